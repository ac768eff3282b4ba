//! Package snapshots and the recency-ordered search over them.

use redb::{ReadableDatabase, ReadableTable};
use tracing::debug;
use xdcc_proto::{Package, PackageRecord, path::package_key};

use super::{PACKAGE_ORDER, PACKAGE_SEQ, PACKAGES, SearchFilter, StoreError, decode, encode};

/// Repository for package snapshots.
pub struct PackageRepository<'a> {
    db: &'a redb::Database,
}

impl<'a> PackageRepository<'a> {
    pub fn new(db: &'a redb::Database) -> Self {
        Self { db }
    }

    /// Store a package advertisement, replacing any earlier one for the same
    /// slot. The package becomes the most recent entry for search.
    pub fn put(
        &self,
        server: &str,
        channel: &str,
        nick: &str,
        package: &Package,
    ) -> Result<String, StoreError> {
        let key = package_key(server, channel, nick, package.slot);
        let value = encode(package)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut packages = write_txn.open_table(PACKAGES)?;
            let mut order = write_txn.open_table(PACKAGE_ORDER)?;
            let mut seq = write_txn.open_table(PACKAGE_SEQ)?;

            let next = match order.last()? {
                Some((last, _)) => last.value() + 1,
                None => 0,
            };
            let previous = seq.get(key.as_str())?.map(|v| v.value());
            if let Some(previous) = previous {
                order.remove(previous)?;
            }

            packages.insert(key.as_str(), value.as_slice())?;
            order.insert(next, key.as_str())?;
            seq.insert(key.as_str(), next)?;
        }
        write_txn.commit()?;

        debug!(key = %key, name = %package.name, "Stored package");
        Ok(key)
    }

    pub fn get(&self, key: &str) -> Result<Option<Package>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PACKAGES)?;
        match table.get(key)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Packages whose stored record matches `filter`, most recently written
    /// first.
    pub fn search(&self, filter: &str) -> Result<Vec<PackageRecord>, StoreError> {
        let filter = SearchFilter::new(filter)?;

        let read_txn = self.db.begin_read()?;
        let order = read_txn.open_table(PACKAGE_ORDER)?;
        let packages = read_txn.open_table(PACKAGES)?;

        let mut records = Vec::new();
        for item in order.iter()?.rev() {
            let (_seq, key) = item?;
            let key = key.value();
            let Some(value) = packages.get(key)? else {
                continue;
            };
            let raw = value.value();
            if filter.matches(&String::from_utf8_lossy(raw)) {
                records.push(PackageRecord {
                    path: key.to_string(),
                    package: decode(raw)?,
                });
            }
        }
        Ok(records)
    }
}
