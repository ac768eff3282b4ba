//! Download requests, keyed by the offer path that was asked for.

use redb::{ReadableDatabase, ReadableTable};
use xdcc_proto::Request;

use super::{REQUESTS, StoreError, decode, encode};

/// Repository for download requests.
pub struct RequestRepository<'a> {
    db: &'a redb::Database,
}

impl<'a> RequestRepository<'a> {
    pub fn new(db: &'a redb::Database) -> Self {
        Self { db }
    }

    /// Store a request, overwriting an earlier one for the same query.
    pub fn put(&self, request: &Request) -> Result<(), StoreError> {
        let value = encode(request)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(REQUESTS)?;
            table.insert(request.query.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, query: &str) -> Result<Option<Request>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REQUESTS)?;
        match table.get(query)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Requests whose query starts with `prefix`, in key order.
    pub fn scan(&self, prefix: &str) -> Result<Vec<Request>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REQUESTS)?;

        let mut requests = Vec::new();
        for item in table.range(prefix..)? {
            let (key, value) = item?;
            if !key.value().starts_with(prefix) {
                break;
            }
            requests.push(decode(value.value())?);
        }
        Ok(requests)
    }
}
