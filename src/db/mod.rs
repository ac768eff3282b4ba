//! Redb-backed persistence for harvested offers and download requests.
//!
//! # Schema
//!
//! ```text
//! xdcc_offers:        "server/channel/nick"      -> Bot (serde_json)
//! xdcc_packages:      "server/channel/nick/slot" -> Package (serde_json)
//! xdcc_package_order: write sequence             -> package key
//! xdcc_package_seq:   package key                -> write sequence
//! xdcc_requests:      query                      -> Request (serde_json)
//! ```
//!
//! Every put is one write transaction. Reads are snapshots and never block
//! each other or a writer.

mod offers;
mod packages;
mod requests;
mod search;

pub use offers::{BotRecord, OfferRepository};
pub use packages::PackageRepository;
pub use requests::RequestRepository;
pub use search::SearchFilter;

use redb::TableDefinition;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub(crate) const OFFERS: TableDefinition<&str, &[u8]> = TableDefinition::new("xdcc_offers");
pub(crate) const PACKAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("xdcc_packages");
pub(crate) const PACKAGE_ORDER: TableDefinition<u64, &str> =
    TableDefinition::new("xdcc_package_order");
pub(crate) const PACKAGE_SEQ: TableDefinition<&str, u64> = TableDefinition::new("xdcc_package_seq");
pub(crate) const REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("xdcc_requests");

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid search filter: {0}")]
    Query(String),
}

/// Shared handle to the offer database.
#[derive(Clone)]
pub struct Database {
    db: Arc<redb::Database>,
}

impl Database {
    /// Open (or create) the database file and make sure every table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), error = %e, "Failed to create database directory");
        }

        let db = redb::Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(OFFERS)?;
            let _ = write_txn.open_table(PACKAGES)?;
            let _ = write_txn.open_table(PACKAGE_ORDER)?;
            let _ = write_txn.open_table(PACKAGE_SEQ)?;
            let _ = write_txn.open_table(REQUESTS)?;
        }
        write_txn.commit()?;

        info!(path = %path.display(), "Database opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Bot snapshots.
    pub fn offers(&self) -> OfferRepository<'_> {
        OfferRepository::new(&self.db)
    }

    /// Package snapshots and search.
    pub fn packages(&self) -> PackageRepository<'_> {
        PackageRepository::new(&self.db)
    }

    /// Download requests.
    pub fn requests(&self) -> RequestRepository<'_> {
        RequestRepository::new(&self.db)
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}
