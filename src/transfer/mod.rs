//! DCC file transfers.
//!
//! - [`engine`]: receives one DCC stream into the download directory
//! - [`pool`]: bounds how many run at once and tracks them for the API

pub mod engine;
pub mod pool;

pub use engine::{
    BUFFER_SIZE, TransferControl, TransferEngine, TransferOptions, TransferOutcome,
    sanitize_file_name,
};
pub use pool::{TransferJob, TransferListener, TransferPool, TransferSnapshot, TransferState};
