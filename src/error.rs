//! Unified error handling for downer.
//!
//! One error enum per layer, with metric labels for the ones that end up on
//! a dashboard. [`StoreError`] lives with the store in [`crate::db`].

use std::net::SocketAddrV4;
use thiserror::Error;
use xdcc_proto::ProtocolError;

use crate::db::StoreError;

// ============================================================================
// Transfer Errors (DCC receive)
// ============================================================================

/// Errors that end a DCC transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },

    #[error("{phase} timed out after {secs}s")]
    Timeout { phase: &'static str, secs: u64 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer closed the connection before sending any data")]
    Empty,

    #[error("incomplete transfer: expected {expected} bytes, received {received}")]
    Incomplete { expected: u64, received: u64 },

    #[error("transfer cancelled after {0} bytes")]
    Cancelled(u64),

    #[error("passive DCC is not supported")]
    PassiveUnsupported,

    #[error("transfer pool is shut down")]
    PoolClosed,
}

impl TransferError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidFileName(_) => "invalid_file_name",
            Self::Connect { .. } => "connect",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
            Self::Empty => "empty",
            Self::Incomplete { .. } => "incomplete",
            Self::Cancelled(_) => "cancelled",
            Self::PassiveUnsupported => "passive_unsupported",
            Self::PoolClosed => "pool_closed",
        }
    }
}

// ============================================================================
// Session Errors (IRC link)
// ============================================================================

/// Errors on an IRC session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session is not connected")]
    Closed,

    #[error("server closed the link: {0}")]
    ServerError(String),

    #[error("{phase} timed out after {secs}s")]
    Timeout { phase: &'static str, secs: u64 },
}

// ============================================================================
// Request Errors (download requests)
// ============================================================================

/// Errors raised while issuing a download request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    InvalidPath(#[from] ProtocolError),

    #[error("no live session for server {0:?}")]
    UnknownServer(String),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl RequestError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "invalid_path",
            Self::UnknownServer(_) => "unknown_server",
            Self::Session(_) => "session",
            Self::Store(_) => "store",
        }
    }
}
