//! Error types for the protocol crate.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors raised while interpreting protocol input.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// An IRC line could not be parsed.
    #[error("invalid message: {string}: {cause}")]
    InvalidMessage {
        /// The offending line.
        string: String,
        /// What went wrong.
        #[source]
        cause: MessageParseError,
    },

    /// A DCC SEND handshake was malformed.
    #[error("invalid DCC SEND handshake: {0}")]
    InvalidDcc(String),

    /// An offer path did not have the `server/channel/nick/slot` shape.
    #[error("invalid offer path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Which part was wrong.
        reason: &'static str,
    },
}

/// Errors encountered while parsing a single IRC line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// The line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// The command token was missing or not a letter word / 3-digit numeric.
    #[error("invalid command at position {position}")]
    InvalidCommand {
        /// Byte offset where parsing stopped.
        position: usize,
    },
}
