//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Database Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "downer.db".to_string()
}

// =============================================================================
// HTTP Defaults
// =============================================================================

pub fn default_http_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

// =============================================================================
// Transfer Defaults
// =============================================================================

pub fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

pub fn default_max_concurrent() -> usize {
    4
}

pub fn default_connect_timeout() -> u64 {
    30
}

pub fn default_read_timeout() -> u64 {
    120
}

// =============================================================================
// Session Defaults
// =============================================================================

pub fn default_reconnect_delay() -> u64 {
    30
}

pub fn default_server_connect_timeout() -> u64 {
    30
}

pub fn default_ping_interval() -> u64 {
    120
}

pub fn default_ping_timeout() -> u64 {
    60
}
