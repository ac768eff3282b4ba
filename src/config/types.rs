//! Core configuration types and loading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::{
    default_connect_timeout, default_database_path, default_download_dir, default_http_address,
    default_max_concurrent, default_ping_interval, default_ping_timeout, default_read_timeout,
    default_reconnect_delay, default_server_connect_timeout, default_true,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Offer/request storage.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// HTTP API listener.
    #[serde(default)]
    pub http: HttpConfig,
    /// DCC transfer behaviour.
    #[serde(default)]
    pub transfer: TransferConfig,
    /// IRC networks to watch, keyed by the name used in offer paths.
    #[serde(default)]
    pub xdcc: BTreeMap<String, XdccServerConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the redb file.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to bind to (default: 127.0.0.1:8080).
    #[serde(default = "default_http_address")]
    pub address: SocketAddr,
    /// Serve Prometheus metrics on `/metrics` (default: true).
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            metrics: true,
        }
    }
}

/// DCC transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Directory completed files land in.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Transfers allowed to run at once; further handshakes queue (default: 4).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Seconds to wait for the DCC connection (default: 30).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Seconds a single read may stall before the transfer fails (default: 120).
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Send the 32-bit DCC byte-count acknowledgements (default: true).
    #[serde(default = "default_true")]
    pub send_acks: bool,
}

impl TransferConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent: default_max_concurrent(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            send_acks: true,
        }
    }
}

/// One IRC network to join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XdccServerConfig {
    /// `host:port` of the IRC server.
    pub server: String,
    pub nickname: String,
    pub username: String,
    /// Realname sent in USER (defaults to the username).
    #[serde(default)]
    pub realname: Option<String>,
    /// Channels joined after registration.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Seconds to wait before reconnecting after a drop (default: 30).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    /// Seconds to wait for the TCP connect (default: 30).
    #[serde(default = "default_server_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Seconds of inbound silence before we PING the server (default: 120).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    /// Seconds after our PING before a silent link is dropped (default: 60).
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
}

impl XdccServerConfig {
    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.username)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}
