//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and TOML loading
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup validation of a loaded config

mod defaults;
mod types;
mod validation;

pub use types::{Config, ConfigError, DatabaseConfig, HttpConfig, TransferConfig, XdccServerConfig};
pub use validation::{ValidationError, validate};
