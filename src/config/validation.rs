//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no [xdcc.<name>] server is configured")]
    NoServers,
    #[error("xdcc.{0}: name must not be empty or contain '/'")]
    InvalidServerName(String),
    #[error("xdcc.{0}.server must be host:port")]
    InvalidServerAddress(String),
    #[error("xdcc.{0}.nickname is required")]
    MissingNickname(String),
    #[error("xdcc.{0}.username is required")]
    MissingUsername(String),
    #[error("xdcc.{server}: '{channel}' is not a channel name")]
    InvalidChannel { server: String, channel: String },
    #[error("transfer.max_concurrent must be at least 1")]
    ZeroConcurrency,
    #[error("{0} must be at least 1 second")]
    ZeroTimeout(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.xdcc.is_empty() {
        errors.push(ValidationError::NoServers);
    }

    for (name, server) in &config.xdcc {
        // The name is the first segment of every offer path.
        if name.is_empty() || name.contains('/') {
            errors.push(ValidationError::InvalidServerName(name.clone()));
        }
        match server.server.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => errors.push(ValidationError::InvalidServerAddress(name.clone())),
        }
        if server.nickname.trim().is_empty() {
            errors.push(ValidationError::MissingNickname(name.clone()));
        }
        if server.username.trim().is_empty() {
            errors.push(ValidationError::MissingUsername(name.clone()));
        }
        for (field, secs) in [
            ("connect_timeout_secs", server.connect_timeout_secs),
            ("ping_interval_secs", server.ping_interval_secs),
            ("ping_timeout_secs", server.ping_timeout_secs),
        ] {
            if secs == 0 {
                errors.push(ValidationError::ZeroTimeout(format!("xdcc.{}.{}", name, field)));
            }
        }
        for channel in &server.channels {
            if !(channel.starts_with('#') || channel.starts_with('&')) || channel.contains('/') {
                errors.push(ValidationError::InvalidChannel {
                    server: name.clone(),
                    channel: channel.clone(),
                });
            }
        }
    }

    if config.transfer.max_concurrent == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }

    if config.transfer.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("transfer.connect_timeout_secs".into()));
    }
    if config.transfer.read_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("transfer.read_timeout_secs".into()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
