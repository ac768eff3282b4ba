//! downer - XDCC offer harvester and DCC downloader.
//!
//! Sits in IRC channels, records every pack XDCC bots advertise, and pulls
//! files over DCC when asked to through the HTTP API.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod metrics;
pub mod network;
pub mod observer;
pub mod tracker;
pub mod transfer;
