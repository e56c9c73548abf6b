//! Data models: the card record and service configuration.

pub mod config;
pub mod record;
