//! Command modules for the Conductor CLI

pub mod config;
pub mod api;

pub use config::{ConductorConfig, ConfigError, LogFormat};
