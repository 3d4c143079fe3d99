//! Configuration loading.

/// TOML configuration (`delve.toml`).
pub mod toml_config;

pub use toml_config::{ConfigError, DelveConfig, ResearchConfig};
