//! Runtime configuration.
//!
//! Settings are read from a TOML file; every field has a default so a
//! missing file or section yields a usable configuration.

mod loader;
mod types;

pub use loader::{ConfigError, CONFIG_PATH_ENV};
pub use types::{EventsConfig, LoggingConfig, RuntimeConfig, TestingConfig};
