use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::RuntimeConfig;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "COMPONENT_STORE_CONFIG";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl RuntimeConfig {
    /// Returns the path to the configuration file.
    ///
    /// Uses `$COMPONENT_STORE_CONFIG` when set, otherwise
    /// `~/.config/component-store/config.toml` (via `dirs::config_dir()`).
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("component-store").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// - If the file doesn't exist, returns `RuntimeConfig::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(RuntimeConfig::default());
        }

        Self::load_from(&path)
    }

    /// Loads and validates configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content).map_err(|err| match err {
            ParseFailure::Toml(source) => ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Invalid(err) => err,
        })
    }

    fn parse(content: &str) -> Result<Self, ParseFailure> {
        let config: RuntimeConfig = toml::from_str(content).map_err(ParseFailure::Toml)?;
        config.validate().map_err(ParseFailure::Invalid)?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The global event sink keeps at least one event
    /// - Test steps have a non-zero settle timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events.capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "events.capacity must be greater than zero".to_string(),
            });
        }

        if self.testing.settle_timeout_ms == 0 {
            return Err(ConfigError::ValidationError {
                message: "testing.settle_timeout_ms must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}
