//! Error types for the settings crate.
//!
//! This module provides structured error types for loading, saving and
//! validating configuration files.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file could not be written.
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration directory could not be found or created.
    #[error("Config directory error: {0}")]
    ConfigDirectory(String),

    /// JSON serialization/deserialization error.
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("Invalid TOML config: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("Failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A configuration validation error occurred.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to configuration validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file format is not supported.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A configuration value is out of valid range.
    #[error("Value out of range for '{key}': {reason}")]
    ValueOutOfRange { key: String, reason: String },

    /// The network map is inconsistent.
    #[error("Invalid network map: {0}")]
    InvalidNetwork(String),
}

impl ConfigError {
    pub(crate) fn range(key: &str, reason: &str) -> Self {
        Self::ValueOutOfRange {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnsupportedFormat("yaml".to_string());
        assert_eq!(err.to_string(), "Unsupported config format: yaml");

        let err = ConfigError::range("connection.port", "must be non-zero");
        assert_eq!(
            err.to_string(),
            "Value out of range for 'connection.port': must be non-zero"
        );
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::InvalidNetwork("no systems".to_string());
        let settings_err: SettingsError = config_err.into();
        assert!(matches!(settings_err, SettingsError::Config(_)));
        assert_eq!(
            settings_err.to_string(),
            "Config error: Invalid network map: no systems"
        );
    }

    #[test]
    fn test_read_error_names_path() {
        let err = SettingsError::Read {
            path: PathBuf::from("/tmp/fabkit.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read config file /tmp/fabkit.toml: missing"
        );
    }
}
