//! FabKit Settings Crate
//!
//! Handles application configuration: file loading and saving, defaults,
//! validation and conversion into session and discovery parameters.

pub mod config;
pub mod error;

pub use config::{
    BackupSettings, Config, ConnectionSettings, DiscoverySettings, IdentitySettings,
    CONFIG_DIR_NAME, CONFIG_FILE_NAME,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
