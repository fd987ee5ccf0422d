//! Configuration and settings management for FabKit
//!
//! Provides configuration file handling, defaults and validation.
//! Supports JSON and TOML file formats stored in the platform config directory.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, timeout tiers, retries)
//! - Discovery settings (probe parallelism, ping timeout)
//! - Identity probe settings
//! - Backup output directory
//! - Network map (deployment layouts and known hosts)

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use fabkit_communication::{
    DiscoveryConfig, IdentityProbe, PingProbe, SessionConfig, SessionTimeouts, DEFAULT_PORT,
};
use fabkit_core::NetworkMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the platform config directory
pub const CONFIG_DIR_NAME: &str = "fabkit";

/// Config file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// TCP port of the components
    pub port: u16,
    /// Connect and greeting timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Ordinary command timeout in milliseconds
    pub command_timeout_ms: u64,
    /// Motion completion timeout in milliseconds
    pub motion_timeout_ms: u64,
    /// Flash commit timeout in milliseconds
    pub flash_timeout_ms: u64,
    /// Pause before a connect retry in milliseconds
    pub retry_backoff_ms: u64,
    /// Connect retries after a transient failure
    pub retries: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
            command_timeout_ms: 3000,
            motion_timeout_ms: 120_000,
            flash_timeout_ms: 60_000,
            retry_backoff_ms: 1000,
            retries: 1,
        }
    }
}

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Probes in flight at once
    pub max_parallel: usize,
    /// Ping timeout in milliseconds
    pub ping_timeout_ms: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_parallel: 32,
            ping_timeout_ms: 1000,
        }
    }
}

/// Identity probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000,
            command_timeout_ms: 3000,
        }
    }
}

/// Backup settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Directory backup files are written to
    pub output_directory: PathBuf,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            output_directory: dirs::document_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("fabkit-backups"),
        }
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Discovery settings
    pub discovery: DiscoverySettings,
    /// Identity probe settings
    pub identity: IdentitySettings,
    /// Backup settings
    pub backup: BackupSettings,
    /// Network layouts
    pub network: NetworkMap,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> ConfigResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform config file location, `<config dir>/fabkit/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no platform config directory".to_string())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load config from `path`, or the defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        let connection = &self.connection;
        if connection.port == 0 {
            return Err(ConfigError::range("connection.port", "must be non-zero"));
        }
        for (key, value) in [
            ("connection.connect_timeout_ms", connection.connect_timeout_ms),
            ("connection.command_timeout_ms", connection.command_timeout_ms),
            ("connection.motion_timeout_ms", connection.motion_timeout_ms),
            ("connection.flash_timeout_ms", connection.flash_timeout_ms),
            ("discovery.ping_timeout_ms", self.discovery.ping_timeout_ms),
            ("identity.connect_timeout_ms", self.identity.connect_timeout_ms),
            ("identity.command_timeout_ms", self.identity.command_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::range(key, "timeout must be > 0"));
            }
        }
        if connection.command_timeout_ms >= connection.motion_timeout_ms {
            return Err(ConfigError::range(
                "connection.motion_timeout_ms",
                "must be longer than the command timeout",
            ));
        }

        if self.discovery.max_parallel == 0 {
            return Err(ConfigError::range("discovery.max_parallel", "must be > 0"));
        }

        if self.backup.output_directory.as_os_str().is_empty() {
            return Err(ConfigError::range(
                "backup.output_directory",
                "must not be empty",
            ));
        }

        self.validate_network()
    }

    fn validate_network(&self) -> ConfigResult<()> {
        let mut systems = HashSet::new();
        for layout in &self.network.systems {
            if !systems.insert(layout.system) {
                return Err(ConfigError::InvalidNetwork(format!(
                    "{} is listed twice",
                    layout.system
                )));
            }

            let mut roles = HashSet::new();
            for entry in &layout.devices {
                if !roles.insert(entry.role.as_str()) {
                    return Err(ConfigError::InvalidNetwork(format!(
                        "role {} is listed twice in {}",
                        entry.role, layout.system
                    )));
                }
                if !layout.subnet.contains(&entry.ip) {
                    return Err(ConfigError::InvalidNetwork(format!(
                        "{} ({}) is outside the {} subnet {}",
                        entry.role, entry.ip, layout.system, layout.subnet
                    )));
                }
            }
        }

        // Evidence subnets must not overlap or classification is ambiguous
        for (i, a) in self.network.systems.iter().enumerate() {
            for b in &self.network.systems[i + 1..] {
                if a.subnet.contains(&b.subnet.network()) || b.subnet.contains(&a.subnet.network()) {
                    return Err(ConfigError::InvalidNetwork(format!(
                        "{} and {} subnets overlap",
                        a.system, b.system
                    )));
                }
            }
        }
        Ok(())
    }

    /// Timeout tiers for device sessions
    pub fn session_timeouts(&self) -> SessionTimeouts {
        let c = &self.connection;
        SessionTimeouts {
            connect: Duration::from_millis(c.connect_timeout_ms),
            command: Duration::from_millis(c.command_timeout_ms),
            motion: Duration::from_millis(c.motion_timeout_ms),
            flash: Duration::from_millis(c.flash_timeout_ms),
            retry_backoff: Duration::from_millis(c.retry_backoff_ms),
        }
    }

    /// Connection parameters for device sessions
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            port: self.connection.port,
            timeouts: self.session_timeouts(),
            retries: self.connection.retries,
        }
    }

    /// Sweep parameters
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            max_parallel: self.discovery.max_parallel,
        }
    }

    /// Ping probe with the configured timeout
    pub fn ping_probe(&self) -> PingProbe {
        PingProbe::new(Duration::from_millis(self.discovery.ping_timeout_ms))
    }

    /// Identity probe on the configured port
    pub fn identity_probe(&self) -> IdentityProbe {
        IdentityProbe::new(
            self.connection.port,
            Duration::from_millis(self.identity.connect_timeout_ms),
            Duration::from_millis(self.identity.command_timeout_ms),
        )
    }
}
