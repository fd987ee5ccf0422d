//! # FabKit
//!
//! Commissioning toolkit for Rorze fab automation components:
//! - Robots, prealigners, loadports and linear tracks
//! - Network discovery and deployment layout detection (SEMDEX / WMC)
//! - Identity probing, status and motion commands over TCP
//! - Configuration backup and network provisioning
//!
//! ## Architecture
//!
//! FabKit is organized as a workspace with multiple crates:
//!
//! 1. **fabkit-core** - Error taxonomy, device data model, network tables
//! 2. **fabkit-communication** - Sessions, workers, discovery, Rorze command dialect
//! 3. **fabkit-settings** - Configuration files and validation
//! 4. **fabkit** - Headless commissioning binary that integrates all crates

pub use fabkit_communication::{communication, firmware};
pub use fabkit_core::data;

pub use fabkit_core::{
    ConnectionError, DeploymentSystem, DeviceDescriptor, DeviceError, DeviceFamily, DeviceKind,
    DiscoveryError, Error, ErrorKind, HostInfo, NetworkMap, ProtocolError, Result,
};

pub use fabkit_communication::{
    backup, backup_with_catalog, Arm, BackupCatalog, BasicSettings, DeviceCommands,
    DeviceSession, Discovery, DiscoveryConfig, DiscoveryReport, IdentityProbe, PingProbe,
    Provisioner, ReachabilityProbe, SessionConfig, SessionState, SessionTimeouts, SessionWorker,
};

pub use fabkit_settings::{Config, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting on stderr
/// - RUST_LOG environment variable support, INFO otherwise
/// - Thread names and ids, so session workers can be told apart
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.to_string()));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
