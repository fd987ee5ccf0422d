//! # FabKit Communication
//!
//! Device communication for FabKit.
//! Connects to Rorze fab automation components over TCP, frames commands
//! and replies, and runs discovery, identity probing, configuration backup
//! and network provisioning on top of per-device sessions.

pub mod communication;
pub mod firmware;

pub use communication::{
    classify, parse_version, DeviceSession, Discovery, DiscoveryConfig, DiscoveryReport,
    IdentityProbe, PingProbe, ReachabilityProbe, SessionConfig, SessionState, SessionTimeouts,
    SessionWorker, Transport, WorkerError, DEFAULT_PORT,
};

pub use firmware::rorze::{
    backup, backup_file_name, backup_with_catalog, next_backup_index, read_block, Arm,
    BackupCatalog, BasicSettings, BlockSpec, DeviceCommands, Provisioner, Register, RegisterMap,
    Reply, ReplyKind,
};
