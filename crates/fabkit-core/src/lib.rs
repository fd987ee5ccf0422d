//! # FabKit Core
//!
//! Core types for FabKit.
//! Provides the error taxonomy, the device data model and the static
//! network tables shared by discovery, sessions and provisioning.

pub mod data;
pub mod error;

pub use data::{
    network::{HostInfo, KnownHost, NetworkMap, RoleAddress, SystemLayout},
    short_name, DeploymentSystem, DeviceDescriptor, DeviceFamily, DeviceKind,
    SIMULATION_SHORT_NAME, SIMULATION_TYPE_STRING,
};

pub use error::{
    ConnectionError, DeviceError, DiscoveryError, Error, ErrorKind, ProtocolError, Result,
};
