//! Firmware command dialects
//!
//! Supported controllers:
//! - Rorze: wafer robots, prealigners, loadports and linear tracks

pub mod rorze;

pub use rorze::{
    backup, read_block, Arm, BackupCatalog, BlockSpec, DeviceCommands, Provisioner, RegisterMap,
};
