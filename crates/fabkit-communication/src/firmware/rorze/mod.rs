//! Rorze command dialect
//!
//! Framing, cancel codes, fixed commands, block transfer with its per-family
//! catalogs, configuration backup and network provisioning.

pub mod backup;
pub mod block_transfer;
pub mod cancel_decoder;
pub mod catalog;
pub mod commands;
pub mod frame;
pub mod provisioning;

pub use backup::{backup, backup_file_name, backup_with_catalog, next_backup_index};
pub use block_transfer::{get_verb, read_block, BlockIndices, BlockSpec};
pub use cancel_decoder::{decode_cancel, describe_cancel, format_cancel, parse_cancel_code};
pub use catalog::BackupCatalog;
pub use commands::{Arm, DeviceCommands};
pub use frame::{FrameBuffer, Reply, ReplyKind};
pub use provisioning::{BasicSettings, Provisioner, Register, RegisterMap};
