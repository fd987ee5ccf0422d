//! Backup catalogs
//!
//! The ordered blocks the maintenance "Read Data" function reads for each
//! family. These tables are hardware knowledge; verify changes on a unit.

use crate::firmware::rorze::block_transfer::BlockSpec;
use fabkit_core::{DeviceError, DeviceFamily, Result};

/// XAX1 parameter indices on robots
const ROBOT_XAX1_INDICES: [usize; 17] = [0, 1, 2, 3, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 40];

/// XAX1 parameter indices on linear tracks
const TRACK_XAX1_INDICES: [usize; 16] = [0, 1, 2, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 40];

/// Ordered block list for one family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupCatalog {
    family: DeviceFamily,
    blocks: Vec<BlockSpec>,
}

impl BackupCatalog {
    /// Catalog from an explicit block list
    pub fn new(family: DeviceFamily, blocks: Vec<BlockSpec>) -> Self {
        Self { family, blocks }
    }

    /// Catalog for a device family
    pub fn for_family(family: &DeviceFamily) -> Result<Self> {
        let blocks = match family {
            DeviceFamily::Rr754 => robot_blocks(),
            DeviceFamily::Ra320 | DeviceFamily::Ra320Rev1 | DeviceFamily::Ra420Rev1 => {
                prealigner_blocks()
            }
            DeviceFamily::Rv201F07 => loadport_blocks(),
            DeviceFamily::Rts13 => linear_track_blocks(),
            DeviceFamily::Ra320Rev3 | DeviceFamily::Simulation | DeviceFamily::Unknown(_) => {
                return Err(DeviceError::UnsupportedFamily {
                    family: family.to_string(),
                    operation: "Backup".to_string(),
                }
                .into())
            }
        };
        Ok(Self::new(family.clone(), blocks))
    }

    pub fn family(&self) -> &DeviceFamily {
        &self.family
    }

    pub fn blocks(&self) -> &[BlockSpec] {
        &self.blocks
    }

    /// Total number of reads
    pub fn read_count(&self) -> usize {
        self.blocks.iter().map(BlockSpec::read_count).sum()
    }
}

fn robot_blocks() -> Vec<BlockSpec> {
    let mut blocks = vec![
        BlockSpec::root(&[1], "STDT"),
        BlockSpec::new("DEQU", 1, "STDT"),
        BlockSpec::new("DRES", 1, "STDT"),
        BlockSpec::new("DRCI", 5, "STDT"),
        BlockSpec::new("DRCS", 5, "STDT"),
        BlockSpec::new("DRCH", 5, "STDT"),
        BlockSpec::new("DMNT", 5, "STDT"),
        BlockSpec::list("XAX1", &ROBOT_XAX1_INDICES, "STDT"),
        BlockSpec::new("XAX1", 1, "SPRM"),
    ];

    for axis in ["ZAX1", "ROT1", "ARM1", "ARM2"] {
        blocks.push(BlockSpec::new(axis, 4, "STDT"));
        blocks.push(BlockSpec::new(axis, 1, "SPRM"));
    }
    for axis in ["XAX1", "ZAX1", "ROT1", "ARM1", "ARM2"] {
        blocks.push(BlockSpec::new(axis, 16, "SEPM"));
    }

    blocks.extend([
        BlockSpec::new("DAPM", 3, "STDT"),
        BlockSpec::new("DITK", 32, "STDT"),
        BlockSpec::new("DOUT", 32, "STDT"),
        BlockSpec::new("DTRB", 400, "STDA"),
        BlockSpec::new("DTUL", 400, "STDA"),
        BlockSpec::new("DMPR", 400, "STDT"),
        BlockSpec::new("DCFG", 400, "STDT"),
    ]);
    for table in 0..4 {
        blocks.push(BlockSpec::new("DAXM", 400, &format!("STDT[{}]", table)));
    }
    blocks.extend([
        BlockSpec::new("DSSC", 32, "STDT"),
        BlockSpec::new("DIND", 4, "STDT"),
    ]);
    blocks
}

/// Standard prealigner without vacuum spindle
fn prealigner_blocks() -> Vec<BlockSpec> {
    let mut blocks = vec![
        BlockSpec::new("DRES", 1, "STDT"),
        BlockSpec::new("DEQU", 1, "STDT"),
        BlockSpec::new("DRCS", 5, "STDT"),
        BlockSpec::new("DMNT", 5, "STDT"),
    ];
    for table in 0..5 {
        blocks.push(BlockSpec::new("DSDB", 4, &format!("STDT[{}]", table)));
    }
    blocks.extend([
        BlockSpec::new("DTMP", 3, "STDT"),
        BlockSpec::new("DCAM", 4, "STDT"),
        BlockSpec::new("DALN", 10, "STDT"),
        BlockSpec::new("DROT", 100, "STDT"),
        BlockSpec::new("DSEN", 10, "STDT"),
        BlockSpec::new("DRCP", 10, "STDT"),
    ]);
    blocks
}

fn loadport_blocks() -> Vec<BlockSpec> {
    vec![
        BlockSpec::root(&[1], "STDT"),
        BlockSpec::new("DEQU", 1, "STDT"),
        BlockSpec::new("DRES", 1, "STDT"),
        BlockSpec::new("DRCI", 2, "STDT"),
        BlockSpec::new("DRCS", 2, "STDT"),
        BlockSpec::new("DMNT", 2, "STDT"),
        BlockSpec::new("YAX1", 4, "STDT"),
        BlockSpec::new("YAX1", 1, "SPRM"),
        BlockSpec::new("ZAX1", 4, "STDT"),
        BlockSpec::new("ZAX1", 1, "SPRM"),
        BlockSpec::new("DSTG", 1, "STDT"),
        BlockSpec::new("DMPR", 1, "STDT"),
        BlockSpec::new("DPRM", 64, "STDT"),
        BlockSpec::new("DCST", 1, "STDT"),
        BlockSpec::new("DE84", 1, "STDT"),
    ]
}

fn linear_track_blocks() -> Vec<BlockSpec> {
    vec![
        BlockSpec::new("DEQU", 1, "STDT"),
        BlockSpec::new("DRES", 1, "STDT"),
        BlockSpec::new("DRCI", 1, "STDT").with_bracket_single(),
        BlockSpec::new("DRCS", 1, "STDT").with_bracket_single(),
        BlockSpec::new("DRCH", 1, "STDT").with_bracket_single(),
        BlockSpec::new("DMNT", 1, "STDT").with_bracket_single(),
        BlockSpec::list("XAX1", &TRACK_XAX1_INDICES, "STDT"),
        BlockSpec::new("XAX1", 1, "SPRM"),
        BlockSpec::new("XAX1", 16, "SEPM"),
        BlockSpec::new("DTBL", 400, "STDA"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabkit_core::ErrorKind;

    #[test]
    fn test_catalog_per_family() {
        let robot = BackupCatalog::for_family(&DeviceFamily::Rr754).unwrap();
        assert_eq!(robot.blocks()[0], BlockSpec::root(&[1], "STDT"));
        // 1 + 1 + 1 + 20 + 17 + 1 + 4*5 + 5*16 + 3 + 32 + 32 + 4*400 + 4*400 + 32 + 4
        assert_eq!(robot.read_count(), 3444);

        let track = BackupCatalog::for_family(&DeviceFamily::Rts13).unwrap();
        assert!(track.blocks()[2].bracket_single);
        assert_eq!(track.read_count(), 1 + 1 + 4 + 16 + 1 + 16 + 400);

        let loadport = BackupCatalog::for_family(&DeviceFamily::Rv201F07).unwrap();
        assert_eq!(loadport.blocks().len(), 15);

        for family in [DeviceFamily::Ra320, DeviceFamily::Ra320Rev1, DeviceFamily::Ra420Rev1] {
            let catalog = BackupCatalog::for_family(&family).unwrap();
            assert_eq!(catalog.read_count(), 1 + 1 + 5 + 5 + 20 + 3 + 4 + 10 + 100 + 10 + 10);
        }
    }

    #[test]
    fn test_unsupported_families() {
        for family in [
            DeviceFamily::Ra320Rev3,
            DeviceFamily::Simulation,
            DeviceFamily::Unknown("RX999".to_string()),
        ] {
            let err = BackupCatalog::for_family(&family).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedFamily);
        }
    }
}
