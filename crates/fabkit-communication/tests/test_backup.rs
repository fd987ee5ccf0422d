mod common;

use chrono::Local;
use common::{connect, descriptor, table, FakeDevice};
use fabkit_communication::{backup, backup_file_name, backup_with_catalog, BackupCatalog, BlockSpec};
use fabkit_core::{DeviceFamily, ErrorKind};
use std::fs;

fn catalog() -> BackupCatalog {
    BackupCatalog::new(
        DeviceFamily::Rr754,
        vec![
            BlockSpec::new("DEQU", 1, "STDT"),
            BlockSpec::new("DRES", 1, "STDT"),
            BlockSpec::new("DMNT", 1, "STDT"),
        ],
    )
}

fn healthy() -> FakeDevice {
    FakeDevice::spawn(
        "eTRB0.CNCT",
        table(&[
            ("oTRB0.DEQU.GTDT", "aoTRB0.DEQU.GTDT:1,12100,0"),
            ("oTRB0.DRES.GTDT", "aoTRB0.DRES.GTDT:200"),
            ("oTRB0.DMNT.GTDT", "aoTRB0.DMNT.GTDT:0,0,1"),
        ]),
    )
}

#[test]
fn test_backup_writes_one_line_per_block() {
    let device = healthy();
    let session = connect(&device, descriptor(DeviceFamily::Rr754, "eTRB0", "SN1"));
    let dir = tempfile::tempdir().unwrap();

    let path = backup_with_catalog(&session, &catalog(), dir.path()).unwrap();

    let today = Local::now().date_naive();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        backup_file_name("RR754", "SN1", today, 0)
    );
    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(
        lines,
        vec!["DEQU.STDT=1,12100,0", "DRES.STDT=200", "DMNT.STDT=0,0,1"]
    );
    assert_eq!(session.status(), format!("Backup saved to '{}'", path.display()));
}

#[test]
fn test_backup_picks_next_index() {
    let device = healthy();
    let session = connect(&device, descriptor(DeviceFamily::Rr754, "eTRB0", "SN1"));
    let dir = tempfile::tempdir().unwrap();
    let today = Local::now().date_naive();
    fs::write(dir.path().join(backup_file_name("RR754", "SN1", today, 4)), "old\n").unwrap();

    let path = backup_with_catalog(&session, &catalog(), dir.path()).unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        backup_file_name("RR754", "SN1", today, 5)
    );
    let old = fs::read_to_string(dir.path().join(backup_file_name("RR754", "SN1", today, 4))).unwrap();
    assert_eq!(old, "old\n");
}

#[test]
fn test_desync_aborts_without_file() {
    let device = FakeDevice::spawn(
        "eTRB0.CNCT",
        table(&[
            ("oTRB0.DEQU.GTDT", "aoTRB0.DEQU.GTDT:1,12100,0"),
            ("oTRB0.DRES.GTDT", "aoTRB0.DEQU.GTDT:1,12100,0"),
            ("oTRB0.DMNT.GTDT", "aoTRB0.DMNT.GTDT:0,0,1"),
        ]),
    );
    let session = connect(&device, descriptor(DeviceFamily::Rr754, "eTRB0", "SN1"));
    let dir = tempfile::tempdir().unwrap();

    let err = backup_with_catalog(&session, &catalog(), dir.path()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolDesync);
    assert!(session.status().starts_with("Reading failed: Mismatch"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    session.close();
    assert_eq!(
        device.join(),
        vec!["oTRB0.DEQU.GTDT".to_string(), "oTRB0.DRES.GTDT".to_string()]
    );
}

#[test]
fn test_unsupported_family_is_refused() {
    let device = FakeDevice::spawn("eTRB0.CNCT", |_: &str| Vec::new());
    let session = connect(
        &device,
        descriptor(DeviceFamily::Unknown("RX999".to_string()), "eTRB0", "SN1"),
    );
    let dir = tempfile::tempdir().unwrap();

    let err = backup(&session, dir.path()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedFamily);
    assert_eq!(
        session.status(),
        "Reading failed: Backup not implemented for component type RX999"
    );
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    session.close();
    assert!(device.join().is_empty());
}

#[test]
fn test_simulation_has_no_catalog() {
    let err = BackupCatalog::for_family(&DeviceFamily::Simulation).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFamily);
}
