mod common;

use common::{connect, descriptor, send, FakeDevice};
use fabkit_communication::{read_block, BlockSpec};
use fabkit_core::{DeviceFamily, ErrorKind};

#[test]
fn test_table_block_echoes_fixed_index() {
    let device = FakeDevice::spawn("eALN0.CNCT", |command: &str| {
        match command.strip_prefix("oALN0.DSDB.GTDT[1][") {
            Some(rest) => vec![send(&format!("aoALN0.DSDB.GTDT[1]:{}", rest.trim_end_matches(']')))],
            None => Vec::new(),
        }
    });
    let session = connect(&device, descriptor(DeviceFamily::Ra320, "eALN0", "A1"));

    let lines = read_block(&session, &BlockSpec::new("DSDB", 4, "STDT[1]")).unwrap();

    assert_eq!(
        lines,
        vec![
            "DSDB.STDT[1][0]=0",
            "DSDB.STDT[1][1]=1",
            "DSDB.STDT[1][2]=2",
            "DSDB.STDT[1][3]=3",
        ]
    );
    session.close();
    assert_eq!(
        device.join(),
        vec![
            "oALN0.DSDB.GTDT[1][0]".to_string(),
            "oALN0.DSDB.GTDT[1][1]".to_string(),
            "oALN0.DSDB.GTDT[1][2]".to_string(),
            "oALN0.DSDB.GTDT[1][3]".to_string(),
        ]
    );
}

#[test]
fn test_table_block_rejects_wrong_table() {
    let device = FakeDevice::spawn("eALN0.CNCT", |_: &str| vec![send("aoALN0.DSDB.GTDT[2]:7")]);
    let session = connect(&device, descriptor(DeviceFamily::Ra320, "eALN0", "A1"));

    let err = read_block(&session, &BlockSpec::new("DSDB", 4, "STDT[1]")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolDesync);
    session.close();
    assert_eq!(device.join(), vec!["oALN0.DSDB.GTDT[1][0]".to_string()]);
}
