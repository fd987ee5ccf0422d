//! Configuration backup
//!
//! Reads every block of a catalog into memory and only then writes the
//! `.dat` file, so a failed read never leaves a partial backup behind. Files
//! are named `{family}_{serial}_{YYYYMMDD}_{index}.dat` and never overwritten.

use crate::communication::session::DeviceSession;
use crate::firmware::rorze::block_transfer::read_block;
use crate::firmware::rorze::catalog::BackupCatalog;
use chrono::{Local, NaiveDate};
use fabkit_core::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Backup file extension
pub const BACKUP_EXTENSION: &str = "dat";

/// Placeholder for a missing family or serial in file names
const UNKNOWN_FIELD: &str = "UNKNOWN";

/// Create-new attempts before giving up on a racing writer
const MAX_CREATE_ATTEMPTS: u32 = 16;

fn field(value: &str) -> &str {
    if value.is_empty() {
        UNKNOWN_FIELD
    } else {
        value
    }
}

fn file_stem(family: &str, serial: &str, date: NaiveDate) -> String {
    format!("{}_{}_{}", field(family), field(serial), date.format("%Y%m%d"))
}

/// File name of one backup
pub fn backup_file_name(family: &str, serial: &str, date: NaiveDate, index: u32) -> String {
    format!("{}_{}.{}", file_stem(family, serial, date), index, BACKUP_EXTENSION)
}

/// Index for the next backup of a unit on a date
///
/// One more than the largest index already present in `dir`, or 0 when
/// there is none. Gaps are not reused.
pub fn next_backup_index(dir: &Path, family: &str, serial: &str, date: NaiveDate) -> io::Result<u32> {
    let prefix = format!("{}_", file_stem(family, serial, date));
    let suffix = format!(".{}", BACKUP_EXTENSION);

    let mut highest: Option<u32> = None;
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let index = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(&suffix))
            .and_then(|index| index.parse::<u32>().ok());
        if let Some(index) = index {
            highest = Some(highest.map_or(index, |h| h.max(index)));
        }
    }

    Ok(highest.map_or(0, |h| h.saturating_add(1)))
}

/// Read all blocks of a catalog into restore lines
pub fn read_catalog(session: &DeviceSession, catalog: &BackupCatalog) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(catalog.read_count());
    for spec in catalog.blocks() {
        lines.extend(read_block(session, spec)?);
    }
    Ok(lines)
}

/// Back up a unit using the catalog of its family
pub fn backup(session: &DeviceSession, dir: &Path) -> Result<PathBuf> {
    let catalog = match BackupCatalog::for_family(session.descriptor().family()) {
        Ok(catalog) => catalog,
        Err(err) => {
            error!("{}", err);
            session.set_status(format!("Reading failed: {}", err));
            return Err(err);
        }
    };
    backup_with_catalog(session, &catalog, dir)
}

/// Back up a unit using an explicit catalog
pub fn backup_with_catalog(session: &DeviceSession, catalog: &BackupCatalog, dir: &Path) -> Result<PathBuf> {
    let descriptor = session.descriptor();
    info!(
        "Starting {} backup of {} ({} reads)",
        catalog.family(),
        descriptor.display_name(),
        catalog.read_count()
    );

    let lines = match read_catalog(session, catalog) {
        Ok(lines) => lines,
        Err(err) => {
            error!("Reading failed: {}", err);
            session.set_status(format!("Reading failed: {}", err));
            return Err(err);
        }
    };

    let family = catalog.family().identifier().to_string();
    let serial = descriptor.serial().to_string();
    let date = Local::now().date_naive();

    match write_backup(dir, &family, &serial, date, &lines) {
        Ok(path) => {
            info!("Backup saved to '{}'", path.display());
            session.set_status(format!("Backup saved to '{}'", path.display()));
            Ok(path)
        }
        Err(err) => {
            error!("Writing backup failed: {}", err);
            session.set_status(format!("Writing backup failed: {}", err));
            Err(err)
        }
    }
}

/// Run `write` against a freshly created file, deleting the file on failure
fn write_or_remove<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce() -> io::Result<()>,
{
    if let Err(e) = write() {
        error!("Writing {} failed, removing it: {}", path.display(), e);
        if let Err(remove) = fs::remove_file(path) {
            warn!("Could not remove {}: {}", path.display(), remove);
        }
        return Err(e.into());
    }
    Ok(())
}

/// Write lines to the next free backup file in `dir`
pub fn write_backup(
    dir: &Path,
    family: &str,
    serial: &str,
    date: NaiveDate,
    lines: &[String],
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    for _ in 0..MAX_CREATE_ATTEMPTS {
        let index = next_backup_index(dir, family, serial, date)?;
        let path = dir.join(backup_file_name(family, serial, date, index));
        debug!("Reading data to {}", path.display());

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!("File exists! Picking a new index for {}", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut contents = lines.join("\n");
        contents.push('\n');
        write_or_remove(&path, || {
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        })?;
        return Ok(path);
    }

    Err(Error::other(format!(
        "no free backup file name in {} after {} attempts",
        dir.display(),
        MAX_CREATE_ATTEMPTS
    )))
}
