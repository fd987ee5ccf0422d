//! Identity probing
//!
//! Connects to one address, reads the greeting, and for recognised roles asks
//! the unit for its serial number and version string. The probe never fails:
//! anything that goes wrong yields an unidentified descriptor.

use crate::communication::discovery::DiscoveryReport;
use crate::communication::session::DeviceSession;
use crate::communication::{SessionConfig, SessionTimeouts, DEFAULT_PORT};
use fabkit_core::{DeploymentSystem, DeviceDescriptor, DeviceFamily, DeviceKind, Error, Result};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Register holding the serial number as its first comma field
const SERIAL_QUERY: &str = "DEQU.GTDT[0]";

/// Version string query, `<model> ... Ver <firmware> ...`
const VERSION_QUERY: &str = "GVER";

struct Identity {
    type_string: String,
    serial: String,
    family: DeviceFamily,
    firmware: String,
}

/// Split a `GVER` payload into model code and firmware version
///
/// The model code is the first whitespace field; the firmware is the field
/// following `Ver` (or the rest of a `Ver1.19` style field).
pub fn parse_version(payload: &str) -> (String, String) {
    let fields: Vec<&str> = payload.split_whitespace().collect();
    let model = fields.first().map(|s| s.to_string()).unwrap_or_default();

    let firmware = fields
        .iter()
        .position(|field| field.eq_ignore_ascii_case("ver"))
        .and_then(|pos| fields.get(pos + 1))
        .map(|s| s.to_string())
        .or_else(|| {
            fields.iter().skip(1).find_map(|field| {
                let lower = field.to_ascii_lowercase();
                lower
                    .strip_prefix("ver")
                    .map(|rest| field[field.len() - rest.len()..].trim_start_matches('.').to_string())
            })
        })
        .unwrap_or_default();

    (model, firmware)
}

/// Builds descriptors by talking to devices
#[derive(Debug, Clone)]
pub struct IdentityProbe {
    port: u16,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl Default for IdentityProbe {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(3),
            command_timeout: Duration::from_secs(3),
        }
    }
}

impl IdentityProbe {
    pub fn new(port: u16, connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
            command_timeout,
        }
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            port: self.port,
            timeouts: SessionTimeouts {
                connect: self.connect_timeout,
                command: self.command_timeout,
                ..SessionTimeouts::default()
            },
            retries: 0,
        }
    }

    /// Identify the unit at `ip`
    pub fn identify(&self, ip: Ipv4Addr, system: DeploymentSystem, role: &str) -> DeviceDescriptor {
        let descriptor = DeviceDescriptor::new(ip).with_system(system).with_role(role);

        match self.probe(ip) {
            Ok(identity) => {
                let descriptor = descriptor
                    .with_type_string(identity.type_string)
                    .with_serial(identity.serial)
                    .with_family(identity.family)
                    .with_firmware(identity.firmware);
                info!("Identified {}", descriptor);
                descriptor
            }
            Err(err) => {
                warn!("Could not identify {} ({}): {}", ip, role, err);
                descriptor
            }
        }
    }

    fn probe(&self, ip: Ipv4Addr) -> Result<Identity> {
        let session = DeviceSession::new(DeviceDescriptor::new(ip), self.session_config());
        session.connect()?;

        let type_string = session.type_string();
        debug!("{} announced type {}", ip, type_string);
        let kind = DeviceKind::from_type_string(&type_string);
        if kind.is_none() {
            session.close();
            return Err(Error::other(format!(
                "no known role in type string '{}'",
                type_string
            )));
        }

        let result = Self::query_identity(&session);
        session.close();
        let (serial, version) = result?;

        let (model, firmware) = parse_version(&version);
        let family = DeviceFamily::from_identifier(&model);
        if !family.is_known() {
            warn!("{} reports unknown model code '{}'", ip, model);
        }

        Ok(Identity {
            type_string,
            serial,
            family,
            firmware,
        })
    }

    fn query_identity(session: &DeviceSession) -> Result<(String, String)> {
        let serial = session.query(SERIAL_QUERY)?;
        let serial = serial.split(',').next().unwrap_or_default().trim().to_string();
        let version = session.query(VERSION_QUERY)?;
        Ok((serial, version))
    }

    /// Identify every reachable host of a discovery report concurrently
    ///
    /// Each probe runs on the blocking pool. Descriptors come back in the
    /// order of the report.
    pub async fn identify_report(&self, report: &DiscoveryReport) -> Vec<DeviceDescriptor> {
        let mut set = JoinSet::new();
        for (index, host) in report.hosts.iter().enumerate() {
            let probe = self.clone();
            let (ip, system, label) = (host.ip, host.system, host.label.clone());
            set.spawn_blocking(move || (index, probe.identify(ip, system, &label)));
        }

        let mut found = Vec::with_capacity(report.hosts.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => found.push(entry),
                Err(err) => warn!("Identity task failed: {}", err),
            }
        }
        found.sort_by_key(|(index, _)| *index);
        found.into_iter().map(|(_, descriptor)| descriptor).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("RR754 Ver 1.19U 2021/04/01"),
            ("RR754".to_string(), "1.19U".to_string())
        );
        assert_eq!(
            parse_version("RA320_003 Ver1.05"),
            ("RA320_003".to_string(), "1.05".to_string())
        );
        assert_eq!(parse_version("RTS13"), ("RTS13".to_string(), String::new()));
        assert_eq!(parse_version(""), (String::new(), String::new()));
    }

    #[test]
    fn test_unreachable_host_is_unidentified() {
        let probe = IdentityProbe::new(1, Duration::from_millis(200), Duration::from_millis(200));
        let descriptor = probe.identify(Ipv4Addr::LOCALHOST, DeploymentSystem::Wmc, "Robot");
        assert!(!descriptor.is_identified());
        assert_eq!(descriptor.role(), "Robot");
        assert_eq!(descriptor.system(), DeploymentSystem::Wmc);
        assert!(!descriptor.family().is_known());
    }
}
