//! Network provisioning
//!
//! Writes the host, port and log-host registers a unit needs before it can
//! join a deployment system. Register addresses differ per family; a family
//! without a map, or a register the map lacks, is refused before anything
//! is sent. Every write is committed to flash with `WTDT`.

use crate::communication::session::DeviceSession;
use crate::firmware::rorze::frame::{encode_command, encode_write};
use fabkit_core::{DeploymentSystem, DeviceError, DeviceFamily, Result};
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{error, info};

/// Verb committing written registers to flash
pub const COMMIT_VERB: &str = "WTDT";

/// Host IP written by the basic settings (broadcast)
pub const BASIC_HOST_IP: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Host port written by the basic settings
pub const BASIC_HOST_PORT: u16 = 12000;

/// Provisionable registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    HostIp,
    HostPort,
    LogHost,
    DeviceIp,
    BodyNumber,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostIp => write!(f, "Host IP"),
            Self::HostPort => write!(f, "TCP/IP port"),
            Self::LogHost => write!(f, "Log host"),
            Self::DeviceIp => write!(f, "IP"),
            Self::BodyNumber => write!(f, "Body number"),
        }
    }
}

/// Register addresses of one family, written as set commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterMap {
    family: DeviceFamily,
    host_ip: &'static str,
    host_port: &'static str,
    log_host: &'static str,
    device_ip: Option<&'static str>,
    body_number: Option<&'static str>,
}

impl RegisterMap {
    /// Register map of a family
    ///
    /// `RA320_001` has no known layout and gets no map. `RA320` has no
    /// device IP register.
    pub fn for_family(family: &DeviceFamily) -> Result<Self> {
        let map = match family {
            DeviceFamily::Ra320 | DeviceFamily::Ra320Rev3 | DeviceFamily::Ra420Rev1 => Self {
                family: family.clone(),
                host_ip: "DEQU.STDT[1]",
                host_port: "DEQU.STDT[2]",
                log_host: "DEQU.STDT[4]",
                device_ip: (*family != DeviceFamily::Ra320).then_some("DEQU.STDT[3]"),
                body_number: Some("DEQU.STDT[0]"),
            },
            DeviceFamily::Rr754
            | DeviceFamily::Rts13
            | DeviceFamily::Rv201F07
            | DeviceFamily::Simulation => Self {
                family: family.clone(),
                host_ip: "DEQU.STDT[1]",
                host_port: "DEQU.STDT[68]",
                log_host: "DEQU.STDT[69]",
                device_ip: Some("STDT[1]"),
                body_number: (*family == DeviceFamily::Rv201F07).then_some("DEQU.STDT[0]"),
            },
            DeviceFamily::Ra320Rev1 | DeviceFamily::Unknown(_) => {
                return Err(DeviceError::UnsupportedFamily {
                    family: family.to_string(),
                    operation: "Provisioning".to_string(),
                }
                .into())
            }
        };
        Ok(map)
    }

    pub fn family(&self) -> &DeviceFamily {
        &self.family
    }

    /// Set address of a register
    pub fn address(&self, register: Register) -> Result<&'static str> {
        let address = match register {
            Register::HostIp => Some(self.host_ip),
            Register::HostPort => Some(self.host_port),
            Register::LogHost => Some(self.log_host),
            Register::DeviceIp => self.device_ip,
            Register::BodyNumber => self.body_number,
        };
        address.ok_or_else(|| {
            DeviceError::UnsupportedFamily {
                family: self.family.to_string(),
                operation: format!("Setting {}", register),
            }
            .into()
        })
    }

    /// Get address of a register, `DEQU.STDT[68]` becomes `DEQU.GTDT[68]`
    pub fn read_address(&self, register: Register) -> Result<String> {
        let address = self.address(register)?;
        Ok(match address.rsplit_once('.') {
            Some((block, verb)) => format!("{}.G{}", block, &verb[1..]),
            None => format!("G{}", &address[1..]),
        })
    }
}

/// System-wide values written by `apply_basic_settings`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicSettings {
    pub host_ip: Ipv4Addr,
    pub host_port: u16,
    pub log_host: Ipv4Addr,
}

impl BasicSettings {
    /// Settings for a deployment system
    pub fn for_system(system: DeploymentSystem) -> Result<Self> {
        let log_host = match system {
            DeploymentSystem::Wmc => Ipv4Addr::new(192, 168, 30, 1),
            DeploymentSystem::Semdex => Ipv4Addr::new(192, 168, 0, 10),
            DeploymentSystem::Unknown => {
                error!("No system found in configuration");
                return Err(DeviceError::NoSystem.into());
            }
        };
        Ok(Self {
            host_ip: BASIC_HOST_IP,
            host_port: BASIC_HOST_PORT,
            log_host,
        })
    }
}

/// Writes provisioning registers through a session
pub struct Provisioner<'a> {
    session: &'a DeviceSession,
    map: RegisterMap,
}

impl<'a> Provisioner<'a> {
    /// Provisioner for the family of the session's descriptor
    pub fn new(session: &'a DeviceSession) -> Result<Self> {
        match RegisterMap::for_family(session.descriptor().family()) {
            Ok(map) => Ok(Self { session, map }),
            Err(err) => {
                error!("{}", err);
                session.set_status(err.to_string());
                Err(err)
            }
        }
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    fn write_register(&self, register: Register, value: &str) -> Result<()> {
        let address = self.map.address(register).map_err(|err| {
            error!("{}", err);
            self.session.set_status(err.to_string());
            err
        })?;

        let short = self.session.short_name();
        self.session.send_and_read(&encode_write(&short, address, value))?;
        self.commit()
    }

    fn commit(&self) -> Result<()> {
        let short = self.session.short_name();
        let timeout = self.session.config().timeouts.flash;
        self.session
            .send_and_read_with_timeout(&encode_command(&short, COMMIT_VERB), timeout)?;
        Ok(())
    }

    fn read_register(&self, register: Register) -> Result<String> {
        let address = self.map.read_address(register)?;
        self.session.query(&address)
    }

    /// Set the host IP
    pub fn set_host_ip(&self, ip: Ipv4Addr) -> Result<()> {
        self.write_register(Register::HostIp, &ip.to_string())?;
        self.session.set_status(format!("Host IP set to {}.", ip));
        Ok(())
    }

    /// Set the TCP/IP port the unit listens on
    pub fn set_host_port(&self, port: u16) -> Result<()> {
        if port == 0 {
            return Err(DeviceError::InvalidValue {
                field: Register::HostPort.to_string(),
                reason: "port must be non-zero".to_string(),
            }
            .into());
        }
        self.write_register(Register::HostPort, &port.to_string())?;
        self.session.set_status(format!("TCP/IP port set to {}.", port));
        Ok(())
    }

    /// Set the log host
    pub fn set_log_host(&self, ip: Ipv4Addr) -> Result<()> {
        self.write_register(Register::LogHost, &ip.to_string())?;
        self.session.set_status(format!("Log host set to {}.", ip));
        Ok(())
    }

    /// Set the body number (1 to 3)
    pub fn set_body_number(&self, number: u8) -> Result<()> {
        if !(1..=3).contains(&number) {
            return Err(DeviceError::InvalidValue {
                field: Register::BodyNumber.to_string(),
                reason: format!("{} is outside 1..=3", number),
            }
            .into());
        }
        self.write_register(Register::BodyNumber, &number.to_string())?;
        self.session.set_status(format!("Body number set to {}.", number));
        Ok(())
    }

    /// Change the unit's own IP; takes effect after a restart
    pub fn change_ip(&self, ip: Ipv4Addr) -> Result<()> {
        self.write_register(Register::DeviceIp, &ip.to_string())?;
        self.session
            .set_status(format!("IP set to {}. Please restart the component.", ip));
        Ok(())
    }

    pub fn host_ip(&self) -> Result<String> {
        self.read_register(Register::HostIp)
    }

    pub fn host_port(&self) -> Result<String> {
        self.read_register(Register::HostPort)
    }

    pub fn log_host(&self) -> Result<String> {
        self.read_register(Register::LogHost)
    }

    /// Write host port, host IP and log host for a deployment system
    pub fn apply_basic_settings(&self, system: DeploymentSystem) -> Result<()> {
        let settings = BasicSettings::for_system(system).map_err(|err| {
            self.session.set_status(err.to_string());
            err
        })?;

        info!(
            "Changing {} settings: TCP/IP Port | Host IP | Log Host",
            self.map.family()
        );
        self.set_host_port(settings.host_port)?;
        self.set_host_ip(settings.host_ip)?;
        self.set_log_host(settings.log_host)?;

        self.session
            .set_status(format!("Basic {} settings applied.", system));
        Ok(())
    }
}
