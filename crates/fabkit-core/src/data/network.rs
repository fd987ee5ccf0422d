//! Static network tables
//!
//! Each deployment system has a fixed role-to-address layout and a subnet
//! whose reachable members evidence that the system is present. A separate
//! registry labels well-known hosts that are not commissionable devices
//! (factory defaults, pendants, cameras, PCs).

use super::DeploymentSystem;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// One role slot in a layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAddress {
    pub role: String,
    pub ip: Ipv4Addr,
}

/// Role table and evidence subnet of one deployment system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLayout {
    pub system: DeploymentSystem,
    pub subnet: Ipv4Net,
    pub devices: Vec<RoleAddress>,
}

/// A labelled address outside the role tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownHost {
    pub ip: Ipv4Addr,
    pub label: String,
}

/// What the map knows about an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub ip: Ipv4Addr,
    /// System whose role table or subnet contains the address
    pub system: DeploymentSystem,
    /// Role name or well-known label, empty if the address is not listed
    pub label: String,
    /// True when the address is a role slot of a layout
    pub is_device: bool,
}

/// Immutable network configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMap {
    pub systems: Vec<SystemLayout>,
    #[serde(default)]
    pub known_hosts: Vec<KnownHost>,
}

fn subnet24(a: u8, b: u8, c: u8) -> Ipv4Net {
    Ipv4Net::new(Ipv4Addr::new(a, b, c, 0), 24).unwrap_or_default()
}

fn roles(entries: &[(&str, [u8; 4])]) -> Vec<RoleAddress> {
    entries
        .iter()
        .map(|(role, ip)| RoleAddress {
            role: role.to_string(),
            ip: Ipv4Addr::from(*ip),
        })
        .collect()
}

impl Default for NetworkMap {
    fn default() -> Self {
        let semdex = SystemLayout {
            system: DeploymentSystem::Semdex,
            subnet: subnet24(192, 168, 0),
            devices: roles(&[
                ("Robot", [192, 168, 0, 1]),
                ("Lineartrack", [192, 168, 0, 3]),
                ("Loadport_1", [192, 168, 0, 21]),
                ("Loadport_2", [192, 168, 0, 22]),
                ("Loadport_3", [192, 168, 0, 23]),
                ("Prealigner", [192, 168, 0, 151]),
            ]),
        };

        let wmc = SystemLayout {
            system: DeploymentSystem::Wmc,
            subnet: subnet24(192, 168, 30),
            devices: roles(&[
                ("Cam_Handling", [192, 168, 30, 4]),
                ("Cam_Metrology", [192, 168, 30, 5]),
                ("Pendant", [192, 168, 30, 6]),
                ("Robot", [192, 168, 30, 20]),
                ("Lineartrack", [192, 168, 30, 21]),
                ("WID_Reader", [192, 168, 30, 61]),
                ("WID_Reader 2", [192, 168, 30, 62]),
                ("WID_Reader 3", [192, 168, 30, 63]),
                ("Prealigner", [192, 168, 30, 70]),
                ("Loadport_1", [192, 168, 30, 110]),
                ("Loadport_2", [192, 168, 30, 120]),
                ("Loadport_3", [192, 168, 30, 130]),
                ("CID_Reader_1", [192, 168, 30, 111]),
                ("CID_Reader_2", [192, 168, 30, 112]),
                ("CID_Reader_3", [192, 168, 30, 113]),
            ]),
        };

        let mut known_hosts: Vec<KnownHost> = [
            ([172, 20, 9, 100], "Loadport (Unconfigured)"),
            ([172, 20, 9, 101], "Loadport (Unconfigured)"),
            ([172, 20, 9, 140], "Lineartrack (Unconfigured)"),
            ([172, 20, 9, 150], "Robot (Unconfigured)"),
            ([172, 20, 9, 151], "Robot (Unconfigured)"),
            ([172, 20, 9, 160], "Prealigner (Unconfigured)"),
            ([172, 20, 9, 161], "Prealigner (Unconfigured)"),
            ([172, 20, 9, 220], "Teaching Pendant (Unconfigured)"),
            ([192, 168, 0, 2], "SEMDEX Teaching Pendant"),
            ([192, 168, 0, 161], "SEMDEX WID reader"),
            ([192, 168, 30, 1], "WMC Software PC"),
            ([192, 168, 40, 2], "WMC Hardware PC"),
        ]
        .iter()
        .map(|(ip, label)| KnownHost {
            ip: Ipv4Addr::from(*ip),
            label: label.to_string(),
        })
        .collect();

        for last in [55u8, 56, 57, 58, 59, 240, 241] {
            known_hosts.push(KnownHost {
                ip: Ipv4Addr::new(192, 168, 30, last),
                label: "Reolink Camera (?)".to_string(),
            });
        }
        for last in 55u8..=59 {
            known_hosts.push(KnownHost {
                ip: Ipv4Addr::new(192, 168, 60, last),
                label: "Reolink Camera (?)".to_string(),
            });
        }

        Self {
            systems: vec![semdex, wmc],
            known_hosts,
        }
    }
}

impl NetworkMap {
    /// Layout of a deployment system
    pub fn layout(&self, system: DeploymentSystem) -> Option<&SystemLayout> {
        self.systems.iter().find(|layout| layout.system == system)
    }

    /// Evidence subnet of a deployment system
    pub fn subnet(&self, system: DeploymentSystem) -> Option<Ipv4Net> {
        self.layout(system).map(|layout| layout.subnet)
    }

    /// Address assigned to a role in a system
    pub fn role_ip(&self, system: DeploymentSystem, role: &str) -> Option<Ipv4Addr> {
        self.layout(system)?
            .devices
            .iter()
            .find(|entry| entry.role == role)
            .map(|entry| entry.ip)
    }

    /// System whose subnet contains the address
    pub fn system_of(&self, ip: Ipv4Addr) -> DeploymentSystem {
        self.systems
            .iter()
            .find(|layout| layout.subnet.contains(&ip))
            .map(|layout| layout.system)
            .unwrap_or(DeploymentSystem::Unknown)
    }

    /// Every address worth probing, role slots first, without duplicates
    pub fn candidates(&self) -> Vec<Ipv4Addr> {
        let mut seen = HashSet::new();
        self.systems
            .iter()
            .flat_map(|layout| layout.devices.iter().map(|entry| entry.ip))
            .chain(self.known_hosts.iter().map(|host| host.ip))
            .filter(|ip| seen.insert(*ip))
            .collect()
    }

    /// Describe an address
    pub fn lookup(&self, ip: Ipv4Addr) -> HostInfo {
        for layout in &self.systems {
            if let Some(entry) = layout.devices.iter().find(|entry| entry.ip == ip) {
                return HostInfo {
                    ip,
                    system: layout.system,
                    label: entry.role.clone(),
                    is_device: true,
                };
            }
        }

        HostInfo {
            ip,
            system: self.system_of(ip),
            label: self
                .known_hosts
                .iter()
                .find(|host| host.ip == ip)
                .map(|host| host.label.clone())
                .unwrap_or_default(),
            is_device: false,
        }
    }
}
