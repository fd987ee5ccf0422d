//! Data models for components, device families and deployment systems
//!
//! This module provides:
//! - Deployment system (network layout) identification
//! - Device kinds derived from the role marker in a type string
//! - Device family identifiers that select command dialects
//! - Short name derivation used as the addressing prefix of every frame
//! - The immutable device descriptor built by an identity probe
//! - The static network map

pub mod network;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Type string a simulator announces in its greeting
pub const SIMULATION_TYPE_STRING: &str = "SIM1";

/// Fixed command prefix used for the simulator, bypassing short name derivation
pub const SIMULATION_SHORT_NAME: &str = "SIMULATIONeTRB0";

/// Network layout a component belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeploymentSystem {
    /// SEMDEX tool layout (192.168.0.0/24)
    Semdex,
    /// WMC tool layout (192.168.30.0/24)
    Wmc,
    /// Not yet configured, or undecidable
    #[default]
    #[serde(rename = "UNCONF")]
    Unknown,
}

impl DeploymentSystem {
    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Semdex => "SEMDEX",
            Self::Wmc => "WMC",
            Self::Unknown => "UNCONF",
        }
    }

    /// Parse a system name, case-insensitively
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "SEMDEX" => Self::Semdex,
            "WMC" => Self::Wmc,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for DeploymentSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Hardware role, recognised from the marker inside a long type string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Wafer transfer robot (`TRB`)
    Robot,
    /// Prealigner (`ALN`)
    Prealigner,
    /// Loadport (`STG`)
    Loadport,
    /// Linear track (`TBL`)
    LinearTrack,
    /// Software simulator (`SIM`)
    Simulation,
}

impl DeviceKind {
    /// Markers in match order. `SIM` comes first because the simulator alias
    /// also contains a robot marker.
    pub const MARKERS: [(&'static str, DeviceKind); 5] = [
        ("SIM", DeviceKind::Simulation),
        ("TRB", DeviceKind::Robot),
        ("ALN", DeviceKind::Prealigner),
        ("STG", DeviceKind::Loadport),
        ("TBL", DeviceKind::LinearTrack),
    ];

    /// Recognise the role marker in a greeting type string
    pub fn from_type_string(type_string: &str) -> Option<Self> {
        Self::MARKERS
            .iter()
            .find(|(marker, _)| type_string.contains(marker))
            .map(|(_, kind)| *kind)
    }

    /// The role marker for this kind
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Robot => "TRB",
            Self::Prealigner => "ALN",
            Self::Loadport => "STG",
            Self::LinearTrack => "TBL",
            Self::Simulation => "SIM",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Robot => write!(f, "Robot"),
            Self::Prealigner => write!(f, "Prealigner"),
            Self::Loadport => write!(f, "Loadport"),
            Self::LinearTrack => write!(f, "Linear Track"),
            Self::Simulation => write!(f, "Simulation"),
        }
    }
}

/// Model code selecting which register map and block catalog apply
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceFamily {
    /// RR754 wafer robot
    Rr754,
    /// RTS13 linear track
    Rts13,
    /// RV201-F07-000 loadport
    Rv201F07,
    /// RA320 prealigner (base model)
    Ra320,
    /// RA320_001 prealigner
    Ra320Rev1,
    /// RA320_003 prealigner
    Ra320Rev3,
    /// RA420_001 prealigner
    Ra420Rev1,
    /// Simulator component
    Simulation,
    /// Anything not in the table; every policy rejects it
    Unknown(String),
}

impl DeviceFamily {
    /// All known families
    pub const KNOWN: [DeviceFamily; 8] = [
        DeviceFamily::Rr754,
        DeviceFamily::Rts13,
        DeviceFamily::Rv201F07,
        DeviceFamily::Ra320,
        DeviceFamily::Ra320Rev1,
        DeviceFamily::Ra320Rev3,
        DeviceFamily::Ra420Rev1,
        DeviceFamily::Simulation,
    ];

    /// Map a model code to a family
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier.trim() {
            "RR754" => Self::Rr754,
            "RTS13" => Self::Rts13,
            "RV201-F07-000" => Self::Rv201F07,
            "RA320" => Self::Ra320,
            "RA320_001" => Self::Ra320Rev1,
            "RA320_003" => Self::Ra320Rev3,
            "RA420_001" => Self::Ra420Rev1,
            "SIM_COMPONENT" => Self::Simulation,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The model code as reported by the device
    pub fn identifier(&self) -> &str {
        match self {
            Self::Rr754 => "RR754",
            Self::Rts13 => "RTS13",
            Self::Rv201F07 => "RV201-F07-000",
            Self::Ra320 => "RA320",
            Self::Ra320Rev1 => "RA320_001",
            Self::Ra320Rev3 => "RA320_003",
            Self::Ra420Rev1 => "RA420_001",
            Self::Simulation => "SIM_COMPONENT",
            Self::Unknown(identifier) => identifier,
        }
    }

    /// Hardware role of this family
    pub fn kind(&self) -> Option<DeviceKind> {
        match self {
            Self::Rr754 => Some(DeviceKind::Robot),
            Self::Rts13 => Some(DeviceKind::LinearTrack),
            Self::Rv201F07 => Some(DeviceKind::Loadport),
            Self::Ra320 | Self::Ra320Rev1 | Self::Ra320Rev3 | Self::Ra420Rev1 => {
                Some(DeviceKind::Prealigner)
            }
            Self::Simulation => Some(DeviceKind::Simulation),
            Self::Unknown(_) => None,
        }
    }

    /// Check whether this family is in the table
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl Default for DeviceFamily {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl From<String> for DeviceFamily {
    fn from(identifier: String) -> Self {
        Self::from_identifier(&identifier)
    }
}

impl From<DeviceFamily> for String {
    fn from(family: DeviceFamily) -> Self {
        family.identifier().to_string()
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(identifier) if identifier.is_empty() => write!(f, "Unknown"),
            _ => write!(f, "{}", self.identifier()),
        }
    }
}

/// Derive the command prefix from a long type string
///
/// The role prefix is dropped and the last four characters are kept behind an
/// `o`, so `eTRB0` and `TRB0` both become `oTRB0`. The simulator type string
/// maps to a fixed alias.
pub fn short_name(type_string: &str) -> String {
    if type_string == SIMULATION_TYPE_STRING {
        return SIMULATION_SHORT_NAME.to_string();
    }

    let chars: Vec<char> = type_string.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("o{}", tail)
}

/// Identity of one physical unit
///
/// Built once per identity probe and never changed by a session. An
/// unidentified descriptor keeps the address, system and role only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    ip: Ipv4Addr,
    system: DeploymentSystem,
    role: String,
    type_string: String,
    short_name: String,
    serial: String,
    family: DeviceFamily,
    firmware: String,
}

impl DeviceDescriptor {
    /// Create an unidentified descriptor for an address
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            system: DeploymentSystem::Unknown,
            role: String::new(),
            type_string: String::new(),
            short_name: String::new(),
            serial: String::new(),
            family: DeviceFamily::default(),
            firmware: String::new(),
        }
    }

    /// Set the deployment system
    pub fn with_system(mut self, system: DeploymentSystem) -> Self {
        self.system = system;
        self
    }

    /// Set the role label from the network map
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set the long type string and derive the short name from it
    pub fn with_type_string(mut self, type_string: impl Into<String>) -> Self {
        self.type_string = type_string.into();
        self.short_name = if self.type_string.is_empty() {
            String::new()
        } else {
            short_name(&self.type_string)
        };
        self
    }

    /// Set the serial number
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    /// Set the device family
    pub fn with_family(mut self, family: DeviceFamily) -> Self {
        self.family = family;
        self
    }

    /// Set the firmware version
    pub fn with_firmware(mut self, firmware: impl Into<String>) -> Self {
        self.firmware = firmware.into();
        self
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn system(&self) -> DeploymentSystem {
        self.system
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn type_string(&self) -> &str {
        &self.type_string
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn family(&self) -> &DeviceFamily {
        &self.family
    }

    pub fn firmware(&self) -> &str {
        &self.firmware
    }

    /// Hardware role, from the type string or else the family
    pub fn kind(&self) -> Option<DeviceKind> {
        DeviceKind::from_type_string(&self.type_string).or_else(|| self.family.kind())
    }

    /// Whether the identity probe recognised this unit
    pub fn is_identified(&self) -> bool {
        !self.type_string.is_empty() && DeviceKind::from_type_string(&self.type_string).is_some()
    }

    /// Name for status lines and logs
    pub fn display_name(&self) -> String {
        if self.is_identified() {
            format!("Rorze {}", self.type_string)
        } else if !self.role.is_empty() {
            self.role.clone()
        } else {
            self.ip.to_string()
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} SN:{} v{} ({})",
            self.display_name(),
            self.ip,
            self.family,
            if self.serial.is_empty() { "-" } else { &self.serial },
            if self.firmware.is_empty() { "-" } else { &self.firmware },
            self.system
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_name_drops_role_prefix() {
        assert_eq!(short_name("eTRB0"), "oTRB0");
        assert_eq!(short_name("TRB0"), "oTRB0");
        assert_eq!(short_name("RORZE_ALN0"), "oALN0");
        assert_eq!(short_name("SIM1"), SIMULATION_SHORT_NAME);
    }

    #[test]
    fn test_short_name_short_input() {
        assert_eq!(short_name("AB"), "oAB");
    }

    #[test]
    fn test_kind_from_type_string() {
        assert_eq!(DeviceKind::from_type_string("eTRB0"), Some(DeviceKind::Robot));
        assert_eq!(DeviceKind::from_type_string("STG1"), Some(DeviceKind::Loadport));
        assert_eq!(DeviceKind::from_type_string("TBL0"), Some(DeviceKind::LinearTrack));
        assert_eq!(
            DeviceKind::from_type_string(SIMULATION_SHORT_NAME),
            Some(DeviceKind::Simulation)
        );
        assert_eq!(DeviceKind::from_type_string("CAM1"), None);
    }

    #[test]
    fn test_family_identifier_roundtrip() {
        for family in DeviceFamily::KNOWN {
            assert_eq!(DeviceFamily::from_identifier(family.identifier()), family);
            assert!(family.kind().is_some());
        }
        let unknown = DeviceFamily::from_identifier("RX999");
        assert_eq!(unknown, DeviceFamily::Unknown("RX999".to_string()));
        assert!(!unknown.is_known());
        assert_eq!(unknown.kind(), None);
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = DeviceDescriptor::new(Ipv4Addr::new(192, 168, 30, 20))
            .with_system(DeploymentSystem::Wmc)
            .with_role("Robot")
            .with_type_string("eTRB0")
            .with_serial("RC5J082")
            .with_family(DeviceFamily::Rr754)
            .with_firmware("1.19U");

        assert_eq!(descriptor.short_name(), "oTRB0");
        assert_eq!(descriptor.kind(), Some(DeviceKind::Robot));
        assert!(descriptor.is_identified());
        assert_eq!(descriptor.display_name(), "Rorze eTRB0");
    }

    #[test]
    fn test_unidentified_descriptor() {
        let descriptor = DeviceDescriptor::new(Ipv4Addr::new(172, 20, 9, 220)).with_role("Pendant");
        assert!(!descriptor.is_identified());
        assert_eq!(descriptor.short_name(), "");
        assert_eq!(descriptor.display_name(), "Pendant");
    }

    #[test]
    fn test_system_names() {
        assert_eq!(DeploymentSystem::from_name("wmc"), DeploymentSystem::Wmc);
        assert_eq!(DeploymentSystem::from_name("SEMDEX"), DeploymentSystem::Semdex);
        assert_eq!(DeploymentSystem::from_name("lab"), DeploymentSystem::Unknown);
        assert_eq!(DeploymentSystem::Unknown.to_string(), "UNCONF");
    }

    proptest! {
        #[test]
        fn prop_short_name_keeps_last_four(type_string in "[A-Za-z0-9_]{4,16}") {
            prop_assume!(type_string != SIMULATION_TYPE_STRING);
            let name = short_name(&type_string);
            prop_assert_eq!(name.len(), 5);
            prop_assert!(name.starts_with('o'));
            prop_assert!(type_string.ends_with(&name[1..]));
        }
    }
}
