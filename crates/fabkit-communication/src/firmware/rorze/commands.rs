//! Fixed command helpers
//!
//! Thin wrappers over session exchanges for the commands the commissioning
//! workflow issues directly. Each updates the session status line.

use crate::communication::session::DeviceSession;
use crate::firmware::rorze::frame::{encode_command, Reply};
use fabkit_core::Result;
use std::fmt;

/// `SAIO` masks enabling automatic status output
const AUTO_STATUS_ON: &str =
    "SAIO(00000000000000000000000100000010,00000000000000000000000000000000,0000000000)";

/// `SAIO` masks disabling automatic status output
const AUTO_STATUS_OFF: &str =
    "SAIO(00000000000000000000000000000000,00000000000000000000000000000000,0000000000)";

/// Robot arm carrying a mapping laser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arm {
    Upper,
    Lower,
}

impl Arm {
    /// Arm number in command blocks (`ARM1`, `ARM2`)
    pub fn number(&self) -> u8 {
        match self {
            Self::Upper => 1,
            Self::Lower => 2,
        }
    }

    /// Output bit switching the laser
    pub fn laser_bit(&self, on: bool) -> &'static str {
        match (self, on) {
            (Self::Upper, true) => "D100B",
            (Self::Upper, false) => "D101B",
            (Self::Lower, true) => "D080B",
            (Self::Lower, false) => "D081B",
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upper => write!(f, "upper"),
            Self::Lower => write!(f, "lower"),
        }
    }
}

/// Commands every Rorze unit understands
pub trait DeviceCommands {
    /// `STAT`; the status line becomes the payload
    fn get_status(&self) -> Result<String>;

    /// Rotary switch position, `GTDT[3]`
    fn rotary_switch(&self) -> Result<String>;

    /// Origin search, a motion command
    fn origin_search(&self, p1: u32, p2: u32) -> Result<Reply>;

    /// Read all I/O, `GAIO`
    fn gaio(&self) -> Result<String>;

    /// Switch automatic status output
    fn set_auto_status(&self, on: bool) -> Result<()>;

    /// Switch the mapping laser of one arm, then read back the I/O
    fn set_laser(&self, arm: Arm, on: bool) -> Result<()>;
}

impl DeviceCommands for DeviceSession {
    fn get_status(&self) -> Result<String> {
        let status = self.query("STAT")?;
        self.set_status(status.clone());
        Ok(status)
    }

    fn rotary_switch(&self) -> Result<String> {
        let position = self.query("GTDT[3]")?;
        self.set_status(format!("Rotary switch position: {}", position));
        Ok(position)
    }

    fn origin_search(&self, p1: u32, p2: u32) -> Result<Reply> {
        let command = encode_command(&self.short_name(), &format!("ORGN({},{})", p1, p2));
        let reply = self.send_and_read_motion(&command)?;
        self.set_status(format!("Origin search completed: {}", reply.raw));
        Ok(reply)
    }

    fn gaio(&self) -> Result<String> {
        let reply = self.send_and_read(&encode_command(&self.short_name(), "GAIO"))?;
        self.set_status("Response logged.");
        Ok(reply.payload)
    }

    fn set_auto_status(&self, on: bool) -> Result<()> {
        let masks = if on { AUTO_STATUS_ON } else { AUTO_STATUS_OFF };
        self.send_and_read(&encode_command(&self.short_name(), masks))?;
        self.set_status(format!(
            "Automatic status {}. Response logged.",
            if on { "ON" } else { "OFF" }
        ));
        Ok(())
    }

    fn set_laser(&self, arm: Arm, on: bool) -> Result<()> {
        let verb = format!("ARM{}.DCMD({},1)", arm.number(), arm.laser_bit(on));
        self.send_and_read(&encode_command(&self.short_name(), &verb))?;
        self.gaio()?;
        self.set_status(format!(
            "{} arm laser turned {}",
            arm,
            if on { "on" } else { "off" }
        ));
        Ok(())
    }
}
