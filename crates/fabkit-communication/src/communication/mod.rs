//! Device communication
//!
//! Provides the byte transport seam, timeout tiers, per-device sessions and
//! their worker threads, network discovery and identity probing.

pub mod discovery;
pub mod identity;
pub mod session;
pub mod worker;

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

pub use discovery::{
    classify, Discovery, DiscoveryConfig, DiscoveryReport, PingProbe, ReachabilityProbe,
};
pub use identity::{parse_version, IdentityProbe};
pub use session::{DeviceSession, SessionState};
pub use worker::{SessionWorker, WorkerError};

/// TCP port Rorze components listen on
pub const DEFAULT_PORT: u16 = 12100;

/// Byte stream to a device
///
/// Implemented for `TcpStream`; tests can inject any stream that honours
/// read timeouts and non-blocking mode.
pub trait Transport: Read + Write + Send {
    /// Set the timeout for blocking reads
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Switch non-blocking mode
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    /// Close both directions
    fn shutdown(&self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Timeout tiers for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// TCP connect and greeting
    pub connect: Duration,
    /// Reply to an ordinary command
    pub command: Duration,
    /// Completion of a motion command
    pub motion: Duration,
    /// Flash commit (`WTDT`)
    pub flash: Duration,
    /// Pause before the single connect retry
    pub retry_backoff: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            command: Duration::from_secs(3),
            motion: Duration::from_secs(120),
            flash: Duration::from_secs(60),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl SessionTimeouts {
    /// Check that every tier is non-zero and command < motion
    pub fn is_valid(&self) -> bool {
        !self.connect.is_zero()
            && !self.command.is_zero()
            && !self.flash.is_zero()
            && self.command < self.motion
    }
}

/// Connection parameters for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub port: u16,
    pub timeouts: SessionTimeouts,
    /// Extra connect attempts after a transient failure
    pub retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeouts: SessionTimeouts::default(),
            retries: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let timeouts = SessionTimeouts::default();
        assert!(timeouts.is_valid());
        assert!(timeouts.command < timeouts.motion);
        assert_eq!(SessionConfig::default().port, 12100);
    }

    #[test]
    fn test_inverted_tiers_are_invalid() {
        let timeouts = SessionTimeouts {
            command: Duration::from_secs(10),
            motion: Duration::from_secs(5),
            ..SessionTimeouts::default()
        };
        assert!(!timeouts.is_valid());
    }
}
