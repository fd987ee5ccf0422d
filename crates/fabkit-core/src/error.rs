//! Error handling for FabKit
//!
//! Provides error types for every layer of the device communication subsystem:
//! - Connection errors (socket, handshake)
//! - Protocol errors (framing, desync, cancel codes, timeouts)
//! - Device errors (unsupported families, invalid values)
//! - Discovery errors (network layout detection)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents errors raised while opening or holding the TCP link to a device.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// The device did not accept the connection in time
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The TCP connection could not be opened
    #[error("Failed to connect to {address}: {reason}")]
    FailedToConnect {
        /// The address that was dialled.
        address: String,
        /// The socket error text.
        reason: String,
    },

    /// Connected, but the device did not greet with a valid `CNCT` line
    #[error("Handshake with {address} failed: {reason}")]
    HandshakeFailed {
        /// The address of the device.
        address: String,
        /// What was wrong with the greeting.
        reason: String,
    },

    /// The peer closed the socket
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// No open link (never connected, failed, or closed)
    #[error("Device not connected")]
    NotConnected,

    /// Socket I/O error
    #[error("Socket error: {reason}")]
    IoError {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Protocol error type
///
/// Represents violations of the command/response framing protocol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// No complete response frame within the command tier
    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The command that was sent.
        command: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// No completion frame within the motion tier
    #[error("Motion '{command}' timed out after {timeout_ms}ms")]
    MotionTimeout {
        /// The motion command that was sent.
        command: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Response prefix did not echo the request
    #[error("Mismatch between sent command and received command: expected '{expected}', got '{received}'")]
    Desync {
        /// The expected response prefix.
        expected: String,
        /// The response that was actually received.
        received: String,
    },

    /// Device cancelled the command with a cancel code
    #[error("Command cancelled ({code}): {description}")]
    Cancelled {
        /// The 4-hex-digit cancel code.
        code: String,
        /// Human-readable description of the code.
        description: String,
    },

    /// Device answered with a negative acknowledgement
    #[error("Command rejected: {response}")]
    Rejected {
        /// The raw rejection frame.
        response: String,
    },

    /// A frame that could not be interpreted
    #[error("Malformed frame: {frame}")]
    MalformedFrame {
        /// The offending frame.
        frame: String,
    },
}

/// Device error type
///
/// Represents errors caused by asking a device for something its family
/// does not support.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// No register map or block catalog exists for the family
    #[error("{operation} not implemented for component type {family}")]
    UnsupportedFamily {
        /// The family identifier.
        family: String,
        /// The requested operation.
        operation: String,
    },

    /// A value supplied for a register is invalid
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// The field being set.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// System-specific settings requested without a known deployment system
    #[error("No system found in configuration")]
    NoSystem,
}

/// Discovery error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscoveryError {
    /// Devices of both mutually exclusive network layouts answered
    #[error("Both {first} and {second} configurations found")]
    AmbiguousDeployment {
        /// The first layout seen.
        first: String,
        /// The second layout seen.
        second: String,
    },

    /// The probe machinery itself failed
    #[error("Reachability probe failed: {reason}")]
    ProbeFailed {
        /// The reason for the failure.
        reason: String,
    },
}

/// Coarse error classification used by callers that only render status text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Address did not respond or the socket could not be opened
    Unreachable,
    /// Connected, but the greeting was missing or invalid
    HandshakeFailure,
    /// Response prefix did not echo the request
    ProtocolDesync,
    /// Command or motion tier exceeded
    Timeout,
    /// Device refused the command (cancel code or negative ack)
    Rejected,
    /// Operation requested for an unmapped device family
    UnsupportedFamily,
    /// Both network layouts present
    AmbiguousDeployment,
    /// Local I/O (files, sockets)
    Io,
    /// Anything else
    Other,
}

/// Main error type for FabKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Device error
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Discovery error
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(ConnectionError::ConnectionTimeout { .. })
            | Error::Connection(ConnectionError::FailedToConnect { .. })
            | Error::Connection(ConnectionError::NotConnected) => ErrorKind::Unreachable,
            Error::Connection(ConnectionError::HandshakeFailed { .. }) => {
                ErrorKind::HandshakeFailure
            }
            Error::Connection(_) => ErrorKind::Io,
            Error::Protocol(ProtocolError::Timeout { .. })
            | Error::Protocol(ProtocolError::MotionTimeout { .. }) => ErrorKind::Timeout,
            Error::Protocol(ProtocolError::Desync { .. })
            | Error::Protocol(ProtocolError::MalformedFrame { .. }) => ErrorKind::ProtocolDesync,
            Error::Protocol(ProtocolError::Cancelled { .. })
            | Error::Protocol(ProtocolError::Rejected { .. }) => ErrorKind::Rejected,
            Error::Device(DeviceError::UnsupportedFamily { .. }) => ErrorKind::UnsupportedFamily,
            Error::Device(_) => ErrorKind::Other,
            Error::Discovery(DiscoveryError::AmbiguousDeployment { .. }) => {
                ErrorKind::AmbiguousDeployment
            }
            Error::Discovery(_) => ErrorKind::Other,
            Error::Io(_) => ErrorKind::Io,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
            || matches!(
                self,
                Error::Connection(ConnectionError::ConnectionTimeout { .. })
            )
    }

    /// Check if a single local retry is allowed
    ///
    /// Only link-level failures qualify. Desync, unsupported family and
    /// ambiguous deployment are structural and must surface immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Connection(ConnectionError::NotConnected) => false,
            Error::Connection(_) => true,
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(ProtocolError::Desync {
            expected: "aoTRB0.DEQU.GTDT:".to_string(),
            received: "aoTRB0.DRES.GTDT:1".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Mismatch between sent command and received command: expected 'aoTRB0.DEQU.GTDT:', got 'aoTRB0.DRES.GTDT:1'"
        );

        let err = Error::from(DeviceError::UnsupportedFamily {
            family: "RX999".to_string(),
            operation: "Backup".to_string(),
        });
        assert_eq!(err.to_string(), "Backup not implemented for component type RX999");
    }

    #[test]
    fn test_error_kind() {
        let timeout = Error::from(ProtocolError::Timeout {
            command: "oTRB0.STAT".to_string(),
            timeout_ms: 3000,
        });
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert!(timeout.is_timeout());
        assert!(!timeout.is_transient());

        let handshake = Error::from(ConnectionError::HandshakeFailed {
            address: "127.0.0.1:12100".to_string(),
            reason: "no greeting".to_string(),
        });
        assert_eq!(handshake.kind(), ErrorKind::HandshakeFailure);
        assert!(handshake.is_transient());

        let ambiguous = Error::from(DiscoveryError::AmbiguousDeployment {
            first: "SEMDEX".to_string(),
            second: "WMC".to_string(),
        });
        assert_eq!(ambiguous.kind(), ErrorKind::AmbiguousDeployment);
        assert!(!ambiguous.is_transient());
    }

    #[test]
    fn test_not_connected_is_not_retried() {
        let err = Error::from(ConnectionError::NotConnected);
        assert!(!err.is_transient());
        assert_eq!(err.kind(), ErrorKind::Unreachable);
    }
}
