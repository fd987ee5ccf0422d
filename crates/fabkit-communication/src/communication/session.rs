//! Device session
//!
//! One session owns the TCP link to one component. All traffic goes through
//! a single lock so a command and its reply are never interleaved with another
//! caller's. The busy flag, state and status text live outside that lock and
//! can be observed while a long motion is in progress.

use crate::communication::{SessionConfig, Transport};
use crate::firmware::rorze::cancel_decoder::describe_cancel;
use crate::firmware::rorze::frame::{
    ack_prefix, base_verb, encode_command, parse_greeting, FrameBuffer, Reply, ReplyKind,
    COMMAND_TERMINATOR,
};
use fabkit_core::{short_name, ConnectionError, DeviceDescriptor, Error, ProtocolError, Result};
use parking_lot::{Mutex, RwLock};
use std::io::{self, ErrorKind as IoErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never connected
    Disconnected,
    /// Connect or handshake in progress
    Connecting,
    /// Connected, no command in flight
    Idle,
    /// Connected, a command holds the link
    Busy,
    /// Connect failed or the link dropped
    Failed,
    /// Closed by the owner
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Idle => write!(f, "Idle"),
            Self::Busy => write!(f, "Busy"),
            Self::Failed => write!(f, "Failed"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Open link: the stream plus bytes received but not yet consumed
struct Link {
    transport: Box<dyn Transport>,
    frames: FrameBuffer,
}

impl Link {
    fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            frames: FrameBuffer::new(),
        }
    }

    fn write_command(&mut self, command: &str) -> io::Result<()> {
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(COMMAND_TERMINATOR);
        self.transport.write_all(&line)?;
        self.transport.flush()
    }

    /// Read one frame, waiting at most `timeout` in total
    fn read_frame(&mut self, timeout: Duration) -> io::Result<String> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 1024];

        loop {
            if let Some(frame) = self.frames.next_frame() {
                return Ok(frame);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(io::Error::new(IoErrorKind::TimedOut, "read timed out"));
            }
            self.transport.set_read_timeout(Some(remaining))?;

            match self.transport.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        IoErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    ))
                }
                Ok(n) => self.frames.extend(&chunk[..n]),
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), IoErrorKind::WouldBlock | IoErrorKind::TimedOut) => {
                    return Err(io::Error::new(IoErrorKind::TimedOut, "read timed out"))
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drain everything already received and return the complete frames
    fn discard_stale(&mut self) -> io::Result<Vec<String>> {
        self.transport.set_nonblocking(true)?;
        let mut chunk = [0u8; 1024];
        let drained = loop {
            match self.transport.read(&mut chunk) {
                Ok(0) => {
                    break Err(io::Error::new(
                        IoErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    ))
                }
                Ok(n) => self.frames.extend(&chunk[..n]),
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) if e.kind() == IoErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.transport.set_nonblocking(false)?;
        drained?;

        let mut stale = Vec::new();
        while let Some(frame) = self.frames.next_frame() {
            stale.push(frame);
        }
        if self.frames.has_partial() {
            warn!("Dropping partial frame left over from an earlier reply");
            self.frames.clear();
        }
        Ok(stale)
    }
}

/// Sets the busy flag for its lifetime
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn link_error(err: io::Error) -> Error {
    match err.kind() {
        IoErrorKind::UnexpectedEof
        | IoErrorKind::BrokenPipe
        | IoErrorKind::ConnectionReset
        | IoErrorKind::ConnectionAborted => ConnectionError::ConnectionLost {
            reason: err.to_string(),
        }
        .into(),
        _ => ConnectionError::IoError {
            reason: err.to_string(),
        }
        .into(),
    }
}

fn read_error(err: io::Error, command: &str, timeout: Duration, motion: bool) -> Error {
    if err.kind() != IoErrorKind::TimedOut {
        return link_error(err);
    }
    let command = command.to_string();
    let timeout_ms = timeout.as_millis() as u64;
    if motion {
        ProtocolError::MotionTimeout {
            command,
            timeout_ms,
        }
        .into()
    } else {
        ProtocolError::Timeout {
            command,
            timeout_ms,
        }
        .into()
    }
}

fn connect_error(address: &SocketAddr, timeout: Duration, err: io::Error) -> Error {
    match err.kind() {
        IoErrorKind::TimedOut | IoErrorKind::WouldBlock => ConnectionError::ConnectionTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
        .into(),
        _ => ConnectionError::FailedToConnect {
            address: address.to_string(),
            reason: err.to_string(),
        }
        .into(),
    }
}

/// Turn cancel and nak frames into errors
fn check_reply(reply: Reply) -> Result<Reply> {
    match reply.kind {
        ReplyKind::Cancel => Err(ProtocolError::Cancelled {
            code: reply.payload.trim().to_string(),
            description: describe_cancel(&reply.payload),
        }
        .into()),
        ReplyKind::Nak => Err(ProtocolError::Rejected {
            response: reply.raw,
        }
        .into()),
        _ => Ok(reply),
    }
}

/// Session with one component
pub struct DeviceSession {
    descriptor: DeviceDescriptor,
    config: SessionConfig,
    link: Mutex<Option<Link>>,
    busy: AtomicBool,
    state: RwLock<SessionState>,
    status: RwLock<String>,
    type_string: RwLock<String>,
    short_name: RwLock<String>,
}

impl DeviceSession {
    /// Create a disconnected session
    pub fn new(descriptor: DeviceDescriptor, config: SessionConfig) -> Self {
        info!("Initializing {}...", descriptor.display_name());
        Self {
            type_string: RwLock::new(descriptor.type_string().to_string()),
            short_name: RwLock::new(descriptor.short_name().to_string()),
            descriptor,
            config,
            link: Mutex::new(None),
            busy: AtomicBool::new(false),
            state: RwLock::new(SessionState::Disconnected),
            status: RwLock::new("Initializing...".to_string()),
        }
    }

    /// Create a session over an already open stream and run the handshake
    pub fn with_transport(
        descriptor: DeviceDescriptor,
        config: SessionConfig,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        let session = Self::new(descriptor, config);
        session.set_state(SessionState::Connecting);
        let address = session.address().to_string();
        if let Err(err) = session.handshake(transport, &address) {
            session.fail(&err);
            return Err(err);
        }
        Ok(session)
    }

    /// Open the TCP link and wait for the greeting
    ///
    /// Transient failures are retried `config.retries` times after the
    /// backoff. On final failure the session is `Failed` and the status holds
    /// the error text.
    pub fn connect(&self) -> Result<()> {
        let address = self.address();
        self.set_state(SessionState::Connecting);
        self.set_status("Connecting...");
        info!("Connecting to {} at {}...", self.descriptor.display_name(), address);

        let mut attempt = 0;
        loop {
            match self.try_connect(&address) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(
                        "Connection attempt unsuccessful ({}), retrying {} more time(s)",
                        err,
                        self.config.retries - attempt + 1
                    );
                    thread::sleep(self.config.timeouts.retry_backoff);
                }
                Err(err) => {
                    self.fail(&err);
                    return Err(err);
                }
            }
        }
    }

    fn try_connect(&self, address: &SocketAddr) -> Result<()> {
        let timeout = self.config.timeouts.connect;
        let stream = TcpStream::connect_timeout(address, timeout)
            .map_err(|e| connect_error(address, timeout, e))?;
        self.handshake(Box::new(stream), &address.to_string())
    }

    fn handshake(&self, transport: Box<dyn Transport>, address: &str) -> Result<()> {
        let mut link = Link::new(transport);
        let timeout = self.config.timeouts.connect;

        let frame = link.read_frame(timeout).map_err(|e| {
            let reason = if e.kind() == IoErrorKind::TimedOut {
                format!("no greeting within {}ms", timeout.as_millis())
            } else {
                e.to_string()
            };
            Error::from(ConnectionError::HandshakeFailed {
                address: address.to_string(),
                reason,
            })
        })?;
        debug!("Received: {}", frame);

        let type_string = parse_greeting(&frame).ok_or_else(|| ConnectionError::HandshakeFailed {
            address: address.to_string(),
            reason: format!("unexpected greeting '{}'", frame),
        })?;

        if !self.descriptor.type_string().is_empty() && self.descriptor.type_string() != type_string {
            warn!(
                "{} greeted as {}, expected {}",
                address,
                type_string,
                self.descriptor.type_string()
            );
        }

        *self.link.lock() = Some(link);
        *self.short_name.write() = short_name(&type_string);
        self.set_status(format!("{} is connected", type_string));
        *self.type_string.write() = type_string;
        self.set_state(SessionState::Idle);
        info!("Connection to {} successful", self.descriptor.display_name());
        Ok(())
    }

    /// Send a command and read one reply under the command timeout
    pub fn send_and_read(&self, command: &str) -> Result<Reply> {
        self.exchange(command, self.config.timeouts.command, None)
    }

    /// Send a command and read one reply under an explicit timeout
    pub fn send_and_read_with_timeout(&self, command: &str, timeout: Duration) -> Result<Reply> {
        self.exchange(command, timeout, None)
    }

    /// Send a motion command, read its acknowledgement, then wait for the
    /// completion frame under the motion timeout
    pub fn send_and_read_motion(&self, command: &str) -> Result<Reply> {
        self.exchange(
            command,
            self.config.timeouts.command,
            Some(self.config.timeouts.motion),
        )
    }

    /// Send `<short>.<verb>` and return the payload after the echoed prefix
    pub fn query(&self, verb: &str) -> Result<String> {
        let short = self.short_name();
        let reply = self.send_and_read(&encode_command(&short, verb))?;
        let prefix = ack_prefix(&short, base_verb(verb));
        match reply.strip_prefix(&prefix) {
            Ok(payload) => Ok(payload.to_string()),
            Err(err) => {
                error!("{}", err);
                self.set_status(err.to_string());
                Err(err.into())
            }
        }
    }

    fn exchange(&self, command: &str, timeout: Duration, completion: Option<Duration>) -> Result<Reply> {
        let mut guard = self.link.lock();
        let Some(link) = guard.as_mut() else {
            let err = Error::from(ConnectionError::NotConnected);
            self.set_status(err.to_string());
            return Err(err);
        };

        let _busy = BusyGuard::engage(&self.busy);
        let result = self.run_exchange(link, command, timeout, completion);

        if let Err(err) = &result {
            error!("{} failed: {}", command, err);
            self.set_status(err.to_string());
            if err.is_connection_error() {
                *guard = None;
                self.set_state(SessionState::Failed);
            }
        }
        result
    }

    fn run_exchange(
        &self,
        link: &mut Link,
        command: &str,
        timeout: Duration,
        completion: Option<Duration>,
    ) -> Result<Reply> {
        for frame in link.discard_stale().map_err(link_error)? {
            warn!("Discarding stale frame: {}", frame);
        }

        debug!("Sending: {}", command);
        link.write_command(command).map_err(link_error)?;
        self.set_status("Reading data...");

        let frame = link
            .read_frame(timeout)
            .map_err(|e| read_error(e, command, timeout, false))?;
        debug!("Receive: {}", frame);
        let reply = check_reply(Reply::parse(&frame))?;

        let Some(motion_timeout) = completion else {
            self.set_status(format!("Output: {}", reply.raw));
            return Ok(reply);
        };

        self.set_status("Component is in motion...");
        debug!("Component is in motion... {}", reply.raw);
        let frame = link
            .read_frame(motion_timeout)
            .map_err(|e| read_error(e, command, motion_timeout, true))?;
        let done = check_reply(Reply::parse(&frame))?;
        info!("Motion completed. {}", done.raw);
        self.set_status(format!("Motion completed. {}", done.raw));
        Ok(done)
    }

    /// Shut the socket down; later commands fail with `NotConnected`
    pub fn close(&self) {
        if let Some(link) = self.link.lock().take() {
            if let Err(e) = link.transport.shutdown() {
                debug!("Shutdown of {} reported: {}", self.address(), e);
            }
            info!("Closed connection to {}", self.descriptor.display_name());
        }
        self.set_state(SessionState::Closed);
        self.set_status("Connection closed");
    }

    /// Whether a command currently holds the link
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Whether a link is open
    pub fn is_connected(&self) -> bool {
        matches!(*self.state.read(), SessionState::Idle | SessionState::Busy)
    }

    pub fn state(&self) -> SessionState {
        let state = *self.state.read();
        if state == SessionState::Idle && self.is_busy() {
            SessionState::Busy
        } else {
            state
        }
    }

    /// Last status line
    pub fn status(&self) -> String {
        self.status.read().clone()
    }

    /// Replace the status line
    pub fn set_status(&self, status: impl Into<String>) {
        *self.status.write() = status.into();
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Command prefix, from the last greeting or else the descriptor
    pub fn short_name(&self) -> String {
        self.short_name.read().clone()
    }

    /// Type string announced in the last greeting
    pub fn type_string(&self) -> String {
        self.type_string.read().clone()
    }

    /// Socket address of the component
    pub fn address(&self) -> SocketAddr {
        SocketAddr::from((self.descriptor.ip(), self.config.port))
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    fn fail(&self, err: &Error) {
        error!("Connection to {} failed: {}", self.descriptor.display_name(), err);
        self.set_state(SessionState::Failed);
        self.set_status(err.to_string());
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            let _ = link.transport.shutdown();
        }
    }
}
