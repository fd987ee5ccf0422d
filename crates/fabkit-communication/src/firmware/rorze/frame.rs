//! Rorze frame codec
//!
//! Commands are `<shortname>.<verb>[(args)]` terminated by `\r`. Replies carry a
//! one-byte kind in front of the echoed command (`a` ack, `n` nak, `c` cancel,
//! `e` event) followed by `:` and the payload. The greeting on connect is
//! `<typestring>.CNCT`.

use fabkit_core::ProtocolError;

/// Terminator appended to every outgoing command
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Verb the device sends as its greeting
pub const GREETING_VERB: &str = "CNCT";

/// Reply kind, taken from the first byte of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// `a` positive acknowledgement
    Ack,
    /// `n` negative acknowledgement
    Nak,
    /// `c` cancel, payload is a cancel code
    Cancel,
    /// `e` event
    Event,
    /// Anything else
    Unknown,
}

impl ReplyKind {
    fn from_byte(byte: u8) -> Self {
        match byte {
            b'a' => Self::Ack,
            b'n' => Self::Nak,
            b'c' => Self::Cancel,
            b'e' => Self::Event,
            _ => Self::Unknown,
        }
    }
}

/// A parsed response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Frame text without terminator
    pub raw: String,
    pub kind: ReplyKind,
    /// Text after the first `:`, empty if there is none
    pub payload: String,
}

impl Reply {
    /// Parse a frame
    pub fn parse(frame: &str) -> Self {
        let raw = frame.trim_end_matches(['\r', '\n']).to_string();
        let kind = raw
            .bytes()
            .next()
            .map(ReplyKind::from_byte)
            .unwrap_or(ReplyKind::Unknown);
        let payload = raw
            .split_once(':')
            .map(|(_, payload)| payload.to_string())
            .unwrap_or_default();

        Self { raw, kind, payload }
    }

    /// Check whether the frame starts with `prefix` byte for byte
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.raw.as_bytes().starts_with(prefix.as_bytes())
    }

    /// Return the text after `prefix`, or a desync error
    pub fn strip_prefix(&self, prefix: &str) -> Result<&str, ProtocolError> {
        self.raw
            .strip_prefix(prefix)
            .ok_or_else(|| ProtocolError::Desync {
                expected: prefix.to_string(),
                received: self.raw.clone(),
            })
    }
}

/// Build an outgoing command line (without terminator)
pub fn encode_command(short_name: &str, verb: &str) -> String {
    format!("{}.{}", short_name, verb)
}

/// Build an outgoing write, `<short>.<register>=<value>`
pub fn encode_write(short_name: &str, register: &str, value: &str) -> String {
    format!("{}.{}={}", short_name, register, value)
}

/// The prefix an acknowledgement of `verb` must start with
pub fn ack_prefix(short_name: &str, verb: &str) -> String {
    format!("a{}.{}:", short_name, verb)
}

/// Strip a trailing `[...]` index from a verb, `GTDT[3]` becomes `GTDT`
pub fn base_verb(verb: &str) -> &str {
    match verb.find(['[', '(']) {
        Some(pos) => &verb[..pos],
        None => verb,
    }
}

/// Extract the type string from a greeting frame
///
/// `eTRB0.CNCT` yields `eTRB0`. Returns `None` if the verb is not `CNCT`.
pub fn parse_greeting(frame: &str) -> Option<String> {
    let frame = frame.trim();
    let (type_string, verb) = frame.split_once('.')?;
    if type_string.is_empty() || !verb.starts_with(GREETING_VERB) {
        return None;
    }
    Some(type_string.to_string())
}

/// Accumulates socket bytes and yields complete frames
///
/// Frames end at `\r` or `\n`; empty frames (such as the `\n` of a `\r\n`
/// pair) are skipped.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pop the next complete frame
    pub fn next_frame(&mut self) -> Option<String> {
        loop {
            let pos = self.pending.iter().position(|b| *b == b'\r' || *b == b'\n')?;
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    /// Whether an incomplete frame is buffered
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
