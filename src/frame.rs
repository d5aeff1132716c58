//! Transport frame: the envelope that rides directly on the TCP stream.
//!
//! Wire format:
//! ```text
//! CMD LEN_LO LEN_HI ATTR PAYLOAD[LEN]
//! ```
//!
//! `PAYLOAD` is UTF-8 text for Info/Warning/Error, an inner UART frame for
//! Uart, and opaque for Control.

use std::fmt;

use crate::codec;
use crate::error::{Result, WireError};

/// Transport header size: command, 2-byte length, attribute.
pub const HEADER_LEN: usize = 4;

/// Largest payload the length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Transport frame command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportCommand {
    Control,
    Info,
    Warning,
    Error,
    Uart,
    /// Unrecognised command byte, kept so the session can report it.
    Unknown(u8),
}

impl TransportCommand {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::Control,
            0x10 => Self::Info,
            0x11 => Self::Warning,
            0x12 => Self::Error,
            0x20 => Self::Uart,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Control => 0x00,
            Self::Info => 0x10,
            Self::Warning => 0x11,
            Self::Error => 0x12,
            Self::Uart => 0x20,
            Self::Unknown(b) => b,
        }
    }
}

impl fmt::Display for TransportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "CONTROL"),
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Uart => write!(f, "UART"),
            Self::Unknown(b) => write!(f, "0x{b:02X}"),
        }
    }
}

/// A decoded transport frame.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportFrame {
    pub command: TransportCommand,
    /// Free-form flag byte. Unused by the current command set but preserved.
    pub attribute: u8,
    pub payload: Vec<u8>,
}

impl TransportFrame {
    pub fn new(command: TransportCommand, payload: Vec<u8>) -> Self {
        Self { command, attribute: 0, payload }
    }

    /// Human-readable informational frame.
    pub fn info(text: &str) -> Self {
        Self::new(TransportCommand::Info, text.as_bytes().to_vec())
    }

    /// Human-readable warning frame.
    pub fn warning(text: &str) -> Self {
        Self::new(TransportCommand::Warning, text.as_bytes().to_vec())
    }

    /// Human-readable error frame, used to report rejected frames to the peer.
    pub fn error(text: &str) -> Self {
        Self::new(TransportCommand::Error, text.as_bytes().to_vec())
    }

    /// Frame carrying an encoded inner UART frame.
    pub fn uart(inner: Vec<u8>) -> Self {
        Self::new(TransportCommand::Uart, inner)
    }

    /// Decode one complete frame from the front of `wire`.
    ///
    /// Bytes past the declared payload are ignored; use
    /// [`encoded_len`](Self::encoded_len) or [`FrameSplitter`] to find frame
    /// boundaries in a stream.
    pub fn decode(wire: &[u8]) -> Result<Self> {
        let total = frame_len(wire)?.ok_or(WireError::Incomplete {
            need: HEADER_LEN,
            have: wire.len(),
        })?;
        if wire.len() < total {
            return Err(WireError::Incomplete { need: total, have: wire.len() });
        }
        Ok(Self {
            command: TransportCommand::from_byte(wire[0]),
            attribute: wire[3],
            payload: wire[HEADER_LEN..total].to_vec(),
        })
    }

    /// Encode into header + payload.
    ///
    /// Fails for payloads the 16-bit length field cannot describe.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = u16::try_from(self.payload.len()).map_err(|_| WireError::PayloadTooLong {
            what: "transport payload",
            max: MAX_PAYLOAD_LEN,
            got: self.payload.len(),
        })?;
        let mut wire = Vec::with_capacity(self.encoded_len());
        wire.push(self.command.as_byte());
        codec::write_u16(&mut wire, len);
        wire.push(self.attribute);
        wire.extend_from_slice(&self.payload);
        Ok(wire)
    }

    /// Header plus payload size on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Payload as text, replacing invalid UTF-8 and stripping trailing NULs.
    pub fn text(&self) -> String {
        let end = self
            .payload
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |p| p + 1);
        String::from_utf8_lossy(&self.payload[..end]).into_owned()
    }
}

impl fmt::Debug for TransportFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // "UART attr=0x00 12B | A50300..."
        write!(f, "{} attr=0x{:02X} {}B", self.command, self.attribute, self.payload.len())?;
        if !self.payload.is_empty() {
            write!(f, " | ")?;
            let limit = 20;
            for b in self.payload.iter().take(limit) {
                write!(f, "{b:02X}")?;
            }
            if self.payload.len() > limit {
                write!(f, "...")?;
            }
        }
        Ok(())
    }
}

/// Outbound half of the transport: fire-and-forget delivery of encoded
/// transport frames to the peer. No acknowledgement, no retry.
pub trait FrameSink {
    /// Deliver one encoded transport frame.
    fn send(&mut self, wire: &[u8]);

    /// Encode and deliver. Only fails if the frame cannot be encoded.
    fn send_frame(&mut self, frame: &TransportFrame) -> Result<()> {
        self.send(&frame.encode()?);
        Ok(())
    }
}

/// Collects outbound frames in memory, one entry per frame.
impl FrameSink for Vec<Vec<u8>> {
    fn send(&mut self, wire: &[u8]) {
        self.push(wire.to_vec());
    }
}

/// Total frame size declared by the header at the front of `buf`, or `None`
/// if the header itself has not arrived yet.
fn frame_len(buf: &[u8]) -> Result<Option<usize>> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let len = codec::read_u16(buf, 1)?;
    Ok(Some(HEADER_LEN + len as usize))
}

/// Splits a byte stream into complete transport frames. Buffers partial data
/// across calls, so a transport can feed it whatever each read returned and
/// only ever hand whole frames to the session.
pub struct FrameSplitter {
    buf: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(512),
        }
    }

    /// Feed new data and extract any complete frames.
    ///
    /// Returns raw wire frames (header + declared payload) in arrival order.
    /// A trailing partial frame is kept for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(data);
        let mut frames = Vec::new();

        let mut start = 0;
        loop {
            let total = match frame_len(&self.buf[start..]) {
                Ok(Some(total)) => total,
                _ => break,
            };
            if self.buf.len() - start < total {
                break; // incomplete frame
            }
            frames.push(self.buf[start..start + total].to_vec());
            start += total;
        }
        self.buf.drain(..start);

        frames
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop any buffered partial frame, e.g. when the peer is replaced.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
