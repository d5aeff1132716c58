//! Inner UART-style frame carried inside a transport frame with command Uart.
//!
//! Wire format:
//! ```text
//! A5 LEN_LO LEN_HI SEQ CRC8 CMD_LO CMD_HI DATA[LEN] CRC16_LO CRC16_HI
//! ```
//!
//! CRC8 covers the four bytes before it. CRC16 covers everything before it.

use std::fmt;

use tracing::warn;

use crate::checksum;
use crate::codec;
use crate::error::{Result, WireError};
use crate::frame::{FrameSink, TransportFrame};

/// Start-of-frame marker.
pub const SOF: u8 = 0xA5;

/// SOF + length + seq + CRC8.
pub const HEADER_LEN: usize = 5;

/// Header, command id and trailer: everything except the data.
pub const OVERHEAD: usize = HEADER_LEN + 2 + 2;

/// Largest data block the 16-bit length field can describe.
pub const MAX_DATA_LEN: usize = u16::MAX as usize;

/// Largest data block whose inner frame still fits in one Uart transport
/// frame.
pub const MAX_UART_DATA_LEN: usize = crate::frame::MAX_PAYLOAD_LEN - OVERHEAD;

/// A validated inner frame.
#[derive(Clone, PartialEq, Eq)]
pub struct InnerFrame {
    /// Sender's sequence number. Diagnostic only.
    pub seq: u8,
    pub command_id: u16,
    pub data: Vec<u8>,
}

impl InnerFrame {
    /// Encode with checksums. Fails for data longer than [`MAX_DATA_LEN`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = u16::try_from(self.data.len()).map_err(|_| WireError::PayloadTooLong {
            what: "inner frame data",
            max: MAX_DATA_LEN,
            got: self.data.len(),
        })?;
        let mut wire = Vec::with_capacity(OVERHEAD + self.data.len());
        wire.push(SOF);
        codec::write_u16(&mut wire, len);
        wire.push(self.seq);
        checksum::append_crc8(&mut wire);
        codec::write_u16(&mut wire, self.command_id);
        wire.extend_from_slice(&self.data);
        checksum::append_crc16(&mut wire);
        Ok(wire)
    }

    /// Validate and parse an inner frame.
    ///
    /// Checksum failures are reported to the peer through `errors` as an
    /// Error transport frame before being returned. A missing start marker is
    /// rejected silently. Truncation is returned without a report; the caller
    /// decides whether to answer it.
    pub fn decode(wire: &[u8], errors: &mut impl FrameSink) -> Result<Self> {
        match wire.first() {
            Some(&SOF) => {}
            Some(&got) => return Err(WireError::MissingStart { got }),
            None => return Err(WireError::Incomplete { need: HEADER_LEN, have: 0 }),
        }
        if wire.len() < HEADER_LEN {
            return Err(WireError::Incomplete { need: HEADER_LEN, have: wire.len() });
        }

        let seq = wire[3];
        if !checksum::verify_crc8(wire, HEADER_LEN - 1) {
            return Err(reject(WireError::HeaderChecksum { seq }, errors));
        }

        let declared = codec::read_u16(wire, 1)? as usize;
        let data_end = HEADER_LEN + 2 + declared;
        if wire.len() < data_end + 2 {
            return Err(WireError::Truncated {
                seq,
                declared,
                have: wire.len().saturating_sub(OVERHEAD),
            });
        }

        if !checksum::verify_crc16(wire, data_end) {
            return Err(reject(WireError::TrailerChecksum { seq }, errors));
        }

        Ok(Self {
            seq,
            command_id: codec::read_u16(wire, HEADER_LEN)?,
            data: wire[HEADER_LEN + 2..data_end].to_vec(),
        })
    }
}

/// Tell the peer why its frame was dropped, then hand the error back.
fn reject(err: WireError, errors: &mut impl FrameSink) -> WireError {
    warn!(error = %err, "inner frame rejected");
    if let Err(e) = errors.send_frame(&TransportFrame::error(&err.to_string())) {
        warn!(error = %e, "rejection report not sent");
    }
    err
}

impl fmt::Debug for InnerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InnerFrame {{ seq: {}, command_id: 0x{:04X}, len: {}, data: ",
            self.seq,
            self.command_id,
            self.data.len(),
        )?;
        for (i, b) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02X}")?;
        }
        write!(f, " }}")
    }
}

/// Outbound sequence numbers: start at 0, wrap at 256.
#[derive(Debug, Clone, Default)]
pub struct SeqCounter {
    next: u8,
}

impl SeqCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the current number and move on.
    pub fn advance(&mut self) -> u8 {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        seq
    }

    /// The number the next frame will carry.
    pub fn peek(&self) -> u8 {
        self.next
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
