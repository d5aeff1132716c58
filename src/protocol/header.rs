//! Interactive record header and raw record envelope.
//!
//! Every robot-interaction data block starts with
//! `[content_id:2 sender_id:2 receiver_id:2]` (little-endian), followed by a
//! body whose layout depends on the content id.

use std::fmt;

use crate::codec;
use crate::error::{Result, WireError};
use crate::protocol::{CONTENT_TEAM_CHATTER, ContentId, TEAM_CHATTER_RANGE};

/// Collapse the same-team chatter range onto its single sentinel id.
/// Every other id passes through untouched.
pub fn normalize_content_id(raw: u16) -> u16 {
    if TEAM_CHATTER_RANGE.contains(&raw) {
        CONTENT_TEAM_CHATTER
    } else {
        raw
    }
}

/// The 6-byte prefix of an interactive record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InteractiveHeader {
    /// Normalized content id (same-team chatter collapsed).
    pub content_id: u16,
    /// Content id exactly as it appeared on the wire.
    pub raw_content_id: u16,
    /// Opaque routing id, not interpreted here.
    pub sender_id: u16,
    /// Opaque routing id, not interpreted here.
    pub receiver_id: u16,
}

impl InteractiveHeader {
    pub const LEN: usize = 6;

    pub fn new(content_id: u16, sender_id: u16, receiver_id: u16) -> Self {
        Self {
            content_id: normalize_content_id(content_id),
            raw_content_id: content_id,
            sender_id,
            receiver_id,
        }
    }

    /// Split `data` into the header and the body that follows it.
    pub fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::LEN {
            return Err(WireError::payload_too_short("InteractiveHeader", Self::LEN, data.len()));
        }
        let header = Self::new(
            codec::read_u16(data, 0)?,
            codec::read_u16(data, 2)?,
            codec::read_u16(data, 4)?,
        );
        Ok((header, &data[Self::LEN..]))
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        codec::write_u16(buf, self.raw_content_id);
        codec::write_u16(buf, self.sender_id);
        codec::write_u16(buf, self.receiver_id);
    }

    /// The record type this header announces, if known.
    pub fn content(&self) -> Option<ContentId> {
        ContentId::from_raw(self.content_id)
    }
}

/// A header plus its undecoded body.
///
/// `encode` writes back exactly the bytes `decode` consumed.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InteractiveRecord {
    pub header: InteractiveHeader,
    pub body: Vec<u8>,
}

impl InteractiveRecord {
    pub fn new(header: InteractiveHeader, body: Vec<u8>) -> Self {
        Self { header, body }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (header, body) = InteractiveHeader::decode(data)?;
        Ok(Self {
            header,
            body: body.to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(InteractiveHeader::LEN + self.body.len());
        self.header.encode(&mut buf);
        buf.extend_from_slice(&self.body);
        buf
    }
}

impl fmt::Debug for InteractiveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InteractiveRecord {{ content: 0x{:04X}, {} -> {}, body: {}B",
            self.header.raw_content_id,
            self.header.sender_id,
            self.header.receiver_id,
            self.body.len(),
        )?;
        if !self.body.is_empty() {
            write!(f, " |")?;
            for b in &self.body {
                write!(f, " {b:02X}")?;
            }
        }
        write!(f, " }}")
    }
}
