//! Layer deletion (content 0x0100).

use crate::error::{Result, WireError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DeleteOperation {
    None,
    /// Clear one layer
    Layer,
    /// Clear every layer
    All,
    Unknown(u8),
}

impl DeleteOperation {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::None,
            1 => Self::Layer,
            2 => Self::All,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Layer => 1,
            Self::All => 2,
            Self::Unknown(b) => b,
        }
    }
}

/// Delete-layer record (2 bytes): `[operation layer]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeleteLayer {
    pub operation: DeleteOperation,
    /// Target layer; ignored for `All`.
    pub layer: u8,
}

impl DeleteLayer {
    pub const LEN: usize = 2;

    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::LEN {
            return Err(WireError::payload_too_short("DeleteLayer", Self::LEN, body.len()));
        }
        Ok(Self {
            operation: DeleteOperation::from_byte(body[0]),
            layer: body[1],
        })
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        [self.operation.as_byte(), self.layer]
    }
}
