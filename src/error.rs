use thiserror::Error;

/// Errors arising from frame parsing, record decoding and dispatch.
///
/// None of these are fatal: the session reports them to the peer and moves
/// on to the next frame.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("incomplete frame: need {need} bytes, have {have}")]
    Incomplete { need: usize, have: usize },

    #[error("missing start of frame (expected 0xA5, got 0x{got:02X})")]
    MissingStart { got: u8 },

    #[error("CRC8 failed, seq={seq} frame rejected")]
    HeaderChecksum { seq: u8 },

    #[error("CRC16 failed, seq={seq} frame rejected")]
    TrailerChecksum { seq: u8 },

    #[error("inner frame truncated, seq={seq}: declared {declared} data bytes, have {have}")]
    Truncated { seq: u8, declared: usize, have: usize },

    #[error("unknown transport command 0x{command:02X}")]
    UnknownTransportCommand { command: u8 },

    #[error("unknown command id 0x{id:04X}")]
    UnknownCommandId { id: u16 },

    #[error("unknown content id 0x{id:04X}")]
    UnknownContentId { id: u16 },

    #[error("payload too short for {what}: need {need} bytes, got {got}{}", format_raw_suffix(raw))]
    PayloadTooShort {
        what: &'static str,
        need: usize,
        got: usize,
        /// Raw body bytes for debug context.
        raw: Vec<u8>,
    },

    #[error("unexpected length for {what}: expected {expected} bytes, got {got}{}", format_raw_suffix(raw))]
    UnexpectedLength {
        what: &'static str,
        expected: usize,
        got: usize,
        raw: Vec<u8>,
    },

    #[error("{what} too long: {got} bytes, limit {max}")]
    PayloadTooLong { what: &'static str, max: usize, got: usize },

    #[error("invalid bit width {width} (must be 1..=32)")]
    InvalidBitWidth { width: u32 },

    #[error("cannot draw {count} graphics in one record (1, 2, 5 or 7)")]
    InvalidDrawCount { count: usize },
}

impl WireError {
    /// Create a `PayloadTooShort` error (raw bytes filled in later via `with_raw`).
    pub(crate) fn payload_too_short(what: &'static str, need: usize, got: usize) -> Self {
        Self::PayloadTooShort { what, need, got, raw: Vec::new() }
    }

    /// Create an `UnexpectedLength` error (raw bytes filled in later via `with_raw`).
    pub(crate) fn unexpected_length(what: &'static str, expected: usize, got: usize) -> Self {
        Self::UnexpectedLength { what, expected, got, raw: Vec::new() }
    }

    /// Attach raw body bytes to decode-phase errors for diagnostics.
    pub fn with_raw(self, body: &[u8]) -> Self {
        match self {
            Self::PayloadTooShort { what, need, got, .. } => {
                Self::PayloadTooShort { what, need, got, raw: body.to_vec() }
            }
            Self::UnexpectedLength { what, expected, got, .. } => {
                Self::UnexpectedLength { what, expected, got, raw: body.to_vec() }
            }
            other => other,
        }
    }

    /// Checksum failures are the only rejections the transport may answer
    /// by dropping the peer.
    pub fn is_checksum(&self) -> bool {
        matches!(self, Self::HeaderChecksum { .. } | Self::TrailerChecksum { .. })
    }

    /// Rejections the peer never hears about. Without a valid start marker
    /// nothing in the frame can be trusted enough to answer.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::MissingStart { .. })
    }
}

/// Format raw bytes as a suffix like " | 0101A5..." (empty if no bytes).
fn format_raw_suffix(raw: &[u8]) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let limit = 16;
    let hex: String = raw.iter().take(limit).map(|b| format!("{b:02X}")).collect();
    let ellipsis = if raw.len() > limit { "..." } else { "" };
    format!(" | {hex}{ellipsis}")
}

pub type Result<T> = std::result::Result<T, WireError>;
