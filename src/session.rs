//! Per-connection protocol state and frame handling.
//!
//! A [`Session`] takes one complete transport frame at a time, routes it by
//! command, and reports anything it cannot accept back to the peer as an
//! Error frame. It never tears the connection down itself: the returned
//! [`FrameOutcome`] tells the transport whether its disconnect policy applies.

use tracing::{debug, error, info, warn};

use crate::error::{Result, WireError};
use crate::frame::{FrameSink, TransportCommand, TransportFrame};
use crate::protocol::{CMD_ROBOT_INTERACTION, Interaction, Renderer};
use crate::uart::{InnerFrame, MAX_UART_DATA_LEN, SeqCounter};

/// Session behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Ask the transport to drop the peer after a checksum failure.
    pub disconnect_on_checksum_failure: bool,
    /// Answer unknown commands, unknown ids and truncated frames with an
    /// Error frame. Checksum failures are always reported.
    pub report_rejections: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            disconnect_on_checksum_failure: true,
            report_rejections: true,
        }
    }
}

/// Severity of a human-readable transport frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TextLevel {
    Info,
    Warning,
    Error,
}

impl TextLevel {
    fn frame(self, text: &str) -> TransportFrame {
        match self {
            Self::Info => TransportFrame::info(text),
            Self::Warning => TransportFrame::warning(text),
            Self::Error => TransportFrame::error(text),
        }
    }
}

/// What happened to one transport frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// Control frame accepted. No behaviour is attached to it yet.
    Control { payload: Vec<u8> },
    /// Info/Warning/Error text from the peer, already logged.
    Text { level: TextLevel, text: String },
    /// Robot-interaction record decoded and handed to the renderer.
    Interaction(Interaction),
    /// Frame dropped. The peer has been told unless the error is silent.
    Rejected { error: WireError, disconnect: bool },
}

impl FrameOutcome {
    /// True when the transport should close the connection.
    pub fn should_disconnect(&self) -> bool {
        matches!(self, Self::Rejected { disconnect: true, .. })
    }
}

/// Protocol state for the single active peer.
#[derive(Debug, Default)]
pub struct Session {
    seq: SeqCounter,
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            seq: SeqCounter::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Sequence number the next outbound inner frame will carry.
    pub fn next_seq(&self) -> u8 {
        self.seq.peek()
    }

    /// Process one complete transport frame.
    pub fn handle(
        &mut self,
        wire: &[u8],
        sink: &mut impl FrameSink,
        renderer: &mut impl Renderer,
    ) -> FrameOutcome {
        // Only whole frames should arrive here; a short one is the caller's
        // bug, not the peer's.
        let frame = match TransportFrame::decode(wire) {
            Ok(frame) => frame,
            Err(error) => {
                debug!(error = %error, "incomplete transport frame dropped");
                return FrameOutcome::Rejected { error, disconnect: false };
            }
        };

        match frame.command {
            TransportCommand::Control => {
                debug!(len = frame.payload.len(), "control frame");
                FrameOutcome::Control { payload: frame.payload }
            }
            TransportCommand::Info => self.text(TextLevel::Info, &frame),
            TransportCommand::Warning => self.text(TextLevel::Warning, &frame),
            TransportCommand::Error => self.text(TextLevel::Error, &frame),
            TransportCommand::Uart => self.uart(&frame.payload, sink, renderer),
            TransportCommand::Unknown(command) => {
                self.reject(WireError::UnknownTransportCommand { command }, sink)
            }
        }
    }

    fn text(&self, level: TextLevel, frame: &TransportFrame) -> FrameOutcome {
        let text = frame.text();
        match level {
            TextLevel::Info => info!(peer = %text, "peer info"),
            TextLevel::Warning => warn!(peer = %text, "peer warning"),
            TextLevel::Error => error!(peer = %text, "peer error"),
        }
        FrameOutcome::Text { level, text }
    }

    fn uart(
        &mut self,
        payload: &[u8],
        sink: &mut impl FrameSink,
        renderer: &mut impl Renderer,
    ) -> FrameOutcome {
        let inner = match InnerFrame::decode(payload, sink) {
            Ok(inner) => inner,
            Err(e) => return self.reject(e, sink),
        };

        let interaction = match Interaction::decode(&inner) {
            Ok(interaction) => interaction,
            Err(e) => return self.reject(e, sink),
        };

        if let Interaction::TeamChatter(record) = &interaction {
            info!(
                seq = inner.seq,
                content_id = record.header.raw_content_id,
                len = record.body.len(),
                "same-team chatter received, not handled"
            );
        } else {
            let header = interaction.header();
            let rendered = interaction.render(renderer);
            debug!(
                seq = inner.seq,
                kind = interaction.kind(),
                sender = header.sender_id,
                receiver = header.receiver_id,
                rendered,
                "interaction"
            );
        }
        FrameOutcome::Interaction(interaction)
    }

    fn reject(&self, error: WireError, sink: &mut impl FrameSink) -> FrameOutcome {
        // Checksum failures were already reported by the inner frame codec.
        if error.is_silent() {
            debug!(error = %error, "frame dropped");
        } else if !error.is_checksum() {
            warn!(error = %error, "frame rejected");
            if self.config.report_rejections {
                if let Err(e) = sink.send_frame(&TransportFrame::error(&error.to_string())) {
                    warn!(error = %e, "rejection report not sent");
                }
            }
        }
        let disconnect = error.is_checksum() && self.config.disconnect_on_checksum_failure;
        FrameOutcome::Rejected { error, disconnect }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Encode an inner frame with the next sequence number. The number is
    /// only used up if encoding succeeds.
    pub fn encode_uart(&mut self, command_id: u16, data: &[u8]) -> Result<Vec<u8>> {
        let wire = InnerFrame {
            seq: self.seq.peek(),
            command_id,
            data: data.to_vec(),
        }
        .encode()?;
        self.seq.advance();
        Ok(wire)
    }

    /// Wrap an inner frame in a Uart transport frame and send it.
    /// Returns the sequence number used.
    pub fn send_uart(
        &mut self,
        command_id: u16,
        data: &[u8],
        sink: &mut impl FrameSink,
    ) -> Result<u8> {
        if data.len() > MAX_UART_DATA_LEN {
            return Err(WireError::PayloadTooLong {
                what: "uart data",
                max: MAX_UART_DATA_LEN,
                got: data.len(),
            });
        }
        let seq = self.seq.peek();
        let inner = self.encode_uart(command_id, data)?;
        sink.send_frame(&TransportFrame::uart(inner))?;
        Ok(seq)
    }

    /// Send a robot-interaction record. Returns the sequence number used.
    pub fn send_interaction(
        &mut self,
        interaction: &Interaction,
        sink: &mut impl FrameSink,
    ) -> Result<u8> {
        let record = interaction.to_record()?;
        self.send_uart(CMD_ROBOT_INTERACTION, &record.encode(), sink)
    }

    /// Send human-readable text to the peer.
    pub fn send_text(&self, level: TextLevel, text: &str, sink: &mut impl FrameSink) -> Result<()> {
        sink.send_frame(&level.frame(text))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
