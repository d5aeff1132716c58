//! Byte-stream adapter for a single peer.
//!
//! Reads whatever the stream returns, splits it into transport frames, and
//! feeds them to a [`Session`]. Outbound frames go straight back to the same
//! stream. No application logic: callers decide what to do when the peer
//! goes away.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read, Write};

use tracing::{debug, info, warn};

use crate::error::WireError;
use crate::frame::{FrameSink, FrameSplitter};
use crate::protocol::{Interaction, Renderer};
use crate::session::{FrameOutcome, Session, SessionConfig, TextLevel};

/// Errors from connection operations.
#[derive(Debug)]
pub enum ConnError {
    /// Stream read failed.
    Io(io::Error),
    /// Outbound frame could not be encoded.
    Wire(WireError),
    /// Stream closed by peer.
    Disconnected,
}

impl fmt::Display for ConnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnError::Io(e) => write!(f, "I/O error: {e}"),
            ConnError::Wire(e) => write!(f, "wire error: {e}"),
            ConnError::Disconnected => write!(f, "connection closed by peer"),
        }
    }
}

impl std::error::Error for ConnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnError::Io(e) => Some(e),
            ConnError::Wire(e) => Some(e),
            ConnError::Disconnected => None,
        }
    }
}

impl From<io::Error> for ConnError {
    fn from(e: io::Error) -> Self {
        ConnError::Io(e)
    }
}

impl From<WireError> for ConnError {
    fn from(e: WireError) -> Self {
        ConnError::Wire(e)
    }
}

/// Why [`Connection::serve`] stopped.
#[derive(Debug)]
pub enum Disconnect {
    /// The peer closed the stream.
    PeerClosed,
    /// The session asked for the peer to be dropped.
    Rejected(WireError),
}

/// Writes each outbound frame to the stream. A failed write loses the frame
/// and is only logged.
struct StreamSink<'a, W: Write> {
    stream: &'a mut W,
}

impl<W: Write> FrameSink for StreamSink<'_, W> {
    fn send(&mut self, wire: &[u8]) {
        if let Err(e) = self.stream.write_all(wire).and_then(|()| self.stream.flush()) {
            warn!(error = %e, len = wire.len(), "outbound frame dropped");
        }
    }
}

/// One peer on a reliable, ordered byte stream.
///
/// Synchronous and single-threaded. Any `Read + Write` works: a
/// `TcpStream`, a serial port, or an in-memory pipe in tests.
///
/// # Example
///
/// ```no_run
/// use std::net::TcpListener;
/// use refbus::{Connection, Renderer, SessionConfig};
/// # struct Overlay;
/// # impl Renderer for Overlay {
/// #     fn draw_graphic(&mut self, _: &refbus::InteractiveHeader, _: &refbus::GraphicDescriptor) {}
/// #     fn draw_character(&mut self, _: &refbus::InteractiveHeader, _: &refbus::CharacterDescriptor) {}
/// #     fn delete_layer(&mut self, _: &refbus::InteractiveHeader, _: &refbus::DeleteLayer) {}
/// # }
///
/// let listener = TcpListener::bind("0.0.0.0:7788")?;
/// let (stream, _) = listener.accept()?;
/// let mut conn = Connection::new(stream, SessionConfig::default());
/// let reason = conn.serve(&mut Overlay)?;
/// println!("peer gone: {reason:?}");
/// # Ok::<(), refbus::ConnError>(())
/// ```
pub struct Connection<S> {
    stream: S,
    splitter: FrameSplitter,
    session: Session,
    read_buf: [u8; 4096],
    /// Frames split from the stream but not yet handled.
    pending: VecDeque<Vec<u8>>,
    /// Called after every handled frame.
    on_recv: Option<Box<dyn FnMut(&FrameOutcome)>>,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, config: SessionConfig) -> Self {
        Self {
            stream,
            splitter: FrameSplitter::new(),
            session: Session::new(config),
            read_buf: [0u8; 4096],
            pending: VecDeque::new(),
            on_recv: None,
        }
    }

    /// Register a callback invoked after every handled frame.
    pub fn set_on_recv(&mut self, f: impl FnMut(&FrameOutcome) + 'static) {
        self.on_recv = Some(Box::new(f));
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Send a robot-interaction record. Returns the sequence number used.
    pub fn send_interaction(&mut self, interaction: &Interaction) -> Result<u8, ConnError> {
        let mut sink = StreamSink { stream: &mut self.stream };
        Ok(self.session.send_interaction(interaction, &mut sink)?)
    }

    /// Send an inner frame with an arbitrary command id.
    pub fn send_uart(&mut self, command_id: u16, data: &[u8]) -> Result<u8, ConnError> {
        let mut sink = StreamSink { stream: &mut self.stream };
        Ok(self.session.send_uart(command_id, data, &mut sink)?)
    }

    pub fn send_text(&mut self, level: TextLevel, text: &str) -> Result<(), ConnError> {
        let mut sink = StreamSink { stream: &mut self.stream };
        Ok(self.session.send_text(level, text, &mut sink)?)
    }

    /// Block until one complete frame has been handled.
    ///
    /// Returns `ConnError::Disconnected` once the peer closes the stream.
    /// A partial frame left in the buffer at that point is discarded.
    pub fn recv(&mut self, renderer: &mut impl Renderer) -> Result<FrameOutcome, ConnError> {
        loop {
            if let Some(wire) = self.pending.pop_front() {
                let mut sink = StreamSink { stream: &mut self.stream };
                let outcome = self.session.handle(&wire, &mut sink, renderer);
                if let Some(cb) = self.on_recv.as_mut() {
                    cb(&outcome);
                }
                return Ok(outcome);
            }

            let n = match self.stream.read(&mut self.read_buf) {
                Ok(0) => {
                    if self.splitter.pending() > 0 {
                        debug!(bytes = self.splitter.pending(), "partial frame discarded");
                        self.splitter.reset();
                    }
                    return Err(ConnError::Disconnected);
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.pending.extend(self.splitter.feed(&self.read_buf[..n]));
        }
    }

    /// Handle frames until the peer leaves or the session drops it.
    pub fn serve(&mut self, renderer: &mut impl Renderer) -> Result<Disconnect, ConnError> {
        loop {
            match self.recv(renderer) {
                Ok(FrameOutcome::Rejected { error, disconnect: true }) => {
                    info!(error = %error, "dropping peer");
                    return Ok(Disconnect::Rejected(error));
                }
                Ok(_) => {}
                Err(ConnError::Disconnected) => {
                    info!("peer closed connection");
                    return Ok(Disconnect::PeerClosed);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{TransportCommand, TransportFrame};
    use crate::protocol::{
        CharacterDescriptor, Color, DeleteLayer, DeleteOperation, GraphicDescriptor,
        InteractiveHeader, Operation, Shape,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    /// In-memory stream that hands out at most `chunk` bytes per read.
    struct Pipe {
        input: Vec<u8>,
        pos: usize,
        chunk: usize,
        output: Vec<u8>,
        fail_writes: bool,
    }

    impl Pipe {
        fn new(input: Vec<u8>, chunk: usize) -> Self {
            Self { input, pos: 0, chunk, output: Vec::new(), fail_writes: false }
        }

        fn written(&self) -> Vec<TransportFrame> {
            let mut splitter = FrameSplitter::new();
            splitter
                .feed(&self.output)
                .iter()
                .map(|w| TransportFrame::decode(w).unwrap())
                .collect()
        }
    }

    impl Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.input.len() - self.pos);
            buf[..n].copy_from_slice(&self.input[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counter {
        graphics: usize,
        characters: usize,
        deletes: usize,
    }

    impl Renderer for Counter {
        fn draw_graphic(&mut self, _: &InteractiveHeader, _: &GraphicDescriptor) {
            self.graphics += 1;
        }
        fn draw_character(&mut self, _: &InteractiveHeader, _: &CharacterDescriptor) {
            self.characters += 1;
        }
        fn delete_layer(&mut self, _: &InteractiveHeader, _: &DeleteLayer) {
            self.deletes += 1;
        }
    }

    fn arc() -> GraphicDescriptor {
        GraphicDescriptor {
            name: *b"arc",
            operation: Operation::Add,
            shape: Shape::Arc,
            layer: 1,
            color: Color::Orange,
            start_angle: 0,
            end_angle: 180,
            width: 4,
            start_x: 960,
            end_x: 0,
            radius: 0,
            start_y: 540,
            end_y: 0,
        }
    }

    /// Wire bytes a peer would send for `interactions`, in order.
    fn peer_bytes(interactions: &[Interaction]) -> Vec<u8> {
        let mut peer = Session::default();
        let mut frames: Vec<Vec<u8>> = Vec::new();
        for interaction in interactions {
            peer.send_interaction(interaction, &mut frames).unwrap();
        }
        frames.concat()
    }

    #[test]
    fn frames_split_across_reads() {
        let input = peer_bytes(&[
            Interaction::draw(1, 0x0101, vec![arc(), arc()]).unwrap(),
            Interaction::delete_layer(1, 0x0101, DeleteLayer { operation: DeleteOperation::All, layer: 0 }),
        ]);
        let mut conn = Connection::new(Pipe::new(input, 3), SessionConfig::default());
        let mut counter = Counter::default();

        assert!(matches!(conn.recv(&mut counter).unwrap(), FrameOutcome::Interaction(Interaction::Graphics { .. })));
        assert!(matches!(conn.recv(&mut counter).unwrap(), FrameOutcome::Interaction(Interaction::DeleteLayer { .. })));
        assert!(matches!(conn.recv(&mut counter), Err(ConnError::Disconnected)));
        assert_eq!((counter.graphics, counter.deletes), (2, 1));
        assert!(conn.get_ref().output.is_empty());
    }

    #[test]
    fn serve_until_peer_closes() {
        let mut input = peer_bytes(&[Interaction::draw(1, 2, vec![arc()]).unwrap()]);
        input.extend(TransportFrame::info("bye").encode().unwrap());
        input.extend_from_slice(&[0x20, 0x10]); // partial header, never completed

        let seen = Rc::new(RefCell::new(0usize));
        let seen_cb = Rc::clone(&seen);
        let mut conn = Connection::new(Pipe::new(input, 64), SessionConfig::default());
        conn.set_on_recv(move |_| *seen_cb.borrow_mut() += 1);

        let mut counter = Counter::default();
        assert!(matches!(conn.serve(&mut counter).unwrap(), Disconnect::PeerClosed));
        assert_eq!(*seen.borrow(), 2);
        assert_eq!(counter.graphics, 1);
    }

    #[test]
    fn checksum_failure_drops_peer() {
        let mut input = peer_bytes(&[Interaction::draw(1, 2, vec![arc()]).unwrap()]);
        input[6] ^= 0x01; // inner length byte, covered by CRC8
        input.extend(peer_bytes(&[Interaction::draw(1, 2, vec![arc()]).unwrap()]));

        let mut conn = Connection::new(Pipe::new(input, 4096), SessionConfig::default());
        let mut counter = Counter::default();
        match conn.serve(&mut counter).unwrap() {
            Disconnect::Rejected(WireError::HeaderChecksum { seq: 0 }) => {}
            other => panic!("expected checksum disconnect, got {other:?}"),
        }
        assert_eq!(counter.graphics, 0);

        let written = conn.get_ref().written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].command, TransportCommand::Error);
        assert_eq!(written[0].text(), "CRC8 failed, seq=0 frame rejected");
    }

    #[test]
    fn lenient_session_keeps_peer() {
        let mut input = peer_bytes(&[Interaction::draw(1, 2, vec![arc()]).unwrap()]);
        let last = input.len() - 1;
        input[last] ^= 0xFF;
        input.extend(peer_bytes(&[Interaction::draw(1, 2, vec![arc()]).unwrap()]));

        let config = SessionConfig { disconnect_on_checksum_failure: false, ..SessionConfig::default() };
        let mut conn = Connection::new(Pipe::new(input, 4096), config);
        let mut counter = Counter::default();
        assert!(matches!(conn.serve(&mut counter).unwrap(), Disconnect::PeerClosed));
        assert_eq!(counter.graphics, 1);
    }

    #[test]
    fn write_failure_is_not_fatal() {
        let mut input = TransportFrame::new(TransportCommand::Unknown(0x7F), vec![]).encode().unwrap();
        input.extend(peer_bytes(&[Interaction::draw(1, 2, vec![arc()]).unwrap()]));

        let mut pipe = Pipe::new(input, 4096);
        pipe.fail_writes = true;
        let mut conn = Connection::new(pipe, SessionConfig::default());
        let mut counter = Counter::default();
        assert!(matches!(conn.serve(&mut counter).unwrap(), Disconnect::PeerClosed));
        assert_eq!(counter.graphics, 1);
        assert!(conn.into_inner().output.is_empty());
    }

    #[test]
    fn outbound_goes_to_stream() {
        let mut conn = Connection::new(Pipe::new(Vec::new(), 1), SessionConfig::default());
        assert_eq!(conn.send_uart(0x0301, &[1, 2]).unwrap(), 0);
        let seq = conn.send_interaction(&Interaction::draw(1, 2, vec![arc()]).unwrap()).unwrap();
        assert_eq!(seq, 1);
        conn.send_text(TextLevel::Info, "hello").unwrap();

        let written = conn.get_ref().written();
        let commands: Vec<_> = written.iter().map(|f| f.command).collect();
        assert_eq!(commands, vec![TransportCommand::Uart, TransportCommand::Uart, TransportCommand::Info]);
        assert_eq!(conn.session().next_seq(), 2);

        assert!(matches!(
            conn.send_uart(0x0301, &vec![0; crate::uart::MAX_UART_DATA_LEN + 1]),
            Err(ConnError::Wire(WireError::PayloadTooLong { .. }))
        ));
        assert_eq!(conn.get_ref().written().len(), 3);
    }
}
