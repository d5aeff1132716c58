pub mod checksum;
pub mod codec;
pub mod conn;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod session;
pub mod uart;

pub use conn::{ConnError, Connection, Disconnect};
pub use error::WireError;
pub use frame::{FrameSink, FrameSplitter, TransportCommand, TransportFrame};
pub use protocol::{
    CharacterDescriptor, Color, ContentId, DeleteLayer, DeleteOperation, DrawCount,
    GraphicDescriptor, Interaction, InteractiveHeader, InteractiveRecord, Operation, Renderer,
    Shape,
};
pub use session::{FrameOutcome, Session, SessionConfig, TextLevel};
pub use uart::{InnerFrame, SeqCounter};
