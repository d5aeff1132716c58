//! Robot-interaction records and their dispatch.
//!
//! An inner frame with command id [`CMD_ROBOT_INTERACTION`] carries one
//! interactive record: a 6-byte [`InteractiveHeader`] whose content id picks
//! the body layout.
//!
//! | content id      | body                              |
//! |-----------------|-----------------------------------|
//! | `0x0100`        | [`DeleteLayer`]                   |
//! | `0x0101`        | 1 × [`GraphicDescriptor`]         |
//! | `0x0102`        | 2 × [`GraphicDescriptor`]         |
//! | `0x0103`        | 5 × [`GraphicDescriptor`]         |
//! | `0x0104`        | 7 × [`GraphicDescriptor`]         |
//! | `0x0110`        | [`CharacterDescriptor`]           |
//! | `0x0200-0x02FF` | same-team chatter, not decoded    |
//!
//! [`Interaction::decode`] is the dispatch table; [`Interaction::render`]
//! hands the decoded records to a [`Renderer`].

pub mod graphic;
pub mod header;
pub mod layer;

use std::ops::RangeInclusive;

use crate::error::{Result, WireError};
use crate::uart::InnerFrame;

pub use graphic::{CharacterDescriptor, Color, GraphicDescriptor, Operation, Shape};
pub use header::{InteractiveHeader, InteractiveRecord, normalize_content_id};
pub use layer::{DeleteLayer, DeleteOperation};

// ---------------------------------------------------------------------------
// Id constants
// ---------------------------------------------------------------------------

/// Inner-frame command id for robot interaction records.
pub const CMD_ROBOT_INTERACTION: u16 = 0x0000;

pub const CONTENT_DELETE_GRAPHIC: u16 = 0x0100;
pub const CONTENT_DRAW_1: u16 = 0x0101;
pub const CONTENT_DRAW_2: u16 = 0x0102;
pub const CONTENT_DRAW_5: u16 = 0x0103;
pub const CONTENT_DRAW_7: u16 = 0x0104;
pub const CONTENT_DRAW_CHARACTER: u16 = 0x0110;

/// Messages between cooperating robots. The whole range collapses to
/// [`CONTENT_TEAM_CHATTER`] when a header is decoded.
pub const TEAM_CHATTER_RANGE: RangeInclusive<u16> = 0x0200..=0x02FF;
pub const CONTENT_TEAM_CHATTER: u16 = 0x0200;

// ---------------------------------------------------------------------------
// Content ids
// ---------------------------------------------------------------------------

/// How many graphic descriptors a draw record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DrawCount {
    One,
    Two,
    Five,
    Seven,
}

impl DrawCount {
    pub fn count(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Five => 5,
            Self::Seven => 7,
        }
    }

    /// The variant holding exactly `n` descriptors, if there is one.
    pub fn from_count(n: usize) -> Option<Self> {
        match n {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            5 => Some(Self::Five),
            7 => Some(Self::Seven),
            _ => None,
        }
    }
}

/// Known interactive record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ContentId {
    DeleteGraphic,
    Draw(DrawCount),
    DrawCharacter,
    TeamChatter,
}

impl ContentId {
    pub fn from_raw(id: u16) -> Option<Self> {
        match normalize_content_id(id) {
            CONTENT_DELETE_GRAPHIC => Some(Self::DeleteGraphic),
            CONTENT_DRAW_1 => Some(Self::Draw(DrawCount::One)),
            CONTENT_DRAW_2 => Some(Self::Draw(DrawCount::Two)),
            CONTENT_DRAW_5 => Some(Self::Draw(DrawCount::Five)),
            CONTENT_DRAW_7 => Some(Self::Draw(DrawCount::Seven)),
            CONTENT_DRAW_CHARACTER => Some(Self::DrawCharacter),
            CONTENT_TEAM_CHATTER => Some(Self::TeamChatter),
            _ => None,
        }
    }

    /// Exact body size for typed records. Same-team chatter has no fixed size.
    pub fn body_len(self) -> Option<usize> {
        match self {
            Self::DeleteGraphic => Some(DeleteLayer::LEN),
            Self::Draw(count) => Some(count.count() * GraphicDescriptor::LEN),
            Self::DrawCharacter => Some(CharacterDescriptor::LEN),
            Self::TeamChatter => None,
        }
    }

    fn body_name(self) -> &'static str {
        match self {
            Self::DeleteGraphic => "DeleteLayer",
            Self::Draw(_) => "GraphicDescriptor array",
            Self::DrawCharacter => "CharacterDescriptor",
            Self::TeamChatter => "team chatter",
        }
    }

    pub fn as_raw(self) -> u16 {
        match self {
            Self::DeleteGraphic => CONTENT_DELETE_GRAPHIC,
            Self::Draw(DrawCount::One) => CONTENT_DRAW_1,
            Self::Draw(DrawCount::Two) => CONTENT_DRAW_2,
            Self::Draw(DrawCount::Five) => CONTENT_DRAW_5,
            Self::Draw(DrawCount::Seven) => CONTENT_DRAW_7,
            Self::DrawCharacter => CONTENT_DRAW_CHARACTER,
            Self::TeamChatter => CONTENT_TEAM_CHATTER,
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Consumer of decoded overlay records. One call per record; nothing flows
/// back.
pub trait Renderer {
    fn draw_graphic(&mut self, header: &InteractiveHeader, graphic: &GraphicDescriptor);
    fn draw_character(&mut self, header: &InteractiveHeader, character: &CharacterDescriptor);
    fn delete_layer(&mut self, header: &InteractiveHeader, delete: &DeleteLayer);
}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

/// A decoded robot-interaction record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Interaction {
    DeleteLayer {
        header: InteractiveHeader,
        delete: DeleteLayer,
    },
    /// `graphics.len() == count.count()`, checked again by
    /// [`to_record`](Self::to_record).
    Graphics {
        header: InteractiveHeader,
        count: DrawCount,
        graphics: Vec<GraphicDescriptor>,
    },
    Character {
        header: InteractiveHeader,
        character: CharacterDescriptor,
    },
    /// Recognised but not decoded. The raw record is kept so nothing is lost.
    TeamChatter(InteractiveRecord),
}

impl Interaction {
    /// Route an inner frame to the decoder for its command and content id.
    pub fn decode(frame: &InnerFrame) -> Result<Self> {
        if frame.command_id != CMD_ROBOT_INTERACTION {
            return Err(WireError::UnknownCommandId { id: frame.command_id });
        }
        let (header, body) = InteractiveHeader::decode(&frame.data)?;
        let content = header
            .content()
            .ok_or(WireError::UnknownContentId { id: header.raw_content_id })?;

        if let Some(expected) = content.body_len() {
            if body.len() > expected {
                return Err(WireError::unexpected_length(content.body_name(), expected, body.len())
                    .with_raw(body));
            }
        }

        let decoded = match content {
            ContentId::TeamChatter => Ok(Self::TeamChatter(InteractiveRecord::new(
                header,
                body.to_vec(),
            ))),
            ContentId::DeleteGraphic => {
                DeleteLayer::decode(body).map(|delete| Self::DeleteLayer { header, delete })
            }
            ContentId::Draw(count) => GraphicDescriptor::decode_many(body, count.count())
                .map(|graphics| Self::Graphics { header, count, graphics }),
            ContentId::DrawCharacter => CharacterDescriptor::decode(body)
                .map(|character| Self::Character { header, character }),
        };
        decoded.map_err(|e| e.with_raw(body))
    }

    /// Build a draw record for 1, 2, 5 or 7 graphics.
    pub fn draw(sender_id: u16, receiver_id: u16, graphics: Vec<GraphicDescriptor>) -> Result<Self> {
        let count = DrawCount::from_count(graphics.len())
            .ok_or(WireError::InvalidDrawCount { count: graphics.len() })?;
        let header =
            InteractiveHeader::new(ContentId::Draw(count).as_raw(), sender_id, receiver_id);
        Ok(Self::Graphics { header, count, graphics })
    }

    pub fn draw_character(sender_id: u16, receiver_id: u16, character: CharacterDescriptor) -> Self {
        let header = InteractiveHeader::new(CONTENT_DRAW_CHARACTER, sender_id, receiver_id);
        Self::Character { header, character }
    }

    pub fn delete_layer(sender_id: u16, receiver_id: u16, delete: DeleteLayer) -> Self {
        let header = InteractiveHeader::new(CONTENT_DELETE_GRAPHIC, sender_id, receiver_id);
        Self::DeleteLayer { header, delete }
    }

    pub fn header(&self) -> &InteractiveHeader {
        match self {
            Self::DeleteLayer { header, .. }
            | Self::Graphics { header, .. }
            | Self::Character { header, .. } => header,
            Self::TeamChatter(record) => &record.header,
        }
    }

    /// Pack back into a raw record (header + body).
    pub fn to_record(&self) -> Result<InteractiveRecord> {
        let body = match self {
            Self::DeleteLayer { delete, .. } => delete.encode().to_vec(),
            Self::Graphics { count, graphics, .. } => {
                if graphics.len() != count.count() {
                    return Err(WireError::InvalidDrawCount { count: graphics.len() });
                }
                let mut body = Vec::with_capacity(graphics.len() * GraphicDescriptor::LEN);
                for g in graphics {
                    body.extend_from_slice(&g.encode()?);
                }
                body
            }
            Self::Character { character, .. } => character.encode()?.to_vec(),
            Self::TeamChatter(record) => return Ok(record.clone()),
        };
        Ok(InteractiveRecord::new(*self.header(), body))
    }

    /// Hand every decoded record to `renderer`. Returns the number of calls
    /// made; same-team chatter makes none.
    pub fn render(&self, renderer: &mut impl Renderer) -> usize {
        match self {
            Self::DeleteLayer { header, delete } => {
                renderer.delete_layer(header, delete);
                1
            }
            Self::Graphics { header, graphics, .. } => {
                for g in graphics {
                    renderer.draw_graphic(header, g);
                }
                graphics.len()
            }
            Self::Character { header, character } => {
                renderer.draw_character(header, character);
                1
            }
            Self::TeamChatter(_) => 0,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeleteLayer { .. } => "delete_layer",
            Self::Graphics { .. } => "graphics",
            Self::Character { .. } => "character",
            Self::TeamChatter(_) => "team_chatter",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Records every renderer call in order.
    #[derive(Default)]
    struct Recorder {
        graphics: Vec<GraphicDescriptor>,
        characters: Vec<CharacterDescriptor>,
        deletes: Vec<DeleteLayer>,
    }

    impl Renderer for Recorder {
        fn draw_graphic(&mut self, _: &InteractiveHeader, graphic: &GraphicDescriptor) {
            self.graphics.push(graphic.clone());
        }
        fn draw_character(&mut self, _: &InteractiveHeader, character: &CharacterDescriptor) {
            self.characters.push(character.clone());
        }
        fn delete_layer(&mut self, _: &InteractiveHeader, delete: &DeleteLayer) {
            self.deletes.push(*delete);
        }
    }

    fn line(layer: u8) -> GraphicDescriptor {
        GraphicDescriptor {
            name: [b'l', b'0' + layer, 0],
            operation: Operation::Add,
            shape: Shape::Line,
            layer,
            color: Color::White,
            start_angle: 0,
            end_angle: 0,
            width: 2,
            start_x: 100 + u16::from(layer),
            end_x: 900,
            radius: 0,
            start_y: 540,
            end_y: 540,
        }
    }

    fn inner(content_id: u16, body: &[u8]) -> InnerFrame {
        let mut data = Vec::new();
        InteractiveHeader::new(content_id, 0x0003, 0x0103).encode(&mut data);
        data.extend_from_slice(body);
        InnerFrame { seq: 0, command_id: CMD_ROBOT_INTERACTION, data }
    }

    #[test]
    fn content_id_round_trip() {
        for id in [
            CONTENT_DELETE_GRAPHIC,
            CONTENT_DRAW_1,
            CONTENT_DRAW_2,
            CONTENT_DRAW_5,
            CONTENT_DRAW_7,
            CONTENT_DRAW_CHARACTER,
            CONTENT_TEAM_CHATTER,
        ] {
            assert_eq!(ContentId::from_raw(id).unwrap().as_raw(), id);
        }
        assert_eq!(ContentId::from_raw(0x0105), None);
    }

    #[test]
    fn draw_five_dispatch() {
        let mut body = Vec::new();
        for layer in 0..5 {
            body.extend_from_slice(&line(layer).encode().unwrap());
        }
        let interaction = Interaction::decode(&inner(CONTENT_DRAW_5, &body)).unwrap();
        let Interaction::Graphics { count, graphics, .. } = &interaction else {
            panic!("expected graphics, got {interaction:?}");
        };
        assert_eq!(*count, DrawCount::Five);
        assert_eq!(graphics.len(), 5);
        for (i, g) in graphics.iter().enumerate() {
            assert_eq!(g, &line(i as u8));
            assert_eq!(g.encode().unwrap(), body[i * 15..(i + 1) * 15]);
        }

        let mut recorder = Recorder::default();
        assert_eq!(interaction.render(&mut recorder), 5);
        assert_eq!(recorder.graphics.len(), 5);
    }

    #[test]
    fn draw_counts() {
        for (id, n) in [(CONTENT_DRAW_1, 1), (CONTENT_DRAW_2, 2), (CONTENT_DRAW_7, 7)] {
            let body: Vec<u8> = (0..n).flat_map(|i| line(i as u8).encode().unwrap()).collect();
            let Interaction::Graphics { graphics, .. } = Interaction::decode(&inner(id, &body)).unwrap() else {
                panic!("expected graphics for 0x{id:04X}");
            };
            assert_eq!(graphics.len(), n);
        }
    }

    #[test]
    fn short_draw_body() {
        let body = line(0).encode().unwrap();
        assert!(matches!(
            Interaction::decode(&inner(CONTENT_DRAW_2, &body)),
            Err(WireError::PayloadTooShort { need: 30, got: 15, .. })
        ));
    }

    #[test]
    fn surplus_body_bytes_rejected() {
        let mut body = line(0).encode().unwrap().to_vec();
        body.extend_from_slice(&[0xEE, 0xEE]);
        match Interaction::decode(&inner(CONTENT_DRAW_1, &body)) {
            Err(WireError::UnexpectedLength { expected: 15, got: 17, raw, .. }) => assert_eq!(raw, body),
            other => panic!("expected length error, got {other:?}"),
        }
        assert!(matches!(
            Interaction::decode(&inner(CONTENT_DELETE_GRAPHIC, &[0x01, 0x02, 0x03])),
            Err(WireError::UnexpectedLength { expected: 2, got: 3, .. })
        ));
        let character = [0u8; CharacterDescriptor::LEN + 1];
        assert!(matches!(
            Interaction::decode(&inner(CONTENT_DRAW_CHARACTER, &character)),
            Err(WireError::UnexpectedLength { expected: 45, got: 46, .. })
        ));
    }

    #[test]
    fn decoded_records_re_encode_exactly() {
        let mut text = [0u8; CharacterDescriptor::LEN];
        text[..15].copy_from_slice(&line(3).encode().unwrap());
        text[15..20].copy_from_slice(&[0xB0, 0xA1, 0x00, 0x41, 0x00]);
        let draw: Vec<u8> = (0..2).flat_map(|i| line(i).encode().unwrap()).collect();

        for (id, body) in [
            (CONTENT_DRAW_CHARACTER, text.to_vec()),
            (CONTENT_DRAW_2, draw),
            (CONTENT_DELETE_GRAPHIC, vec![0x07, 0x09]),
        ] {
            let frame = inner(id, &body);
            let interaction = Interaction::decode(&frame).unwrap();
            assert_eq!(interaction.to_record().unwrap().encode(), frame.data, "content 0x{id:04X}");
        }
    }

    #[test]
    fn mismatched_draw_count_not_encoded() {
        let graphics = Interaction::Graphics {
            header: InteractiveHeader::new(CONTENT_DRAW_5, 1, 2),
            count: DrawCount::Five,
            graphics: vec![line(0)],
        };
        assert!(matches!(graphics.to_record(), Err(WireError::InvalidDrawCount { count: 1 })));
    }

    #[test]
    fn delete_dispatch() {
        let interaction = Interaction::decode(&inner(CONTENT_DELETE_GRAPHIC, &[0x02, 0x00])).unwrap();
        let mut recorder = Recorder::default();
        assert_eq!(interaction.render(&mut recorder), 1);
        assert_eq!(recorder.deletes[0].operation, DeleteOperation::All);
    }

    #[test]
    fn character_dispatch() {
        let character =
            CharacterDescriptor::new(GraphicDescriptor { shape: Shape::Character, ..line(2) }, "AMMO 120");
        let body = character.encode().unwrap();
        let interaction = Interaction::decode(&inner(CONTENT_DRAW_CHARACTER, &body)).unwrap();
        let mut recorder = Recorder::default();
        interaction.render(&mut recorder);
        assert_eq!(recorder.characters, vec![character]);
    }

    #[test]
    fn unknown_content_id() {
        assert!(matches!(
            Interaction::decode(&inner(0x0999, &[])),
            Err(WireError::UnknownContentId { id: 0x0999 })
        ));
    }

    #[test]
    fn unknown_command_id() {
        let mut frame = inner(CONTENT_DRAW_1, &line(0).encode().unwrap());
        frame.command_id = 0x0301;
        assert!(matches!(
            Interaction::decode(&frame),
            Err(WireError::UnknownCommandId { id: 0x0301 })
        ));
    }

    #[test]
    fn builders_encode_losslessly() {
        let built = Interaction::draw(1, 0x0101, vec![line(1), line(2)]).unwrap();
        assert_eq!(built.header().content_id, CONTENT_DRAW_2);
        let record = built.to_record().unwrap();
        let frame = InnerFrame { seq: 0, command_id: CMD_ROBOT_INTERACTION, data: record.encode() };
        assert_eq!(Interaction::decode(&frame).unwrap(), built);

        let delete = Interaction::delete_layer(1, 2, DeleteLayer { operation: DeleteOperation::Layer, layer: 4 });
        assert_eq!(delete.to_record().unwrap().encode(), vec![0x00, 0x01, 0x01, 0x00, 0x02, 0x00, 0x01, 0x04]);

        assert!(matches!(
            Interaction::draw(1, 2, vec![line(0); 3]),
            Err(WireError::InvalidDrawCount { count: 3 })
        ));
    }

    proptest! {
        #[test]
        fn chatter_never_reaches_decoders(id in 0x0200u16..=0x02FF, body in proptest::collection::vec(any::<u8>(), 0..64)) {
            let frame = inner(id, &body);
            let interaction = Interaction::decode(&frame).unwrap();
            prop_assert_eq!(interaction.kind(), "team_chatter");
            prop_assert_eq!(interaction.header().content_id, CONTENT_TEAM_CHATTER);
            prop_assert_eq!(interaction.to_record().unwrap().encode(), frame.data);

            let mut recorder = Recorder::default();
            prop_assert_eq!(interaction.render(&mut recorder), 0);
        }
    }
}
