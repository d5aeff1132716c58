//! Graphic and character descriptors (bit-packed overlay primitives).
//!
//! A graphic descriptor is 15 bytes: a 3-byte name followed by three 32-bit
//! little-endian words of bit fields.
//!
//! ```text
//! byte 3  : operation:3 type:3 layer:4 color:4 start_angle:9 end_angle:9
//! byte 7  : width:10 start_x:11 end_x:11
//! byte 11 : radius:10 start_y:11 end_y:11
//! ```
//!
//! A character descriptor is a graphic descriptor followed by a 30-byte,
//! NUL-padded text field.

use crate::codec;
use crate::error::{Result, WireError};

/// (byte offset, bit offset, width) of each packed field.
type Field = (usize, usize, u32);

const OPERATION: Field = (3, 0, 3);
const SHAPE: Field = (3, 3, 3);
const LAYER: Field = (3, 6, 4);
const COLOR: Field = (3, 10, 4);
const START_ANGLE: Field = (3, 14, 9);
const END_ANGLE: Field = (3, 23, 9);
const WIDTH: Field = (7, 0, 10);
const START_X: Field = (7, 10, 11);
const END_X: Field = (7, 21, 11);
const RADIUS: Field = (11, 0, 10);
const START_Y: Field = (11, 10, 11);
const END_Y: Field = (11, 21, 11);

fn get(buf: &[u8], (byte, bit, width): Field) -> Result<u32> {
    codec::get_bits(buf, byte, bit, width)
}

fn set(buf: &mut [u8], (byte, bit, width): Field, value: u32) -> Result<()> {
    codec::set_bits(value, buf, byte, bit, width)
}

/// What the renderer should do with the named graphic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Operation {
    None,
    Add,
    Modify,
    Delete,
    /// Bit pattern outside the defined set, kept for re-encoding.
    Unknown(u8),
}

impl Operation {
    pub fn from_bits(b: u8) -> Self {
        match b {
            0 => Self::None,
            1 => Self::Add,
            2 => Self::Modify,
            3 => Self::Delete,
            other => Self::Unknown(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Add => 1,
            Self::Modify => 2,
            Self::Delete => 3,
            Self::Unknown(b) => b,
        }
    }
}

/// Primitive type. The 3-bit field has exactly eight values, all defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Shape {
    Line,
    Rectangle,
    Circle,
    Ellipse,
    Arc,
    /// Floating-point readout
    Float,
    /// Integer readout
    Integer,
    /// Text, body carried by a character descriptor
    Character,
}

impl Shape {
    pub fn from_bits(b: u8) -> Self {
        match b & 0x07 {
            0 => Self::Line,
            1 => Self::Rectangle,
            2 => Self::Circle,
            3 => Self::Ellipse,
            4 => Self::Arc,
            5 => Self::Float,
            6 => Self::Integer,
            _ => Self::Character,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Nine-entry palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Color {
    /// The sender's own team colour (red or blue).
    Team,
    Yellow,
    Green,
    Orange,
    Amaranth,
    Pink,
    Cyan,
    Black,
    White,
    Unknown(u8),
}

impl Color {
    pub fn from_bits(b: u8) -> Self {
        match b {
            0 => Self::Team,
            1 => Self::Yellow,
            2 => Self::Green,
            3 => Self::Orange,
            4 => Self::Amaranth,
            5 => Self::Pink,
            6 => Self::Cyan,
            7 => Self::Black,
            8 => Self::White,
            other => Self::Unknown(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Team => 0,
            Self::Yellow => 1,
            Self::Green => 2,
            Self::Orange => 3,
            Self::Amaranth => 4,
            Self::Pink => 5,
            Self::Cyan => 6,
            Self::Black => 7,
            Self::White => 8,
            Self::Unknown(b) => b,
        }
    }
}

/// One drawable primitive (15 bytes).
///
/// Numeric fields hold whatever fits their bit width; wider values are
/// truncated on encode.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GraphicDescriptor {
    /// Three raw name bytes, the key for modify/delete
    pub name: [u8; 3],
    pub operation: Operation,
    pub shape: Shape,
    /// Layer 0-9
    pub layer: u8,
    pub color: Color,
    /// Arc start angle (deg), or font size for readouts
    pub start_angle: u16,
    /// Arc end angle (deg), or decimal places for floats
    pub end_angle: u16,
    /// Line width (px)
    pub width: u16,
    pub start_x: u16,
    pub end_x: u16,
    /// Circle radius, or font size for characters
    pub radius: u16,
    pub start_y: u16,
    pub end_y: u16,
}

impl GraphicDescriptor {
    pub const LEN: usize = 15;

    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::LEN {
            return Err(WireError::payload_too_short("GraphicDescriptor", Self::LEN, body.len()));
        }
        Ok(Self {
            name: [body[0], body[1], body[2]],
            operation: Operation::from_bits(get(body, OPERATION)? as u8),
            shape: Shape::from_bits(get(body, SHAPE)? as u8),
            layer: get(body, LAYER)? as u8,
            color: Color::from_bits(get(body, COLOR)? as u8),
            start_angle: get(body, START_ANGLE)? as u16,
            end_angle: get(body, END_ANGLE)? as u16,
            width: get(body, WIDTH)? as u16,
            start_x: get(body, START_X)? as u16,
            end_x: get(body, END_X)? as u16,
            radius: get(body, RADIUS)? as u16,
            start_y: get(body, START_Y)? as u16,
            end_y: get(body, END_Y)? as u16,
        })
    }

    /// Decode `count` descriptors packed back-to-back at 15-byte strides.
    pub fn decode_many(body: &[u8], count: usize) -> Result<Vec<Self>> {
        let need = count * Self::LEN;
        if body.len() < need {
            return Err(WireError::payload_too_short("GraphicDescriptor array", need, body.len()));
        }
        body.chunks_exact(Self::LEN)
            .take(count)
            .map(Self::decode)
            .collect()
    }

    pub fn encode(&self) -> Result<[u8; Self::LEN]> {
        let mut buf = [0u8; Self::LEN];
        codec::set_bytes(&self.name, &mut buf, 0)?;
        set(&mut buf, OPERATION, self.operation.bits().into())?;
        set(&mut buf, SHAPE, self.shape.bits().into())?;
        set(&mut buf, LAYER, self.layer.into())?;
        set(&mut buf, COLOR, self.color.bits().into())?;
        set(&mut buf, START_ANGLE, self.start_angle.into())?;
        set(&mut buf, END_ANGLE, self.end_angle.into())?;
        set(&mut buf, WIDTH, self.width.into())?;
        set(&mut buf, START_X, self.start_x.into())?;
        set(&mut buf, END_X, self.end_x.into())?;
        set(&mut buf, RADIUS, self.radius.into())?;
        set(&mut buf, START_Y, self.start_y.into())?;
        set(&mut buf, END_Y, self.end_y.into())?;
        Ok(buf)
    }

    /// Name bytes as text, for logs.
    pub fn name_lossy(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(3);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// Size of the text field in a character descriptor.
pub const TEXT_LEN: usize = 30;

/// A text overlay: graphic descriptor plus a 30-byte text field.
///
/// The text bytes are kept exactly as received, padding included, so a
/// decoded record re-encodes unchanged whatever encoding the sender used.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CharacterDescriptor {
    pub graphic: GraphicDescriptor,
    pub text: [u8; TEXT_LEN],
}

impl CharacterDescriptor {
    pub const TEXT_LEN: usize = TEXT_LEN;
    pub const LEN: usize = GraphicDescriptor::LEN + TEXT_LEN;

    /// Build from a string, NUL-padded, or cut at the last whole character
    /// that fits in 30 bytes.
    pub fn new(graphic: GraphicDescriptor, text: &str) -> Self {
        let mut field = [0u8; TEXT_LEN];
        let text = truncate_utf8(text, TEXT_LEN);
        field[..text.len()].copy_from_slice(text.as_bytes());
        Self { graphic, text: field }
    }

    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::LEN {
            return Err(WireError::payload_too_short("CharacterDescriptor", Self::LEN, body.len()));
        }
        let mut text = [0u8; TEXT_LEN];
        text.copy_from_slice(&codec::get_bytes(body, GraphicDescriptor::LEN, TEXT_LEN)?);
        Ok(Self {
            graphic: GraphicDescriptor::decode(body)?,
            text,
        })
    }

    pub fn encode(&self) -> Result<[u8; Self::LEN]> {
        let mut buf = [0u8; Self::LEN];
        buf[..GraphicDescriptor::LEN].copy_from_slice(&self.graphic.encode()?);
        codec::set_bytes(&self.text, &mut buf, GraphicDescriptor::LEN)?;
        Ok(buf)
    }

    /// Text up to the first NUL, invalid UTF-8 replaced.
    pub fn text_lossy(&self) -> String {
        let end = self.text.iter().position(|&b| b == 0).unwrap_or(TEXT_LEN);
        String::from_utf8_lossy(&self.text[..end]).into_owned()
    }
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
