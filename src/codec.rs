//! Field codecs for the interaction protocol.
//!
//! Multi-byte integers are little-endian. Bit fields are numbered LSB-first
//! across little-endian bytes, the layout a C compiler produces for
//! bit-field structs on the peer firmware: bit `n` of a field starting at
//! `(byte_offset, bit_offset)` lives in byte `byte_offset + (bit_offset + n) / 8`
//! at position `(bit_offset + n) % 8`.

use crate::error::{Result, WireError};

// ---------------------------------------------------------------------------
// Bit fields
// ---------------------------------------------------------------------------

/// Read a `bit_width`-bit unsigned field starting `bit_offset` bits past
/// `byte_offset`. The field may span up to five bytes.
pub fn get_bits(buf: &[u8], byte_offset: usize, bit_offset: usize, bit_width: u32) -> Result<u32> {
    check_width(bit_width)?;
    let (first, shift, span) = locate(byte_offset, bit_offset, bit_width);
    check_len(buf, first, span, "bit field")?;

    let word = load_le(&buf[first..first + span]);
    Ok(((word >> shift) & mask(bit_width)) as u32)
}

/// Write `value` into a `bit_width`-bit field starting `bit_offset` bits past
/// `byte_offset`. Bits outside the field are left untouched.
///
/// Values wider than the field are truncated to their low `bit_width` bits.
pub fn set_bits(
    value: u32,
    buf: &mut [u8],
    byte_offset: usize,
    bit_offset: usize,
    bit_width: u32,
) -> Result<()> {
    check_width(bit_width)?;
    let (first, shift, span) = locate(byte_offset, bit_offset, bit_width);
    check_len(buf, first, span, "bit field")?;

    let field_mask = mask(bit_width) << shift;
    let mut word = load_le(&buf[first..first + span]);
    word = (word & !field_mask) | ((u64::from(value) << shift) & field_mask);
    for (i, byte) in buf[first..first + span].iter_mut().enumerate() {
        *byte = (word >> (8 * i)) as u8;
    }
    Ok(())
}

/// Copy `len` whole bytes starting at `offset`.
pub fn get_bytes(buf: &[u8], offset: usize, len: usize) -> Result<Vec<u8>> {
    check_len(buf, offset, len, "byte range")?;
    Ok(buf[offset..offset + len].to_vec())
}

/// Copy `src` into `buf` starting at `offset`.
pub fn set_bytes(src: &[u8], buf: &mut [u8], offset: usize) -> Result<()> {
    check_len(buf, offset, src.len(), "byte range")?;
    buf[offset..offset + src.len()].copy_from_slice(src);
    Ok(())
}

// ---------------------------------------------------------------------------
// Whole integers
// ---------------------------------------------------------------------------

/// Read a little-endian unsigned 16-bit integer.
pub fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    check_len(data, offset, 2, "UINT16")?;
    Ok(u16::from_le_bytes([data[offset], data[offset + 1]]))
}

/// Write a little-endian unsigned 16-bit integer.
pub fn write_u16(buf: &mut Vec<u8>, val: u16) {
    buf.extend_from_slice(&val.to_le_bytes());
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

/// Returns (first byte index, shift within that byte, bytes touched).
fn locate(byte_offset: usize, bit_offset: usize, bit_width: u32) -> (usize, usize, usize) {
    let start = byte_offset * 8 + bit_offset;
    let shift = start % 8;
    let span = (shift + bit_width as usize).div_ceil(8);
    (start / 8, shift, span)
}

fn load_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i)))
}

fn mask(bit_width: u32) -> u64 {
    (1u64 << bit_width) - 1
}

fn check_width(bit_width: u32) -> Result<()> {
    if (1..=32).contains(&bit_width) {
        Ok(())
    } else {
        Err(WireError::InvalidBitWidth { width: bit_width })
    }
}

fn check_len(data: &[u8], offset: usize, need: usize, what: &'static str) -> Result<()> {
    if data.len() < offset + need {
        Err(WireError::payload_too_short(what, offset + need, data.len()))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
