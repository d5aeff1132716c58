//! CRC8 / CRC16 over byte ranges.
//!
//! Both checksums are shared with the peer firmware and must stay
//! bit-identical:
//!
//! - CRC8: Dallas/Maxim polynomial 0x31 (reflected 0x8C), init 0xFF, no final XOR.
//! - CRC16: CCITT polynomial 0x1021 (reflected 0x8408), init 0xFFFF, no final XOR.
//!
//! The CRC16 is stored little-endian.

const CRC8_INIT: u8 = 0xFF;
const CRC16_INIT: u16 = 0xFFFF;

const CRC8_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0x8C } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

const CRC16_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0x8408 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// 8-bit checksum over `data`.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(CRC8_INIT, |crc, &b| CRC8_TABLE[(crc ^ b) as usize])
}

/// 16-bit checksum over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(CRC16_INIT, |crc, &b| {
        (crc >> 8) ^ CRC16_TABLE[((crc ^ b as u16) & 0xFF) as usize]
    })
}

/// Check `data[..len]` against the CRC8 byte stored at `data[len]`.
///
/// Returns false if the checksum byte is missing.
pub fn verify_crc8(data: &[u8], len: usize) -> bool {
    match data.get(len) {
        Some(&stored) => crc8(&data[..len]) == stored,
        None => false,
    }
}

/// Check `data[..len]` against the little-endian CRC16 stored at
/// `data[len..len + 2]`.
///
/// Returns false if the checksum bytes are missing.
pub fn verify_crc16(data: &[u8], len: usize) -> bool {
    let stored = len.checked_add(2).and_then(|end| data.get(len..end));
    match stored {
        Some(stored) => crc16(&data[..len]) == u16::from_le_bytes([stored[0], stored[1]]),
        None => false,
    }
}

/// Append the CRC8 of everything currently in `buf`.
pub fn append_crc8(buf: &mut Vec<u8>) {
    let crc = crc8(buf);
    buf.push(crc);
}

/// Append the little-endian CRC16 of everything currently in `buf`.
pub fn append_crc16(buf: &mut Vec<u8>) {
    let crc = crc16(buf);
    buf.extend_from_slice(&crc.to_le_bytes());
}
