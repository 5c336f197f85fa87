//! Byte order handling for the capture container and for protocol headers
//!
//! The container is written in the byte order of the recording host, which is
//! announced by the magic number. Protocol headers are always network order.

use std::io::Write;

use thiserror::Error;

/// Byte order of the multi-byte fields in a capture file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Little-endian byte order
    #[default]
    LittleEndian,
    /// Big-endian byte order
    BigEndian,
}

impl Endianness {
    pub fn u16_from_bytes(self, bytes: [u8; 2]) -> u16 {
        match self {
            Endianness::BigEndian => u16::from_be_bytes(bytes),
            Endianness::LittleEndian => u16::from_le_bytes(bytes),
        }
    }
    pub fn u16_to_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Endianness::BigEndian => value.to_be_bytes(),
            Endianness::LittleEndian => value.to_le_bytes(),
        }
    }
    pub fn u32_from_bytes(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endianness::BigEndian => u32::from_be_bytes(bytes),
            Endianness::LittleEndian => u32::from_le_bytes(bytes),
        }
    }
    pub fn u32_to_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Endianness::BigEndian => value.to_be_bytes(),
            Endianness::LittleEndian => value.to_le_bytes(),
        }
    }
    pub fn u64_from_bytes(self, bytes: [u8; 8]) -> u64 {
        match self {
            Endianness::BigEndian => u64::from_be_bytes(bytes),
            Endianness::LittleEndian => u64::from_le_bytes(bytes),
        }
    }
    /// Byte order announced by the byte-order magic of a pcapng section header
    pub fn from_pcap_ng_bytes(bytes: [u8; 4]) -> Option<Self> {
        match bytes {
            [0x1a, 0x2b, 0x3c, 0x4d] => Some(Endianness::BigEndian),
            [0x4d, 0x3c, 0x2b, 0x1a] => Some(Endianness::LittleEndian),
            _ => None,
        }
    }
    /// Converts a byte slice to a u16
    pub(crate) fn try_u16_from_bytes(self, bytes: &[u8]) -> Result<u16, UnexpectedSize> {
        let array: [u8; 2] = bytes.try_into().map_err(|_| UnexpectedSize {
            name: "u16",
            expected: 2,
            got: bytes.len(),
        })?;
        Ok(self.u16_from_bytes(array))
    }
    /// Converts a byte slice to a u32
    pub(crate) fn try_u32_from_bytes(self, bytes: &[u8]) -> Result<u32, UnexpectedSize> {
        let array: [u8; 4] = bytes.try_into().map_err(|_| UnexpectedSize {
            name: "u32",
            expected: 4,
            got: bytes.len(),
        })?;
        Ok(self.u32_from_bytes(array))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unexpected Size for {name}: expected {expected}, got {got}")]
pub struct UnexpectedSize {
    pub name: &'static str,
    pub expected: usize,
    pub got: usize,
}

/// Reads a network order u16 at `offset`
///
/// Returns `None` when the slice is too short
#[inline]
pub(crate) fn be_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let field = bytes.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([field[0], field[1]]))
}

/// Reads a network order u32 at `offset`
#[inline]
pub(crate) fn be_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let field = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
}

pub trait WriteExt {
    /// Writes a u16 in the given byte order
    fn write_u16(&mut self, value: u16, byte_order: Endianness) -> Result<(), std::io::Error>;

    fn write_u32(&mut self, value: u32, byte_order: Endianness) -> Result<(), std::io::Error>;
}
impl<W: Write> WriteExt for W {
    fn write_u16(&mut self, value: u16, byte_order: Endianness) -> Result<(), std::io::Error> {
        self.write_all(&byte_order.u16_to_bytes(value))
    }
    fn write_u32(&mut self, value: u32, byte_order: Endianness) -> Result<(), std::io::Error> {
        self.write_all(&byte_order.u32_to_bytes(value))
    }
}
