use std::io::Write;

use crate::{
    byte_order::{Endianness, WriteExt},
    capture::{Malformed, file_header::GlobalHeader},
};

/// Size of a record header in bytes
pub const RECORD_HEADER_LEN: usize = 16;
/// Captured lengths up to this size are accepted even if the snap length is smaller
///
/// Matches the largest snap length libpcap hands out.
pub const MAX_SNAP_LENGTH: u32 = 262_144;

/// The 16 byte header in front of each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordHeader {
    pub ts_sec: u32,
    /// Micro- or nanoseconds depending on the magic number
    pub ts_frac: u32,
    /// The length of the packet data included in the file
    pub captured_length: u32,
    /// The original length of the packet data
    pub original_length: u32,
}
impl RecordHeader {
    #[inline(always)]
    pub fn parse_bytes(bytes: &[u8; RECORD_HEADER_LEN], endianness: Endianness) -> Self {
        let field = |at: usize| {
            endianness.u32_from_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Self {
            ts_sec: field(0),
            ts_frac: field(4),
            captured_length: field(8),
            original_length: field(12),
        }
    }
    /// Checks the lengths against each other and against the global header
    ///
    /// `frame` is the 1-based position of the record, only used in the error
    pub fn validate(&self, global: &GlobalHeader, frame: u64) -> Result<usize, Malformed> {
        if self.captured_length > self.original_length {
            return Err(Malformed::LengthMismatch {
                frame,
                captured_length: self.captured_length,
                original_length: self.original_length,
            });
        }
        let limit = global.snap_length.max(MAX_SNAP_LENGTH);
        if self.captured_length > limit {
            return Err(Malformed::OversizedRecord {
                frame,
                captured_length: self.captured_length,
                limit,
            });
        }
        Ok(self.captured_length as usize)
    }
    pub fn write<W: Write>(
        &self,
        writer: &mut W,
        endianness: Endianness,
    ) -> Result<(), std::io::Error> {
        writer.write_u32(self.ts_sec, endianness)?;
        writer.write_u32(self.ts_frac, endianness)?;
        writer.write_u32(self.captured_length, endianness)?;
        writer.write_u32(self.original_length, endianness)?;
        Ok(())
    }
}
