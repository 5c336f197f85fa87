use std::io::{Read, Write};

use crate::{
    byte_order::{Endianness, WriteExt},
    capture::{CaptureError, Malformed, TimestampResolution, TruncatedAt},
    link_type::LinkType,
    utils::read_up_to,
};

/// Size of the global header in bytes
pub const GLOBAL_HEADER_LEN: usize = 24;

/// The byte order and timestamp resolution announced by the first four bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Magic {
    pub resolution: TimestampResolution,
    pub endianness: Endianness,
}
impl Magic {
    pub fn to_bytes(self) -> [u8; 4] {
        let value = match self.resolution {
            TimestampResolution::Microsecond => 0xa1b2_c3d4,
            TimestampResolution::Nanosecond => 0xa1b2_3c4d,
        };
        self.endianness.u32_to_bytes(value)
    }
}

impl TryFrom<[u8; 4]> for Magic {
    type Error = Malformed;

    fn try_from(value: [u8; 4]) -> Result<Self, Self::Error> {
        let (resolution, endianness) = match value {
            [0xa1, 0xb2, 0xc3, 0xd4] => (TimestampResolution::Microsecond, Endianness::BigEndian),
            [0xd4, 0xc3, 0xb2, 0xa1] => {
                (TimestampResolution::Microsecond, Endianness::LittleEndian)
            }
            [0xa1, 0xb2, 0x3c, 0x4d] => (TimestampResolution::Nanosecond, Endianness::BigEndian),
            [0x4d, 0x3c, 0xb2, 0xa1] => (TimestampResolution::Nanosecond, Endianness::LittleEndian),
            _ => return Err(Malformed::InvalidMagicNumber(value)),
        };
        Ok(Self {
            resolution,
            endianness,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}
impl Default for Version {
    fn default() -> Self {
        Self { major: 2, minor: 4 }
    }
}

/// The 24 byte header at the start of every capture file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHeader {
    /// 0..4
    pub magic: Magic,
    /// 4..8
    pub version: Version,
    /// 8..12, offset from UTC in seconds. Always 0 in practice
    pub timezone: i32,
    /// 12..16, timestamp accuracy
    pub sig_figs: u32,
    /// 16..20
    pub snap_length: u32,
    /// 20..24
    pub link_type: LinkType,
}
impl Default for GlobalHeader {
    fn default() -> Self {
        Self {
            magic: Magic::default(),
            version: Version::default(),
            timezone: 0,
            sig_figs: 0,
            snap_length: 65535,
            link_type: LinkType::Ethernet,
        }
    }
}

impl GlobalHeader {
    pub fn endianness(&self) -> Endianness {
        self.magic.endianness
    }
    /// Reads the global header from the reader
    ///
    /// The magic number is checked before the length so that a short file
    /// with the wrong magic is reported as malformed rather than truncated.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, CaptureError> {
        Self::read_with_prefix(reader, &[])
    }
    /// Reads the header when its first bytes were already taken from `reader`
    pub(crate) fn read_with_prefix<R: Read>(
        reader: &mut R,
        prefix: &[u8],
    ) -> Result<Self, CaptureError> {
        let mut header = [0u8; GLOBAL_HEADER_LEN];
        let split = prefix.len().min(GLOBAL_HEADER_LEN);
        header[..split].copy_from_slice(&prefix[..split]);
        let got = split + read_up_to(reader, &mut header[split..])?;
        Self::parse_read(&header, got)
    }
    /// Parses a header buffer of which only the first `got` bytes were filled
    pub(crate) fn parse_read(
        header: &[u8; GLOBAL_HEADER_LEN],
        got: usize,
    ) -> Result<Self, CaptureError> {
        if got >= 4 {
            Magic::try_from([header[0], header[1], header[2], header[3]])?;
        }
        if got < GLOBAL_HEADER_LEN {
            return Err(CaptureError::Truncated {
                context: TruncatedAt::GlobalHeader,
                expected: GLOBAL_HEADER_LEN,
                got,
            });
        }
        Ok(Self::try_from(header)?)
    }
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        let endianness = self.endianness();
        writer.write_all(&self.magic.to_bytes())?;
        writer.write_u16(self.version.major, endianness)?;
        writer.write_u16(self.version.minor, endianness)?;
        writer.write_u32(self.timezone as u32, endianness)?;
        writer.write_u32(self.sig_figs, endianness)?;
        writer.write_u32(self.snap_length, endianness)?;
        writer.write_u32(u32::from(self.link_type), endianness)?;
        Ok(())
    }
}
impl TryFrom<&[u8; GLOBAL_HEADER_LEN]> for GlobalHeader {
    type Error = Malformed;

    fn try_from(bytes: &[u8; GLOBAL_HEADER_LEN]) -> Result<Self, Self::Error> {
        let magic = Magic::try_from([bytes[0], bytes[1], bytes[2], bytes[3]])?;
        let endianness = magic.endianness;
        let version = Version {
            major: endianness.try_u16_from_bytes(&bytes[4..6])?,
            minor: endianness.try_u16_from_bytes(&bytes[6..8])?,
        };
        let timezone = endianness.try_u32_from_bytes(&bytes[8..12])? as i32;
        let sig_figs = endianness.try_u32_from_bytes(&bytes[12..16])?;
        let snap_length = endianness.try_u32_from_bytes(&bytes[16..20])?;
        let link_type = LinkType::from(endianness.try_u32_from_bytes(&bytes[20..24])?);
        Ok(Self {
            magic,
            version,
            timezone,
            sig_figs,
            snap_length,
            link_type,
        })
    }
}
