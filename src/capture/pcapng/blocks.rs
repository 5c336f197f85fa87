//! Block types of pcapng files
use std::io::Read;

use log::warn;

use crate::{
    byte_order::Endianness,
    capture::{
        CaptureError, Malformed, TruncatedAt, file_header::Version, pcapng::PCAP_NG_MAGIC,
    },
    link_type::LinkType,
    utils::read_up_to,
};

/// Block type and total length in front of every block
pub const BLOCK_HEADER_LEN: usize = 8;
/// Largest block accepted, keeps a corrupt length from allocating gigabytes
pub const MAX_BLOCK_LENGTH: u32 = 16 * 1024 * 1024;
/// Block types this crate reads, anything else is skipped
pub mod block_type {
    pub const SECTION_HEADER: u32 = 0x0A0D_0D0A;
    pub const INTERFACE_DESCRIPTION: u32 = 1;
    pub const SIMPLE_PACKET: u32 = 3;
    pub const NAME_RESOLUTION: u32 = 4;
    pub const INTERFACE_STATISTICS: u32 = 5;
    pub const ENHANCED_PACKET: u32 = 6;
}
/// Option codes of the Interface Description Block
pub mod interface_option {
    pub const IF_NAME: u16 = 2;
    pub const IF_TSRESOL: u16 = 9;
}
const END_OF_OPTIONS: u16 = 0;

/// Rounds a length up to the 32 bit boundary every field is padded to
#[inline]
pub(crate) fn pad_to_32_bits(length: usize) -> usize {
    length.div_ceil(4) * 4
}

/// Smallest total length, header and trailer included, of a block type
pub(crate) fn minimum_length(block_type: u32) -> u32 {
    match block_type {
        block_type::SECTION_HEADER => 28,
        block_type::INTERFACE_DESCRIPTION => 20,
        block_type::ENHANCED_PACKET => 32,
        block_type::SIMPLE_PACKET => 16,
        _ => 12,
    }
}

/// A block with its header and trailer stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawBlock {
    pub block_type: u32,
    pub endianness: Endianness,
    pub body: Vec<u8>,
}
impl RawBlock {
    fn u16_at(&self, offset: usize) -> Result<u16, Malformed> {
        let field = self.body.get(offset..offset + 2).unwrap_or_default();
        Ok(self.endianness.try_u16_from_bytes(field)?)
    }
    fn u32_at(&self, offset: usize) -> Result<u32, Malformed> {
        let field = self.body.get(offset..offset + 4).unwrap_or_default();
        Ok(self.endianness.try_u32_from_bytes(field)?)
    }
}

/// Reads the rest of a block whose type field was already taken from `reader`
///
/// A section header announces its own byte order, every other block is read
/// in `endianness`. `block` is the 1-based position, only used in errors.
pub(crate) fn read_block<R: Read>(
    reader: &mut R,
    type_bytes: [u8; 4],
    endianness: Endianness,
    block: u64,
) -> Result<RawBlock, CaptureError> {
    let truncated = |expected: usize, got: usize| {
        warn!("pcapng block {block} is cut off after {got} of {expected} bytes");
        CaptureError::Truncated {
            context: TruncatedAt::Block { block },
            expected,
            got,
        }
    };
    let mut length_bytes = [0u8; 4];
    let got = read_up_to(reader, &mut length_bytes)?;
    if got < 4 {
        return Err(truncated(BLOCK_HEADER_LEN, 4 + got));
    }
    let mut body = Vec::new();
    let endianness = if type_bytes == PCAP_NG_MAGIC {
        let mut magic = [0u8; 4];
        let got = read_up_to(reader, &mut magic)?;
        if got < 4 {
            let minimum = minimum_length(block_type::SECTION_HEADER) as usize;
            return Err(truncated(minimum, BLOCK_HEADER_LEN + got));
        }
        body.extend_from_slice(&magic);
        Endianness::from_pcap_ng_bytes(magic).ok_or(Malformed::InvalidByteOrderMagic(magic))?
    } else {
        endianness
    };
    let block_type = endianness.u32_from_bytes(type_bytes);
    let length = endianness.u32_from_bytes(length_bytes);
    if length < minimum_length(block_type) || length % 4 != 0 || length > MAX_BLOCK_LENGTH {
        return Err(Malformed::InvalidBlockLength {
            block,
            block_type,
            length,
        }
        .into());
    }

    let remaining = length as usize - BLOCK_HEADER_LEN - body.len();
    reader
        .by_ref()
        .take(remaining as u64)
        .read_to_end(&mut body)?;
    if BLOCK_HEADER_LEN + body.len() < length as usize {
        return Err(truncated(length as usize, BLOCK_HEADER_LEN + body.len()));
    }
    let trailer = body.split_off(body.len() - 4);
    let trailer = endianness.u32_from_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if trailer != length {
        return Err(Malformed::BlockLengthMismatch {
            block,
            length,
            trailer,
        }
        .into());
    }
    Ok(RawBlock {
        block_type,
        endianness,
        body,
    })
}

/// Walks the `code, length, value` options at the end of a block body
#[derive(Debug, Clone)]
pub(crate) struct BlockOptions<'b> {
    bytes: &'b [u8],
    endianness: Endianness,
}
impl<'b> BlockOptions<'b> {
    pub fn new(bytes: &'b [u8], endianness: Endianness) -> Self {
        Self { bytes, endianness }
    }
}
impl<'b> Iterator for BlockOptions<'b> {
    type Item = (u16, &'b [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.bytes.get(..4)?;
        let code = self.endianness.u16_from_bytes([header[0], header[1]]);
        let length = usize::from(self.endianness.u16_from_bytes([header[2], header[3]]));
        if code == END_OF_OPTIONS {
            self.bytes = &[];
            return None;
        }
        let Some(value) = self.bytes.get(4..4 + length) else {
            warn!("Option {code} claims {length} bytes but the block ends first");
            self.bytes = &[];
            return None;
        };
        self.bytes = self.bytes.get(4 + pad_to_32_bits(length)..).unwrap_or_default();
        Some((code, value))
    }
}

/// Starts a section, resetting the interfaces and the byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub endianness: Endianness,
    pub version: Version,
    /// `None` when the section length is not given (-1)
    pub section_length: Option<u64>,
}
impl SectionHeader {
    pub(crate) fn parse(block: &RawBlock) -> Result<Self, Malformed> {
        let section_length: [u8; 8] = block
            .body
            .get(8..16)
            .and_then(|bytes| bytes.try_into().ok())
            .unwrap_or([0xFF; 8]);
        Ok(Self {
            endianness: block.endianness,
            version: Version {
                major: block.u16_at(4)?,
                minor: block.u16_at(6)?,
            },
            section_length: (section_length != [0xFF; 8])
                .then(|| block.endianness.u64_from_bytes(section_length)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescription {
    pub link_type: LinkType,
    /// 0 means no limit
    pub snap_length: u32,
    /// `if_tsresol`: the low seven bits are the exponent, the high bit picks
    /// base 2 over base 10. Defaults to 6, microseconds
    pub ts_resolution: u8,
    pub name: Option<String>,
}
impl InterfaceDescription {
    pub const DEFAULT_TS_RESOLUTION: u8 = 6;

    pub(crate) fn parse(block: &RawBlock) -> Result<Self, Malformed> {
        let link_type = LinkType::from(u32::from(block.u16_at(0)?));
        let snap_length = block.u32_at(4)?;
        let mut interface = Self {
            link_type,
            snap_length,
            ts_resolution: Self::DEFAULT_TS_RESOLUTION,
            name: None,
        };
        let options = block.body.get(8..).unwrap_or_default();
        for (code, value) in BlockOptions::new(options, block.endianness) {
            match (code, value) {
                (interface_option::IF_TSRESOL, [resolution, ..]) => {
                    interface.ts_resolution = *resolution
                }
                (interface_option::IF_NAME, name) => {
                    interface.name = Some(String::from_utf8_lossy(name).into_owned())
                }
                _ => {}
            }
        }
        Ok(interface)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedPacket<'b> {
    // 0..4
    pub interface_id: u32,
    // 4..8
    pub timestamp_high: u32,
    // 8..12
    pub timestamp_low: u32,
    // 12..16
    pub captured_length: u32,
    // 16..20
    pub original_length: u32,
    pub content: &'b [u8],
}
impl<'b> EnhancedPacket<'b> {
    const CONTENT_OFFSET: usize = 20;

    pub(crate) fn parse(block: &'b RawBlock, frame: u64) -> Result<Self, Malformed> {
        let captured_length = block.u32_at(12)?;
        let end = Self::CONTENT_OFFSET + captured_length as usize;
        let content = block
            .body
            .get(Self::CONTENT_OFFSET..end)
            .ok_or(Malformed::PacketOverrunsBlock {
                frame,
                captured_length,
            })?;
        Ok(Self {
            interface_id: block.u32_at(0)?,
            timestamp_high: block.u32_at(4)?,
            timestamp_low: block.u32_at(8)?,
            captured_length,
            original_length: block.u32_at(16)?,
            content,
        })
    }
    /// Timestamp in units of the interface's `if_tsresol`
    pub fn timestamp_units(&self) -> u64 {
        (u64::from(self.timestamp_high) << 32) | u64::from(self.timestamp_low)
    }
}

/// A packet without interface id or timestamp, always from interface 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplePacket<'b> {
    pub original_length: u32,
    /// The stored bytes including the padding, cut to the captured length by
    /// the reader
    pub content: &'b [u8],
}
impl<'b> SimplePacket<'b> {
    pub(crate) fn parse(block: &'b RawBlock) -> Result<Self, Malformed> {
        Ok(Self {
            original_length: block.u32_at(0)?,
            content: block.body.get(4..).unwrap_or_default(),
        })
    }
    /// Bytes actually captured: the original length bounded by the snap
    /// length of the interface and by the block
    pub fn captured(&self, snap_length: u32) -> &'b [u8] {
        let mut length = self.original_length as usize;
        if snap_length != 0 {
            length = length.min(snap_length as usize);
        }
        &self.content[..length.min(self.content.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A little endian section header with one `shb_userappl` option
    const SECTION: [u8; 40] = [
        0x0a, 0x0d, 0x0d, 0x0a, 40, 0, 0, 0, // type, length
        0x4d, 0x3c, 0x2b, 0x1a, 1, 0, 0, 0, // byte order, 1.0
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // no section length
        4, 0, 3, 0, b'p', b'k', b't', 0, // shb_userappl "pkt"
        0, 0, 0, 0, 40, 0, 0, 0, // opt_endofopt, length
    ];

    fn read(bytes: &[u8], endianness: Endianness) -> Result<RawBlock, CaptureError> {
        let mut reader = bytes;
        let mut type_bytes = [0u8; 4];
        reader.read_exact(&mut type_bytes)?;
        read_block(&mut reader, type_bytes, endianness, 1)
    }

    #[test]
    fn section_header_sets_byte_order() -> anyhow::Result<()> {
        // The reader's byte order is ignored for section headers
        let block = read(&SECTION, Endianness::BigEndian)?;
        assert_eq!(block.block_type, block_type::SECTION_HEADER);
        assert_eq!(block.endianness, Endianness::LittleEndian);
        assert_eq!(block.body.len(), 40 - 12);
        let section = SectionHeader::parse(&block)?;
        assert_eq!(section.version, Version { major: 1, minor: 0 });
        assert_eq!(section.section_length, None);
        Ok(())
    }

    #[test]
    fn bad_byte_order_magic() {
        let mut bytes = SECTION;
        bytes[8..12].copy_from_slice(&[1, 2, 3, 4]);
        let err = read(&bytes, Endianness::LittleEndian).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Malformed(Malformed::InvalidByteOrderMagic([1, 2, 3, 4]))
        ));
    }

    #[test]
    fn trailer_must_repeat_the_length() {
        let mut bytes = SECTION;
        bytes[36] = 44;
        let err = read(&bytes, Endianness::LittleEndian).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Malformed(Malformed::BlockLengthMismatch {
                length: 40,
                trailer: 44,
                ..
            })
        ));
    }

    #[test]
    fn lengths_below_minimum_or_unaligned_are_rejected() {
        for length in [8u8, 24, 41] {
            let mut bytes = SECTION;
            bytes[4] = length;
            let err = read(&bytes, Endianness::LittleEndian).unwrap_err();
            assert!(
                matches!(
                    err,
                    CaptureError::Malformed(Malformed::InvalidBlockLength { block_type: block_type::SECTION_HEADER, .. })
                ),
                "{length}: {err:?}"
            );
        }
    }

    #[test]
    fn cut_off_block_is_truncated() {
        let err = read(&SECTION[..30], Endianness::LittleEndian).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Truncated {
                context: TruncatedAt::Block { block: 1 },
                expected: 40,
                got: 30,
            }
        ));
    }

    #[test]
    fn interface_options() -> anyhow::Result<()> {
        let bytes = [
            0, 0, 0, 1, 0, 0, 0, 36, // type, length
            0, 101, 0, 0, 0, 0, 0xff, 0xff, // raw ip, snap length 65535
            0, 2, 0, 4, b'e', b't', b'h', b'0', // if_name
            0, 9, 0, 1, 0x89, 0, 0, 0, // if_tsresol 2^-9
            0, 0, 0, 36, // no opt_endofopt, straight to the trailer
        ];
        let block = read(&bytes, Endianness::BigEndian)?;
        let interface = InterfaceDescription::parse(&block)?;
        assert_eq!(interface.link_type, LinkType::Raw);
        assert_eq!(interface.snap_length, 65535);
        assert_eq!(interface.ts_resolution, 0x89);
        assert_eq!(interface.name.as_deref(), Some("eth0"));
        Ok(())
    }

    #[test]
    fn options_stop_at_a_cut_off_value() {
        let bytes = [2u8, 0, 10, 0, b'e', b't'];
        let mut options = BlockOptions::new(&bytes, Endianness::LittleEndian);
        assert_eq!(options.next(), None);
        assert_eq!(options.next(), None);
    }

    #[test]
    fn enhanced_packet_content_must_fit() {
        let block = RawBlock {
            block_type: block_type::ENHANCED_PACKET,
            endianness: Endianness::LittleEndian,
            body: [0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 5, 0, 0, 0, 5, 0, 0, 0, 9, 9, 9, 9]
                .to_vec(),
        };
        let err = EnhancedPacket::parse(&block, 3).unwrap_err();
        assert_eq!(
            err,
            Malformed::PacketOverrunsBlock {
                frame: 3,
                captured_length: 5
            }
        );
    }

    #[test]
    fn simple_packet_is_cut_to_snap_length() -> anyhow::Result<()> {
        let block = RawBlock {
            block_type: block_type::SIMPLE_PACKET,
            endianness: Endianness::BigEndian,
            body: [0, 0, 0, 6, 1, 2, 3, 4, 5, 6, 0, 0].to_vec(),
        };
        let packet = SimplePacket::parse(&block)?;
        assert_eq!(packet.captured(0), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(packet.captured(4), &[1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn padding() {
        assert_eq!(pad_to_32_bits(0), 0);
        assert_eq!(pad_to_32_bits(1), 4);
        assert_eq!(pad_to_32_bits(4), 4);
        assert_eq!(pad_to_32_bits(54), 56);
    }
}
