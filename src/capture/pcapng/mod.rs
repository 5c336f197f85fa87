//! Reading pcapng capture files
//!
//! Only the blocks that carry packets, and the two that describe how to read
//! them, are interpreted. Name resolution, statistics and custom blocks are
//! skipped.
//!
//! [Source](https://www.ietf.org/archive/id/draft-tuexen-opsawg-pcapng-03.html)
pub mod blocks;
mod writer;
pub use writer::PcapNgWriter;

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use log::{debug, trace, warn};

use crate::{
    capture::{
        CaptureError, FrameRecord, Malformed, Timestamp, TimestampResolution, TruncatedAt,
        open_file,
    },
    utils::{read_up_to, saturating_length},
};
use blocks::{
    EnhancedPacket, InterfaceDescription, RawBlock, SectionHeader, SimplePacket, block_type,
    read_block,
};

/// Block type of section headers, the first four bytes of every pcapng file
///
/// It reads the same in both byte orders.
pub const PCAP_NG_MAGIC: [u8; 4] = [0x0A, 0x0D, 0x0D, 0x0A];

/// Converts a timestamp in `if_tsresol` units to seconds and a fraction
///
/// Resolutions of microseconds or coarser keep microseconds, finer ones are
/// reduced to nanoseconds.
pub fn timestamp_from_units(units: u64, ts_resolution: u8) -> Timestamp {
    let exponent = u32::from(ts_resolution & 0x7f);
    let binary = ts_resolution & 0x80 != 0;
    let per_second: u128 = if binary {
        1 << exponent
    } else {
        10u128.pow(exponent.min(38))
    };
    let units = u128::from(units);
    let seconds = u32::try_from(units / per_second).unwrap_or(u32::MAX);
    let remainder = units % per_second;
    let (fraction, resolution) = if !binary && exponent <= 6 {
        (
            remainder * 10u128.pow(6 - exponent),
            TimestampResolution::Microsecond,
        )
    } else {
        (
            remainder * 1_000_000_000 / per_second,
            TimestampResolution::Nanosecond,
        )
    };
    Timestamp::new(seconds, fraction as u32, resolution)
}

/// A streaming reader for pcapng files
///
/// Yields the packets of every section in file order. After the first error
/// the reader is finished and yields nothing else.
#[derive(Debug)]
pub struct PcapNgReader<R: Read> {
    reader: R,
    section: SectionHeader,
    /// Interfaces of the current section, indexed by interface id
    interfaces: Vec<InterfaceDescription>,
    blocks_read: u64,
    frames_read: u64,
    finished: bool,
}
impl PcapNgReader<BufReader<File>> {
    /// Opens the pcapng file at `path` and reads its first section header
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let reader = open_file(path)?;
        debug!("Opened pcapng capture {}", path.display());
        Self::new(reader)
    }
}
impl<R: Read> PcapNgReader<R> {
    pub fn new(mut reader: R) -> Result<Self, CaptureError> {
        let mut type_bytes = [0u8; 4];
        let got = read_up_to(&mut reader, &mut type_bytes)?;
        if got < 4 {
            return Err(CaptureError::Truncated {
                context: TruncatedAt::Block { block: 1 },
                expected: blocks::minimum_length(block_type::SECTION_HEADER) as usize,
                got,
            });
        }
        if type_bytes != PCAP_NG_MAGIC {
            return Err(Malformed::InvalidMagicNumber(type_bytes).into());
        }
        Self::after_magic(reader)
    }
    /// Continues after the block type of the first section header
    pub(crate) fn after_magic(mut reader: R) -> Result<Self, CaptureError> {
        let block = read_block(&mut reader, PCAP_NG_MAGIC, Default::default(), 1)?;
        let section = SectionHeader::parse(&block)?;
        debug!(
            "pcapng section: version {}.{}, {:?}",
            section.version.major, section.version.minor, section.endianness
        );
        Ok(Self {
            reader,
            section,
            interfaces: Vec::with_capacity(1),
            blocks_read: 1,
            frames_read: 0,
            finished: false,
        })
    }
    /// The section the next block belongs to
    pub fn section(&self) -> &SectionHeader {
        &self.section
    }
    /// Interfaces described so far in the current section
    pub fn interfaces(&self) -> &[InterfaceDescription] {
        &self.interfaces
    }
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
    /// Reads blocks until the next packet
    ///
    /// Returns `Ok(None)` once the input ends on a block boundary
    pub fn next_frame(&mut self) -> Result<Option<FrameRecord>, CaptureError> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_frame();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }
    fn read_frame(&mut self) -> Result<Option<FrameRecord>, CaptureError> {
        loop {
            let block = self.blocks_read + 1;
            let mut type_bytes = [0u8; 4];
            let got = read_up_to(&mut self.reader, &mut type_bytes)?;
            if got == 0 {
                debug!(
                    "End of pcapng capture after {} blocks, {} frames",
                    self.blocks_read, self.frames_read
                );
                return Ok(None);
            }
            if got < 4 {
                warn!("Header of pcapng block {block} is cut off after {got} bytes");
                return Err(CaptureError::Truncated {
                    context: TruncatedAt::Block { block },
                    expected: blocks::minimum_length(0) as usize,
                    got,
                });
            }
            let raw = read_block(&mut self.reader, type_bytes, self.section.endianness, block)?;
            self.blocks_read = block;
            match raw.block_type {
                block_type::SECTION_HEADER => {
                    self.section = SectionHeader::parse(&raw)?;
                    self.interfaces.clear();
                    debug!("New pcapng section at block {block}, {:?}", self.section.endianness);
                }
                block_type::INTERFACE_DESCRIPTION => {
                    let interface = InterfaceDescription::parse(&raw)?;
                    debug!(
                        "Interface {} ({}): {:?}, snap length {}",
                        self.interfaces.len(),
                        interface.name.as_deref().unwrap_or("unnamed"),
                        interface.link_type,
                        interface.snap_length
                    );
                    self.interfaces.push(interface);
                }
                block_type::ENHANCED_PACKET => return self.enhanced_packet(&raw).map(Some),
                block_type::SIMPLE_PACKET => return self.simple_packet(&raw).map(Some),
                other => trace!("Skipping pcapng block {block} of type {other:#x}"),
            }
        }
    }
    fn interface(&self, interface_id: u32, frame: u64) -> Result<&InterfaceDescription, Malformed> {
        self.interfaces
            .get(interface_id as usize)
            .ok_or(Malformed::UnknownInterface {
                frame,
                interface_id,
            })
            .inspect_err(|err| warn!("Rejecting packet: {err}"))
    }
    fn enhanced_packet(&mut self, raw: &RawBlock) -> Result<FrameRecord, CaptureError> {
        let frame = self.frames_read + 1;
        let packet = EnhancedPacket::parse(raw, frame)
            .inspect_err(|err| warn!("Rejecting packet: {err}"))?;
        let interface = self.interface(packet.interface_id, frame)?;
        if packet.captured_length > packet.original_length {
            let err = Malformed::LengthMismatch {
                frame,
                captured_length: packet.captured_length,
                original_length: packet.original_length,
            };
            warn!("Rejecting packet: {err}");
            return Err(err.into());
        }
        let record = FrameRecord {
            timestamp: timestamp_from_units(packet.timestamp_units(), interface.ts_resolution),
            captured_length: packet.captured_length,
            original_length: packet.original_length,
            link_type: interface.link_type,
            data: packet.content.to_vec(),
        };
        self.frames_read = frame;
        trace!(
            "Frame {frame} on interface {}: {} of {} bytes captured",
            packet.interface_id, record.captured_length, record.original_length
        );
        Ok(record)
    }
    fn simple_packet(&mut self, raw: &RawBlock) -> Result<FrameRecord, CaptureError> {
        let frame = self.frames_read + 1;
        let packet = SimplePacket::parse(raw)?;
        let interface = self.interface(0, frame)?;
        let data = packet.captured(interface.snap_length).to_vec();
        let record = FrameRecord {
            timestamp: Timestamp::default(),
            captured_length: saturating_length(data.len()),
            original_length: packet.original_length,
            link_type: interface.link_type,
            data,
        };
        self.frames_read = frame;
        trace!(
            "Frame {frame}: simple packet, {} of {} bytes captured",
            record.captured_length, record.original_length
        );
        Ok(record)
    }
}
impl<R: Read> Iterator for PcapNgReader<R> {
    type Item = Result<FrameRecord, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
