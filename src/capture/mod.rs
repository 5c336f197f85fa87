//! Reading and writing capture files in the libpcap and pcapng formats
//!
//! Sources
//! - [Wireshark Wiki - File Format](https://wiki.wireshark.org/Development/LibpcapFileFormat)
//! - [PCAP Next Generation Dump File Format](https://www.ietf.org/archive/id/draft-tuexen-opsawg-pcapng-03.html)
mod any_reader;
pub mod file_header;
pub mod pcapng;
pub mod record_header;
mod sync;
pub use any_reader::{AnyCaptureReader, CaptureFormat};
pub use pcapng::{PcapNgReader, PcapNgWriter};
pub use sync::*;
#[cfg(feature = "tokio-async")]
mod tokio_impl;
#[cfg(feature = "tokio-async")]
pub use tokio_impl::AsyncCaptureReader;

use std::{
    fmt,
    fs::File,
    io::{BufReader, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;

use crate::{byte_order::UnexpectedSize, link_type::LinkType, utils::saturating_length};
use file_header::GlobalHeader;

/// Which part of the container ran past the end of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncatedAt {
    GlobalHeader,
    RecordHeader { frame: u64 },
    RecordPayload { frame: u64 },
    /// A pcapng block, counted from 1 with the first section header
    Block { block: u64 },
}
impl fmt::Display for TruncatedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TruncatedAt::GlobalHeader => f.write_str("global header"),
            TruncatedAt::RecordHeader { frame } => write!(f, "record header of frame {frame}"),
            TruncatedAt::RecordPayload { frame } => write!(f, "payload of frame {frame}"),
            TruncatedAt::Block { block } => write!(f, "pcapng block {block}"),
        }
    }
}

/// Reasons a capture container is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("invalid magic number {0:02x?}")]
    InvalidMagicNumber([u8; 4]),
    #[error("invalid pcapng byte-order magic {0:02x?}")]
    InvalidByteOrderMagic([u8; 4]),
    #[error("pcapng block {block} of type {block_type:#x} has an invalid length of {length} bytes")]
    InvalidBlockLength {
        block: u64,
        block_type: u32,
        length: u32,
    },
    #[error("pcapng block {block} starts with length {length} but ends with {trailer}")]
    BlockLengthMismatch { block: u64, length: u32, trailer: u32 },
    #[error("frame {frame}: captured length {captured_length} runs past the end of its block")]
    PacketOverrunsBlock { frame: u64, captured_length: u32 },
    #[error("frame {frame}: no interface with id {interface_id} in this section")]
    UnknownInterface { frame: u64, interface_id: u32 },
    #[error(
        "frame {frame}: captured length {captured_length} is greater than original length {original_length}"
    )]
    LengthMismatch {
        frame: u64,
        captured_length: u32,
        original_length: u32,
    },
    #[error("frame {frame}: captured length {captured_length} exceeds the limit of {limit} bytes")]
    OversizedRecord {
        frame: u64,
        captured_length: u32,
        limit: u32,
    },
    #[error(transparent)]
    UnexpectedSize(#[from] UnexpectedSize),
}

/// Errors that can occur when reading or writing capture files
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("File {} does not exist.", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },
    #[error("malformed capture: {0}")]
    Malformed(#[from] Malformed),
    #[error("truncated capture: {context} needs {expected} bytes but only {got} remain")]
    Truncated {
        context: TruncatedAt,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// Resolution of the fractional part of a timestamp, chosen by the magic number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampResolution {
    #[default]
    Microsecond,
    Nanosecond,
}
impl TimestampResolution {
    /// Number of fractional units in one second
    pub fn units_per_second(self) -> u32 {
        match self {
            TimestampResolution::Microsecond => 1_000_000,
            TimestampResolution::Nanosecond => 1_000_000_000,
        }
    }
}

/// Time a frame was captured, relative to the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub seconds: u32,
    /// Micro- or nanoseconds, see `resolution`
    pub fraction: u32,
    pub resolution: TimestampResolution,
}
impl Timestamp {
    pub fn new(seconds: u32, fraction: u32, resolution: TimestampResolution) -> Self {
        Self {
            seconds,
            fraction,
            resolution,
        }
    }
    /// Fractional part in nanoseconds
    pub fn subsec_nanos(&self) -> u64 {
        match self.resolution {
            TimestampResolution::Microsecond => u64::from(self.fraction) * 1_000,
            TimestampResolution::Nanosecond => u64::from(self.fraction),
        }
    }
    /// Fractional part expressed in another resolution
    pub fn fraction_in(&self, resolution: TimestampResolution) -> u32 {
        match (self.resolution, resolution) {
            (TimestampResolution::Microsecond, TimestampResolution::Nanosecond) => {
                self.fraction.saturating_mul(1_000)
            }
            (TimestampResolution::Nanosecond, TimestampResolution::Microsecond) => {
                self.fraction / 1_000
            }
            _ => self.fraction,
        }
    }
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.seconds)) + Duration::from_nanos(self.subsec_nanos())
    }
    #[cfg(feature = "chrono")]
    pub fn to_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let duration = self.as_duration();
        chrono::DateTime::from_timestamp(duration.as_secs() as i64, duration.subsec_nanos())
    }
}

/// One captured frame as stored in the container
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameRecord {
    pub timestamp: Timestamp,
    /// Number of bytes stored in the file for this frame
    pub captured_length: u32,
    /// Length of the frame on the wire
    pub original_length: u32,
    /// Link layer `data` starts with. One per libpcap file, one per
    /// interface in pcapng
    pub link_type: LinkType,
    pub data: Vec<u8>,
}
impl FrameRecord {
    /// A record of an Ethernet frame
    ///
    /// The captured length saturates at `u32::MAX` for data that long.
    pub fn new(timestamp: Timestamp, data: Vec<u8>, original_length: Option<u32>) -> Self {
        let captured_length = saturating_length(data.len());
        Self {
            timestamp,
            captured_length,
            original_length: original_length.unwrap_or(captured_length).max(captured_length),
            link_type: LinkType::default(),
            data,
        }
    }
    /// A record holding `data` with a zero timestamp, as if captured in full
    pub fn from_data(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Timestamp::default(), data.into(), None)
    }
    pub fn with_link_type(mut self, link_type: LinkType) -> Self {
        self.link_type = link_type;
        self
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A fully read capture file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFile {
    header: GlobalHeader,
    frames: Vec<FrameRecord>,
}
impl CaptureFile {
    /// Reads every record of the capture at `path`
    ///
    /// Any truncation fails the whole read, use [CaptureReader::open] to keep
    /// the frames before a damaged record.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let reader = CaptureReader::open(path)?;
        Self::from_capture_reader(reader)
    }
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, CaptureError> {
        Self::from_capture_reader(CaptureReader::new(reader)?)
    }
    fn from_capture_reader<R: std::io::Read>(
        reader: CaptureReader<R>,
    ) -> Result<Self, CaptureError> {
        let header = *reader.global_header();
        let frames = reader.collect::<Result<Vec<_>, _>>()?;
        Ok(Self { header, frames })
    }
    pub fn global_header(&self) -> &GlobalHeader {
        &self.header
    }
    pub fn link_type(&self) -> LinkType {
        self.header.link_type
    }
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }
    pub fn len(&self) -> usize {
        self.frames.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
    pub fn into_frames(self) -> Vec<FrameRecord> {
        self.frames
    }
}
impl<'a> IntoIterator for &'a CaptureFile {
    type Item = &'a FrameRecord;
    type IntoIter = std::slice::Iter<'a, FrameRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Opens `path` as a regular file
///
/// A missing or unreadable path, or one that is not a regular file, is
/// [CaptureError::NotFound]. Other failures stay [CaptureError::IO].
pub(crate) fn open_file(path: &Path) -> Result<BufReader<File>, CaptureError> {
    let classify = |err: std::io::Error| match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => CaptureError::NotFound {
            path: path.to_path_buf(),
            source: Some(err),
        },
        _ => CaptureError::IO(err),
    };
    let metadata = std::fs::metadata(path).map_err(classify)?;
    if !metadata.is_file() {
        return Err(CaptureError::NotFound {
            path: path.to_path_buf(),
            source: None,
        });
    }
    let file = File::open(path).map_err(classify)?;
    Ok(BufReader::new(file))
}
