//! Synchronous capture reader and writer
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use log::{debug, trace, warn};
pub mod writer;
pub use writer::CaptureWriter;

use crate::{
    capture::{
        CaptureError, FrameRecord, Timestamp, TruncatedAt,
        file_header::GlobalHeader,
        open_file,
        record_header::{MAX_SNAP_LENGTH, RECORD_HEADER_LEN, RecordHeader},
    },
    link_type::LinkType,
    utils::read_up_to,
};

/// A streaming reader for capture files
///
/// Records are handed out one at a time in on-disk order. After the first
/// error the reader is finished and yields nothing else.
#[derive(Debug)]
pub struct CaptureReader<R: Read> {
    reader: R,
    header_buffer: [u8; RECORD_HEADER_LEN],
    global_header: GlobalHeader,
    frames_read: u64,
    finished: bool,
}
impl CaptureReader<BufReader<File>> {
    /// Opens the capture at `path` and reads its global header
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let reader = open_file(path)?;
        debug!("Opened capture {}", path.display());
        Self::new(reader)
    }
}
impl<R: Read> CaptureReader<R> {
    /// Creates a new `CaptureReader` from a reader
    /// Returns `Ok(Self)` on success, or `Err` if there was an error
    /// reading the global header
    pub fn new(reader: R) -> Result<Self, CaptureError> {
        Self::with_prefix(reader, &[])
    }
    /// Continues after the first bytes of the global header were consumed
    pub(crate) fn with_prefix(mut reader: R, prefix: &[u8]) -> Result<Self, CaptureError> {
        let global_header = GlobalHeader::read_with_prefix(&mut reader, prefix)?;
        debug!(
            "Capture header: version {}.{}, {:?}, snap length {}, link type {:?}",
            global_header.version.major,
            global_header.version.minor,
            global_header.magic,
            global_header.snap_length,
            global_header.link_type
        );
        Ok(Self {
            reader,
            header_buffer: [0; RECORD_HEADER_LEN],
            global_header,
            frames_read: 0,
            finished: false,
        })
    }
    /// Returns the global header of the capture file
    pub fn global_header(&self) -> &GlobalHeader {
        &self.global_header
    }
    pub fn link_type(&self) -> LinkType {
        self.global_header.link_type
    }
    /// Number of records successfully read so far
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
    /// Reads the next record
    ///
    /// Returns `Ok(None)` once the input ends on a record boundary
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
        let frame = self.frames_read + 1;
        let got = read_up_to(&mut self.reader, &mut self.header_buffer)?;
        if got == 0 {
            debug!("End of capture after {} frames", self.frames_read);
            return Ok(None);
        }
        if got < RECORD_HEADER_LEN {
            warn!("Record header of frame {frame} is cut off after {got} bytes");
            return Err(CaptureError::Truncated {
                context: TruncatedAt::RecordHeader { frame },
                expected: RECORD_HEADER_LEN,
                got,
            });
        }
        let header = RecordHeader::parse_bytes(&self.header_buffer, self.global_header.endianness());
        let length = header
            .validate(&self.global_header, frame)
            .inspect_err(|err| warn!("Rejecting record: {err}"))?;

        let mut data = Vec::with_capacity(length.min(MAX_SNAP_LENGTH as usize));
        self.reader
            .by_ref()
            .take(length as u64)
            .read_to_end(&mut data)?;
        if data.len() < length {
            warn!(
                "Payload of frame {frame} is cut off: {} of {length} bytes",
                data.len()
            );
            return Err(CaptureError::Truncated {
                context: TruncatedAt::RecordPayload { frame },
                expected: length,
                got: data.len(),
            });
        }
        self.frames_read = frame;
        trace!(
            "Frame {frame}: {} of {} bytes captured",
            header.captured_length, header.original_length
        );
        Ok(Some(FrameRecord {
            timestamp: Timestamp::new(
                header.ts_sec,
                header.ts_frac,
                self.global_header.magic.resolution,
            ),
            captured_length: header.captured_length,
            original_length: header.original_length,
            link_type: self.global_header.link_type,
            data,
        }))
    }
}
impl<R: Read> Iterator for CaptureReader<R> {
    type Item = Result<FrameRecord, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        byte_order::Endianness,
        capture::{
            CaptureFile, Malformed, TimestampResolution,
            file_header::{GLOBAL_HEADER_LEN, Magic},
        },
        test_helpers::{capture_bytes, logged_warnings},
    };

    fn sample_frames() -> Vec<FrameRecord> {
        (0..5u8)
            .map(|i| {
                FrameRecord::new(
                    Timestamp::new(1_700_000_000 + u32::from(i), 10 * u32::from(i), Default::default()),
                    vec![i; 14 + usize::from(i)],
                    Some(1500),
                )
            })
            .collect()
    }

    #[test]
    fn read_packets_in_order() -> anyhow::Result<()> {
        let frames = sample_frames();
        let bytes = capture_bytes(GlobalHeader::default(), &frames);
        let mut reader = CaptureReader::new(bytes.as_slice())?;
        let mut read = Vec::new();
        while let Some(frame) = reader.next_frame()? {
            read.push(frame);
        }
        assert_eq!(read, frames);
        assert_eq!(reader.frames_read(), 5);
        Ok(())
    }

    #[test]
    fn read_big_endian_nanosecond_capture() -> anyhow::Result<()> {
        let header = GlobalHeader {
            magic: Magic {
                resolution: TimestampResolution::Nanosecond,
                endianness: Endianness::BigEndian,
            },
            ..Default::default()
        };
        let frame = FrameRecord::new(
            Timestamp::new(42, 123_456_789, TimestampResolution::Nanosecond),
            vec![0xab; 60],
            None,
        );
        let bytes = capture_bytes(header, std::slice::from_ref(&frame));
        let capture = CaptureFile::from_reader(bytes.as_slice())?;
        assert_eq!(capture.global_header().endianness(), Endianness::BigEndian);
        assert_eq!(capture.frames(), &[frame]);
        Ok(())
    }

    #[test]
    fn empty_capture_has_no_frames() -> anyhow::Result<()> {
        let bytes = capture_bytes(GlobalHeader::default(), &[]);
        assert_eq!(bytes.len(), GLOBAL_HEADER_LEN);
        let capture = CaptureFile::from_reader(bytes.as_slice())?;
        assert!(capture.is_empty());
        Ok(())
    }

    #[test]
    fn truncated_payload_keeps_earlier_frames() {
        let frames = sample_frames();
        let mut bytes = capture_bytes(GlobalHeader::default(), &frames);
        bytes.truncate(bytes.len() - 3);

        let mut reader = CaptureReader::new(bytes.as_slice()).unwrap();
        for expected in &frames[..4] {
            assert_eq!(&reader.next().unwrap().unwrap(), expected);
        }
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Truncated {
                context: TruncatedAt::RecordPayload { frame: 5 },
                expected: 18,
                got: 15,
            }
        ));
        // The reader is finished after the first error
        assert!(reader.next().is_none());
    }

    #[test]
    fn truncated_record_header() {
        let frames = sample_frames();
        let mut bytes = capture_bytes(GlobalHeader::default(), &frames[..1]);
        bytes.extend_from_slice(&[0u8; 7]);
        let err = CaptureFile::from_reader(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Truncated {
                context: TruncatedAt::RecordHeader { frame: 2 },
                expected: 16,
                got: 7,
            }
        ));
    }

    #[test]
    fn bad_magic_is_malformed() {
        let mut bytes = capture_bytes(GlobalHeader::default(), &sample_frames());
        bytes[..4].copy_from_slice(&[0xca, 0xfe, 0xba, 0xbe]);
        let err = CaptureReader::new(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Malformed(Malformed::InvalidMagicNumber([0xca, 0xfe, 0xba, 0xbe]))
        ));
    }

    #[test]
    fn captured_longer_than_original_is_malformed() {
        logged_warnings();
        let mut bytes = capture_bytes(GlobalHeader::default(), &sample_frames()[..1]);
        // orig_len of the first record, little endian
        bytes[GLOBAL_HEADER_LEN + 12..GLOBAL_HEADER_LEN + 16].copy_from_slice(&5u32.to_le_bytes());
        let err = CaptureFile::from_reader(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Malformed(Malformed::LengthMismatch { frame: 1, .. })
        ));
        assert!(
            logged_warnings()
                .iter()
                .any(|warning| warning == "Rejecting record: frame 1: captured length 14 is greater than original length 5")
        );
    }
}
