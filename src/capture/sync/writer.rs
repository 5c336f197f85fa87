use std::io::{self, Seek, Write};

use log::debug;

use crate::capture::{
    FrameRecord, Timestamp, file_header::GlobalHeader, record_header::RecordHeader,
};

/// A Sync Capture Writer
///
/// ## Why is Seek Required?
///
/// If you write a frame larger than the snap_length then the global header has to be rewritten
pub struct CaptureWriter<W: Write + Seek> {
    target: W,
    header: GlobalHeader,
    /// If a written frame size exceeds snap_length then this will flip to true
    requires_header_rewrite: bool,
}

impl<W: Write + Seek> CaptureWriter<W> {
    pub fn new(mut target: W, header: GlobalHeader) -> Result<Self, io::Error> {
        header.write(&mut target)?;
        Ok(Self {
            target,
            header,
            requires_header_rewrite: false,
        })
    }
    pub fn global_header(&self) -> &GlobalHeader {
        &self.header
    }

    /// Writes a frame that was seen on the wire with `original_length` bytes
    ///
    /// The timestamp is converted to the resolution of the file.
    pub fn write_packet(
        &mut self,
        timestamp: Timestamp,
        content: &[u8],
        original_length: Option<u32>,
    ) -> Result<(), io::Error> {
        let captured_length = u32::try_from(content.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame is too large"))?;
        let record_header = RecordHeader {
            ts_sec: timestamp.seconds,
            ts_frac: timestamp.fraction_in(self.header.magic.resolution),
            captured_length,
            original_length: original_length.unwrap_or(captured_length).max(captured_length),
        };
        if record_header.captured_length > self.header.snap_length {
            debug!(
                "Frame of {captured_length} bytes exceeds snap length {}, header will be rewritten",
                self.header.snap_length
            );
            self.requires_header_rewrite = true;
            self.header.snap_length = record_header.captured_length;
        }

        record_header.write(&mut self.target, self.header.endianness())?;
        self.target.write_all(content)?;
        Ok(())
    }
    pub fn write_frame(&mut self, frame: &FrameRecord) -> Result<(), io::Error> {
        self.write_packet(frame.timestamp, &frame.data, Some(frame.original_length))
    }

    /// Flushes the target, rewriting the global header if needed, and hands it back
    pub fn finish(mut self) -> Result<W, io::Error> {
        if self.requires_header_rewrite {
            self.target.seek(io::SeekFrom::Start(0))?;
            self.header.write(&mut self.target)?;
            self.target.seek(io::SeekFrom::End(0))?;
        }
        self.target.flush()?;
        Ok(self.target)
    }
}
