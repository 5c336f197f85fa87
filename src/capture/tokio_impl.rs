//! Asynchronous reader for capture files
use futures::Stream;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    capture::{
        CaptureError, FrameRecord, Timestamp, TruncatedAt,
        file_header::{GLOBAL_HEADER_LEN, GlobalHeader},
        record_header::{MAX_SNAP_LENGTH, RECORD_HEADER_LEN, RecordHeader},
    },
    link_type::LinkType,
};

/// Async counterpart of [crate::capture::CaptureReader]
#[derive(Debug)]
pub struct AsyncCaptureReader<R: AsyncRead + Unpin> {
    reader: R,
    /// Buffer for record headers
    header_buffer: [u8; RECORD_HEADER_LEN],
    global_header: GlobalHeader,
    frames_read: u64,
    finished: bool,
}

async fn read_up_to<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

impl<R: AsyncRead + Unpin> AsyncCaptureReader<R> {
    /// Creates a new `AsyncCaptureReader` from a reader
    /// Returns `Ok(Self)` on success, or `Err` if there was an error
    /// reading the global header
    pub async fn new(mut reader: R) -> Result<Self, CaptureError> {
        let mut header = [0u8; GLOBAL_HEADER_LEN];
        let got = read_up_to(&mut reader, &mut header).await?;
        let global_header = GlobalHeader::parse_read(&header, got)?;
        debug!("Capture header: {global_header:?}");
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
    /// Reads the next record from the capture file
    /// Returns `Ok(None)` if there are no more records to read
    /// Returns `Err` if there was an error reading the record
    pub async fn next_frame(&mut self) -> Result<Option<FrameRecord>, CaptureError> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_frame().await;
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }
    async fn read_frame(&mut self) -> Result<Option<FrameRecord>, CaptureError> {
        let frame = self.frames_read + 1;
        let got = read_up_to(&mut self.reader, &mut self.header_buffer).await?;
        if got == 0 {
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
        (&mut self.reader)
            .take(length as u64)
            .read_to_end(&mut data)
            .await?;
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
    /// Turns the reader into a stream of records
    pub fn into_stream(self) -> impl Stream<Item = Result<FrameRecord, CaptureError>> {
        futures::stream::try_unfold(self, |mut reader| async move {
            Ok::<_, CaptureError>(reader.next_frame().await?.map(|frame| (frame, reader)))
        })
    }
}
