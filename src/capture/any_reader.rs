use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use log::debug;

use crate::{
    capture::{
        CaptureError, CaptureReader, FrameRecord, open_file,
        pcapng::{PCAP_NG_MAGIC, PcapNgReader},
    },
    utils::read_up_to,
};

/// Container format of a capture file, told apart by its first four bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Pcap,
    PcapNg,
}

#[derive(Debug)]
enum AnyCaptureReaderInner<R: Read> {
    Pcap(CaptureReader<R>),
    PcapNg(PcapNgReader<R>),
}

/// A reader for both libpcap and pcapng files
///
/// Every [FrameRecord] carries the link type it was captured with, so frames
/// from pcapng interfaces of different link types decode correctly.
///
/// Anything that does not start with the pcapng section header is read as
/// libpcap, so a bad magic number is reported the same way it is by
/// [CaptureReader].
#[derive(Debug)]
pub struct AnyCaptureReader<R: Read> {
    inner: AnyCaptureReaderInner<R>,
}
impl AnyCaptureReader<BufReader<File>> {
    /// Opens the capture at `path`, reading its global or first section header
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let reader = open_file(path)?;
        let reader = Self::new(reader)?;
        debug!("Opened {:?} capture {}", reader.format(), path.display());
        Ok(reader)
    }
}
impl<R: Read> AnyCaptureReader<R> {
    pub fn new(mut reader: R) -> Result<Self, CaptureError> {
        let mut magic = [0u8; 4];
        let got = read_up_to(&mut reader, &mut magic)?;
        let inner = if got == 4 && magic == PCAP_NG_MAGIC {
            AnyCaptureReaderInner::PcapNg(PcapNgReader::after_magic(reader)?)
        } else {
            AnyCaptureReaderInner::Pcap(CaptureReader::with_prefix(reader, &magic[..got])?)
        };
        Ok(Self { inner })
    }
    pub fn format(&self) -> CaptureFormat {
        match &self.inner {
            AnyCaptureReaderInner::Pcap(_) => CaptureFormat::Pcap,
            AnyCaptureReaderInner::PcapNg(_) => CaptureFormat::PcapNg,
        }
    }
    pub fn frames_read(&self) -> u64 {
        match &self.inner {
            AnyCaptureReaderInner::Pcap(reader) => reader.frames_read(),
            AnyCaptureReaderInner::PcapNg(reader) => reader.frames_read(),
        }
    }
    /// Reads the next frame
    ///
    /// Returns `Ok(None)` at the end of input. The reader is finished after
    /// the first error.
    pub fn next_frame(&mut self) -> Result<Option<FrameRecord>, CaptureError> {
        match &mut self.inner {
            AnyCaptureReaderInner::Pcap(reader) => reader.next_frame(),
            AnyCaptureReaderInner::PcapNg(reader) => reader.next_frame(),
        }
    }
}
impl<R: Read> Iterator for AnyCaptureReader<R> {
    type Item = Result<FrameRecord, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
impl<R: Read> From<CaptureReader<R>> for AnyCaptureReader<R> {
    fn from(reader: CaptureReader<R>) -> Self {
        Self {
            inner: AnyCaptureReaderInner::Pcap(reader),
        }
    }
}
impl<R: Read> From<PcapNgReader<R>> for AnyCaptureReader<R> {
    fn from(reader: PcapNgReader<R>) -> Self {
        Self {
            inner: AnyCaptureReaderInner::PcapNg(reader),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{
        byte_order::Endianness,
        capture::{Malformed, PcapNgWriter, TruncatedAt, file_header::GlobalHeader},
        link_type::LinkType,
        test_helpers::{capture_bytes, tcp_syn_frame, udp_frame},
    };

    #[test]
    fn reads_libpcap() -> anyhow::Result<()> {
        let frames = vec![
            FrameRecord::from_data(tcp_syn_frame()),
            FrameRecord::from_data(udp_frame()),
        ];
        let header = GlobalHeader {
            link_type: LinkType::Ethernet,
            ..Default::default()
        };
        let bytes = capture_bytes(header, &frames);
        let reader = AnyCaptureReader::new(bytes.as_slice())?;
        assert_eq!(reader.format(), CaptureFormat::Pcap);
        assert_eq!(reader.collect::<Result<Vec<_>, _>>()?, frames);
        Ok(())
    }

    #[test]
    fn reads_pcapng() -> anyhow::Result<()> {
        let mut writer = PcapNgWriter::new(Cursor::new(Vec::new()), Endianness::BigEndian)?;
        let interface = writer.add_interface(LinkType::Ethernet, 0, None)?;
        writer.write_packet(interface, 0, &tcp_syn_frame(), None)?;
        let bytes = writer.finish()?.into_inner();

        let mut reader = AnyCaptureReader::new(bytes.as_slice())?;
        assert_eq!(reader.format(), CaptureFormat::PcapNg);
        assert_eq!(reader.next_frame()?.map(|frame| frame.data), Some(tcp_syn_frame()));
        assert!(reader.next_frame()?.is_none());
        assert_eq!(reader.frames_read(), 1);
        Ok(())
    }

    #[test]
    fn unknown_magic_and_short_input() {
        let err = AnyCaptureReader::new(&[0xde, 0xad, 0xbe, 0xef, 0, 0][..]).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Malformed(Malformed::InvalidMagicNumber([0xde, 0xad, 0xbe, 0xef]))
        ));
        let err = AnyCaptureReader::new(&[0x0a, 0x0d, 0x0d][..]).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Truncated {
                context: TruncatedAt::GlobalHeader,
                got: 3,
                ..
            }
        ));
    }
}
