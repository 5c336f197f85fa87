//! TCP header decoding
use std::fmt;

use crate::{
    byte_order::{be_u16, be_u32},
    layers::options::{RawOption, RawOptions, hex},
};

/// Size of a TCP header without options
pub const TCP_MIN_HEADER_LEN: usize = 20;

/// The six control bits in the low end of byte 13
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags(pub u8);
impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const MASK: u8 = 0x3f;

    pub fn bits(self) -> u8 {
        self.0
    }
    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }
    pub fn fin(self) -> bool {
        self.contains(Self::FIN)
    }
    pub fn syn(self) -> bool {
        self.contains(Self::SYN)
    }
    pub fn rst(self) -> bool {
        self.contains(Self::RST)
    }
    pub fn psh(self) -> bool {
        self.contains(Self::PSH)
    }
    pub fn ack(self) -> bool {
        self.contains(Self::ACK)
    }
    pub fn urg(self) -> bool {
        self.contains(Self::URG)
    }
}
/// One letter per set flag, lowest bit first (`SA` for a SYN-ACK)
impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LETTERS: [(u8, char); 6] = [
            (TcpFlags::FIN, 'F'),
            (TcpFlags::SYN, 'S'),
            (TcpFlags::RST, 'R'),
            (TcpFlags::PSH, 'P'),
            (TcpFlags::ACK, 'A'),
            (TcpFlags::URG, 'U'),
        ];
        for (flag, letter) in LETTERS {
            if self.contains(flag) {
                fmt::Write::write_char(f, letter)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcpOption {
    EndOfList,
    NoOp,
    MaximumSegmentSize(u16),
    WindowScale(u8),
    SackPermitted,
    /// Left and right edges of each block
    Sack(Vec<(u32, u32)>),
    Timestamp {
        value: u32,
        echo_reply: u32,
    },
    /// Unknown kinds, or known kinds with an unexpected length
    Other {
        kind: u8,
        data: Vec<u8>,
    },
    Malformed(Vec<u8>),
}
impl TcpOption {
    /// Decodes the option area of a TCP header
    pub fn parse_all(bytes: &[u8]) -> Vec<Self> {
        RawOptions::new(bytes).map(Self::from_raw).collect()
    }
    fn from_raw(raw: RawOption<'_>) -> Self {
        let (kind, data) = match raw {
            RawOption::EndOfList => return TcpOption::EndOfList,
            RawOption::NoOp => return TcpOption::NoOp,
            RawOption::Malformed(bytes) => return TcpOption::Malformed(bytes.to_vec()),
            RawOption::Value { kind, data } => (kind, data),
        };
        match (kind, data.len()) {
            (2, 2) => TcpOption::MaximumSegmentSize(u16::from_be_bytes([data[0], data[1]])),
            (3, 1) => TcpOption::WindowScale(data[0]),
            (4, 0) => TcpOption::SackPermitted,
            (5, len) if len > 0 && len % 8 == 0 => TcpOption::Sack(
                data.chunks_exact(8)
                    .filter_map(|block| Some((be_u32(block, 0)?, be_u32(block, 4)?)))
                    .collect(),
            ),
            (8, 8) => TcpOption::Timestamp {
                value: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
                echo_reply: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            },
            _ => TcpOption::Other {
                kind,
                data: data.to_vec(),
            },
        }
    }
}
impl fmt::Display for TcpOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcpOption::EndOfList => f.write_str("EOL"),
            TcpOption::NoOp => f.write_str("NOP"),
            TcpOption::MaximumSegmentSize(mss) => write!(f, "MSS = {mss}"),
            TcpOption::WindowScale(shift) => write!(f, "WScale = {shift}"),
            TcpOption::SackPermitted => f.write_str("SAckOK"),
            TcpOption::Sack(blocks) => {
                f.write_str("SAck =")?;
                for (left, right) in blocks {
                    write!(f, " {left}-{right}")?;
                }
                Ok(())
            }
            TcpOption::Timestamp { value, echo_reply } => {
                write!(f, "Timestamp = {value}, {echo_reply}")
            }
            TcpOption::Other { kind, data } if data.is_empty() => write!(f, "Kind {kind}"),
            TcpOption::Other { kind, data } => write!(f, "Kind {kind} = {}", hex(data)),
            TcpOption::Malformed(bytes) => write!(f, "malformed {}", hex(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgment: u32,
    /// Header length in 32 bit words
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
    /// Bytes 20 up to the header length
    pub options: Vec<u8>,
}
impl TcpHeader {
    /// Splits a TCP header off the front of `data`
    ///
    /// Returns `None` if the data offset is below 5 words or points past the
    /// end of the segment
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < TCP_MIN_HEADER_LEN {
            return None;
        }
        let data_offset = data[12] >> 4;
        let header_length = usize::from(data_offset) * 4;
        if header_length < TCP_MIN_HEADER_LEN || header_length > data.len() {
            return None;
        }
        let header = Self {
            source_port: be_u16(data, 0)?,
            destination_port: be_u16(data, 2)?,
            sequence: be_u32(data, 4)?,
            acknowledgment: be_u32(data, 8)?,
            data_offset,
            flags: TcpFlags(data[13] & TcpFlags::MASK),
            window: be_u16(data, 14)?,
            checksum: be_u16(data, 16)?,
            urgent_pointer: be_u16(data, 18)?,
            options: data[TCP_MIN_HEADER_LEN..header_length].to_vec(),
        };
        Some((header, &data[header_length..]))
    }
    /// Header length in bytes
    pub fn header_length(&self) -> usize {
        usize::from(self.data_offset) * 4
    }
    pub fn decoded_options(&self) -> Vec<TcpOption> {
        TcpOption::parse_all(&self.options)
    }
}
