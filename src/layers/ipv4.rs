//! IPv4 header decoding
use std::{fmt, net::Ipv4Addr};

use crate::{
    byte_order::{be_u16, be_u32},
    layers::options::{RawOption, RawOptions, hex},
};

/// Size of an IPv4 header without options
pub const IPV4_MIN_HEADER_LEN: usize = 20;

/// IP protocol numbers the decoder follows
pub mod ip_protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

/// The three flag bits in front of the fragment offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ipv4Flags(pub u8);
impl Ipv4Flags {
    pub const RESERVED: u8 = 0b100;
    pub const DONT_FRAGMENT: u8 = 0b010;
    pub const MORE_FRAGMENTS: u8 = 0b001;

    pub fn bits(self) -> u8 {
        self.0
    }
    pub fn reserved(self) -> bool {
        self.0 & Self::RESERVED != 0
    }
    pub fn dont_fragment(self) -> bool {
        self.0 & Self::DONT_FRAGMENT != 0
    }
    pub fn more_fragments(self) -> bool {
        self.0 & Self::MORE_FRAGMENTS != 0
    }
}
/// Names of the set flags joined with `+`, empty when none are set
impl fmt::Display for Ipv4Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.reserved(), "RB"),
            (self.dont_fragment(), "DF"),
            (self.more_fragments(), "MF"),
        ];
        let mut first = true;
        for (_, name) in names.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str("+")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// Option kinds that get their own variant
pub mod option_kind {
    pub const RECORD_ROUTE: u8 = 7;
    pub const TIMESTAMP: u8 = 68;
    pub const LOOSE_SOURCE_ROUTE: u8 = 131;
    pub const STRICT_SOURCE_ROUTE: u8 = 137;
    pub const ROUTER_ALERT: u8 = 148;
}

/// One slot of a Timestamp option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampEntry {
    /// Present for flags 1 and 3
    pub address: Option<Ipv4Addr>,
    pub timestamp: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ipv4Option {
    EndOfList,
    NoOp,
    /// `pointer` is the 1-based offset of the next free slot, counted from the kind byte
    RecordRoute {
        pointer: u8,
        route: Vec<Ipv4Addr>,
    },
    Timestamp {
        pointer: u8,
        overflow: u8,
        flag: u8,
        entries: Vec<TimestampEntry>,
    },
    LooseSourceRoute {
        pointer: u8,
        route: Vec<Ipv4Addr>,
    },
    StrictSourceRoute {
        pointer: u8,
        route: Vec<Ipv4Addr>,
    },
    RouterAlert(u16),
    /// Any other option, kept undecoded
    Other {
        kind: u8,
        data: Vec<u8>,
    },
    /// The rest of the option area after a length byte that did not fit
    Malformed(Vec<u8>),
}
impl Ipv4Option {
    /// Decodes the option area of an IPv4 header
    pub fn parse_all(bytes: &[u8]) -> Vec<Self> {
        RawOptions::new(bytes)
            .map(|raw| match raw {
                RawOption::EndOfList => Ipv4Option::EndOfList,
                RawOption::NoOp => Ipv4Option::NoOp,
                RawOption::Value { kind, data } => {
                    Self::parse_value(kind, data).unwrap_or_else(|| Ipv4Option::Other {
                        kind,
                        data: data.to_vec(),
                    })
                }
                RawOption::Malformed(bytes) => Ipv4Option::Malformed(bytes.to_vec()),
            })
            .collect()
    }
    /// `None` when the value does not have the layout of its kind
    fn parse_value(kind: u8, data: &[u8]) -> Option<Self> {
        match kind {
            option_kind::RECORD_ROUTE => {
                let (pointer, route) = parse_route(data)?;
                Some(Ipv4Option::RecordRoute { pointer, route })
            }
            option_kind::LOOSE_SOURCE_ROUTE => {
                let (pointer, route) = parse_route(data)?;
                Some(Ipv4Option::LooseSourceRoute { pointer, route })
            }
            option_kind::STRICT_SOURCE_ROUTE => {
                let (pointer, route) = parse_route(data)?;
                Some(Ipv4Option::StrictSourceRoute { pointer, route })
            }
            option_kind::TIMESTAMP => parse_timestamp(data),
            option_kind::ROUTER_ALERT => match data {
                [high, low] => Some(Ipv4Option::RouterAlert(u16::from_be_bytes([*high, *low]))),
                _ => None,
            },
            _ => None,
        }
    }
}
fn address(bytes: &[u8]) -> Option<Ipv4Addr> {
    let octets: [u8; 4] = bytes.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}
/// Pointer byte followed by whole addresses
fn parse_route(data: &[u8]) -> Option<(u8, Vec<Ipv4Addr>)> {
    let (&pointer, addresses) = data.split_first()?;
    if addresses.len() % 4 != 0 {
        return None;
    }
    let route = addresses.chunks_exact(4).filter_map(address).collect();
    Some((pointer, route))
}
fn parse_timestamp(data: &[u8]) -> Option<Ipv4Option> {
    let [pointer, overflow_and_flag, slots @ ..] = data else {
        return None;
    };
    let flag = overflow_and_flag & 0x0f;
    let with_address = matches!(flag, 1 | 3);
    let slot_length = if with_address { 8 } else { 4 };
    if slots.len() % slot_length != 0 {
        return None;
    }
    let entries = slots
        .chunks_exact(slot_length)
        .map(|slot| {
            let (address, timestamp) = if with_address {
                (self::address(&slot[..4]), &slot[4..])
            } else {
                (None, slot)
            };
            TimestampEntry {
                address,
                timestamp: be_u32(timestamp, 0).unwrap_or_default(),
            }
        })
        .collect();
    Some(Ipv4Option::Timestamp {
        pointer: *pointer,
        overflow: overflow_and_flag >> 4,
        flag,
        entries,
    })
}
fn write_route(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    pointer: u8,
    route: &[Ipv4Addr],
) -> fmt::Result {
    write!(f, "{name} pointer {pointer} =")?;
    for hop in route {
        write!(f, " {hop}")?;
    }
    Ok(())
}
fn option_name(kind: u8) -> Option<&'static str> {
    match kind {
        option_kind::RECORD_ROUTE => Some("RR"),
        option_kind::TIMESTAMP => Some("Timestamp"),
        130 => Some("Security"),
        option_kind::LOOSE_SOURCE_ROUTE => Some("LSRR"),
        option_kind::STRICT_SOURCE_ROUTE => Some("SSRR"),
        option_kind::ROUTER_ALERT => Some("RouterAlert"),
        _ => None,
    }
}
impl fmt::Display for Ipv4Option {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ipv4Option::EndOfList => f.write_str("EOL"),
            Ipv4Option::NoOp => f.write_str("NOP"),
            Ipv4Option::RecordRoute { pointer, route } => write_route(f, "RR", *pointer, route),
            Ipv4Option::LooseSourceRoute { pointer, route } => {
                write_route(f, "LSRR", *pointer, route)
            }
            Ipv4Option::StrictSourceRoute { pointer, route } => {
                write_route(f, "SSRR", *pointer, route)
            }
            Ipv4Option::Timestamp {
                pointer,
                overflow,
                flag,
                entries,
            } => {
                write!(f, "Timestamp pointer {pointer} overflow {overflow} flag {flag} =")?;
                for entry in entries {
                    match entry.address {
                        Some(address) => write!(f, " {address}@{}", entry.timestamp)?,
                        None => write!(f, " {}", entry.timestamp)?,
                    }
                }
                Ok(())
            }
            Ipv4Option::RouterAlert(value) => write!(f, "RouterAlert = {value}"),
            Ipv4Option::Other { kind, data } => {
                match option_name(*kind) {
                    Some(name) => f.write_str(name)?,
                    None => write!(f, "Option {kind}")?,
                }
                if !data.is_empty() {
                    write!(f, " = {}", hex(data))?;
                }
                Ok(())
            }
            Ipv4Option::Malformed(bytes) => write!(f, "malformed {}", hex(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    /// Header length in 32 bit words
    pub ihl: u8,
    pub type_of_service: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags: Ipv4Flags,
    /// In units of 8 bytes
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    /// Bytes 20 up to the header length
    pub options: Vec<u8>,
}
impl Ipv4Header {
    /// Splits an IPv4 header off the front of `data`
    ///
    /// The returned payload ends at the total length, so Ethernet padding is
    /// not handed to the next layer. Returns `None` when the header does not
    /// fit or its length fields contradict each other.
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < IPV4_MIN_HEADER_LEN {
            return None;
        }
        let ihl = data[0] & 0x0f;
        let header_length = usize::from(ihl) * 4;
        if header_length < IPV4_MIN_HEADER_LEN || header_length > data.len() {
            return None;
        }
        let total_length = be_u16(data, 2)?;
        if usize::from(total_length) < header_length {
            return None;
        }
        let flags_and_offset = be_u16(data, 6)?;
        let header = Self {
            version: data[0] >> 4,
            ihl,
            type_of_service: data[1],
            total_length,
            identification: be_u16(data, 4)?,
            flags: Ipv4Flags((flags_and_offset >> 13) as u8),
            fragment_offset: flags_and_offset & 0x1fff,
            ttl: data[8],
            protocol: data[9],
            checksum: be_u16(data, 10)?,
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            destination: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            options: data[IPV4_MIN_HEADER_LEN..header_length].to_vec(),
        };
        let end = usize::from(total_length).min(data.len());
        Some((header, &data[header_length..end]))
    }
    /// Header length in bytes
    pub fn header_length(&self) -> usize {
        usize::from(self.ihl) * 4
    }
    pub fn dont_fragment(&self) -> bool {
        self.flags.dont_fragment()
    }
    pub fn more_fragments(&self) -> bool {
        self.flags.more_fragments()
    }
    /// Only the first fragment of a datagram starts with the transport header
    pub fn is_first_fragment(&self) -> bool {
        self.fragment_offset == 0
    }
    pub fn decoded_options(&self) -> Vec<Ipv4Option> {
        Ipv4Option::parse_all(&self.options)
    }
}
