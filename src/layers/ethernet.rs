//! Ethernet II framing
use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::byte_order::be_u16;

/// Length of the Ethernet II header
pub const ETHERNET_HEADER_LEN: usize = 14;

/// EtherType values the decoder knows by name
pub mod ether_type {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
    pub const IPV6: u16 = 0x86dd;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid MAC address: {0}")]
pub struct InvalidMacAddr(pub String);

/// A 48 bit hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);
impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}
impl FromStr for MacAddr {
    type Err = InvalidMacAddr;

    /// Accepts six hex octets separated by `:` or `-`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidMacAddr(s.to_owned());
        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddr(octets))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub ether_type: u16,
}
impl EthernetHeader {
    /// Splits an Ethernet header off the front of `data`
    ///
    /// Returns `None` if fewer than 14 bytes are available
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < ETHERNET_HEADER_LEN {
            return None;
        }
        let mut destination = [0u8; 6];
        destination.copy_from_slice(&data[0..6]);
        let mut source = [0u8; 6];
        source.copy_from_slice(&data[6..12]);
        let ether_type = be_u16(data, 12)?;
        Some((
            Self {
                destination: MacAddr(destination),
                source: MacAddr(source),
                ether_type,
            },
            &data[ETHERNET_HEADER_LEN..],
        ))
    }
    pub fn carries_ipv4(&self) -> bool {
        self.ether_type == ether_type::IPV4
    }
}
