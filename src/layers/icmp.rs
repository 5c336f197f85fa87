use crate::byte_order::be_u16;

pub const ICMP_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
}
impl IcmpHeader {
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < ICMP_HEADER_LEN {
            return None;
        }
        let header = Self {
            icmp_type: data[0],
            code: data[1],
            checksum: be_u16(data, 2)?,
        };
        Some((header, &data[ICMP_HEADER_LEN..]))
    }
    /// Name of the well known message types
    pub fn type_name(&self) -> Option<&'static str> {
        match self.icmp_type {
            0 => Some("echo-reply"),
            3 => Some("dest-unreach"),
            4 => Some("source-quench"),
            5 => Some("redirect"),
            8 => Some("echo-request"),
            11 => Some("time-exceeded"),
            12 => Some("parameter-problem"),
            13 => Some("timestamp-request"),
            14 => Some("timestamp-reply"),
            _ => None,
        }
    }
}
