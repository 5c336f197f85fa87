use crate::byte_order::be_u16;

pub const UDP_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    /// Length of header and payload in bytes
    pub length: u16,
    pub checksum: u16,
}
impl UdpHeader {
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < UDP_HEADER_LEN {
            return None;
        }
        let header = Self {
            source_port: be_u16(data, 0)?,
            destination_port: be_u16(data, 2)?,
            length: be_u16(data, 4)?,
            checksum: be_u16(data, 6)?,
        };
        Some((header, &data[UDP_HEADER_LEN..]))
    }
}
