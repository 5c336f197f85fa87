use std::io::{self, Write};

use crate::{
    byte_order::{Endianness, WriteExt},
    capture::pcapng::blocks::{BLOCK_HEADER_LEN, block_type, interface_option, pad_to_32_bits},
    link_type::LinkType,
};

/// Writes a single section pcapng file
///
/// Enough for captures made by this crate and for test fixtures. No options
/// other than `if_tsresol` are written.
#[derive(Debug)]
pub struct PcapNgWriter<W: Write> {
    target: W,
    endianness: Endianness,
    interfaces: u32,
}

impl<W: Write> PcapNgWriter<W> {
    /// Writes the section header
    pub fn new(target: W, endianness: Endianness) -> Result<Self, io::Error> {
        let mut writer = Self {
            target,
            endianness,
            interfaces: 0,
        };
        let mut body = Vec::with_capacity(16);
        body.write_u32(0x1a2b_3c4d, endianness)?;
        body.write_u16(1, endianness)?;
        body.write_u16(0, endianness)?;
        // Section length not given
        body.extend_from_slice(&[0xFF; 8]);
        writer.write_block(block_type::SECTION_HEADER, &body)?;
        Ok(writer)
    }
    /// Describes a new interface and returns its id
    ///
    /// `ts_resolution` is written as `if_tsresol` when given, otherwise the
    /// interface uses microseconds.
    pub fn add_interface(
        &mut self,
        link_type: LinkType,
        snap_length: u32,
        ts_resolution: Option<u8>,
    ) -> Result<u32, io::Error> {
        let endianness = self.endianness;
        let link_type = u16::try_from(u32::from(link_type))
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "link type does not fit pcapng"))?;
        let mut body = Vec::with_capacity(20);
        body.write_u16(link_type, endianness)?;
        body.write_u16(0, endianness)?;
        body.write_u32(snap_length, endianness)?;
        if let Some(resolution) = ts_resolution {
            body.write_u16(interface_option::IF_TSRESOL, endianness)?;
            body.write_u16(1, endianness)?;
            body.extend_from_slice(&[resolution, 0, 0, 0]);
            // opt_endofopt
            body.extend_from_slice(&[0; 4]);
        }
        self.write_block(block_type::INTERFACE_DESCRIPTION, &body)?;
        let id = self.interfaces;
        self.interfaces += 1;
        Ok(id)
    }
    /// Writes an Enhanced Packet Block
    ///
    /// `timestamp` is in the units of the interface's resolution.
    pub fn write_packet(
        &mut self,
        interface_id: u32,
        timestamp: u64,
        content: &[u8],
        original_length: Option<u32>,
    ) -> Result<(), io::Error> {
        let endianness = self.endianness;
        let captured_length = packet_length(content)?;
        let mut body = Vec::with_capacity(20 + pad_to_32_bits(content.len()));
        body.write_u32(interface_id, endianness)?;
        body.write_u32((timestamp >> 32) as u32, endianness)?;
        body.write_u32(timestamp as u32, endianness)?;
        body.write_u32(captured_length, endianness)?;
        body.write_u32(
            original_length.unwrap_or(captured_length).max(captured_length),
            endianness,
        )?;
        body.extend_from_slice(content);
        self.write_block(block_type::ENHANCED_PACKET, &body)
    }
    /// Writes a Simple Packet Block, captured in full
    pub fn write_simple_packet(&mut self, content: &[u8]) -> Result<(), io::Error> {
        let mut body = Vec::with_capacity(4 + pad_to_32_bits(content.len()));
        body.write_u32(packet_length(content)?, self.endianness)?;
        body.extend_from_slice(content);
        self.write_block(block_type::SIMPLE_PACKET, &body)
    }
    /// Writes a block of any type, padding `body` to 32 bits
    pub fn write_block(&mut self, block_type: u32, body: &[u8]) -> Result<(), io::Error> {
        let endianness = self.endianness;
        let padded = pad_to_32_bits(body.len());
        let length = u32::try_from(BLOCK_HEADER_LEN + padded + 4)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "block is too large"))?;
        self.target.write_u32(block_type, endianness)?;
        self.target.write_u32(length, endianness)?;
        self.target.write_all(body)?;
        self.target.write_all(&[0; 3][..padded - body.len()])?;
        self.target.write_u32(length, endianness)?;
        Ok(())
    }
    /// Flushes the target and hands it back
    pub fn finish(mut self) -> Result<W, io::Error> {
        self.target.flush()?;
        Ok(self.target)
    }
}

fn packet_length(content: &[u8]) -> Result<u32, io::Error> {
    u32::try_from(content.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame is too large"))
}
