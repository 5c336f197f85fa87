//! Human readable report of a decoded frame
//!
//! ```text
//!
//! PACKET NUMBER -- 1
//!
//!     ETHER: ---- Ether Header ----
//!     ETHER:
//!     ETHER: Packet size = 54 bytes
//!     ...
//! ```
//!
//! Every layer gets its own block, each line prefixed with the layer name.
use std::fmt::{self, Write};

use crate::layers::{
    DecodedFrame, EthernetHeader, IcmpHeader, Ipv4Header, Layer, TcpFlags, TcpHeader, UdpHeader,
};

/// Renders the report for one frame
pub fn render(frame: &DecodedFrame, index: usize) -> String {
    let mut out = String::with_capacity(1024);
    // Writing into a String does not fail
    let _ = write_frame(&mut out, frame, index);
    out
}

/// Writes the report for one frame to `out`
pub fn write_frame<W: Write>(out: &mut W, frame: &DecodedFrame, index: usize) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "PACKET NUMBER -- {index}")?;
    for layer in frame.layers() {
        match layer {
            Layer::Ethernet(header) => write_ethernet(out, header, frame.captured_length())?,
            Layer::Ipv4(header) => write_ipv4(out, header)?,
            Layer::Tcp(header) => write_tcp(out, header)?,
            Layer::Udp(header) => write_udp(out, header)?,
            Layer::Icmp(header) => write_icmp(out, header)?,
        }
    }
    Ok(())
}

/// Lines of one layer, all carrying the same prefix
struct Block<'w, W: Write> {
    out: &'w mut W,
    prefix: &'static str,
}
impl<'w, W: Write> Block<'w, W> {
    fn open(out: &'w mut W, prefix: &'static str, title: &str) -> Result<Self, fmt::Error> {
        writeln!(out)?;
        let mut block = Self { out, prefix };
        block.line(format_args!("---- {title} ----"))?;
        block.blank()?;
        Ok(block)
    }
    fn line(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        writeln!(self.out, "    {} {}", self.prefix, args)
    }
    fn blank(&mut self) -> fmt::Result {
        writeln!(self.out, "    {}", self.prefix)
    }
    /// One line of a bit diagram, `pattern` holds a `*` where the bit goes
    fn bit(&mut self, pattern: &str, set: bool, name: &str) -> fmt::Result {
        let bit = if set { "1" } else { "0" };
        let pattern = pattern.replace('*', bit);
        self.line(format_args!("   {pattern} = {name}"))
    }
    fn close(mut self) -> fmt::Result {
        self.blank()
    }
}

fn write_ethernet<W: Write>(out: &mut W, header: &EthernetHeader, size: usize) -> fmt::Result {
    let mut block = Block::open(out, "ETHER:", "Ether Header")?;
    block.line(format_args!("Packet size = {size} bytes"))?;
    block.line(format_args!("Destination = {}", header.destination))?;
    block.line(format_args!("Source      = {}", header.source))?;
    block.line(format_args!("Ethertype   = {}", header.ether_type))?;
    block.close()
}

fn write_ipv4<W: Write>(out: &mut W, header: &Ipv4Header) -> fmt::Result {
    let mut block = Block::open(out, "IP:", "IP Header")?;
    block.line(format_args!("Version          = {}", header.version))?;
    block.line(format_args!(
        "Header Length    = {} bytes",
        header.header_length()
    ))?;
    block.line(format_args!(
        "Type of Service  = {:#x}",
        header.type_of_service
    ))?;
    block.line(format_args!(
        "Total Length     = {} bytes",
        header.total_length
    ))?;
    block.line(format_args!("Identification   = {}", header.identification))?;
    if header.flags.bits() == 0 {
        block.line(format_args!("Flags            = 0"))?;
    } else {
        block.line(format_args!(
            "Flags            = {} ({})",
            header.flags.bits(),
            header.flags
        ))?;
    }
    block.bit("*...", header.flags.reserved(), "reserved bit")?;
    block.bit(".*..", header.flags.dont_fragment(), "do not fragment")?;
    block.bit("..*.", header.flags.more_fragments(), "more fragments")?;
    block.line(format_args!("Fragment Offsets = {}", header.fragment_offset))?;
    block.line(format_args!("Time to live     = {} seconds/hops", header.ttl))?;
    block.line(format_args!("Protocol         = {}", header.protocol))?;
    block.line(format_args!("Header Checksum  = {:#x}", header.checksum))?;
    block.line(format_args!("Source Address   = {}", header.source))?;
    block.line(format_args!("Dest Address     = {}", header.destination))?;
    let options = header.decoded_options();
    if options.is_empty() {
        block.line(format_args!("Options          = no options"))?;
    } else {
        let options: Vec<String> = options.iter().map(ToString::to_string).collect();
        block.line(format_args!("Options          = {}", options.join(", ")))?;
    }
    block.close()
}

fn write_tcp<W: Write>(out: &mut W, header: &TcpHeader) -> fmt::Result {
    let flags = header.flags;
    let mut block = Block::open(out, "TCP:", "TCP Header")?;
    block.line(format_args!("Source Port      = {}", header.source_port))?;
    block.line(format_args!(
        "Destination Port = {}",
        header.destination_port
    ))?;
    block.line(format_args!("Sequence Number  = {}", header.sequence))?;
    block.line(format_args!("Ack Number       = {}", header.acknowledgment))?;
    block.line(format_args!("Data Offset      = {}", header.data_offset))?;
    if flags.bits() == 0 {
        block.line(format_args!("Flags            = 0"))?;
    } else {
        block.line(format_args!("Flags            = {} ({flags})", flags.bits()))?;
    }
    block.bit("..*. ....", flags.contains(TcpFlags::URG), "urgent pointer")?;
    block.bit("...* ....", flags.contains(TcpFlags::ACK), "ack")?;
    block.bit(".... *...", flags.contains(TcpFlags::PSH), "push")?;
    block.bit(".... .*..", flags.contains(TcpFlags::RST), "reset")?;
    block.bit(".... ..*.", flags.contains(TcpFlags::SYN), "syn")?;
    block.bit(".... ...*", flags.contains(TcpFlags::FIN), "fin")?;
    block.line(format_args!("Window           = {}", header.window))?;
    block.line(format_args!("Checksum         = {:#x}", header.checksum))?;
    block.line(format_args!("Urgent Pointer   = {}", header.urgent_pointer))?;
    let options = header.decoded_options();
    if options.is_empty() {
        block.line(format_args!("Options          = no options"))?;
    } else {
        block.line(format_args!("Options          ="))?;
        for option in options {
            block.line(format_args!("    {option}"))?;
        }
    }
    block.close()
}

fn write_udp<W: Write>(out: &mut W, header: &UdpHeader) -> fmt::Result {
    let mut block = Block::open(out, "UDP:", "UDP Header")?;
    block.line(format_args!("Source Port      = {}", header.source_port))?;
    block.line(format_args!(
        "Destination Port = {}",
        header.destination_port
    ))?;
    block.line(format_args!("Length           = {} bytes", header.length))?;
    block.line(format_args!("Header Checksum  = {:#x}", header.checksum))?;
    block.close()
}

fn write_icmp<W: Write>(out: &mut W, header: &IcmpHeader) -> fmt::Result {
    let mut block = Block::open(out, "ICMP:", "ICMP Header")?;
    match header.type_name() {
        Some(name) => block.line(format_args!(
            "Type             = {} ({name})",
            header.icmp_type
        ))?,
        None => block.line(format_args!("Type             = {}", header.icmp_type))?,
    }
    block.line(format_args!("Code             = {}", header.code))?;
    block.line(format_args!("Header Checksum  = {:#x}", header.checksum))?;
    block.close()
}
