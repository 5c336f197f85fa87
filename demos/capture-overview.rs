use std::{collections::BTreeMap, path::PathBuf};

use clap::Parser;
use pktsniffer::{AnyCaptureReader, LayerKind, layers::decode};

#[derive(Parser, Debug)]
#[clap(name = "capture-overview")]
struct CaptureOverview {
    /// Path to the pcap or pcapng file to read
    file: PathBuf,
}
fn main() -> anyhow::Result<()> {
    let cli = CaptureOverview::parse();
    let mut reader = AnyCaptureReader::open(&cli.file)?;

    let mut frame_count: u64 = 0;
    let mut total_bytes: u64 = 0;
    let mut highest_frame_size: usize = 0;
    let mut lowest_frame_size: usize = 0;
    let mut innermost: BTreeMap<String, u64> = BTreeMap::new();
    let mut link_types: BTreeMap<String, u64> = BTreeMap::new();
    while let Some(frame) = reader.next_frame()? {
        frame_count += 1;
        let frame_size = frame.data().len();
        total_bytes += frame_size as u64;
        highest_frame_size = highest_frame_size.max(frame_size);
        if lowest_frame_size == 0 || frame_size < lowest_frame_size {
            lowest_frame_size = frame_size;
        }
        *link_types.entry(format!("{:?}", frame.link_type)).or_default() += 1;
        let decoded = decode(&frame);
        let name = match decoded.layers().last().map(|layer| layer.kind()) {
            Some(LayerKind::Ethernet) => "ethernet only",
            Some(LayerKind::Ipv4) => "ipv4 only",
            Some(LayerKind::Tcp) => "tcp",
            Some(LayerKind::Udp) => "udp",
            Some(LayerKind::Icmp) => "icmp",
            None => "undecoded",
        };
        *innermost.entry(name.to_owned()).or_default() += 1;
    }
    let average_frame_size = total_bytes.checked_div(frame_count).unwrap_or_default();

    println!("-- Capture Overview --");
    println!("Format: {:?}", reader.format());
    println!("Total frames: {frame_count}");
    for (name, count) in &link_types {
        println!("Link type {name}: {count} frames");
    }
    println!("Average frame size: {average_frame_size} bytes");
    println!("Highest frame size: {highest_frame_size} bytes");
    println!("Lowest frame size: {lowest_frame_size} bytes");
    for (name, count) in &innermost {
        println!("  {name}: {count}");
    }
    println!("-- End of Overview --");
    Ok(())
}
