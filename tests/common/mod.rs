#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
use std::{io::Cursor, path::PathBuf};

use pktsniffer::{
    FrameRecord, LinkType,
    byte_order::Endianness,
    capture::{CaptureWriter, PcapNgWriter, Timestamp, file_header::GlobalHeader},
};

pub fn tcp_syn() -> Vec<u8> {
    let builder = etherparse::PacketBuilder::ethernet2([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e], [0x52, 0x54, 0x00, 0x12, 0x34, 0x56])
        .ipv4([192, 168, 1, 10], [93, 184, 216, 34], 64)
        .tcp(40000, 80, 1000, 64240)
        .syn();
    let mut data = Vec::with_capacity(builder.size(0));
    builder.write(&mut data, &[]).unwrap();
    data
}

pub fn udp_query() -> Vec<u8> {
    let builder = etherparse::PacketBuilder::ethernet2([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e], [0x52, 0x54, 0x00, 0x12, 0x34, 0x56])
        .ipv4([192, 168, 1, 10], [8, 8, 8, 8], 64)
        .udp(5353, 53);
    let payload = [0x12, 0x34, 0x01, 0x00];
    let mut data = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut data, &payload).unwrap();
    data
}

pub fn capture(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut writer = CaptureWriter::new(Cursor::new(Vec::new()), GlobalHeader::default()).unwrap();
    for (second, data) in (1_700_000_000u32..).zip(frames) {
        let frame = FrameRecord::new(Timestamp::new(second, 0, Default::default()), data.clone(), None);
        writer.write_frame(&frame).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A pcapng capture with one Ethernet interface and microsecond timestamps
pub fn pcapng_capture(frames: &[Vec<u8>], endianness: Endianness) -> Vec<u8> {
    let mut writer = PcapNgWriter::new(Cursor::new(Vec::new()), endianness).unwrap();
    let interface = writer.add_interface(LinkType::Ethernet, 0, None).unwrap();
    for (second, data) in (1_700_000_000u64..).zip(frames) {
        writer
            .write_packet(interface, second * 1_000_000, data, None)
            .unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Writes `bytes` to a fresh file in the temp directory
pub fn capture_file(name: &str, bytes: &[u8]) -> PathBuf {
    temp_file(&format!("{name}.pcap"), bytes)
}

pub fn pcapng_file(name: &str, bytes: &[u8]) -> PathBuf {
    temp_file(&format!("{name}.pcapng"), bytes)
}

fn temp_file(file_name: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("pktsniffer-{}-{file_name}", std::process::id()));
    std::fs::write(&path, bytes).unwrap();
    path
}
