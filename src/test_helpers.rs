//! Frames and captures shared by the unit tests
#![allow(clippy::unwrap_used)]
use std::{
    io::Cursor,
    sync::{Mutex, Once},
};

use etherparse::PacketBuilderStep;

use crate::capture::{CaptureWriter, FrameRecord, file_header::GlobalHeader};

pub(crate) const CLIENT_MAC: [u8; 6] = [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e];
pub(crate) const SERVER_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
pub(crate) const CLIENT_IP: [u8; 4] = [192, 168, 1, 10];
pub(crate) const SERVER_IP: [u8; 4] = [93, 184, 216, 34];

/// Serializes a finished etherparse builder with `payload`
pub(crate) fn build_frame<B>(builder: PacketBuilderStep<B>, payload: &[u8]) -> Vec<u8>
where
    PacketBuilderStep<B>: FrameBuilder,
{
    builder.build(payload)
}

/// Implemented by the builder steps that can be written out
pub(crate) trait FrameBuilder {
    fn build(self, payload: &[u8]) -> Vec<u8>;
}
impl FrameBuilder for PacketBuilderStep<etherparse::TcpHeader> {
    fn build(self, payload: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.size(payload.len()));
        self.write(&mut result, payload).unwrap();
        result
    }
}
impl FrameBuilder for PacketBuilderStep<etherparse::UdpHeader> {
    fn build(self, payload: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.size(payload.len()));
        self.write(&mut result, payload).unwrap();
        result
    }
}
impl FrameBuilder for PacketBuilderStep<etherparse::Icmpv4Header> {
    fn build(self, payload: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.size(payload.len()));
        self.write(&mut result, payload).unwrap();
        result
    }
}

/// Ethernet + IPv4 + TCP SYN from 192.168.1.10:40000 to 93.184.216.34:80, 54 bytes
pub(crate) fn tcp_syn_frame() -> Vec<u8> {
    build_frame(
        etherparse::PacketBuilder::ethernet2(CLIENT_MAC, SERVER_MAC)
            .ipv4(CLIENT_IP, SERVER_IP, 64)
            .tcp(40000, 80, 1000, 64240)
            .syn(),
        &[],
    )
}

/// DNS style query from 192.168.1.10:5353 to 8.8.8.8:53
pub(crate) fn udp_frame() -> Vec<u8> {
    build_frame(
        etherparse::PacketBuilder::ethernet2(CLIENT_MAC, SERVER_MAC)
            .ipv4(CLIENT_IP, [8, 8, 8, 8], 64)
            .udp(5353, 53),
        &[0x12, 0x34, 0x01, 0x00],
    )
}

/// Echo request from 192.168.1.10 to 1.1.1.1
pub(crate) fn icmp_echo_frame() -> Vec<u8> {
    build_frame(
        etherparse::PacketBuilder::ethernet2(CLIENT_MAC, SERVER_MAC)
            .ipv4(CLIENT_IP, [1, 1, 1, 1], 64)
            .icmpv4_echo_request(0x1234, 1),
        &[0u8; 8],
    )
}

/// Writes `frames` into an in-memory capture
pub(crate) fn capture_bytes(header: GlobalHeader, frames: &[FrameRecord]) -> Vec<u8> {
    let mut writer = CaptureWriter::new(Cursor::new(Vec::new()), header).unwrap();
    for frame in frames {
        writer.write_frame(frame).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

struct WarningLog(Mutex<Vec<String>>);
impl log::Log for WarningLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }
    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.0.lock().unwrap().push(record.args().to_string());
        }
    }
    fn flush(&self) {}
}

/// Warnings logged by any test so far
///
/// The first call installs the collecting logger.
pub(crate) fn logged_warnings() -> Vec<String> {
    static LOG: WarningLog = WarningLog(Mutex::new(Vec::new()));
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = log::set_logger(&LOG);
        log::set_max_level(log::LevelFilter::Warn);
    });
    LOG.0.lock().unwrap().clone()
}
