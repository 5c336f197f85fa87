//! Decodes the protocol headers of a captured frame
//!
//! Decoding starts at the link layer chosen by the capture's link type and
//! follows the EtherType and IP protocol fields inward. A header that is
//! missing, cut short or not understood ends the chain. That is the normal
//! outcome for non-IP traffic and later fragments, so it is never an error.
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
mod options;
pub mod tcp;
pub mod udp;

use log::trace;

pub use ethernet::{EthernetHeader, MacAddr};
pub use icmp::IcmpHeader;
pub use ipv4::{Ipv4Flags, Ipv4Header, Ipv4Option, TimestampEntry};
pub use tcp::{TcpFlags, TcpHeader, TcpOption};
pub use udp::UdpHeader;

use crate::{capture::FrameRecord, link_type::LinkType};
use ipv4::ip_protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Ethernet,
    Ipv4,
    Tcp,
    Udp,
    Icmp,
}

/// One decoded protocol header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    Ethernet(EthernetHeader),
    Ipv4(Ipv4Header),
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Icmp(IcmpHeader),
}
impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Ethernet(_) => LayerKind::Ethernet,
            Layer::Ipv4(_) => LayerKind::Ipv4,
            Layer::Tcp(_) => LayerKind::Tcp,
            Layer::Udp(_) => LayerKind::Udp,
            Layer::Icmp(_) => LayerKind::Icmp,
        }
    }
}

/// The layers of one frame, outermost first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedFrame {
    layers: Vec<Layer>,
    /// Number of captured bytes the layers were decoded from
    captured_length: usize,
}
impl DecodedFrame {
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
    pub fn captured_length(&self) -> usize {
        self.captured_length
    }
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
    pub fn has(&self, kind: LayerKind) -> bool {
        self.layers.iter().any(|layer| layer.kind() == kind)
    }
    pub fn ethernet(&self) -> Option<&EthernetHeader> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Ethernet(header) => Some(header),
            _ => None,
        })
    }
    pub fn ipv4(&self) -> Option<&Ipv4Header> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Ipv4(header) => Some(header),
            _ => None,
        })
    }
    pub fn tcp(&self) -> Option<&TcpHeader> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Tcp(header) => Some(header),
            _ => None,
        })
    }
    pub fn udp(&self) -> Option<&UdpHeader> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Udp(header) => Some(header),
            _ => None,
        })
    }
    pub fn icmp(&self) -> Option<&IcmpHeader> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Icmp(header) => Some(header),
            _ => None,
        })
    }
    /// Source and destination port of the TCP or UDP layer
    pub fn ports(&self) -> Option<(u16, u16)> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Tcp(tcp) => Some((tcp.source_port, tcp.destination_port)),
            Layer::Udp(udp) => Some((udp.source_port, udp.destination_port)),
            _ => None,
        })
    }
}

/// Decodes frames of a capture with a specific link type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decoder {
    link_type: LinkType,
}
impl Decoder {
    pub fn new(link_type: LinkType) -> Self {
        Self { link_type }
    }
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }
    pub fn decode(&self, frame: &FrameRecord) -> DecodedFrame {
        self.decode_bytes(frame.data())
    }
    pub fn decode_bytes(&self, data: &[u8]) -> DecodedFrame {
        let mut layers = Vec::with_capacity(3);
        self.decode_into(data, &mut layers);
        DecodedFrame {
            layers,
            captured_length: data.len(),
        }
    }
    fn decode_into(&self, data: &[u8], layers: &mut Vec<Layer>) {
        let network = match self.link_type {
            LinkType::Ethernet => {
                let Some((ethernet, rest)) = EthernetHeader::parse(data) else {
                    trace!("Frame of {} bytes is too short for Ethernet", data.len());
                    return;
                };
                let carries_ipv4 = ethernet.carries_ipv4();
                layers.push(Layer::Ethernet(ethernet));
                if !carries_ipv4 {
                    return;
                }
                rest
            }
            LinkType::Raw | LinkType::Ipv4 => {
                if data.first().map(|byte| byte >> 4) != Some(4) {
                    return;
                }
                data
            }
            other => {
                trace!("No decoder for link type {other:?}");
                return;
            }
        };

        let Some((ipv4, payload)) = Ipv4Header::parse(network) else {
            trace!("IPv4 header absent or inconsistent");
            return;
        };
        let protocol = ipv4.protocol;
        let first_fragment = ipv4.is_first_fragment();
        layers.push(Layer::Ipv4(ipv4));
        if !first_fragment {
            return;
        }

        let transport = match protocol {
            ip_protocol::TCP => TcpHeader::parse(payload).map(|(tcp, _)| Layer::Tcp(tcp)),
            ip_protocol::UDP => UdpHeader::parse(payload).map(|(udp, _)| Layer::Udp(udp)),
            ip_protocol::ICMP => IcmpHeader::parse(payload).map(|(icmp, _)| Layer::Icmp(icmp)),
            _ => None,
        };
        match transport {
            Some(layer) => layers.push(layer),
            None => trace!("No transport layer decoded for protocol {protocol}"),
        }
    }
}

/// Decodes a frame starting at the link type it was captured with
pub fn decode(frame: &FrameRecord) -> DecodedFrame {
    Decoder::new(frame.link_type).decode(frame)
}
