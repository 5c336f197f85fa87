//! Filter expressions over decoded frames
//!
//! A filter uses a subset of the tcpdump vocabulary:
//!
//! ```text
//! tcp and dst port 80
//! not (udp or icmp)
//! src net 192.168.0.0/16 && ! port ssh
//! ether host 00:1a:2b:3c:4d:5e
//! ```
//!
//! An empty filter matches every frame. A filter that names a protocol the
//! frame does not carry never matches it.
mod lexer;
mod parser;
mod select;

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use thiserror::Error;

pub use select::{MatchBudget, Selected, select};

use crate::layers::{DecodedFrame, Decoder, LayerKind, MacAddr};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid filter syntax: unexpected `{token}` at position {position}")]
    UnexpectedToken { token: String, position: usize },
    #[error("invalid filter syntax: expression ends after `{after}`")]
    UnexpectedEnd { after: String },
    #[error("invalid filter syntax: unbalanced parenthesis at position {position}")]
    UnbalancedParenthesis { position: usize },
    #[error("invalid filter syntax: `{token}` is not a valid {expected}")]
    InvalidValue {
        token: String,
        expected: &'static str,
    },
}
impl FilterError {
    fn unexpected(lexeme: &lexer::Lexeme) -> Self {
        FilterError::UnexpectedToken {
            token: lexeme.text.clone(),
            position: lexeme.position,
        }
    }
    fn invalid(lexeme: &lexer::Lexeme, expected: &'static str) -> Self {
        FilterError::InvalidValue {
            token: lexeme.text.clone(),
            expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Protocol {
    Ether,
    Ip,
    Tcp,
    Udp,
    Icmp,
}
impl Protocol {
    fn layer(self) -> LayerKind {
        match self {
            Protocol::Ether => LayerKind::Ethernet,
            Protocol::Ip => LayerKind::Ipv4,
            Protocol::Tcp => LayerKind::Tcp,
            Protocol::Udp => LayerKind::Udp,
            Protocol::Icmp => LayerKind::Icmp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transport {
    Tcp,
    Udp,
}
impl From<Transport> for Protocol {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Tcp => Protocol::Tcp,
            Transport::Udp => Protocol::Udp,
        }
    }
}

/// Which end of a conversation an address or port must match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Src,
    Dst,
    SrcOrDst,
    SrcAndDst,
}
impl Direction {
    fn test(self, source: bool, destination: bool) -> bool {
        match self {
            Direction::Src => source,
            Direction::Dst => destination,
            Direction::SrcOrDst => source || destination,
            Direction::SrcAndDst => source && destination,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Primitive {
    Protocol(Protocol),
    Port {
        transport: Option<Transport>,
        direction: Direction,
        port: u16,
    },
    Host {
        direction: Direction,
        address: Ipv4Addr,
    },
    Net {
        direction: Direction,
        network: Ipv4Network,
    },
    EtherHost {
        direction: Direction,
        address: MacAddr,
    },
    IpProtocol(u8),
}
impl Primitive {
    fn matches(&self, frame: &DecodedFrame) -> bool {
        match self {
            Primitive::Protocol(protocol) => frame.has(protocol.layer()),
            Primitive::Port {
                transport,
                direction,
                port,
            } => {
                let ports = match transport {
                    Some(Transport::Tcp) => frame
                        .tcp()
                        .map(|tcp| (tcp.source_port, tcp.destination_port)),
                    Some(Transport::Udp) => frame
                        .udp()
                        .map(|udp| (udp.source_port, udp.destination_port)),
                    None => frame.ports(),
                };
                ports.is_some_and(|(source, destination)| {
                    direction.test(source == *port, destination == *port)
                })
            }
            Primitive::Host { direction, address } => frame.ipv4().is_some_and(|ip| {
                direction.test(ip.source == *address, ip.destination == *address)
            }),
            Primitive::Net { direction, network } => frame.ipv4().is_some_and(|ip| {
                direction.test(network.contains(ip.source), network.contains(ip.destination))
            }),
            Primitive::EtherHost { direction, address } => {
                frame.ethernet().is_some_and(|ethernet| {
                    direction.test(ethernet.source == *address, ethernet.destination == *address)
                })
            }
            Primitive::IpProtocol(protocol) => {
                frame.ipv4().is_some_and(|ip| ip.protocol == *protocol)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Primitive(Primitive),
}
impl Node {
    fn matches(&self, frame: &DecodedFrame) -> bool {
        match self {
            Node::And(left, right) => left.matches(frame) && right.matches(frame),
            Node::Or(left, right) => left.matches(frame) || right.matches(frame),
            Node::Not(inner) => !inner.matches(frame),
            Node::Primitive(primitive) => primitive.matches(frame),
        }
    }
}

/// A compiled filter
///
/// Immutable once compiled, so one expression can be shared by any number
/// of readers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterExpression {
    root: Option<Node>,
}
impl FilterExpression {
    /// Compiles the filter given as command line tokens
    ///
    /// The tokens are joined as if separated by whitespace, so
    /// `["tcp and", "port 80"]` and `["tcp", "and", "port", "80"]` compile to
    /// the same filter.
    pub fn compile<S: AsRef<str>>(tokens: &[S]) -> Result<Self, FilterError> {
        let lexemes = lexer::lex(tokens);
        let root = parser::parse(&lexemes)?;
        Ok(Self { root })
    }
    /// A filter that matches everything
    pub fn match_all() -> Self {
        Self::default()
    }
    /// True for the empty filter
    pub fn is_match_all(&self) -> bool {
        self.root.is_none()
    }
    pub fn matches(&self, frame: &DecodedFrame) -> bool {
        self.root.as_ref().is_none_or(|root| root.matches(frame))
    }
    /// Decodes `data` as an Ethernet frame and tests it
    pub fn matches_bytes(&self, data: &[u8]) -> bool {
        self.matches(&Decoder::default().decode_bytes(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CLIENT_MAC, SERVER_MAC, icmp_echo_frame, tcp_syn_frame, udp_frame};

    fn compile(filter: &str) -> FilterExpression {
        FilterExpression::compile(&[filter]).unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = FilterExpression::compile::<&str>(&[]).unwrap();
        assert!(filter.is_match_all());
        assert!(filter.matches_bytes(&tcp_syn_frame()));
        assert!(filter.matches_bytes(&[0u8; 3]));
        assert!(filter.matches(&DecodedFrame::default()));
    }

    #[test]
    fn protocol_filters() {
        let tcp = tcp_syn_frame();
        let udp = udp_frame();
        let icmp = icmp_echo_frame();
        assert!(compile("tcp").matches_bytes(&tcp));
        assert!(!compile("tcp").matches_bytes(&udp));
        assert!(compile("udp").matches_bytes(&udp));
        assert!(compile("icmp").matches_bytes(&icmp));
        assert!(!compile("icmp").matches_bytes(&tcp));
        for frame in [&tcp, &udp, &icmp] {
            assert!(compile("ip").matches_bytes(frame));
            assert!(compile("ether").matches_bytes(frame));
        }
        assert!(compile("ip proto 17").matches_bytes(&udp));
        assert!(!compile("ip proto tcp").matches_bytes(&udp));
    }

    #[test]
    fn absent_protocol_never_matches() {
        // Too short for anything
        let runt = [0u8; 10];
        for filter in ["tcp", "ip", "ether", "port 80", "host 192.168.1.10"] {
            assert!(!compile(filter).matches_bytes(&runt), "{filter}");
        }
        assert!(compile("not tcp").matches_bytes(&runt));
    }

    #[test]
    fn port_filters() {
        let syn = tcp_syn_frame();
        assert!(compile("port 80").matches_bytes(&syn));
        assert!(compile("port 40000").matches_bytes(&syn));
        assert!(compile("dst port 80").matches_bytes(&syn));
        assert!(!compile("src port 80").matches_bytes(&syn));
        assert!(compile("tcp port http").matches_bytes(&syn));
        assert!(!compile("udp port 80").matches_bytes(&syn));
        assert!(!compile("src and dst port 80").matches_bytes(&syn));
        assert!(compile("udp dst port domain").matches_bytes(&udp_frame()));
        // ICMP has no ports
        assert!(!compile("port 0").matches_bytes(&icmp_echo_frame()));
    }

    #[test]
    fn address_filters() {
        let syn = tcp_syn_frame();
        assert!(compile("host 192.168.1.10").matches_bytes(&syn));
        assert!(compile("src 192.168.1.10").matches_bytes(&syn));
        assert!(!compile("dst host 192.168.1.10").matches_bytes(&syn));
        assert!(compile("dst 93.184.216.34").matches_bytes(&syn));
        assert!(compile("net 192.168.0.0/16").matches_bytes(&syn));
        assert!(compile("src net 192.168.1.0/24").matches_bytes(&syn));
        assert!(!compile("dst net 10.0.0.0/8").matches_bytes(&syn));

        let client = MacAddr(CLIENT_MAC).to_string();
        let server = MacAddr(SERVER_MAC).to_string();
        assert!(compile(&format!("ether src {client}")).matches_bytes(&syn));
        assert!(compile(&format!("ether dst host {server}")).matches_bytes(&syn));
        assert!(compile(&format!("ether host {server}")).matches_bytes(&syn));
        assert!(!compile(&format!("ether src {server}")).matches_bytes(&syn));
    }

    #[test]
    fn ip_qualified_addresses() {
        let syn = tcp_syn_frame();
        assert!(compile("ip host 192.168.1.10").matches_bytes(&syn));
        assert!(compile("ip src 192.168.1.10").matches_bytes(&syn));
        assert!(!compile("ip dst 192.168.1.10").matches_bytes(&syn));
        assert!(compile("ip dst net 93.184.0.0/16").matches_bytes(&syn));
        assert!(!compile("ip src net 93.184.0.0/16").matches_bytes(&syn));
        assert!(compile("ip src 192.168.1.10 and tcp").matches_bytes(&syn));
        assert!(!compile("ip host 192.168.1.10").matches_bytes(&[0u8; 10]));
    }

    #[test]
    fn boolean_combinations() {
        let syn = tcp_syn_frame();
        let udp = udp_frame();
        let filter = FilterExpression::compile(&["tcp", "and", "not", "port", "22"]).unwrap();
        assert!(filter.matches_bytes(&syn));
        assert!(!filter.matches_bytes(&udp));

        let either = compile("(udp or icmp) and host 192.168.1.10");
        assert!(either.matches_bytes(&udp));
        assert!(either.matches_bytes(&icmp_echo_frame()));
        assert!(!either.matches_bytes(&syn));

        assert!(compile("!tcp || port 80").matches_bytes(&syn));
        assert!(compile("TCP AND DST PORT 80").matches_bytes(&syn));
    }

    #[test]
    fn fragments_match_ip_but_not_ports() {
        let mut frame = udp_frame();
        frame[14 + 6] = 0x00;
        frame[14 + 7] = 0x64;
        assert!(compile("ip proto udp").matches_bytes(&frame));
        assert!(!compile("udp").matches_bytes(&frame));
        assert!(!compile("port 53").matches_bytes(&frame));
    }

    #[test]
    fn compile_errors_are_reported() {
        let err = FilterExpression::compile(&["tcp", "and"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid filter syntax: expression ends after `and`"
        );
        let err = FilterExpression::compile(&["port", "eighty"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid filter syntax: `eighty` is not a valid port"
        );
    }
}
