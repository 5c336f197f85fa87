//! Recursive descent over the lexemes of a filter
use std::str::FromStr;

use ipnetwork::Ipv4Network;

use super::{
    Direction, FilterError, Node, Primitive, Protocol, Transport,
    lexer::Lexeme,
};
use crate::layers::ipv4::ip_protocol;

/// Well known port names accepted in place of a number
const SERVICES: &[(&str, u16)] = &[
    ("ftp-data", 20),
    ("ftp", 21),
    ("ssh", 22),
    ("telnet", 23),
    ("smtp", 25),
    ("domain", 53),
    ("bootps", 67),
    ("bootpc", 68),
    ("http", 80),
    ("pop3", 110),
    ("ntp", 123),
    ("imap", 143),
    ("snmp", 161),
    ("https", 443),
];

/// Parses `lexemes` into a predicate tree, `None` for an empty filter
pub(crate) fn parse(lexemes: &[Lexeme]) -> Result<Option<Node>, FilterError> {
    if lexemes.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser {
        lexemes,
        position: 0,
    };
    let node = parser.or_expr()?;
    match parser.peek() {
        None => Ok(Some(node)),
        Some(lexeme) if lexeme.is(")") => Err(FilterError::UnbalancedParenthesis {
            position: lexeme.position,
        }),
        Some(lexeme) => Err(FilterError::unexpected(lexeme)),
    }
}

struct Parser<'a> {
    lexemes: &'a [Lexeme],
    position: usize,
}
impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Lexeme> {
        self.lexemes.get(self.position)
    }
    fn peek_is(&self, keywords: &[&str]) -> bool {
        self.peek()
            .is_some_and(|lexeme| keywords.iter().any(|keyword| lexeme.is(keyword)))
    }
    /// Consumes the next lexeme if it is one of `keywords`
    fn accept(&mut self, keywords: &[&str]) -> bool {
        let found = self.peek_is(keywords);
        if found {
            self.position += 1;
        }
        found
    }
    fn next(&mut self) -> Result<&'a Lexeme, FilterError> {
        match self.lexemes.get(self.position) {
            Some(lexeme) => {
                self.position += 1;
                Ok(lexeme)
            }
            None => Err(self.unexpected_end()),
        }
    }
    fn unexpected_end(&self) -> FilterError {
        FilterError::UnexpectedEnd {
            after: self
                .position
                .checked_sub(1)
                .and_then(|last| self.lexemes.get(last))
                .map(|lexeme| lexeme.text.clone())
                .unwrap_or_default(),
        }
    }
    /// Consumes `keyword` or fails on whatever is there instead
    fn expect_keyword(&mut self, keyword: &str) -> Result<(), FilterError> {
        let lexeme = self.next()?;
        if lexeme.is(keyword) {
            Ok(())
        } else {
            Err(FilterError::unexpected(lexeme))
        }
    }

    fn or_expr(&mut self) -> Result<Node, FilterError> {
        let mut node = self.and_expr()?;
        while self.accept(&["or", "||"]) {
            let right = self.and_expr()?;
            node = Node::Or(Box::new(node), Box::new(right));
        }
        Ok(node)
    }
    fn and_expr(&mut self) -> Result<Node, FilterError> {
        let mut node = self.unary()?;
        while self.accept(&["and", "&&"]) {
            let right = self.unary()?;
            node = Node::And(Box::new(node), Box::new(right));
        }
        Ok(node)
    }
    fn unary(&mut self) -> Result<Node, FilterError> {
        if self.accept(&["not", "!"]) {
            return Ok(Node::Not(Box::new(self.unary()?)));
        }
        if let Some(open) = self.peek().filter(|lexeme| lexeme.is("(")) {
            self.position += 1;
            let node = self.or_expr()?;
            return match self.peek() {
                Some(lexeme) if lexeme.is(")") => {
                    self.position += 1;
                    Ok(node)
                }
                Some(lexeme) => Err(FilterError::unexpected(lexeme)),
                None => Err(FilterError::UnbalancedParenthesis {
                    position: open.position,
                }),
            };
        }
        self.primitive()
    }

    /// A primitive, or `ip` qualifying an address primitive
    ///
    /// `ip host A` is `ip and host A`.
    fn primitive(&mut self) -> Result<Node, FilterError> {
        let qualified = self.peek_is(&["ip"])
            && self.lexemes.get(self.position + 1).is_some_and(|lexeme| {
                ["src", "dst", "host", "net"]
                    .iter()
                    .any(|keyword| lexeme.is(keyword))
            });
        if !qualified {
            return self.simple_primitive().map(Node::Primitive);
        }
        self.position += 1;
        let direction = self.direction();
        let address = self.address(direction)?;
        Ok(Node::And(
            Box::new(Node::Primitive(Primitive::Protocol(Protocol::Ip))),
            Box::new(Node::Primitive(address)),
        ))
    }

    fn simple_primitive(&mut self) -> Result<Primitive, FilterError> {
        if self.peek_is(&["src", "dst"]) {
            let direction = self.direction();
            return if self.accept(&["port"]) {
                self.port(None, direction)
            } else {
                self.address(direction)
            };
        }
        let lexeme = self.next()?;
        let keyword = lexeme.text.to_ascii_lowercase();
        match keyword.as_str() {
            "ether" => {
                if !self.peek_is(&["src", "dst", "host"]) {
                    return Ok(Primitive::Protocol(Protocol::Ether));
                }
                let direction = self.direction();
                self.accept(&["host"]);
                let address = self.value("MAC address")?;
                Ok(Primitive::EtherHost { direction, address })
            }
            "ip" => {
                if !self.accept(&["proto"]) {
                    return Ok(Primitive::Protocol(Protocol::Ip));
                }
                let protocol = self.next()?;
                let number = match protocol.text.to_ascii_lowercase().as_str() {
                    "tcp" => ip_protocol::TCP,
                    "udp" => ip_protocol::UDP,
                    "icmp" => ip_protocol::ICMP,
                    other => other
                        .parse()
                        .map_err(|_| FilterError::invalid(protocol, "IP protocol"))?,
                };
                Ok(Primitive::IpProtocol(number))
            }
            "tcp" | "udp" => {
                let transport = if keyword == "tcp" {
                    Transport::Tcp
                } else {
                    Transport::Udp
                };
                if !self.peek_is(&["src", "dst", "port"]) {
                    return Ok(Primitive::Protocol(transport.into()));
                }
                let direction = self.direction();
                self.expect_keyword("port")?;
                self.port(Some(transport), direction)
            }
            "icmp" => Ok(Primitive::Protocol(Protocol::Icmp)),
            "host" | "net" => {
                self.position -= 1;
                self.address(Direction::SrcOrDst)
            }
            "port" => self.port(None, Direction::SrcOrDst),
            _ => Err(FilterError::unexpected(lexeme)),
        }
    }

    /// `src`, `dst`, `src or dst`, `src and dst`, or nothing
    fn direction(&mut self) -> Direction {
        let first = match self.peek() {
            Some(lexeme) if lexeme.is("src") => Direction::Src,
            Some(lexeme) if lexeme.is("dst") => Direction::Dst,
            _ => return Direction::SrcOrDst,
        };
        self.position += 1;
        let other = if first == Direction::Src { "dst" } else { "src" };
        let combined = self
            .lexemes
            .get(self.position + 1)
            .is_some_and(|lexeme| lexeme.is(other));
        if combined {
            if self.accept(&["or"]) {
                self.position += 1;
                return Direction::SrcOrDst;
            }
            if self.accept(&["and"]) {
                self.position += 1;
                return Direction::SrcAndDst;
            }
        }
        first
    }
    fn port(
        &mut self,
        transport: Option<Transport>,
        direction: Direction,
    ) -> Result<Primitive, FilterError> {
        let lexeme = self.next()?;
        let port = match lexeme.text.parse::<u16>() {
            Ok(port) => port,
            Err(_) => SERVICES
                .iter()
                .find(|(name, _)| lexeme.is(name))
                .map(|(_, port)| *port)
                .ok_or_else(|| FilterError::invalid(lexeme, "port"))?,
        };
        Ok(Primitive::Port {
            transport,
            direction,
            port,
        })
    }
    /// `net N`, `host A` or a bare address
    fn address(&mut self, direction: Direction) -> Result<Primitive, FilterError> {
        if self.accept(&["net"]) {
            return self.net(direction);
        }
        self.accept(&["host"]);
        let address = self.value("IPv4 address")?;
        Ok(Primitive::Host { direction, address })
    }
    fn net(&mut self, direction: Direction) -> Result<Primitive, FilterError> {
        let network: Ipv4Network = self.value("network")?;
        Ok(Primitive::Net { direction, network })
    }
    fn value<T: FromStr>(&mut self, expected: &'static str) -> Result<T, FilterError> {
        let lexeme = self.next()?;
        lexeme
            .text
            .parse()
            .map_err(|_| FilterError::invalid(lexeme, expected))
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::filter::lexer::lex;

    fn parse_str(filter: &str) -> Result<Option<Node>, FilterError> {
        parse(&lex(&[filter]))
    }
    fn primitive(filter: &str) -> Primitive {
        match parse_str(filter) {
            Ok(Some(Node::Primitive(primitive))) => primitive,
            other => panic!("{filter}: {other:?}"),
        }
    }

    #[test]
    fn empty_filter() {
        assert_eq!(parse_str("").unwrap(), None);
    }

    #[test]
    fn protocols() {
        assert_eq!(primitive("tcp"), Primitive::Protocol(Protocol::Tcp));
        assert_eq!(primitive("UDP"), Primitive::Protocol(Protocol::Udp));
        assert_eq!(primitive("icmp"), Primitive::Protocol(Protocol::Icmp));
        assert_eq!(primitive("ip"), Primitive::Protocol(Protocol::Ip));
        assert_eq!(primitive("ether"), Primitive::Protocol(Protocol::Ether));
        assert_eq!(primitive("ip proto 47"), Primitive::IpProtocol(47));
        assert_eq!(primitive("ip proto udp"), Primitive::IpProtocol(17));
    }

    #[test]
    fn ports_with_qualifiers() {
        assert_eq!(
            primitive("port 80"),
            Primitive::Port {
                transport: None,
                direction: Direction::SrcOrDst,
                port: 80
            }
        );
        assert_eq!(
            primitive("tcp dst port https"),
            Primitive::Port {
                transport: Some(Transport::Tcp),
                direction: Direction::Dst,
                port: 443
            }
        );
        assert_eq!(
            primitive("src and dst port 53"),
            Primitive::Port {
                transport: None,
                direction: Direction::SrcAndDst,
                port: 53
            }
        );
        assert_eq!(
            primitive("udp src or dst port 123"),
            Primitive::Port {
                transport: Some(Transport::Udp),
                direction: Direction::SrcOrDst,
                port: 123
            }
        );
    }

    #[test]
    fn hosts_and_networks() {
        let address = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(
            primitive("host 10.0.0.1"),
            Primitive::Host {
                direction: Direction::SrcOrDst,
                address
            }
        );
        assert_eq!(
            primitive("src 10.0.0.1"),
            Primitive::Host {
                direction: Direction::Src,
                address
            }
        );
        assert_eq!(
            primitive("dst host 10.0.0.1"),
            Primitive::Host {
                direction: Direction::Dst,
                address
            }
        );
        assert_eq!(
            primitive("net 192.168.0.0/16"),
            Primitive::Net {
                direction: Direction::SrcOrDst,
                network: "192.168.0.0/16".parse().unwrap()
            }
        );
        assert_eq!(
            primitive("ether src 00:1a:2b:3c:4d:5e"),
            Primitive::EtherHost {
                direction: Direction::Src,
                address: "00:1a:2b:3c:4d:5e".parse().unwrap()
            }
        );
    }

    #[test]
    fn ip_qualifies_addresses() {
        let ip_and = |address: Primitive| {
            Node::And(
                Box::new(Node::Primitive(Primitive::Protocol(Protocol::Ip))),
                Box::new(Node::Primitive(address)),
            )
        };
        let address = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(
            parse_str("ip host 10.0.0.1").unwrap(),
            Some(ip_and(Primitive::Host {
                direction: Direction::SrcOrDst,
                address
            }))
        );
        assert_eq!(
            parse_str("IP src 10.0.0.1").unwrap(),
            Some(ip_and(Primitive::Host {
                direction: Direction::Src,
                address
            }))
        );
        assert_eq!(
            parse_str("ip dst net 10.0.0.0/8").unwrap(),
            Some(ip_and(Primitive::Net {
                direction: Direction::Dst,
                network: "10.0.0.0/8".parse().unwrap()
            }))
        );
        assert_eq!(
            parse_str("ip src or dst 10.0.0.1").unwrap(),
            Some(ip_and(Primitive::Host {
                direction: Direction::SrcOrDst,
                address
            }))
        );
        // still a plain protocol when followed by an operator
        assert!(matches!(
            parse_str("ip and tcp").unwrap(),
            Some(Node::And(left, _)) if *left == Node::Primitive(Primitive::Protocol(Protocol::Ip))
        ));
        assert_eq!(
            parse_str("ip dst port 80"),
            Err(FilterError::InvalidValue {
                token: "port".into(),
                expected: "IPv4 address"
            })
        );
    }

    #[test]
    fn direction_does_not_swallow_boolean_operators() {
        let node = parse_str("src 10.0.0.1 or dst 10.0.0.2").unwrap().unwrap();
        assert!(matches!(node, Node::Or(..)));
    }

    #[test]
    fn precedence() {
        // not binds tighter than and, and tighter than or
        let node = parse_str("not tcp and udp or icmp").unwrap().unwrap();
        let Node::Or(left, right) = node else {
            panic!("expected or");
        };
        assert_eq!(*right, Node::Primitive(Primitive::Protocol(Protocol::Icmp)));
        let Node::And(not, udp) = *left else {
            panic!("expected and");
        };
        assert!(matches!(*not, Node::Not(_)));
        assert_eq!(*udp, Node::Primitive(Primitive::Protocol(Protocol::Udp)));

        let grouped = parse_str("!(tcp || udp) && icmp").unwrap().unwrap();
        assert!(matches!(grouped, Node::And(..)));
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(
            parse_str("tcp udp"),
            Err(FilterError::UnexpectedToken {
                token: "udp".into(),
                position: 2
            })
        );
        assert_eq!(
            parse_str("tcp and"),
            Err(FilterError::UnexpectedEnd { after: "and".into() })
        );
        assert_eq!(
            parse_str("(tcp or udp"),
            Err(FilterError::UnbalancedParenthesis { position: 1 })
        );
        assert_eq!(
            parse_str("tcp)"),
            Err(FilterError::UnbalancedParenthesis { position: 2 })
        );
        assert_eq!(
            parse_str("port 70000"),
            Err(FilterError::InvalidValue {
                token: "70000".into(),
                expected: "port"
            })
        );
        assert_eq!(
            parse_str("host 300.1.1.1"),
            Err(FilterError::InvalidValue {
                token: "300.1.1.1".into(),
                expected: "IPv4 address"
            })
        );
        assert!(matches!(
            parse_str("ether host 00:11"),
            Err(FilterError::InvalidValue { expected: "MAC address", .. })
        ));
        assert!(matches!(
            parse_str("frobnicate"),
            Err(FilterError::UnexpectedToken { position: 1, .. })
        ));
    }
}
