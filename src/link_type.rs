//! Link-layer header types announced in the capture's global header
//!
//! [Source](https://www.tcpdump.org/linktypes.html)
macro_rules! link_type {
    (
        $(
            $(#[$docs:meta])*
            $name:ident = $value:literal
        ),*
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum LinkType {
            $(
                $(#[$docs])*
                $name,
            )*
            /// A link type this crate has no name for
            Unknown(u32),
        }

        impl From<u32> for LinkType {
            fn from(value: u32) -> Self {
                match value {
                    $(
                        $value => LinkType::$name,
                    )*
                    other => LinkType::Unknown(other),
                }
            }
        }
        impl From<LinkType> for u32 {
            fn from(value: LinkType) -> Self {
                match value {
                    $(
                        LinkType::$name => $value,
                    )*
                    LinkType::Unknown(other) => other,
                }
            }
        }
    };
}
link_type! {
    /// BSD loopback encapsulation
    Null = 0,
    /// IEEE 802.3 Ethernet
    Ethernet = 1,
    Ppp = 9,
    /// Raw IP, the version is taken from the first nibble
    Raw = 101,
    Ieee802_11 = 105,
    Loop = 108,
    /// Linux "cooked" capture
    LinuxSll = 113,
    Ieee802_11Radiotap = 127,
    /// Raw IPv4
    Ipv4 = 228,
    /// Raw IPv6
    Ipv6 = 229,
    LinuxSll2 = 276
}

impl Default for LinkType {
    fn default() -> Self {
        LinkType::Ethernet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_values() {
        assert_eq!(LinkType::from(1u32), LinkType::Ethernet);
        assert_eq!(LinkType::from(228u32), LinkType::Ipv4);
        assert_eq!(LinkType::from(4242u32), LinkType::Unknown(4242));
        assert_eq!(u32::from(LinkType::Raw), 101);
        assert_eq!(u32::from(LinkType::Unknown(4242)), 4242);
    }
}
