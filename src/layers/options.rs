//! Type-length-value walking shared by the IPv4 and TCP option areas
use std::fmt::Write;

/// One undecoded entry of an option area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawOption<'a> {
    EndOfList,
    NoOp,
    Value { kind: u8, data: &'a [u8] },
    /// A length byte that can not be right, carries everything from the kind byte on
    Malformed(&'a [u8]),
}

/// Walks an option area
///
/// Kinds 0 (end of list) and 1 (no-op) are single bytes, every other kind
/// is followed by a length byte that counts the kind and length bytes too.
/// Everything after an end of list is padding and is not visited.
pub(crate) struct RawOptions<'a> {
    bytes: &'a [u8],
}
impl<'a> RawOptions<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}
impl<'a> Iterator for RawOptions<'a> {
    type Item = RawOption<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&kind, rest) = self.bytes.split_first()?;
        match kind {
            0 => {
                self.bytes = &[];
                Some(RawOption::EndOfList)
            }
            1 => {
                self.bytes = rest;
                Some(RawOption::NoOp)
            }
            _ => {
                let length = rest.first().map(|&length| usize::from(length));
                match length {
                    Some(length) if length >= 2 && length <= self.bytes.len() => {
                        let data = &self.bytes[2..length];
                        self.bytes = &self.bytes[length..];
                        Some(RawOption::Value { kind, data })
                    }
                    _ => {
                        let malformed = self.bytes;
                        self.bytes = &[];
                        Some(RawOption::Malformed(malformed))
                    }
                }
            }
        }
    }
}

/// Lowercase hex without separators
pub(crate) fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
