use std::io::{ErrorKind, Read};

/// Reads until `buf` is full or the reader reaches end of input
///
/// Returns the number of bytes read. Unlike [Read::read_exact] a short read
/// reports how many bytes were actually available, which is needed to tell a
/// clean end of file apart from a cut off record.
pub(crate) fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Length of a buffer as a record length field, saturating at `u32::MAX`
pub(crate) fn saturating_length(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
