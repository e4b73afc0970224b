use std::char::decode_utf16;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::err::{Result, TdhError};

/// Read a null-terminated UTF-16LE string starting at `offset`.
///
/// Offsets up to and including the buffer length are valid starting points
/// (an offset equal to the length decodes as an empty string); anything past
/// that is [`TdhError::StringOffsetOutOfBounds`]. The string ends at the
/// first NUL code unit. There is no length field, so the scan is bounded by
/// the buffer itself: running out of bytes before a terminator ends the
/// string there, and a trailing odd byte cannot form a code unit.
pub(crate) fn read_wide_string_at(buf: &[u8], offset: usize, what: &'static str) -> Result<String> {
    if offset > buf.len() {
        return Err(TdhError::StringOffsetOutOfBounds {
            what,
            offset,
            len: buf.len(),
        });
    }

    let mut cursor = Cursor::new(&buf[offset..]);
    let mut units = Vec::new();
    loop {
        match cursor.read_u16::<LittleEndian>() {
            Ok(0) => break,
            Ok(unit) => units.push(unit),
            // Buffer end reached before a terminator.
            Err(_) => break,
        }
    }

    decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|_| TdhError::InvalidUtf16String { what, offset })
}
