//! Byte-slice utilities for bounds-oriented parsing.
//!
//! Two layers, as elsewhere in this codebase:
//! - **Option layer** (`read_*`): zero-cost helpers that return `Option<T>`.
//! - **Result layer** (`*_r`): wrappers that map `None` to
//!   [`TdhError::Truncated`] with a `what` label for diagnostics.
//!
//! All numeric reads are **little-endian**; offsets are interpreted relative
//! to the slice you pass in.

use winstructs::guid::Guid;

use crate::err::{Result, TdhError};

/// Read `N` raw bytes at `offset`.
///
/// Returns `None` if the range is out of bounds.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    let bytes: [u8; N] = buf.get(offset..end)?.try_into().ok()?;
    Some(bytes)
}

/// Read a single byte at `offset`.
pub(crate) fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

/// Read a `u16` (little-endian) at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_le_bytes(read_array::<2>(buf, offset)?))
}

/// Read a `u32` (little-endian) at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(read_array::<4>(buf, offset)?))
}

/// Read a `u64` (little-endian) at `offset`.
pub(crate) fn read_u64_le(buf: &[u8], offset: usize) -> Option<u64> {
    Some(u64::from_le_bytes(read_array::<8>(buf, offset)?))
}

#[inline]
fn truncated(what: &'static str, offset: usize, need: usize, len: usize) -> TdhError {
    TdhError::Truncated {
        what,
        offset,
        need,
        have: len.saturating_sub(offset),
    }
}

/// Borrow `len` bytes at `offset`, or return [`TdhError::Truncated`].
pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))
}

/// Read a single byte at `offset`, or return [`TdhError::Truncated`].
pub(crate) fn read_u8_r(buf: &[u8], offset: usize, what: &'static str) -> Result<u8> {
    read_u8(buf, offset).ok_or_else(|| truncated(what, offset, 1, buf.len()))
}

/// Read a `u16` (little-endian) at `offset`, or return [`TdhError::Truncated`].
pub(crate) fn read_u16_le_r(buf: &[u8], offset: usize, what: &'static str) -> Result<u16> {
    read_u16_le(buf, offset).ok_or_else(|| truncated(what, offset, 2, buf.len()))
}

/// Read a `u32` (little-endian) at `offset`, or return [`TdhError::Truncated`].
pub(crate) fn read_u32_le_r(buf: &[u8], offset: usize, what: &'static str) -> Result<u32> {
    read_u32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

/// Read a `u64` (little-endian) at `offset`, or return [`TdhError::Truncated`].
pub(crate) fn read_u64_le_r(buf: &[u8], offset: usize, what: &'static str) -> Result<u64> {
    read_u64_le(buf, offset).ok_or_else(|| truncated(what, offset, 8, buf.len()))
}

/// Read a 16-byte Windows GUID at `offset`.
pub(crate) fn read_guid_r(buf: &[u8], offset: usize, what: &'static str) -> Result<Guid> {
    let bytes = read_array::<16>(buf, offset).ok_or_else(|| truncated(what, offset, 16, buf.len()))?;
    Guid::from_buffer(&bytes).map_err(|_| TdhError::InvalidGuid { what, offset })
}

/// Validate and iterate an array of `count` fixed-size records starting at
/// `offset`.
///
/// Bounds are checked up front for the whole array (overflow included): if
/// even the last record would read past the buffer end, the call fails with
/// [`TdhError::ArrayOutOfBounds`] and the caller observes zero records.
/// On success the returned iterator yields exactly `count` borrowed
/// `record_size`-byte slices in order, with no cursor state of its own —
/// re-iteration means calling this again with the same inputs.
pub(crate) fn record_array<'a>(
    buf: &'a [u8],
    offset: usize,
    record_size: usize,
    count: usize,
    what: &'static str,
) -> Result<impl Iterator<Item = &'a [u8]>> {
    let out_of_bounds = || TdhError::ArrayOutOfBounds {
        what,
        offset,
        record_size,
        count,
        len: buf.len(),
    };

    let end = count
        .checked_mul(record_size)
        .and_then(|total| offset.checked_add(total))
        .ok_or_else(out_of_bounds)?;
    if end > buf.len() {
        return Err(out_of_bounds());
    }

    Ok((0..count).map(move |i| {
        let start = offset + i * record_size;
        &buf[start..start + record_size]
    }))
}
