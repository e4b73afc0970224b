use log::trace;

use crate::err::{Result, TdhError};
use crate::source::QueryStatus;

/// Run the two-phase "query required size, then fill" protocol against a
/// single query operation and return the filled buffer.
///
/// Phase one calls `query` with no buffer; the operation must respond with
/// [`QueryStatus::InsufficientBuffer`] and store the required byte size.
/// Any other status — including success — means the operation did not follow
/// the protocol and yields [`TdhError::SizeQueryFailed`] (a "successful"
/// zero-size answer is never valid). Phase two calls `query` again with a
/// buffer of exactly the reported size; anything but success yields
/// [`TdhError::FillFailed`].
///
/// All three metadata operations share this contract, so call sites only
/// provide the closure that forwards to the concrete operation.
pub fn negotiate_buffer<F>(operation: &'static str, mut query: F) -> Result<Vec<u8>>
where
    F: FnMut(Option<&mut [u8]>, &mut u32) -> QueryStatus,
{
    let mut size = 0u32;
    match query(None, &mut size) {
        QueryStatus::InsufficientBuffer => {}
        status => {
            return Err(TdhError::SizeQueryFailed {
                operation,
                status: status.code(),
            });
        }
    }

    trace!("{operation}: source reported a required size of {size} bytes");

    let needed = size;
    let mut buffer = vec![0u8; needed as usize];
    match query(Some(&mut buffer), &mut size) {
        QueryStatus::Success => Ok(buffer),
        status => Err(TdhError::FillFailed {
            operation,
            size: needed,
            status: status.code(),
        }),
    }
}
