use thiserror::Error;

pub type Result<T> = std::result::Result<T, TdhError>;

/// Errors produced while negotiating and decoding metadata buffers.
///
/// Every variant is fatal to the operation that produced it; the crate never
/// returns partial lists. The enum is `Clone` so that a failed enumeration can
/// be memoized and replayed to later callers exactly like a success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TdhError {
    #[error("size query for {operation} did not report a required size (status {status})")]
    SizeQueryFailed { operation: &'static str, status: u32 },

    #[error("{operation} failed to fill a {size}-byte buffer (status {status})")]
    FillFailed {
        operation: &'static str,
        size: u32,
        status: u32,
    },

    #[error(
        "array of {count} x {record_size}-byte {what} records at offset {offset} out of bounds (len={len})"
    )]
    ArrayOutOfBounds {
        what: &'static str,
        offset: usize,
        record_size: usize,
        count: usize,
        len: usize,
    },

    #[error("string offset {offset} for {what} out of bounds (len={len})")]
    StringOffsetOutOfBounds {
        what: &'static str,
        offset: usize,
        len: usize,
    },

    #[error("invalid utf-16 string for {what} at offset {offset}")]
    InvalidUtf16String { what: &'static str, offset: usize },

    #[error("invalid GUID for {what} at offset {offset}")]
    InvalidGuid { what: &'static str, offset: usize },

    #[error("buffer too small for {what} at offset {offset} (need {need} bytes, have {have})")]
    Truncated {
        what: &'static str,
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("provider {provider} has unknown schema source code {code}")]
    UnknownSchemaSource { provider: String, code: u32 },

    #[error("field length/count reference {index} points past the {decoded} fields decoded so far")]
    FieldIndexOutOfBounds { index: u16, decoded: usize },

    #[error("failed to enumerate events for provider {guid}, caused by:\n\t {source}")]
    Provider {
        guid: String,
        source: Box<TdhError>,
    },

    #[error(
        "failed to decode event {id} (version {version}) of provider {provider}, caused by:\n\t {source}"
    )]
    Event {
        provider: String,
        id: u16,
        version: u8,
        source: Box<TdhError>,
    },
}
