//! A safe decoder for TDH-style event-tracing schema metadata.
//!
//! The metadata source hands out raw, self-describing binary buffers: a
//! fixed header, an array of fixed-size records, and a trailing region of
//! null-terminated UTF-16 strings addressed by byte offset. Buffer sizes are
//! unknown until queried, so every operation follows a two-phase "ask the
//! required size, then fill" protocol. This crate negotiates those buffers
//! and decodes them into owned provider / event / field values, without
//! trusting a single offset, count, or index in the input.
//!
//! The source itself is abstracted behind [`MetadataSource`]; anything that
//! can answer the three query operations (an FFI wrapper over the native
//! helper library, or an in-memory fake in tests) plugs in:
//!
//! ```ignore
//! let reader = TdhReader::new(source);
//! for provider in reader.providers()?.iter() {
//!     let events = reader.provider_events(&provider.guid)?;
//!     println!("{}: {} events", provider.name, events.len());
//! }
//! ```
//!
//! Enumeration results are memoized per reader: the same input never
//! triggers a second underlying query, and concurrent first callers share a
//! single in-flight query.

pub mod err;
mod event;
mod memo;
mod negotiate;
mod provider;
mod reader;
mod source;
mod utils;

pub use err::TdhError;
pub use event::{Event, EventDescriptor, Field, FieldDimension, FieldType, InType, PropertyFlags};
pub use memo::Memo;
pub use negotiate::negotiate_buffer;
pub use provider::{Provider, SchemaSource};
pub use reader::TdhReader;
pub use source::{ERROR_INSUFFICIENT_BUFFER, ERROR_SUCCESS, MetadataSource, QueryStatus};

#[cfg(test)]
fn ensure_env_logger_initialized() {
    use std::io::Write;
    use std::sync::Once;

    static LOGGER_INIT: Once = Once::new();

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
