use bitflags::bitflags;
use log::trace;
use serde::Serialize;

use crate::err::{Result, TdhError};
use crate::utils::bytes;
use crate::utils::wide_string::read_wide_string_at;

/// PROVIDER_EVENT_INFO: event count + reserved word.
const EVENT_ENUMERATION_HEADER_SIZE: usize = 8;
/// EVENT_DESCRIPTOR: id, version, channel, level, opcode, task, keyword.
const EVENT_DESCRIPTOR_SIZE: usize = 16;
/// TRACE_EVENT_INFO up to (excluding) the property info array.
const EVENT_DETAIL_HEADER_SIZE: usize = 112;
/// EVENT_PROPERTY_INFO: flags, name offset, type union, count, length, tags.
const PROPERTY_RECORD_SIZE: usize = 24;

/// The top 16 keyword bits are reserved by the tracing infrastructure and
/// carry no provider semantics.
const KEYWORD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

bitflags! {
    /// EVENT_PROPERTY_INFO.Flags.
    ///
    /// Only the four length/count bits affect decoding; the rest are carried
    /// for completeness.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyFlags: u32 {
        const STRUCT = 0x1;
        const PARAM_LENGTH = 0x2;
        const PARAM_COUNT = 0x4;
        const WBEM_XML_FRAGMENT = 0x8;
        const PARAM_FIXED_LENGTH = 0x10;
        const PARAM_FIXED_COUNT = 0x20;
        const HAS_TAGS = 0x40;
        const HAS_CUSTOM_SCHEMA = 0x80;
    }
}

/// The documented TDH field in-types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InType {
    Null,
    UnicodeString,
    AnsiString,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Boolean,
    Binary,
    Guid,
    Pointer,
    FileTime,
    SystemTime,
    Sid,
    HexInt32,
    HexInt64,
    ManifestCountedString,
    ManifestCountedAnsiString,
    Reserved24,
    ManifestCountedBinary,
    CountedString,
    CountedAnsiString,
    ReversedCountedString,
    ReversedCountedAnsiString,
    NonNullTerminatedString,
    NonNullTerminatedAnsiString,
    UnicodeChar,
    AnsiChar,
    SizeT,
    HexDump,
    WbemSid,
}

impl InType {
    fn from_code(code: u16) -> Option<InType> {
        use InType::*;

        Some(match code {
            0 => Null,
            1 => UnicodeString,
            2 => AnsiString,
            3 => Int8,
            4 => UInt8,
            5 => Int16,
            6 => UInt16,
            7 => Int32,
            8 => UInt32,
            9 => Int64,
            10 => UInt64,
            11 => Float,
            12 => Double,
            13 => Boolean,
            14 => Binary,
            15 => Guid,
            16 => Pointer,
            17 => FileTime,
            18 => SystemTime,
            19 => Sid,
            20 => HexInt32,
            21 => HexInt64,
            22 => ManifestCountedString,
            23 => ManifestCountedAnsiString,
            24 => Reserved24,
            25 => ManifestCountedBinary,
            26 => CountedString,
            27 => CountedAnsiString,
            28 => ReversedCountedString,
            29 => ReversedCountedAnsiString,
            30 => NonNullTerminatedString,
            31 => NonNullTerminatedAnsiString,
            32 => UnicodeChar,
            33 => AnsiChar,
            34 => SizeT,
            35 => HexDump,
            36 => WbemSid,
            _ => return None,
        })
    }
}

/// A field's wire type: a documented in-type, or the raw code for values the
/// enumeration does not cover yet. Providers ship undocumented codes in the
/// wild, so an unmapped value is data, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    Known(InType),
    Raw(u16),
}

impl FieldType {
    pub fn from_code(code: u16) -> FieldType {
        InType::from_code(code).map_or(FieldType::Raw(code), FieldType::Known)
    }
}

/// How a field's byte length or repetition count is determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldDimension {
    /// Fixed value, straight from the schema record.
    Literal(u16),
    /// The named earlier sibling field holds the actual value at decode time.
    Named(String),
}

/// One element of an event's payload schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    /// Byte length of this field, when the schema declares one.
    /// Never `Some` together with `count`.
    pub length: Option<FieldDimension>,
    /// Array repetition of this field, when the schema declares one.
    /// Never `Some` together with `length`.
    pub count: Option<FieldDimension>,
}

/// The fixed-size descriptor record identifying one event of a provider.
///
/// `keyword` is the raw wire value; the masked form lives on [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventDescriptor {
    pub id: u16,
    pub version: u8,
    pub channel: u8,
    pub level: u8,
    pub opcode: u8,
    pub task: u16,
    pub keyword: u64,
}

impl EventDescriptor {
    pub(crate) fn from_record(record: &[u8], what: &'static str) -> Result<EventDescriptor> {
        Ok(EventDescriptor {
            id: bytes::read_u16_le_r(record, 0, what)?,
            version: bytes::read_u8_r(record, 2, what)?,
            channel: bytes::read_u8_r(record, 3, what)?,
            level: bytes::read_u8_r(record, 4, what)?,
            opcode: bytes::read_u8_r(record, 5, what)?,
            task: bytes::read_u16_le_r(record, 6, what)?,
            keyword: bytes::read_u64_le_r(record, 8, what)?,
        })
    }
}

/// One (id, version) pair of a provider, with its ordered field schema.
///
/// Distinct versions of the same id are distinct events and are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub provider_guid: String,
    pub id: u16,
    pub version: u8,
    pub name: Option<String>,
    /// Keyword with the reserved top 16 bits cleared.
    pub keyword: u64,
    pub fields: Vec<Field>,
}

/// Decode a negotiated event-enumeration buffer into its descriptor list.
pub(crate) fn parse_event_enumeration(buf: &[u8]) -> Result<Vec<EventDescriptor>> {
    let event_count = bytes::read_u32_le_r(buf, 0, "event enumeration header")? as usize;
    trace!("event enumeration buffer declares {event_count} descriptors");

    bytes::record_array(
        buf,
        EVENT_ENUMERATION_HEADER_SIZE,
        EVENT_DESCRIPTOR_SIZE,
        event_count,
        "event descriptor",
    )?
    .map(|record| EventDescriptor::from_record(record, "event descriptor"))
    .collect()
}

/// Decode a negotiated event-detail buffer into an [`Event`].
///
/// Identity (id/version) and the keyword are taken from the descriptor
/// embedded in the detail header, not from the descriptor that keyed the
/// query.
pub(crate) fn parse_event_detail(provider_guid: &str, buf: &[u8]) -> Result<Event> {
    let descriptor = EventDescriptor::from_record(
        bytes::slice_r(buf, 32, EVENT_DESCRIPTOR_SIZE, "event detail descriptor")?,
        "event detail descriptor",
    )?;

    let task_name_offset = bytes::read_u32_le_r(buf, 68, "task name offset")? as usize;
    let event_name_offset = bytes::read_u32_le_r(buf, 92, "event name offset")? as usize;
    let property_count = bytes::read_u32_le_r(buf, 100, "property count")?;
    let top_level_count = bytes::read_u32_le_r(buf, 104, "top level property count")? as usize;

    trace!(
        "event {}/{} declares {top_level_count} top-level of {property_count} properties",
        descriptor.id, descriptor.version
    );

    // An absent (zero) event name falls back to the task name.
    let name = if event_name_offset > 0 {
        Some(read_wide_string_at(buf, event_name_offset, "event name")?)
    } else if task_name_offset > 0 {
        Some(read_wide_string_at(buf, task_name_offset, "task name")?)
    } else {
        None
    };
    let name = name.map(|mut s| {
        s.truncate(s.trim_end_matches(' ').len());
        s
    });

    let records = bytes::record_array(
        buf,
        EVENT_DETAIL_HEADER_SIZE,
        PROPERTY_RECORD_SIZE,
        top_level_count,
        "event property info",
    )?;

    let mut fields: Vec<Field> = Vec::with_capacity(top_level_count);
    for record in records {
        let flags =
            PropertyFlags::from_bits_retain(bytes::read_u32_le_r(record, 0, "property flags")?);
        let name_offset = bytes::read_u32_le_r(record, 4, "property name offset")? as usize;
        let in_type = bytes::read_u16_le_r(record, 8, "property in-type")?;
        let count_raw = bytes::read_u16_le_r(record, 16, "property count")?;
        let length_raw = bytes::read_u16_le_r(record, 18, "property length")?;

        let field_name = read_wide_string_at(buf, name_offset, "property name")?;

        let length = resolve_dimension(
            flags,
            PropertyFlags::PARAM_FIXED_LENGTH,
            PropertyFlags::PARAM_LENGTH,
            length_raw,
            &fields,
        )?;
        let count = resolve_dimension(
            flags,
            PropertyFlags::PARAM_FIXED_COUNT,
            PropertyFlags::PARAM_COUNT,
            count_raw,
            &fields,
        )?;

        // The schema format guarantees a field never declares both; seeing
        // both resolved means the record was mis-decoded, not malformed input.
        assert!(
            length.is_none() || count.is_none(),
            "field `{field_name}` resolved both a length and a count"
        );

        // Append before looking at the next record, so later fields can
        // reference this one by index.
        fields.push(Field {
            name: field_name,
            field_type: FieldType::from_code(in_type),
            length,
            count,
        });
    }

    Ok(Event {
        provider_guid: provider_guid.to_string(),
        id: descriptor.id,
        version: descriptor.version,
        name,
        keyword: descriptor.keyword & KEYWORD_MASK,
        fields,
    })
}

/// Resolve one length-or-count dimension of a property record.
///
/// A fixed flag wins over a parameterized flag. A parameterized value is an
/// index into the fields decoded *before* this one; forward references do not
/// exist in this format, so an index at or past the current field count is
/// [`TdhError::FieldIndexOutOfBounds`].
fn resolve_dimension(
    flags: PropertyFlags,
    fixed: PropertyFlags,
    parameterized: PropertyFlags,
    raw: u16,
    decoded: &[Field],
) -> Result<Option<FieldDimension>> {
    if flags.contains(fixed) {
        return Ok(Some(FieldDimension::Literal(raw)));
    }

    if flags.contains(parameterized) {
        let index = raw as usize;
        if index >= decoded.len() {
            return Err(TdhError::FieldIndexOutOfBounds {
                index: raw,
                decoded: decoded.len(),
            });
        }
        return Ok(Some(FieldDimension::Named(decoded[index].name.clone())));
    }

    Ok(None)
}
