use log::trace;
use serde::Serialize;

use crate::err::{Result, TdhError};
use crate::utils::bytes;
use crate::utils::wide_string::read_wide_string_at;

/// PROVIDER_ENUMERATION_INFO: provider count + reserved word.
const ENUMERATION_HEADER_SIZE: usize = 8;
/// TRACE_PROVIDER_INFO: guid (16) + schema source (4) + name offset (4).
const PROVIDER_RECORD_SIZE: usize = 24;

/// The metadata format backing a provider's schema.
///
/// This enumeration is closed: the source documents exactly these codes
/// (`Unknown` is its reserved "max" member), and anything else in a provider
/// record is a decode error rather than a new kind of provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchemaSource {
    XmlFile,
    Wbem,
    Wpp,
    Tlg,
    Unknown,
}

impl SchemaSource {
    pub(crate) fn from_code(code: u32) -> Option<SchemaSource> {
        match code {
            0 => Some(SchemaSource::XmlFile),
            1 => Some(SchemaSource::Wbem),
            2 => Some(SchemaSource::Wpp),
            3 => Some(SchemaSource::Tlg),
            4 => Some(SchemaSource::Unknown),
            _ => None,
        }
    }
}

/// A registered trace provider: GUID, display name, schema source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub guid: String,
    pub name: String,
    pub schema_source: SchemaSource,
}

/// Decode a negotiated provider-enumeration buffer into the full provider
/// list, in source order.
pub(crate) fn parse_provider_enumeration(buf: &[u8]) -> Result<Vec<Provider>> {
    let provider_count = bytes::read_u32_le_r(buf, 0, "provider enumeration header")? as usize;
    trace!("provider enumeration buffer declares {provider_count} providers");

    let records = bytes::record_array(
        buf,
        ENUMERATION_HEADER_SIZE,
        PROVIDER_RECORD_SIZE,
        provider_count,
        "provider info",
    )?;

    let mut providers = Vec::with_capacity(provider_count);
    for record in records {
        let guid = bytes::read_guid_r(record, 0, "provider guid")?.to_string();
        let schema_code = bytes::read_u32_le_r(record, 16, "provider schema source")?;
        let name_offset = bytes::read_u32_le_r(record, 20, "provider name offset")? as usize;

        let schema_source =
            SchemaSource::from_code(schema_code).ok_or_else(|| TdhError::UnknownSchemaSource {
                provider: guid.clone(),
                code: schema_code,
            })?;
        let name = read_wide_string_at(buf, name_offset, "provider name")?;

        providers.push(Provider {
            guid,
            name,
            schema_source,
        });
    }

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use pretty_assertions::assert_eq;
    use winstructs::guid::Guid;

    const GUID_A: [u8; 16] = [
        0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A,
        0x0B,
    ];
    const GUID_B: [u8; 16] = [0xFF; 16];

    fn utf16z(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect()
    }

    fn build_enumeration(entries: &[([u8; 16], u32, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(entries.len() as u32).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap(); // reserved

        let strings_base = ENUMERATION_HEADER_SIZE + entries.len() * PROVIDER_RECORD_SIZE;
        let mut strings = Vec::new();
        for (guid, schema_code, name) in entries {
            buf.extend_from_slice(guid);
            buf.write_u32::<LittleEndian>(*schema_code).unwrap();
            buf.write_u32::<LittleEndian>((strings_base + strings.len()) as u32)
                .unwrap();
            strings.extend_from_slice(&utf16z(name));
        }
        buf.extend_from_slice(&strings);
        buf
    }

    #[test]
    fn test_decodes_providers_in_source_order() {
        crate::ensure_env_logger_initialized();
        let buf = build_enumeration(&[
            (GUID_A, 0, "Microsoft-Windows-Kernel-Process"),
            (GUID_B, 3, "Microsoft-Windows-DNS-Client"),
        ]);

        let providers = parse_provider_enumeration(&buf).unwrap();

        assert_eq!(
            providers,
            vec![
                Provider {
                    guid: Guid::from_buffer(&GUID_A).unwrap().to_string(),
                    name: "Microsoft-Windows-Kernel-Process".to_string(),
                    schema_source: SchemaSource::XmlFile,
                },
                Provider {
                    guid: Guid::from_buffer(&GUID_B).unwrap().to_string(),
                    name: "Microsoft-Windows-DNS-Client".to_string(),
                    schema_source: SchemaSource::Tlg,
                },
            ]
        );
    }

    #[test]
    fn test_schema_source_code_four_is_the_reserved_member() {
        let buf = build_enumeration(&[(GUID_A, 4, "legacy")]);

        let providers = parse_provider_enumeration(&buf).unwrap();

        assert_eq!(providers[0].schema_source, SchemaSource::Unknown);
    }

    #[test]
    fn test_out_of_range_schema_source_is_an_error() {
        let buf = build_enumeration(&[(GUID_A, 7, "future")]);

        let err = parse_provider_enumeration(&buf).unwrap_err();

        assert_eq!(
            err,
            TdhError::UnknownSchemaSource {
                provider: Guid::from_buffer(&GUID_A).unwrap().to_string(),
                code: 7
            }
        );
    }

    #[test]
    fn test_declared_count_larger_than_the_buffer_is_rejected() {
        let mut buf = build_enumeration(&[(GUID_A, 0, "p")]);
        // Claim a second record that is not actually present.
        buf[0] = 2;

        assert!(matches!(
            parse_provider_enumeration(&buf),
            Err(TdhError::ArrayOutOfBounds { what: "provider info", count: 2, .. })
        ));
    }

    #[test]
    fn test_name_offset_past_the_buffer_is_rejected() {
        let mut buf = build_enumeration(&[(GUID_A, 0, "p")]);
        let bad_offset = (buf.len() + 1) as u32;
        buf[ENUMERATION_HEADER_SIZE + 20..ENUMERATION_HEADER_SIZE + 24]
            .copy_from_slice(&bad_offset.to_le_bytes());

        assert!(matches!(
            parse_provider_enumeration(&buf),
            Err(TdhError::StringOffsetOutOfBounds { what: "provider name", .. })
        ));
    }

    #[test]
    fn test_empty_enumeration_decodes_to_an_empty_list() {
        let buf = build_enumeration(&[]);

        assert_eq!(parse_provider_enumeration(&buf).unwrap(), vec![]);
    }
}
