//! Decoding of `name` table strings and the unique font name.

use std::iter;

use encoding_rs::{
    Encoding, BIG5, EUC_KR, GBK, ISO_8859_5, SHIFT_JIS, UTF_16BE, UTF_8, WINDOWS_1252,
    X_MAC_CYRILLIC,
};
use log::debug;
use md5::{Digest, Md5};

use crate::macroman;
use crate::tables::{NameRecord, NameTable};

pub const FAMILY_NAME: u16 = 1;
pub const FULL_NAME: u16 = 4;
pub const POSTSCRIPT_NAME: u16 = 6;

const PLATFORM_UNICODE: u16 = 0;
const PLATFORM_MACINTOSH: u16 = 1;
const PLATFORM_WINDOWS: u16 = 3;

/// Returns a name that identifies the font.
///
/// The PostScript name is preferred, then the full name, then the family name. When none of
/// them is present the name is derived from the MD5 digest of `file_bytes`.
pub fn unique_font_name(name_table: Option<&NameTable<'_>>, file_bytes: &[u8]) -> String {
    name_table
        .and_then(|table| {
            [POSTSCRIPT_NAME, FULL_NAME, FAMILY_NAME]
                .iter()
                .find_map(|&name_id| name_by_id(table, name_id))
        })
        .unwrap_or_else(|| format!("Font-{}", file_digest(file_bytes)))
}

/// Decodes the first record with `name_id` that holds non-blank text.
pub fn name_by_id(name_table: &NameTable<'_>, name_id: u16) -> Option<String> {
    name_table
        .name_records
        .iter()
        .filter(|record| record.name_id == name_id)
        .filter_map(|record| match name_table.record_data(&record) {
            Ok(data) => Some(decode_record(&record, data)),
            Err(err) => {
                debug!("skipping name record {}: {}", record.name_id, err);
                None
            }
        })
        .find(|name| !name.trim().is_empty())
}

/// Decodes the string bytes of `record` according to its platform and encoding.
pub fn decode_record(record: &NameRecord, data: &[u8]) -> String {
    match (record.platform_id, record.encoding_id) {
        (PLATFORM_UNICODE, _) => decode_lossy(UTF_16BE, data),
        (PLATFORM_WINDOWS, 0) => decode_symbol(data),
        (PLATFORM_WINDOWS, 1) | (PLATFORM_WINDOWS, 10) => decode_lossy(UTF_16BE, data),
        (PLATFORM_MACINTOSH, 0) => macroman::decode(data),
        (PLATFORM_MACINTOSH, 1) => decode_lossy(SHIFT_JIS, data),
        (PLATFORM_MACINTOSH, 2) => decode_lossy(BIG5, data),
        (PLATFORM_MACINTOSH, 3) => decode_lossy(EUC_KR, data),
        (PLATFORM_MACINTOSH, 4..=7) => decode_strict(X_MAC_CYRILLIC, data)
            .or_else(|| decode_strict(ISO_8859_5, data))
            .unwrap_or_else(|| safe_decode(data)),
        _ => safe_decode(data),
    }
}

/// Windows Symbol strings are single bytes mapped into the private use area.
fn decode_symbol(data: &[u8]) -> String {
    data.iter()
        .filter_map(|&byte| char::from_u32(0xF000 + u32::from(byte)))
        .collect()
}

fn decode_lossy(encoding: &'static Encoding, data: &[u8]) -> String {
    encoding
        .decode_without_bom_handling(data)
        .0
        .into_owned()
}

fn decode_strict(encoding: &'static Encoding, data: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(data)
        .map(|text| text.into_owned())
}

fn decode_latin1(data: &[u8]) -> String {
    data.iter().copied().map(char::from).collect()
}

/// Decodes bytes of unknown encoding.
///
/// Candidate encodings are tried in turn and the first error-free result that reads as text
/// is kept. Otherwise only printable ASCII survives.
fn safe_decode(data: &[u8]) -> String {
    [UTF_8, UTF_16BE]
        .iter()
        .map(|&encoding| decode_strict(encoding, data))
        .chain(iter::once_with(|| Some(decode_latin1(data))))
        .chain(
            [WINDOWS_1252, GBK, BIG5, SHIFT_JIS, EUC_KR]
                .iter()
                .map(|&encoding| decode_strict(encoding, data)),
        )
        .flatten()
        .find(|text| looks_like_text(text))
        .unwrap_or_else(|| {
            data.iter()
                .filter(|byte| (32..=126).contains(*byte))
                .map(|&byte| char::from(byte))
                .collect()
        })
}

/// At least 30% of the non-whitespace characters must be letters or digits.
fn looks_like_text(text: &str) -> bool {
    let (visible, alphanumeric) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(visible, alphanumeric), c| {
            (visible + 1, alphanumeric + usize::from(c.is_alphanumeric()))
        });

    visible > 0 && alphanumeric * 10 >= visible * 3
}

fn file_digest(file_bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(file_bytes);
    let hash = format!("{:x}", hasher.finalize());
    hash[..6].to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::binary::read::ReadScope;

    /// Builds a format 0 `name` table from `(platform, encoding, name id, bytes)` records.
    pub(crate) fn name_table_bytes(records: &[(u16, u16, u16, &[u8])]) -> Vec<u8> {
        let string_offset = 6 + 12 * records.len();
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&(records.len() as u16).to_be_bytes());
        data.extend_from_slice(&(string_offset as u16).to_be_bytes());

        let mut strings = Vec::new();
        for &(platform_id, encoding_id, name_id, bytes) in records {
            for value in [
                platform_id,
                encoding_id,
                0,
                name_id,
                bytes.len() as u16,
                strings.len() as u16,
            ] {
                data.extend_from_slice(&value.to_be_bytes());
            }
            strings.extend_from_slice(bytes);
        }
        data.extend_from_slice(&strings);
        data
    }

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
    }

    fn record(platform_id: u16, encoding_id: u16) -> NameRecord {
        NameRecord {
            platform_id,
            encoding_id,
            language_id: 0,
            name_id: FULL_NAME,
            length: 0,
            offset: 0,
        }
    }

    #[test]
    fn test_prefers_postscript_name() {
        let family = utf16("Family");
        let full = utf16("Full Name");
        let postscript = utf16("PostScript-Name");
        let data = name_table_bytes(&[
            (3, 1, FAMILY_NAME, family.as_slice()),
            (3, 1, FULL_NAME, full.as_slice()),
            (3, 1, POSTSCRIPT_NAME, postscript.as_slice()),
        ]);
        let table = ReadScope::new(&data).read::<NameTable<'_>>().unwrap();
        assert_eq!(unique_font_name(Some(&table), &data), "PostScript-Name");
    }

    #[test]
    fn test_blank_names_fall_through() {
        let blank = utf16("   ");
        let data = name_table_bytes(&[
            (3, 1, POSTSCRIPT_NAME, blank.as_slice()),
            (3, 1, FULL_NAME, &b""[..]),
            (1, 0, FAMILY_NAME, &b"Family"[..]),
        ]);
        let table = ReadScope::new(&data).read::<NameTable<'_>>().unwrap();
        assert_eq!(unique_font_name(Some(&table), &data), "Family");
    }

    #[test]
    fn test_first_non_blank_record_wins() {
        let first = utf16("First");
        let data = name_table_bytes(&[
            (3, 1, FULL_NAME, &b""[..]),
            (3, 1, FULL_NAME, first.as_slice()),
            (1, 0, FULL_NAME, &b"Second"[..]),
        ]);
        let table = ReadScope::new(&data).read::<NameTable<'_>>().unwrap();
        assert_eq!(name_by_id(&table, FULL_NAME).as_deref(), Some("First"));
    }

    #[test]
    fn test_digest_fallback() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(unique_font_name(None, &b""[..]), "Font-d41d8c");

        let data = name_table_bytes(&[]);
        let table = ReadScope::new(&data).read::<NameTable<'_>>().unwrap();
        let name = unique_font_name(Some(&table), &data);
        assert!(name.starts_with("Font-"));
        assert_eq!(name.len(), 11);
    }

    #[test]
    fn test_decode_windows_symbol() {
        assert_eq!(decode_record(&record(3, 0), &[0x41, 0xFF]), "\u{F041}\u{F0FF}");
    }

    #[test]
    fn test_decode_unicode_platforms() {
        let data = utf16("Grüße");
        assert_eq!(decode_record(&record(0, 3), &data), "Grüße");
        assert_eq!(decode_record(&record(3, 1), &data), "Grüße");
        assert_eq!(decode_record(&record(3, 10), &data), "Grüße");
    }

    #[test]
    fn test_decode_mac_roman() {
        assert_eq!(decode_record(&record(1, 0), &[0x43, 0x61, 0x66, 0x8E]), "Café");
    }

    #[test]
    fn test_decode_mac_legacy_encodings() {
        // "日本" in Shift_JIS
        assert_eq!(decode_record(&record(1, 1), &[0x93, 0xFA, 0x96, 0x7B]), "日本");
        // "한" in EUC-KR
        assert_eq!(decode_record(&record(1, 3), &[0xC7, 0xD1]), "한");
        // "ШРИФТ" in x-mac-cyrillic
        assert_eq!(
            decode_record(&record(1, 7), &[0x98, 0x90, 0x88, 0x94, 0x92]),
            "ШРИФТ"
        );
    }

    #[test]
    fn test_safe_decode() {
        assert_eq!(decode_record(&record(3, 5), &b"Plain Name"[..]), "Plain Name");
        // Latin-1 is accepted when the UTF decoders fail.
        assert_eq!(safe_decode(&[0x43, 0x61, 0x66, 0xE9, 0x21]), "Café!");
    }

    #[test]
    fn test_safe_decode_ascii_filter() {
        // Punctuation only, with an odd length so UTF-16 fails too.
        assert_eq!(safe_decode(b"--- ..."), "--- ...");
        assert!(!looks_like_text("--- ..."));
    }

    #[test]
    fn test_looks_like_text() {
        assert!(looks_like_text("ab--"));
        assert!(!looks_like_text("a----"));
        assert!(!looks_like_text("   "));
    }
}
