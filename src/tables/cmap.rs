//! Parsing of the `cmap` table into a single code point to glyph map.
//!
//! Fonts frequently carry several subtables that disagree, so every supported subtable is
//! decoded and merged in priority order rather than picking one.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/cmap>

use std::collections::BTreeMap;
use std::convert::TryFrom;

use log::{debug, warn};
use rustc_hash::FxHashSet;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be, U32Be, U8};
use crate::error::ParseError;

/// Code points beyond this are not Unicode scalar values.
const MAX_CODE_POINT: u32 = 0x10FFFF;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlatformId(pub u16);

impl PlatformId {
    pub const UNICODE: PlatformId = PlatformId(0);
    pub const MACINTOSH: PlatformId = PlatformId(1);
    pub const WINDOWS: PlatformId = PlatformId(3);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingId(pub u16);

impl EncodingId {
    pub const WINDOWS_SYMBOL: EncodingId = EncodingId(0);
    pub const WINDOWS_UNICODE_BMP_UCS2: EncodingId = EncodingId(1);
    pub const WINDOWS_UNICODE_UCS4: EncodingId = EncodingId(10);

    pub const UNICODE_2_0_BMP: EncodingId = EncodingId(3);
    pub const UNICODE_2_0_FULL: EncodingId = EncodingId(4);
    pub const UNICODE_1_1: EncodingId = EncodingId(1);
}

pub struct Cmap<'a> {
    pub scope: ReadScope<'a>,
    encoding_records: ReadArray<'a, EncodingRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

pub enum CmapSubtable<'a> {
    Format0 {
        language: u16,
        glyph_id_array: ReadArray<'a, U8>,
    },
    Format4 {
        language: u16,
        end_codes: ReadArray<'a, U16Be>,
        start_codes: ReadArray<'a, U16Be>,
        id_deltas: ReadArray<'a, I16Be>,
        id_range_offsets: ReadArray<'a, U16Be>,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format6 {
        language: u16,
        first_code: u16,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format12 {
        language: u32,
        groups: ReadArray<'a, SequentialMapGroup>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SequentialMapGroup {
    pub start_char_code: u32,
    pub end_char_code: u32,
    pub start_glyph_id: u32,
}

impl ReadBinary for Cmap<'_> {
    type HostType<'a> = Cmap<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Cmap<'a>, ParseError> {
        let scope = ctxt.scope();
        let _version = ctxt.read_u16be()?;
        let num_tables = usize::from(ctxt.read_u16be()?);
        let encoding_records = ctxt.read_array::<EncodingRecord>(num_tables)?;
        Ok(Cmap {
            scope,
            encoding_records,
        })
    }
}

impl ReadFrom for EncodingRecord {
    type ReadType = (U16Be, U16Be, U32Be);

    fn read_from((platform_id, encoding_id, offset): (u16, u16, u32)) -> Self {
        EncodingRecord {
            platform_id,
            encoding_id,
            offset,
        }
    }
}

impl ReadFrom for SequentialMapGroup {
    type ReadType = (U32Be, U32Be, U32Be);

    fn read_from((start_char_code, end_char_code, start_glyph_id): (u32, u32, u32)) -> Self {
        SequentialMapGroup {
            start_char_code,
            end_char_code,
            start_glyph_id,
        }
    }
}

impl ReadBinary for CmapSubtable<'_> {
    type HostType<'a> = CmapSubtable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<CmapSubtable<'a>, ParseError> {
        let subtable_format = ctxt.read_u16be()?;
        match subtable_format {
            0 => {
                let length = usize::from(ctxt.read_u16be()?);
                let language = ctxt.read_u16be()?;
                let num_glyphs = length.saturating_sub(6).min(256);
                let glyph_id_array = ctxt.read_array::<U8>(num_glyphs)?;
                Ok(CmapSubtable::Format0 {
                    language,
                    glyph_id_array,
                })
            }
            4 => {
                let length = usize::from(ctxt.read_u16be()?);
                let language = ctxt.read_u16be()?;
                let seg_count = usize::from(ctxt.read_u16be()?) / 2;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let end_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let _reserved_pad = ctxt.read_u16be()?;
                let start_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let id_deltas = ctxt.read_array::<I16Be>(seg_count)?;
                let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?;
                // Whatever remains of the declared length is the glyph id array.
                let num_indices = length.saturating_sub(16 + seg_count * 8) / 2;
                let glyph_id_array = ctxt.read_array_upto::<U16Be>(num_indices)?;
                Ok(CmapSubtable::Format4 {
                    language,
                    end_codes,
                    start_codes,
                    id_deltas,
                    id_range_offsets,
                    glyph_id_array,
                })
            }
            6 => {
                let _length = ctxt.read_u16be()?;
                let language = ctxt.read_u16be()?;
                let first_code = ctxt.read_u16be()?;
                let entry_count = usize::from(ctxt.read_u16be()?);
                let glyph_id_array = ctxt.read_array::<U16Be>(entry_count)?;
                Ok(CmapSubtable::Format6 {
                    language,
                    first_code,
                    glyph_id_array,
                })
            }
            12 => {
                let _reserved = ctxt.read_u16be()?;
                let _length = ctxt.read_u32be()?;
                let language = ctxt.read_u32be()?;
                let num_groups = usize::try_from(ctxt.read_u32be()?)?;
                let groups = ctxt.read_array::<SequentialMapGroup>(num_groups)?;
                Ok(CmapSubtable::Format12 { language, groups })
            }
            _ => Err(ParseError::NotImplemented),
        }
    }
}

/// Ranking used to order encoding records, highest first.
///
/// Full repertoire Windows and Unicode encodings come first so that their mappings are in place
/// before legacy subtables are consulted.
pub fn cmap_priority(platform_id: u16, encoding_id: u16) -> i32 {
    match (PlatformId(platform_id), EncodingId(encoding_id)) {
        (PlatformId::WINDOWS, EncodingId::WINDOWS_UNICODE_UCS4) => 100,
        (PlatformId::WINDOWS, EncodingId::WINDOWS_UNICODE_BMP_UCS2) => 90,
        (PlatformId::UNICODE, EncodingId::UNICODE_2_0_FULL) => 80,
        (PlatformId::UNICODE, EncodingId::UNICODE_2_0_BMP) => 70,
        (PlatformId::UNICODE, EncodingId::UNICODE_1_1) => 60,
        _ => i32::from(platform_id) * 10 + i32::from(encoding_id),
    }
}

impl<'a> Cmap<'a> {
    pub fn encoding_records(&self) -> impl Iterator<Item = EncodingRecord> + 'a {
        self.encoding_records.iter()
    }

    /// Encoding records sorted by descending `cmap_priority`, keeping table order among equals.
    pub fn encoding_records_by_priority(&self) -> Vec<EncodingRecord> {
        let mut records = self.encoding_records.to_vec();
        records.sort_by_key(|record| -cmap_priority(record.platform_id, record.encoding_id));
        records
    }

    pub fn subtable(&self, record: &EncodingRecord) -> Result<CmapSubtable<'a>, ParseError> {
        let offset = usize::try_from(record.offset)?;
        self.scope.offset(offset).read::<CmapSubtable<'_>>()
    }

    /// Decode every supported subtable and merge them into one code point to glyph id map.
    ///
    /// Subtables are visited by priority. A subtable offset shared by several records is only
    /// decoded for the first of them. Subtables that fail to parse are skipped.
    pub fn mappings(&self) -> BTreeMap<u32, u16> {
        let mut mappings = BTreeMap::new();
        let mut seen_offsets = FxHashSet::default();

        for record in self.encoding_records_by_priority() {
            if !seen_offsets.insert(record.offset) {
                continue;
            }
            match self.subtable(&record) {
                Ok(subtable) => subtable.merge_into(&mut mappings),
                Err(ParseError::NotImplemented) => {
                    debug!(
                        "cmap subtable ({}, {}) has an unsupported format",
                        record.platform_id, record.encoding_id
                    );
                }
                Err(err) => {
                    warn!(
                        "cmap subtable ({}, {}) could not be read: {}",
                        record.platform_id, record.encoding_id, err
                    );
                }
            }
        }

        mappings
    }
}

impl<'a> CmapSubtable<'a> {
    pub fn format(&self) -> u16 {
        match self {
            CmapSubtable::Format0 { .. } => 0,
            CmapSubtable::Format4 { .. } => 4,
            CmapSubtable::Format6 { .. } => 6,
            CmapSubtable::Format12 { .. } => 12,
        }
    }

    /// Add the mappings of this subtable to `mappings`.
    ///
    /// Formats 0, 4 and 6 overwrite existing entries. Format 12 only fills code points that are
    /// unmapped or currently map to glyph 0.
    pub fn merge_into(&self, mappings: &mut BTreeMap<u32, u16>) {
        match self {
            CmapSubtable::Format0 { glyph_id_array, .. } => {
                for (code, glyph_id) in (0u32..).zip(glyph_id_array.iter()) {
                    if glyph_id != 0 {
                        mappings.insert(code, u16::from(glyph_id));
                    }
                }
            }
            CmapSubtable::Format4 {
                end_codes,
                start_codes,
                id_deltas,
                id_range_offsets,
                glyph_id_array,
                ..
            } => {
                let seg_count = end_codes.len();
                for i in 0..seg_count {
                    let (Some(start), Some(end), Some(id_delta), Some(id_range_offset)) = (
                        start_codes.get_item(i),
                        end_codes.get_item(i),
                        id_deltas.get_item(i),
                        id_range_offsets.get_item(i),
                    ) else {
                        continue;
                    };
                    let id_delta = i32::from(id_delta);
                    // 0xFFFF is never a real character; the final segment exists only to end the
                    // search.
                    for code in start..=end {
                        if code == 0xFFFF {
                            break;
                        }
                        let glyph_id = if id_range_offset == 0 {
                            (i32::from(code) + id_delta) & 0xFFFF
                        } else {
                            // idRangeOffset is relative to its own entry, so step back over the
                            // remaining idRangeOffsets to index the glyph id array.
                            let index = (usize::from(id_range_offset / 2)
                                + usize::from(code - start)
                                + i)
                                .checked_sub(seg_count);
                            match index.and_then(|index| glyph_id_array.get_item(index)) {
                                Some(0) => 0,
                                Some(raw) => (i32::from(raw) + id_delta) & 0xFFFF,
                                None => continue,
                            }
                        };
                        if glyph_id == 0 && code != 0 {
                            continue;
                        }
                        mappings.insert(u32::from(code), glyph_id as u16);
                    }
                }
            }
            CmapSubtable::Format6 {
                first_code,
                glyph_id_array,
                ..
            } => {
                for (code, glyph_id) in (u32::from(*first_code)..).zip(glyph_id_array.iter()) {
                    if glyph_id == 0 && code != 0 {
                        continue;
                    }
                    mappings.insert(code, glyph_id);
                }
            }
            CmapSubtable::Format12 { groups, .. } => {
                for group in groups.iter() {
                    let end = group.end_char_code.min(MAX_CODE_POINT);
                    for code in group.start_char_code..=end {
                        let glyph_id = group
                            .start_glyph_id
                            .checked_add(code - group.start_char_code)
                            .and_then(|glyph_id| u16::try_from(glyph_id).ok());
                        let Some(glyph_id) = glyph_id else {
                            break;
                        };
                        if glyph_id == 0 && code != 0 {
                            continue;
                        }
                        let entry = mappings.entry(code).or_insert(0);
                        if *entry == 0 {
                            *entry = glyph_id;
                        }
                    }
                }
            }
        }
    }
}
