#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use glyphmatch::binary::read::ReadScope;
use glyphmatch::font_builder::FontBuilder;
use glyphmatch::tables::{HeadTable, OffsetTable, CFF_MAGIC, TTF_MAGIC};
use glyphmatch::tag;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A 54 byte `head` table with long `loca` offsets.
pub fn head_table() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[0, 1, 0, 0]); // version
    data.extend_from_slice(&[0, 1, 0, 0]); // fontRevision
    data.extend_from_slice(&[0, 0, 0, 0]); // checkSumAdjustment
    data.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    data.extend_from_slice(&[0, 0]); // flags
    data.extend_from_slice(&1000u16.to_be_bytes());
    data.extend_from_slice(&[0; 16]); // created, modified
    data.extend_from_slice(&[0; 8]); // bounding box
    data.extend_from_slice(&[0, 0]); // macStyle
    data.extend_from_slice(&[0, 8]); // lowestRecPPEM
    data.extend_from_slice(&2i16.to_be_bytes());
    data.extend_from_slice(&1i16.to_be_bytes()); // indexToLocFormat
    data.extend_from_slice(&[0, 0]);
    data
}

/// A version 0.5 `maxp` table.
pub fn maxp_table(num_glyphs: u16) -> Vec<u8> {
    let mut data = vec![0, 0, 0x50, 0];
    data.extend_from_slice(&num_glyphs.to_be_bytes());
    data
}

/// A `cmap` table with a single Windows Unicode BMP format 4 subtable.
pub fn cmap_table(mappings: &[(u16, u16)]) -> Vec<u8> {
    let mut segments = mappings.to_vec();
    segments.sort_unstable();
    segments.push((0xFFFF, 0));

    let seg_count = segments.len() as u16;
    let mut subtable = Vec::new();
    subtable.extend_from_slice(&4u16.to_be_bytes());
    subtable.extend_from_slice(&(16 + 8 * seg_count).to_be_bytes());
    subtable.extend_from_slice(&[0, 0]); // language
    subtable.extend_from_slice(&(seg_count * 2).to_be_bytes());
    subtable.extend_from_slice(&[0; 6]);
    for &(code, _) in &segments {
        subtable.extend_from_slice(&code.to_be_bytes());
    }
    subtable.extend_from_slice(&[0, 0]); // reservedPad
    for &(code, _) in &segments {
        subtable.extend_from_slice(&code.to_be_bytes());
    }
    for &(code, glyph_id) in &segments {
        let delta = if code == 0xFFFF {
            1
        } else {
            glyph_id.wrapping_sub(code)
        };
        subtable.extend_from_slice(&delta.to_be_bytes());
    }
    for _ in &segments {
        subtable.extend_from_slice(&[0, 0]);
    }

    let mut data = vec![0, 0, 0, 1];
    data.extend_from_slice(&3u16.to_be_bytes());
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&12u32.to_be_bytes());
    data.extend(subtable);
    data
}

/// A format 0 `name` table holding Windows Unicode records.
pub fn name_table(records: &[(u16, &str)]) -> Vec<u8> {
    let mut strings = Vec::new();
    let mut data = Vec::new();
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(&(records.len() as u16).to_be_bytes());
    data.extend_from_slice(&((6 + 12 * records.len()) as u16).to_be_bytes());
    for &(name_id, text) in records {
        let encoded = text
            .encode_utf16()
            .flat_map(|unit| unit.to_be_bytes())
            .collect::<Vec<_>>();
        for value in [3, 1, 0x409, name_id, encoded.len() as u16, strings.len() as u16] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        strings.extend(encoded);
    }
    data.extend(strings);
    data
}

/// Encode a simple glyph with on-curve points and word sized coordinate deltas.
pub fn simple_glyph(contours: &[&[(i16, i16)]]) -> Vec<u8> {
    let points = contours.iter().flat_map(|c| c.iter().copied()).collect::<Vec<_>>();
    let x_min = points.iter().map(|p| p.0).min().unwrap_or(0);
    let x_max = points.iter().map(|p| p.0).max().unwrap_or(0);
    let y_min = points.iter().map(|p| p.1).min().unwrap_or(0);
    let y_max = points.iter().map(|p| p.1).max().unwrap_or(0);

    let mut data = Vec::new();
    data.extend_from_slice(&(contours.len() as i16).to_be_bytes());
    for value in [x_min, y_min, x_max, y_max] {
        data.extend_from_slice(&value.to_be_bytes());
    }
    let mut end = 0u16;
    for contour in contours {
        end += contour.len() as u16;
        data.extend_from_slice(&(end - 1).to_be_bytes());
    }
    data.extend_from_slice(&[0, 0]); // instructionLength
    data.extend(std::iter::repeat(1u8).take(points.len()));
    let mut previous = (0i16, 0i16);
    let mut ys = Vec::new();
    for &(x, y) in &points {
        data.extend_from_slice(&(x - previous.0).to_be_bytes());
        ys.extend_from_slice(&(y - previous.1).to_be_bytes());
        previous = (x, y);
    }
    data.extend(ys);
    data
}

/// Builds a TrueType font from encoded glyphs.
pub struct TtfBuilder {
    pub glyphs: Vec<Vec<u8>>,
    pub mappings: Vec<(u16, u16)>,
    pub names: Vec<(u16, String)>,
}

impl TtfBuilder {
    /// Glyph 0 starts out empty.
    pub fn new() -> Self {
        TtfBuilder {
            glyphs: vec![Vec::new()],
            mappings: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Add a glyph and return its id.
    pub fn glyph(&mut self, data: Vec<u8>) -> u16 {
        self.glyphs.push(data);
        (self.glyphs.len() - 1) as u16
    }

    pub fn map(&mut self, unicode: u16, glyph_id: u16) -> &mut Self {
        self.mappings.push((unicode, glyph_id));
        self
    }

    pub fn name(&mut self, name_id: u16, text: &str) -> &mut Self {
        self.names.push((name_id, text.to_string()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut glyf = Vec::new();
        let mut loca = Vec::new();
        for glyph in &self.glyphs {
            loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());
            glyf.extend_from_slice(glyph);
            while glyf.len() % 4 != 0 {
                glyf.push(0);
            }
        }
        loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());

        let mut tables = vec![
            (tag::CMAP, cmap_table(&self.mappings)),
            (tag::MAXP, maxp_table(self.glyphs.len() as u16)),
            (tag::LOCA, loca),
            (tag::GLYF, glyf),
        ];
        if !self.names.is_empty() {
            let names = self
                .names
                .iter()
                .map(|(name_id, text)| (*name_id, text.as_str()))
                .collect::<Vec<_>>();
            tables.push((tag::NAME, name_table(&names)));
        }
        build_sfnt(TTF_MAGIC, &tables)
    }
}

pub fn build_sfnt(sfnt_version: u32, tables: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let head_data = head_table();
    let head = ReadScope::new(&head_data).read::<HeadTable>().unwrap();
    let mut builder = FontBuilder::new(sfnt_version);
    for (tag, data) in tables {
        builder.add_raw_table(*tag, data).unwrap();
    }
    builder.add_head_table(&head).unwrap().data().unwrap()
}

/// Encode `objects` as a CFF INDEX with 4 byte offsets.
pub fn cff_index(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut data = (objects.len() as u16).to_be_bytes().to_vec();
    if objects.is_empty() {
        return data;
    }
    data.push(4);
    let mut offset = 1u32;
    data.extend_from_slice(&offset.to_be_bytes());
    for object in objects {
        offset += object.len() as u32;
        data.extend_from_slice(&offset.to_be_bytes());
    }
    for object in objects {
        data.extend_from_slice(object);
    }
    data
}

fn dict_int(value: usize) -> Vec<u8> {
    let mut data = vec![29];
    data.extend_from_slice(&(value as i32).to_be_bytes());
    data
}

/// A single font CFF table with the given charstrings and global subroutines.
pub fn cff_table(char_strings: &[Vec<u8>], global_subrs: &[Vec<u8>]) -> Vec<u8> {
    let header = [1, 0, 4, 4];
    let name_index = cff_index(&[b"Test".to_vec()]);
    let string_index = cff_index(&[]);
    let global_subr_index = cff_index(global_subrs);
    let char_strings_index = cff_index(char_strings);

    // Three i32 operands and two operators.
    let top_dict_index_len = 2 + 1 + 2 * 4 + 17;
    let char_strings_offset = header.len()
        + name_index.len()
        + top_dict_index_len
        + string_index.len()
        + global_subr_index.len();
    let private_offset = char_strings_offset + char_strings_index.len();

    let mut top_dict = dict_int(char_strings_offset);
    top_dict.push(17); // CharStrings
    top_dict.extend(dict_int(0));
    top_dict.extend(dict_int(private_offset));
    top_dict.push(18); // Private

    let mut data = header.to_vec();
    data.extend(name_index);
    data.extend(cff_index(&[top_dict]));
    data.extend(string_index);
    data.extend(global_subr_index);
    data.extend(char_strings_index);
    data
}

/// An OpenType font with CFF outlines.
pub fn otf_font(char_strings: &[Vec<u8>], mappings: &[(u16, u16)]) -> Vec<u8> {
    build_sfnt(
        CFF_MAGIC,
        &[
            (tag::CFF, cff_table(char_strings, &[])),
            (tag::CMAP, cmap_table(mappings)),
            (tag::MAXP, maxp_table(char_strings.len() as u16)),
        ],
    )
}

/// Encode a charstring operand in the range -107..=107.
pub fn n(value: i16) -> u8 {
    assert!((-107..=107).contains(&value));
    (value + 139) as u8
}

/// Wrap an sfnt font in a WOFF 1.0 container.
///
/// Tables are zlib compressed when that makes them smaller and stored as is otherwise.
pub fn woff_from_sfnt(sfnt: &[u8], compress: bool) -> Vec<u8> {
    woff_with_version(sfnt, compress, 1)
}

pub fn woff_with_version(sfnt: &[u8], compress: bool, major_version: u16) -> Vec<u8> {
    let scope = ReadScope::new(sfnt);
    let offset_table = scope.read::<OffsetTable<'_>>().unwrap();
    let records = offset_table.table_records.iter().collect::<Vec<_>>();

    let header_len = 44 + 20 * records.len();
    let mut directory = Vec::new();
    let mut tables = Vec::new();
    for record in &records {
        let original = record.read_table(&scope).unwrap().data().to_vec();
        let stored = if compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(&original).unwrap();
            let compressed = encoder.finish().unwrap();
            if compressed.len() < original.len() {
                compressed
            } else {
                original.clone()
            }
        } else {
            original.clone()
        };

        let offset = header_len + tables.len();
        directory.extend_from_slice(&record.table_tag.to_be_bytes());
        directory.extend_from_slice(&(offset as u32).to_be_bytes());
        directory.extend_from_slice(&(stored.len() as u32).to_be_bytes());
        directory.extend_from_slice(&(original.len() as u32).to_be_bytes());
        directory.extend_from_slice(&record.checksum.to_be_bytes());
        tables.extend(stored);
        while tables.len() % 4 != 0 {
            tables.push(0);
        }
    }

    let mut data = Vec::new();
    data.extend_from_slice(&tag::WOFF.to_be_bytes());
    data.extend_from_slice(&offset_table.sfnt_version.to_be_bytes());
    data.extend_from_slice(&((header_len + tables.len()) as u32).to_be_bytes());
    data.extend_from_slice(&(records.len() as u16).to_be_bytes());
    data.extend_from_slice(&[0, 0]); // reserved
    data.extend_from_slice(&(sfnt.len() as u32).to_be_bytes());
    data.extend_from_slice(&major_version.to_be_bytes());
    data.extend_from_slice(&[0, 0]); // minorVersion
    data.extend_from_slice(&[0; 20]); // metadata and private blocks
    data.extend(directory);
    data.extend(tables);
    data
}
