//! Loading a font and answering glyph and code point queries against it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::warn;

use crate::binary::read::ReadScope;
use crate::cff::CFF;
use crate::error::{MatchError, ParseError};
use crate::glyph_index::GlyphIndex;
use crate::matcher::{GlyphShapeMatcher, MatchCaches};
use crate::name;
use crate::tables::cmap::Cmap;
use crate::tables::glyf::{GlyfTable, Glyph};
use crate::tables::loca::LocaTable;
use crate::tables::{HeadTable, MaxpTable, NameTable, OffsetTable};
use crate::tag;
use crate::woff::{self, WoffCache};

lazy_static! {
    static ref DEFAULT_MATCH_CACHES: Arc<MatchCaches> = Arc::new(MatchCaches::new());
    static ref DEFAULT_WOFF_CACHE: WoffCache = WoffCache::new();
}

/// Code points treated as blank by `Font::is_blank_unicode`.
const BLANK_UNICODES: [u32; 12] = [
    0x0009, 0x0020, 0x00A0, 0x2002, 0x2003, 0x2007, 0x200A, 0x200B, 0x200C, 0x200D, 0x202F,
    0x205F,
];

/// The outline format of a font.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FontType {
    /// TrueType outlines in `glyf`.
    Ttf,
    /// CFF outlines in `CFF `.
    Otf,
}

/// A decoded font with every outline and its code point mapping.
pub struct Font {
    data: Arc<[u8]>,
    font_type: FontType,
    num_glyphs: u16,
    glyphs: Vec<Glyph>,
    index: GlyphIndex,
    unique_font_name: String,
    matcher: GlyphShapeMatcher,
}

impl Font {
    /// Load a font from an sfnt or WOFF file, using the process wide match caches.
    pub fn new(data: Vec<u8>) -> Result<Font, ParseError> {
        Font::with_caches(data, Arc::clone(&DEFAULT_MATCH_CACHES))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Font, ParseError> {
        Font::new(data.to_vec())
    }

    /// Load a font whose shape matcher uses `caches`.
    pub fn with_caches(data: Vec<u8>, caches: Arc<MatchCaches>) -> Result<Font, ParseError> {
        let data = if is_woff(&data) {
            DEFAULT_WOFF_CACHE.decode(&data)?
        } else {
            Arc::from(data)
        };

        let scope = ReadScope::new(&data);
        let offset_table = scope.read::<OffsetTable<'_>>()?;
        let head = offset_table
            .require_table(&scope, tag::HEAD)?
            .read::<HeadTable>()?;
        let maxp = offset_table
            .require_table(&scope, tag::MAXP)?
            .read::<MaxpTable>()?;
        let mappings = offset_table
            .require_table(&scope, tag::CMAP)?
            .read::<Cmap<'_>>()?
            .mappings();

        let (font_type, glyphs) = if offset_table.has_table(tag::CFF) {
            (FontType::Otf, read_cff_glyphs(&offset_table, &scope, &maxp)?)
        } else {
            (
                FontType::Ttf,
                read_glyf_glyphs(&offset_table, &scope, &head, &maxp)?,
            )
        };

        let name_table = match offset_table.read_table(&scope, tag::NAME)? {
            Some(name_scope) => name_scope
                .read::<NameTable<'_>>()
                .map_err(|err| warn!("unable to read name table: {}", err))
                .ok(),
            None => None,
        };
        let unique_font_name = name::unique_font_name(name_table.as_ref(), &data);

        let index = GlyphIndex::new(mappings, &glyphs, maxp.num_glyphs);
        let matcher = GlyphShapeMatcher::new(index.reference(), caches);

        Ok(Font {
            data,
            font_type,
            num_glyphs: maxp.num_glyphs,
            glyphs,
            index,
            unique_font_name,
            matcher,
        })
    }

    /// The sfnt data of this font. For WOFF input this is the reconstructed font.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn font_type(&self) -> FontType {
        self.font_type
    }

    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    pub fn unique_font_name(&self) -> &str {
        &self.unique_font_name
    }

    /// Merged `cmap` mappings from code point to glyph id.
    pub fn mappings(&self) -> &BTreeMap<u32, u16> {
        self.index.mappings()
    }

    /// The glyph id for `unicode`, 0 when it is not mapped.
    pub fn glyph_id_by_unicode(&self, unicode: u32) -> u16 {
        self.index.glyph_id(unicode)
    }

    /// Outline text of the glyph mapped to `unicode`.
    pub fn glyph_by_unicode(&self, unicode: u32) -> Option<&str> {
        self.index.text_by_unicode(unicode)
    }

    pub fn glyph_by_id(&self, glyph_id: u16) -> Option<&Glyph> {
        if glyph_id >= self.num_glyphs {
            return None;
        }
        self.glyphs.get(usize::from(glyph_id))
    }

    pub fn glyph_text_by_id(&self, glyph_id: u16) -> Option<String> {
        self.glyph_by_id(glyph_id).map(Glyph::to_text)
    }

    /// The code point mapped to `glyph_id` by `cmap`, 0 when unmapped.
    pub fn unicode_by_glyph_id(&self, glyph_id: u16) -> u32 {
        self.index.unicode_by_glyph_id(glyph_id)
    }

    /// Resolve outline text to a code point.
    ///
    /// Outlines of this font resolve directly. Any other outline is matched by shape against
    /// the glyphs of this font, blocking until the search finishes. Returns 0 when nothing
    /// matches.
    pub fn unicode_by_glyph(&self, glyph: &str) -> u32 {
        match self.index.unicode_by_text(glyph) {
            Some(unicode) => unicode,
            None => self.matcher.find_closest_blocking(glyph).unwrap_or(0),
        }
    }

    /// Like `unicode_by_glyph` but the result is passed to `callback`, which may run on
    /// another thread.
    pub fn unicode_by_glyph_async<F>(&self, glyph: &str, callback: F)
    where
        F: FnOnce(Result<u32, MatchError>) + Send + 'static,
    {
        match self.index.unicode_by_text(glyph) {
            Some(unicode) => callback(Ok(unicode)),
            None => self.matcher.find_closest_async(glyph, callback),
        }
    }

    /// `true` for tab and the space characters that draw nothing.
    pub fn is_blank_unicode(unicode: u32) -> bool {
        BLANK_UNICODES.contains(&unicode)
    }

    /// Empty the process wide match and WOFF caches.
    pub fn clear_caches() {
        DEFAULT_MATCH_CACHES.clear();
        DEFAULT_WOFF_CACHE.clear();
    }
}

impl fmt::Display for FontType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontType::Ttf => write!(f, "ttf"),
            FontType::Otf => write!(f, "otf"),
        }
    }
}

fn is_woff(data: &[u8]) -> bool {
    match data.get(0..4) {
        Some(&[a, b, c, d]) => {
            let signature = u32::from_be_bytes([a, b, c, d]);
            signature == woff::MAGIC || signature == woff::MAGIC2
        }
        _ => false,
    }
}

fn read_glyf_glyphs<'a>(
    offset_table: &OffsetTable<'a>,
    scope: &ReadScope<'a>,
    head: &HeadTable,
    maxp: &MaxpTable,
) -> Result<Vec<Glyph>, ParseError> {
    let loca = offset_table
        .require_table(scope, tag::LOCA)?
        .read_dep::<LocaTable<'_>>((maxp.num_glyphs, head.index_to_loc_format))?;
    let glyf = offset_table
        .require_table(scope, tag::GLYF)?
        .read_dep::<GlyfTable>((&loca, maxp.max_contours()))?;

    Ok(glyf.glyphs)
}

fn read_cff_glyphs<'a>(
    offset_table: &OffsetTable<'a>,
    scope: &ReadScope<'a>,
    maxp: &MaxpTable,
) -> Result<Vec<Glyph>, ParseError> {
    let cff = offset_table
        .require_table(scope, tag::CFF)?
        .read::<CFF<'_>>()?;
    let count = usize::from(maxp.num_glyphs).min(cff.glyph_count());
    if count < usize::from(maxp.num_glyphs) {
        warn!(
            "CFF has {} charstrings but maxp declares {} glyphs",
            cff.glyph_count(),
            maxp.num_glyphs
        );
    }

    let mut glyphs = (0..count)
        .map(|glyph_id| cff.glyph_outline(glyph_id as u16))
        .collect::<Vec<_>>();
    glyphs.resize(usize::from(maxp.num_glyphs), Glyph::Empty);

    Ok(glyphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum;
    use crate::font_builder::FontBuilder;
    use crate::tables::cmap::tests::{cmap_table, format4_subtable};
    use crate::tables::tests::head_bytes;
    use crate::tables::TTF_MAGIC;

    fn maxp_bytes(num_glyphs: u16) -> Vec<u8> {
        let mut data = vec![0, 0, 0x50, 0];
        data.extend_from_slice(&num_glyphs.to_be_bytes());
        data
    }

    /// Glyph 1 is a triangle, glyph 0 is empty.
    fn ttf_font() -> Vec<u8> {
        let triangle = [
            0, 1, // numberOfContours
            0, 0, 0, 0, 0, 10, 0, 10, // bbox
            0, 2, // endPtsOfContours
            0, 0, // instructionLength
            0x37, 0x37, 0x37, // x and y short positive, on curve
            0, 10, 0, // x deltas
            0, 0, 10, // y deltas
            0, // pad
        ];
        let loca = [0u32, 0, triangle.len() as u32]
            .iter()
            .flat_map(|offset| offset.to_be_bytes())
            .collect::<Vec<_>>();
        let format4 = format4_subtable(&[(0x41, 0x41, -0x40, 0), (0xFFFF, 0xFFFF, 1, 0)], &[]);
        let cmap = cmap_table(&[(3, 1, 0)], &[format4]);

        let head = head_bytes(1);
        let head = ReadScope::new(&head).read::<HeadTable>().unwrap();
        let mut builder = FontBuilder::new(TTF_MAGIC);
        builder.add_raw_table(tag::CMAP, &cmap).unwrap();
        builder.add_raw_table(tag::MAXP, &maxp_bytes(2)).unwrap();
        builder.add_raw_table(tag::LOCA, &loca).unwrap();
        builder.add_raw_table(tag::GLYF, &triangle).unwrap();
        builder.add_head_table(&head).unwrap().data().unwrap()
    }

    #[test]
    fn test_load_ttf() {
        let data = ttf_font();
        let font = Font::with_caches(data.clone(), Arc::new(MatchCaches::new())).unwrap();

        assert_eq!(font.font_type(), FontType::Ttf);
        assert_eq!(font.num_glyphs(), 2);
        assert_eq!(font.glyph_id_by_unicode(0x41), 1);
        // glyf points are written as the deltas stored in the table
        assert_eq!(font.glyph_by_unicode(0x41), Some("0,0|10,0|0,10"));
        assert_eq!(font.unicode_by_glyph("0,0|10,0|0,10"), 0x41);
        assert_eq!(font.unicode_by_glyph_id(1), 0x41);
        assert_eq!(font.glyph_text_by_id(0).as_deref(), Some(""));
        assert!(font.glyph_by_id(2).is_none());
        assert_eq!(font.data(), data.as_slice());

        // No name table, so the name comes from the file digest.
        assert!(font.unique_font_name().starts_with("Font-"));
        let file_sum = checksum::table_checksum(font.data()).unwrap();
        assert_eq!(file_sum.0, checksum::SFNT_CHECKSUM_MAGIC);
    }

    #[test]
    fn test_shape_match_fallback() {
        let font = Font::with_caches(ttf_font(), Arc::new(MatchCaches::new())).unwrap();
        assert_eq!(font.unicode_by_glyph("0,0|11,0|-1,11"), 0x41);
        assert_eq!(font.unicode_by_glyph("0,0|1,1"), 0);
        assert_eq!(font.unicode_by_glyph("garbage"), 0);
    }

    #[test]
    fn test_unknown_sfnt_version() {
        let mut data = ttf_font();
        data[0..4].copy_from_slice(b"abcd");
        assert_eq!(Font::new(data).err(), Some(ParseError::BadVersion));
    }

    #[test]
    fn test_missing_cmap() {
        let head = head_bytes(1);
        let head = ReadScope::new(&head).read::<HeadTable>().unwrap();
        let mut builder = FontBuilder::new(TTF_MAGIC);
        builder.add_raw_table(tag::MAXP, &maxp_bytes(1)).unwrap();
        let data = builder.add_head_table(&head).unwrap().data().unwrap();

        assert_eq!(
            Font::new(data).err(),
            Some(ParseError::MissingTable(tag::CMAP))
        );
    }

    #[test]
    fn test_is_blank_unicode() {
        assert!(Font::is_blank_unicode(0x20));
        assert!(Font::is_blank_unicode(0x200B));
        assert!(!Font::is_blank_unicode(0x41));
    }

    #[test]
    fn test_font_type_display() {
        assert_eq!(FontType::Ttf.to_string(), "ttf");
        assert_eq!(FontType::Otf.to_string(), "otf");
    }
}
