//! Lookup tables between code points, glyph ids and outline text.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::matcher::ReferenceGlyph;
use crate::tables::glyf::Glyph;

/// Maps built once from a font's merged `cmap` and its decoded outlines.
pub struct GlyphIndex {
    unicode_to_glyph_id: BTreeMap<u32, u16>,
    unicode_to_text: FxHashMap<u32, String>,
    text_to_unicode: FxHashMap<String, u32>,
    glyph_id_to_unicode: Vec<u32>,
    reference: Arc<[ReferenceGlyph]>,
}

impl GlyphIndex {
    /// Build the index from `cmap` mappings and the outlines of the first `num_glyphs` glyphs.
    ///
    /// Mappings to glyph ids at or past `num_glyphs` only appear in the code point to glyph id
    /// map. Empty glyphs are indexed under the empty text, so a code point mapped to a blank
    /// glyph is told apart from an unmapped one.
    pub fn new(mappings: BTreeMap<u32, u16>, glyphs: &[Glyph], num_glyphs: u16) -> Self {
        let num_glyphs = usize::from(num_glyphs);
        let mut unicode_to_text = FxHashMap::default();
        let mut text_to_unicode = FxHashMap::default();
        let mut glyph_id_to_unicode = vec![0; num_glyphs];

        // BTreeMap iteration is in ascending code point order, so for shared outlines the
        // highest code point is the one kept in `text_to_unicode`.
        for (&unicode, &glyph_id) in &mappings {
            let glyph_index = usize::from(glyph_id);
            if glyph_index >= num_glyphs {
                continue;
            }
            let text = match glyphs.get(glyph_index) {
                Some(glyph) => glyph.to_text(),
                None => continue,
            };

            text_to_unicode.insert(text.clone(), unicode);
            unicode_to_text.insert(unicode, text);
            glyph_id_to_unicode[glyph_index] = unicode;
        }

        let reference = glyphs
            .iter()
            .take(num_glyphs)
            .zip(glyph_id_to_unicode.iter())
            .map(|(glyph, &unicode)| ReferenceGlyph::new(glyph.clone(), unicode))
            .collect();

        GlyphIndex {
            unicode_to_glyph_id: mappings,
            unicode_to_text,
            text_to_unicode,
            glyph_id_to_unicode,
            reference,
        }
    }

    /// The glyph id for `unicode`, 0 when the code point is not mapped.
    pub fn glyph_id(&self, unicode: u32) -> u16 {
        self.unicode_to_glyph_id
            .get(&unicode)
            .copied()
            .unwrap_or(0)
    }

    pub fn text_by_unicode(&self, unicode: u32) -> Option<&str> {
        self.unicode_to_text.get(&unicode).map(String::as_str)
    }

    pub fn unicode_by_text(&self, text: &str) -> Option<u32> {
        self.text_to_unicode.get(text).copied()
    }

    /// The code point mapped to `glyph_id`, 0 when unmapped.
    pub fn unicode_by_glyph_id(&self, glyph_id: u16) -> u32 {
        self.glyph_id_to_unicode
            .get(usize::from(glyph_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn mappings(&self) -> &BTreeMap<u32, u16> {
        &self.unicode_to_glyph_id
    }

    /// One entry per glyph id, pairing the outline with its code point.
    pub fn reference(&self) -> Arc<[ReferenceGlyph]> {
        Arc::clone(&self.reference)
    }
}
