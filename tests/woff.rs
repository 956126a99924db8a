mod common;

use std::sync::Arc;

use glyphmatch::error::ParseError;
use glyphmatch::woff::{self, WoffCache};
use glyphmatch::{Font, FontType, MatchCaches};

use crate::common::{
    init_logging, n, otf_font, simple_glyph, woff_from_sfnt, woff_with_version, TtfBuilder,
};

fn ttf() -> Vec<u8> {
    let mut builder = TtfBuilder::new();
    let square = builder.glyph(simple_glyph(&[&[(0, 0), (0, 700), (700, 700), (700, 0)]]));
    builder.map(0x56DE, square).name(6, "Woff-Test");
    builder.build()
}

#[test]
fn test_decode_uncompressed() {
    let sfnt = ttf();
    let data = woff_from_sfnt(&sfnt, false);
    assert_eq!(woff::decode(&data).unwrap(), sfnt);
}

#[test]
fn test_decode_zlib() {
    init_logging();
    let sfnt = ttf();
    let data = woff_from_sfnt(&sfnt, true);
    assert_eq!(woff::decode(&data).unwrap(), sfnt);
}

#[test]
fn test_decode_otf() {
    let char_strings = vec![vec![14], vec![n(0), n(0), 21, n(50), n(50), 5, 14]];
    let sfnt = otf_font(&char_strings, &[(0x31, 1)]);
    assert_eq!(woff::decode(&woff_from_sfnt(&sfnt, true)).unwrap(), sfnt);
}

#[test]
fn test_woff2_version_selects_brotli() {
    let sfnt = ttf();

    // Stored tables need no decompression whatever the version says.
    let data = woff_with_version(&sfnt, false, 2);
    assert_eq!(woff::decode(&data).unwrap(), sfnt);

    // zlib streams are not valid brotli.
    let data = woff_with_version(&sfnt, true, 2);
    assert!(woff::decode(&data).is_err());
}

#[test]
fn test_unsupported_flavor() {
    let mut data = woff_from_sfnt(&ttf(), false);
    data[4..8].copy_from_slice(b"true");
    assert_eq!(woff::decode(&data).err(), Some(ParseError::BadVersion));
}

#[test]
fn test_truncated_woff() {
    let data = woff_from_sfnt(&ttf(), true);
    assert!(woff::decode(&data[..data.len() - 8]).is_err());
    assert!(woff::decode(&data[..30]).is_err());
}

#[test]
fn test_font_from_woff() {
    let sfnt = ttf();
    let data = woff_from_sfnt(&sfnt, true);
    let font = Font::with_caches(data, Arc::new(MatchCaches::new())).unwrap();

    assert_eq!(font.font_type(), FontType::Ttf);
    assert_eq!(font.data(), sfnt.as_slice());
    assert_eq!(font.unique_font_name(), "Woff-Test");
    assert_eq!(font.glyph_by_unicode(0x56DE), Some("0,0|0,700|700,0|0,-700"));
    assert_eq!(font.unicode_by_glyph("0,0|0,701|701,0|0,-701"), 0x56DE);
}

#[test]
fn test_cache_reuses_decoded_font() {
    let cache = WoffCache::new();
    let data = woff_from_sfnt(&ttf(), true);

    let first = cache.decode(&data).unwrap();
    let second = cache.decode(&data).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.size(), first.len());

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_cache_distinguishes_inputs_sharing_a_prefix() {
    let first = woff_from_sfnt(&ttf(), false);

    let mut builder = TtfBuilder::new();
    let diamond = builder.glyph(simple_glyph(&[&[(350, 0), (0, 350), (350, 700), (700, 350)]]));
    builder.map(0x56DE, diamond).name(6, "Woff-Test");
    let other = woff_from_sfnt(&builder.build(), false);
    assert_eq!(other.len(), first.len());

    // Same length and same leading bytes, different glyph data further in.
    let mut second = first[..100].to_vec();
    second.extend_from_slice(&other[100..]);
    assert_ne!(second, first);

    let cache = WoffCache::new();
    let decoded_first = cache.decode(&first).unwrap();
    let decoded_second = cache.decode(&second).unwrap();
    assert_ne!(decoded_first, decoded_second);
    assert_eq!(&*decoded_second, woff::decode(&other).unwrap().as_slice());
    assert_eq!(cache.len(), 2);

    assert_eq!(
        Font::from_bytes(&first).unwrap().glyph_by_unicode(0x56DE),
        Some("0,0|0,700|700,0|0,-700")
    );
    assert_eq!(
        Font::from_bytes(&second).unwrap().glyph_by_unicode(0x56DE),
        Some("350,0|-350,350|350,350|350,-350")
    );
}

#[test]
fn test_cache_budget() {
    let small = woff_from_sfnt(&ttf(), false);
    let decoded_len = woff::decode(&small).unwrap().len();

    let cache = WoffCache::with_budget(decoded_len);
    cache.decode(&small).unwrap();
    assert_eq!(cache.len(), 1);

    // A second font evicts the first to stay within budget.
    let mut builder = TtfBuilder::new();
    let glyph = builder.glyph(simple_glyph(&[&[(0, 0), (9, 0), (9, 9), (0, 9)]]));
    builder.map(0x41, glyph).name(6, "Woff-Next");
    let other = woff_from_sfnt(&builder.build(), false);
    let other_len = woff::decode(&other).unwrap().len();
    assert!(other_len <= decoded_len);

    cache.decode(&other).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.size(), other_len);

    // Nothing larger than the budget is kept.
    let cache = WoffCache::with_budget(decoded_len - 1);
    cache.decode(&small).unwrap();
    assert!(cache.is_empty());
}
