#![warn(rust_2018_idioms)]

//! Font outline decoding and shape based glyph to code point resolution.
//!
//! Fonts are loaded from sfnt (TrueType or CFF flavoured) or WOFF data with
//! [`Font::new`](font::Font::new). Every glyph outline is decoded up front and indexed against
//! the font's `cmap`. Outlines that the `cmap` does not account for are resolved by comparing
//! their shape with the outlines of the font.

/// Reading and writing of binary data.
pub mod binary;
pub mod cff;
/// Checksum calculation routines.
pub mod checksum;
pub mod error;
pub mod font;
/// Assembly of sfnt fonts from tables.
pub mod font_builder;
pub mod glyph_index;
/// Utilities for handling the Mac OS Roman character set.
pub mod macroman;
pub mod matcher;
pub mod name;
pub mod tables;
pub mod tag;
/// Reading of the WOFF format.
pub mod woff;

pub use font::{Font, FontType};
pub use matcher::{GlyphShapeMatcher, MatchCaches};
