//! Big-endian binary encoding used by sfnt, CFF and WOFF data.
//!
//! The uninhabited types below name an on-disk encoding. They are never constructed; reading
//! `U16Be` yields a `u16`, writing an `I16Be` consumes an `i16` and so on.

/// Bounds checked reading of big-endian font data
pub mod read;

/// Writing of big-endian font data
pub mod write;

/// Round `len` up to the next multiple of four, the alignment of sfnt tables.
///
/// ```
/// use glyphmatch::binary::long_align;
///
/// assert_eq!(long_align(123), 124);
/// assert_eq!(long_align(124), 124);
/// ```
pub const fn long_align(len: usize) -> usize {
    (len + 3) & !3
}

#[derive(Copy, Clone)]
pub enum U8 {}

#[derive(Copy, Clone)]
pub enum I8 {}

#[derive(Copy, Clone)]
pub enum U16Be {}

#[derive(Copy, Clone)]
pub enum I16Be {}

/// Three byte offsets, as found in CFF INDEXes with `offSize` 3.
#[derive(Copy, Clone)]
pub enum U24Be {}

#[derive(Copy, Clone)]
pub enum U32Be {}

#[derive(Copy, Clone)]
pub enum I32Be {}

/// `LONGDATETIME` fields of `head`.
#[derive(Copy, Clone)]
pub enum I64Be {}
