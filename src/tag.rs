//! Four byte font table tags.

use std::fmt;

/// Generate a 4-byte font table tag from byte string
///
/// Example:
///
/// ```
/// # use glyphmatch::tag;
/// assert_eq!(tag!(b"glyf"), 0x676C7966);
/// ```
#[macro_export]
macro_rules! tag {
    ($w:expr) => {
        $crate::tag::tag(*$w)
    };
}

/// Wrapper that formats a tag as its four characters, or as hex when they are not printable.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct DisplayTag(pub u32);

/// Pack four bytes into a big-endian tag value.
pub const fn tag(chars: [u8; 4]) -> u32 {
    u32::from_be_bytes(chars)
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.0;
        let s: String = tag.to_be_bytes().iter().map(|&b| char::from(b)).collect();
        if s.chars().any(|c| !c.is_ascii() || c.is_ascii_control()) {
            write!(f, "0x{:08x}", tag)
        } else {
            s.fmt(f)
        }
    }
}

impl fmt::Debug for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_string().fmt(f)
    }
}

/// `CFF `
pub const CFF: u32 = tag!(b"CFF ");
/// `cmap`
pub const CMAP: u32 = tag!(b"cmap");
/// `glyf`
pub const GLYF: u32 = tag!(b"glyf");
/// `head`
pub const HEAD: u32 = tag!(b"head");
/// `loca`
pub const LOCA: u32 = tag!(b"loca");
/// `maxp`
pub const MAXP: u32 = tag!(b"maxp");
/// `name`
pub const NAME: u32 = tag!(b"name");
/// `OTTO`, the sfnt version of fonts with CFF outlines
pub const OTTO: u32 = tag!(b"OTTO");
/// `true`, the legacy Apple sfnt version for TrueType outlines
pub const TRUE: u32 = tag!(b"true");
/// `wOFF`
pub const WOFF: u32 = tag!(b"wOFF");
/// `wOF2`
pub const WOFF2: u32 = tag!(b"wOF2");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_macro() {
        assert_eq!(tag!(b"head"), 0x68656164);
        assert_eq!(CFF, 0x43464620);
    }

    mod display_tag {
        use crate::tag::{DisplayTag, NAME};

        #[test]
        fn test_ascii() {
            assert_eq!(DisplayTag(NAME).to_string(), "name".to_string());
        }

        #[test]
        fn test_non_ascii() {
            assert_eq!(DisplayTag(0x12345678).to_string(), "0x12345678".to_string());
        }
    }
}
