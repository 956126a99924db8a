#![deny(missing_docs)]

//! Utilities for handling the Mac OS Roman character set.

/// Characters for the upper half (0x80..=0xFF) of Mac OS Roman.
///
/// 0xDB is the euro sign and 0xF0 the Apple logo in the private use area, as in the
/// current Apple mapping.
#[rustfmt::skip]
const HIGH_HALF: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è',
    'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü',
    '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø',
    '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø',
    '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ',
    '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›', 'ﬁ', 'ﬂ',
    '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô',
    '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
];

/// Returns `true` if the supplied `char` exists in the Mac OS Roman character encoding.
///
/// https://en.wikipedia.org/wiki/Mac_OS_Roman
pub fn is_macroman(chr: char) -> bool {
    char_to_macroman(chr).is_some()
}

/// Converts a `char` to its Mac OS Roman character encoding.
///
/// Returns `None` if the character is not part of the Mac OS Roman character set.
pub fn char_to_macroman(chr: char) -> Option<u8> {
    if chr.is_ascii() {
        return Some(chr as u8);
    }

    HIGH_HALF
        .iter()
        .position(|&high| high == chr)
        .map(|index| 0x80 + index as u8)
}

/// Converts a Mac OS Roman byte to the `char` it encodes.
///
/// Every byte value is defined, so this conversion cannot fail.
pub fn macroman_to_char(macroman: u8) -> char {
    match macroman {
        0..=0x7F => char::from(macroman),
        _ => HIGH_HALF[usize::from(macroman - 0x80)],
    }
}

/// Decodes a Mac OS Roman byte string.
pub fn decode(data: &[u8]) -> String {
    data.iter().copied().map(macroman_to_char).collect()
}
