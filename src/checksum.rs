#![deny(missing_docs)]

use std::num::Wrapping;

use crate::binary::read::ReadScope;
use crate::binary::U32Be;
use crate::error::ParseError;

/// The value every well-formed sfnt file sums to once `checkSumAdjustment` is set.
pub const SFNT_CHECKSUM_MAGIC: u32 = 0xB1B0AFBA;

/// Calculate a checksum of `data` according to the OpenType table checksum algorithm
///
/// `data` must be a whole number of 32-bit words.
///
/// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums
pub fn table_checksum(data: &[u8]) -> Result<Wrapping<u32>, ParseError> {
    if data.len() % 4 != 0 {
        return Err(ParseError::BadValue);
    }

    let mut ctxt = ReadScope::new(data).ctxt();
    let array = ctxt.read_array::<U32Be>(data.len() / 4)?;
    Ok(array.iter().map(Wrapping).sum())
}

/// Calculate the checksum of `data` as if it were zero padded to a 32-bit boundary.
pub fn padded_checksum(data: &[u8]) -> Wrapping<u32> {
    data.chunks(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            Wrapping(u32::from_be_bytes(word))
        })
        .sum()
}

/// The `head.checkSumAdjustment` value that makes a font file with sum `file_sum` valid.
pub fn checksum_adjustment(file_sum: Wrapping<u32>) -> u32 {
    (Wrapping(SFNT_CHECKSUM_MAGIC) - file_sum).0
}
