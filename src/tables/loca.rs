//! Parsing of the `loca` table.
//!
//! > The indexToLoc table stores the offsets to the locations of the glyphs in the font, relative
//! > to the beginning of the glyphData table.
//!
//! — <https://docs.microsoft.com/en-us/typography/opentype/spec/loca>

use std::ops::Range;

use crate::binary::read::{ReadArray, ReadBinaryDep, ReadCtxt};
use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::tables::IndexToLocFormat;

/// `loca` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/loca>
#[derive(Clone, Debug)]
pub struct LocaTable<'a> {
    pub offsets: LocaOffsets<'a>,
}

#[derive(Clone, Debug)]
pub enum LocaOffsets<'a> {
    Short(ReadArray<'a, U16Be>),
    Long(ReadArray<'a, U32Be>),
}

impl ReadBinaryDep for LocaTable<'_> {
    type Args<'a> = (u16, IndexToLocFormat);
    type HostType<'a> = LocaTable<'a>;

    /// Read a `loca` table from `ctxt`
    ///
    /// * `num_glyphs` is the number of glyphs in the font, from the `maxp` table.
    /// * `index_to_loc_format` specifies whether the offsets in the `loca` table are short or
    ///   long. This value can be read from the `head` table.
    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (num_glyphs, index_to_loc_format): (u16, IndexToLocFormat),
    ) -> Result<Self::HostType<'a>, ParseError> {
        let num_offsets = usize::from(num_glyphs) + 1;
        let offsets = match index_to_loc_format {
            IndexToLocFormat::Short => LocaOffsets::Short(ctxt.read_array::<U16Be>(num_offsets)?),
            IndexToLocFormat::Long => LocaOffsets::Long(ctxt.read_array::<U32Be>(num_offsets)?),
        };

        Ok(LocaTable { offsets })
    }
}

impl<'a> LocaTable<'a> {
    /// The number of glyphs described by this table.
    pub fn num_glyphs(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Byte range of `glyph_id` within the `glyf` table.
    ///
    /// Returns `None` if the glyph id is out of range or the offsets decrease.
    pub fn glyph_range(&self, glyph_id: usize) -> Option<Range<usize>> {
        let start = self.offsets.get(glyph_id)?;
        let end = self.offsets.get(glyph_id + 1)?;
        if end < start {
            return None;
        }
        Some(usize::try_from(start).ok()?..usize::try_from(end).ok()?)
    }
}

impl<'a> LocaOffsets<'a> {
    /// Iterate the offsets in this table.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Returns the number of offsets in the table.
    pub fn len(&self) -> usize {
        match self {
            LocaOffsets::Short(array) => array.len(),
            LocaOffsets::Long(array) => array.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a specified offset from the table at `index`.
    pub fn get(&self, index: usize) -> Option<u32> {
        match self {
            // The actual local offset divided by 2 is stored.
            LocaOffsets::Short(array) => array.get_item(index).map(|offset| u32::from(offset) * 2),
            LocaOffsets::Long(array) => array.get_item(index),
        }
    }
}
