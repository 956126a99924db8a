//! CFF font handling.
//!
//! Refer to [Technical Note #5176](http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/font/pdfs/5176.CFF.pdf)
//! for more information.

use std::convert::TryFrom;
use std::fmt;

use log::warn;

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope};
use crate::error::ParseError;
use crate::tables::glyf::Glyph;

mod charstring;

pub use charstring::calc_subroutine_bias;

// An operator may be preceded by up to a maximum of 48 operands.
const MAX_OPERANDS: usize = 48;

const END_OF_FLOAT_FLAG: u8 = 0xf;

/// Top DICT operator giving the offset of the CharStrings INDEX.
pub const CHAR_STRINGS: u16 = 17;
/// Top DICT operator giving the size and offset of the Private DICT.
pub const PRIVATE: u16 = 18;
/// Private DICT operator giving the offset of the local subroutines, relative to the Private DICT.
pub const SUBRS: u16 = 19;

/// A parsed CFF table.
///
/// Only the first font of a font set is used.
#[derive(Clone)]
pub struct CFF<'a> {
    pub header: Header,
    pub name_index: Index<'a>,
    pub top_dict: Dict,
    pub string_index: Index<'a>,
    pub global_subr_index: Index<'a>,
    pub char_strings_index: Index<'a>,
    pub private_dict: Option<Dict>,
    pub local_subr_index: Option<Index<'a>>,
}

/// CFF Font Header described in Section 6 of Technical Note #5176
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub major: u8,
    pub minor: u8,
    pub hdr_size: u8,
    pub off_size: u8,
}

/// A CFF INDEX described in Section 5 of Technical Note #5176
#[derive(Clone)]
pub struct Index<'a> {
    pub count: usize,
    off_size: u8,
    offset_array: &'a [u8],
    data_array: &'a [u8],
}

/// A DICT: a list of operators, each with the operands that preceded it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dict {
    pub dict: Vec<(u16, Vec<Operand>)>,
}

/// CFF operand to an operator
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum Operand {
    Integer(i32),
    /// A real number. Its value is not needed by any operator this crate consumes.
    Real,
}

enum Op {
    Operator(u16),
    Operand(Operand),
    Reserved(u8),
}

/// A list of errors that can occur when interpreting CFF CharStrings.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum CFFError {
    ParseError(ParseError),
    InvalidOperator,
    InvalidArgumentsStackLength,
    ArgumentsStackLimitReached,
    NestingLimitReached,
    InvalidSubroutineIndex,
    MissingEndChar,
    MissingMoveTo,
}

/// Two byte DICT operator value for `12 value`.
pub const fn op2(value: u8) -> u16 {
    (12 << 8) | (value as u16)
}

impl<'b> ReadBinary for CFF<'b> {
    type HostType<'a> = CFF<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        // Offsets in the top DICT are relative to the start of the CFF data.
        let scope = ctxt.scope();

        let header = ctxt.read::<Header>()?;
        let name_index = ctxt.read::<Index<'_>>()?;
        let top_dict_index = ctxt.read::<Index<'_>>()?;
        let string_index = ctxt.read::<Index<'_>>()?;
        let global_subr_index = ctxt.read::<Index<'_>>()?;

        let top_dict_data = top_dict_index
            .read_object(0)
            .ok_or(ParseError::MissingValue)?;
        let top_dict = ReadScope::new(top_dict_data).read::<Dict>()?;

        let offset = top_dict
            .get_i32(CHAR_STRINGS)
            .ok_or(ParseError::MissingValue)?;
        let char_strings_index = scope.offset(usize::try_from(offset)?).read::<Index<'_>>()?;

        let (private_dict, local_subr_index) = match top_dict.read_private_dict(&scope)? {
            Some((private_dict, private_dict_offset)) => {
                let local_subr_index =
                    read_local_subr_index(&scope, &private_dict, private_dict_offset)?;
                (Some(private_dict), local_subr_index)
            }
            None => (None, None),
        };

        Ok(CFF {
            header,
            name_index,
            top_dict,
            string_index,
            global_subr_index,
            char_strings_index,
            private_dict,
            local_subr_index,
        })
    }
}

impl<'a> CFF<'a> {
    /// Number of CharStrings, which is the number of glyphs in the font.
    pub fn glyph_count(&self) -> usize {
        self.char_strings_index.count
    }

    /// Execute the CharString of `glyph_id` and return its outline.
    ///
    /// Any failure is logged and yields `Glyph::Empty`.
    pub fn glyph_outline(&self, glyph_id: u16) -> Glyph {
        match self.try_glyph_outline(glyph_id) {
            Ok(glyph) => glyph,
            Err(err) => {
                warn!("unable to read CFF glyph {}: {}", glyph_id, err);
                Glyph::Empty
            }
        }
    }

    /// Execute the CharString of `glyph_id`, reporting failures.
    pub fn try_glyph_outline(&self, glyph_id: u16) -> Result<Glyph, CFFError> {
        let char_string = self
            .char_strings_index
            .read_object(usize::from(glyph_id))
            .ok_or(ParseError::BadIndex)?;
        charstring::parse_char_string(
            char_string,
            &self.global_subr_index,
            self.local_subr_index.as_ref(),
        )
    }
}

impl ReadBinary for Header {
    type HostType<'b> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        // From section 6 of Technical Note #5176:
        // If the major version number is understood by an implementation it can safely proceed
        // with reading the font.
        let major = ctxt.read_u8()?;
        ctxt.check_version(major == 1)?;
        let minor = ctxt.read_u8()?;
        let hdr_size = ctxt.read_u8()?;
        let off_size = ctxt.read_u8()?;

        if hdr_size < 4 {
            return Err(ParseError::BadValue);
        }

        if !(1..=4).contains(&off_size) {
            return Err(ParseError::BadValue);
        }

        let _unknown = ctxt.read_slice(usize::from(hdr_size - 4))?;

        Ok(Header {
            major,
            minor,
            hdr_size,
            off_size,
        })
    }
}

impl<'b> ReadBinary for Index<'b> {
    type HostType<'a> = Index<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let count = usize::from(ctxt.read_u16be()?);

        if count > 0 {
            let off_size = ctxt.read_u8()?;
            if !(1..=4).contains(&off_size) {
                return Err(ParseError::BadValue);
            }

            let offset_array_size = (count + 1) * usize::from(off_size);
            let offset_array = ctxt.read_slice(offset_array_size)?;

            let last_offset_index = lookup_offset_index(off_size, offset_array, count);
            if last_offset_index < 1 {
                return Err(ParseError::BadValue);
            }

            let data_array_size = last_offset_index - 1;
            let data_array = ctxt.read_slice(data_array_size)?;

            Ok(Index {
                count,
                off_size,
                offset_array,
                data_array,
            })
        } else {
            Ok(Index::empty())
        }
    }
}

impl<'a> Index<'a> {
    pub fn empty() -> Self {
        Index {
            count: 0,
            off_size: 1,
            offset_array: &[],
            data_array: &[],
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the bytes of the object at `index`.
    ///
    /// Offsets are 1-based. Returns `None` if `index` is out of range or the offsets are
    /// inconsistent.
    pub fn read_object(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.count {
            return None;
        }

        let start = lookup_offset_index(self.off_size, self.offset_array, index).checked_sub(1)?;
        let end = lookup_offset_index(self.off_size, self.offset_array, index + 1).checked_sub(1)?;
        if end < start {
            return None;
        }
        self.data_array.get(start..end)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        (0..self.count).filter_map(move |index| self.read_object(index))
    }

    /// Length of the data array, which excludes the count, offSize and offsets.
    pub fn data_len(&self) -> usize {
        self.data_array.len()
    }
}

impl fmt::Debug for Index<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("count", &self.count)
            .field("off_size", &self.off_size)
            .field("data_len", &self.data_array.len())
            .finish()
    }
}

fn lookup_offset_index(off_size: u8, offset_array: &[u8], index: usize) -> usize {
    let start = index * usize::from(off_size);
    offset_array
        .get(start..start + usize::from(off_size))
        .map(|bytes| {
            bytes
                .iter()
                .fold(0usize, |value, &byte| (value << 8) | usize::from(byte))
        })
        .unwrap_or(0)
}

impl ReadBinary for Dict {
    type HostType<'b> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let mut dict = Vec::new();
        let mut operands = Vec::new();

        while ctxt.bytes_available() {
            match Op::read(ctxt)? {
                Op::Operator(operator) => {
                    dict.push((operator, std::mem::take(&mut operands)));
                }
                Op::Operand(operand) => {
                    operands.push(operand);
                    if operands.len() > MAX_OPERANDS {
                        return Err(ParseError::LimitExceeded);
                    }
                }
                Op::Reserved(byte) => warn!("skipping reserved DICT byte {}", byte),
            }
        }

        Ok(Dict { dict })
    }
}

impl Dict {
    pub fn get(&self, key: u16) -> Option<&[Operand]> {
        self.dict
            .iter()
            .find(|(operator, _)| *operator == key)
            .map(|(_, operands)| operands.as_slice())
    }

    /// The last integer operand of `key`.
    pub fn get_i32(&self, key: u16) -> Option<i32> {
        match self.get(key)?.last()? {
            Operand::Integer(value) => Some(*value),
            Operand::Real => None,
        }
    }

    /// Read the Private DICT referenced by this Top DICT, returning it with its offset.
    fn read_private_dict(&self, scope: &ReadScope<'_>) -> Result<Option<(Dict, usize)>, ParseError> {
        let (size, offset) = match self.get(PRIVATE) {
            Some([Operand::Integer(size), Operand::Integer(offset)]) => {
                (usize::try_from(*size)?, usize::try_from(*offset)?)
            }
            Some(_) => return Err(ParseError::BadValue),
            None => return Ok(None),
        };
        let private_dict = scope.offset_length(offset, size)?.read::<Dict>()?;
        Ok(Some((private_dict, offset)))
    }
}

fn read_local_subr_index<'a>(
    scope: &ReadScope<'a>,
    private_dict: &Dict,
    private_dict_offset: usize,
) -> Result<Option<Index<'a>>, ParseError> {
    // Local subrs are stored relative to the private dict
    match private_dict.get_i32(SUBRS) {
        Some(offset) => {
            let offset = usize::try_from(offset)?;
            let offset = private_dict_offset
                .checked_add(offset)
                .ok_or(ParseError::BadOffset)?;
            scope.offset(offset).read::<Index<'_>>().map(Some)
        }
        None => Ok(None),
    }
}

impl ReadBinary for Op {
    type HostType<'b> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let b0 = ctxt.read_u8()?;

        match b0 {
            0..=11 | 13..=21 => Ok(Op::Operator(u16::from(b0))),
            12 => Ok(Op::Operator(op2(ctxt.read_u8()?))),
            28 => ok_int(i32::from(ctxt.read_i16be()?)),
            29 => ok_int(ctxt.read_i32be()?),
            30 => {
                let _real = ctxt.read_until_nibble(END_OF_FLOAT_FLAG)?;
                Ok(Op::Operand(Operand::Real))
            }
            32..=246 => ok_int(i32::from(b0) - 139),
            247..=250 => {
                let b1 = ctxt.read_u8()?;
                ok_int((i32::from(b0) - 247) * 256 + i32::from(b1) + 108)
            }
            251..=254 => {
                let b1 = ctxt.read_u8()?;
                ok_int(-(i32::from(b0) - 251) * 256 - i32::from(b1) - 108)
            }
            22..=27 | 31 | 255 => Ok(Op::Reserved(b0)),
        }
    }
}

fn ok_int(num: i32) -> Result<Op, ParseError> {
    Ok(Op::Operand(Operand::Integer(num)))
}

impl From<ParseError> for CFFError {
    fn from(error: ParseError) -> CFFError {
        CFFError::ParseError(error)
    }
}

impl From<crate::binary::read::ReadEof> for CFFError {
    fn from(error: crate::binary::read::ReadEof) -> CFFError {
        CFFError::ParseError(ParseError::from(error))
    }
}

impl fmt::Display for CFFError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CFFError::ParseError(parse_error) => {
                write!(f, "parse error: ")?;
                parse_error.fmt(f)
            }
            CFFError::InvalidOperator => write!(f, "an invalid operator occurred"),
            CFFError::InvalidArgumentsStackLength => {
                write!(f, "an invalid amount of items are in an arguments stack")
            }
            CFFError::ArgumentsStackLimitReached => write!(f, "arguments stack limit reached"),
            CFFError::NestingLimitReached => write!(f, "subroutines nesting limit reached"),
            CFFError::InvalidSubroutineIndex => write!(f, "an invalid subroutine index"),
            CFFError::MissingEndChar => write!(f, "the 'endchar' operator is missing"),
            CFFError::MissingMoveTo => write!(f, "missing moveto operator"),
        }
    }
}

impl std::error::Error for CFFError {}
