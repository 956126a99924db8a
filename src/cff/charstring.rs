// Portions of this file derived from ttf-parser, licenced under Apache-2.0.
// https://github.com/RazrFalcon/ttf-parser/tree/439aaaebd50eb8aed66302e3c1b51fae047f85b2

//! Type 2 CharString execution.
//!
//! Refer to [Technical Note #5177](https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf).

use std::convert::TryFrom;

use log::warn;

use crate::binary::read::{ReadCtxt, ReadScope};
use crate::error::ParseError;
use crate::tables::glyf::{Glyph, Point, SimpleGlyph, SimpleGlyphFlag};
use crate::tables::Fixed;

use super::{CFFError, Index, MAX_OPERANDS};

mod argstack;

pub use argstack::ArgumentsStack;

// Limits according to the Adobe Technical Note #5177 Appendix B.
pub(crate) const STACK_LIMIT: usize = 10;
pub(crate) const MAX_ARGUMENTS_STACK_LEN: usize = MAX_OPERANDS;

pub(crate) const TWO_BYTE_OPERATOR_MARK: u8 = 12;

pub(crate) mod operator {
    pub const HORIZONTAL_STEM: u8 = 1;
    pub const VERTICAL_STEM: u8 = 3;
    pub const VERTICAL_MOVE_TO: u8 = 4;
    pub const LINE_TO: u8 = 5;
    pub const HORIZONTAL_LINE_TO: u8 = 6;
    pub const VERTICAL_LINE_TO: u8 = 7;
    pub const CURVE_TO: u8 = 8;
    pub const CALL_LOCAL_SUBROUTINE: u8 = 10;
    pub const RETURN: u8 = 11;
    pub const ENDCHAR: u8 = 14;
    pub const HORIZONTAL_STEM_HINT_MASK: u8 = 18;
    pub const HSBW: u8 = 19;
    pub const COUNTER_MASK: u8 = 20;
    pub const MOVE_TO: u8 = 21;
    pub const HORIZONTAL_MOVE_TO: u8 = 22;
    pub const VERTICAL_STEM_HINT_MASK: u8 = 23;
    pub const CURVE_LINE: u8 = 24;
    pub const LINE_CURVE: u8 = 25;
    pub const VV_CURVE_TO: u8 = 26;
    pub const HH_CURVE_TO: u8 = 27;
    pub const SHORT_INT: u8 = 28;
    pub const CALL_GLOBAL_SUBROUTINE: u8 = 29;
    pub const VH_CURVE_TO: u8 = 30;
    pub const HV_CURVE_TO: u8 = 31;
    pub const FIXED_16_16: u8 = 255;
}

/// Operators following the `12` escape byte.
pub(crate) mod escape {
    pub const VERTICAL_MOVE_TO: u8 = 34;
    pub const LINE_TO: u8 = 35;
    pub const HORIZONTAL_LINE_TO: u8 = 36;
    pub const MOVE_TO: u8 = 37;
    pub const CURVE_TO: u8 = 38;
}

/// Collects the points of the outline as they are produced.
///
/// Every point, curve control points included, is flagged on-curve.
#[derive(Default)]
struct Builder {
    end_pts_of_contours: Vec<u16>,
    flags: Vec<SimpleGlyphFlag>,
    coordinates: Vec<Point>,
    contour_start: usize,
}

impl Builder {
    fn move_to(&mut self, x: f32, y: f32) -> Result<(), CFFError> {
        self.close()?;
        self.push_point(x, y);
        Ok(())
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.push_point(x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.push_point(x1, y1);
        self.push_point(x2, y2);
        self.push_point(x, y);
    }

    fn close(&mut self) -> Result<(), CFFError> {
        if self.coordinates.len() > self.contour_start {
            let end = u16::try_from(self.coordinates.len() - 1)
                .map_err(|_| ParseError::LimitExceeded)?;
            self.end_pts_of_contours.push(end);
            self.contour_start = self.coordinates.len();
        }
        Ok(())
    }

    fn push_point(&mut self, x: f32, y: f32) {
        self.coordinates.push(Point(round_coordinate(x), round_coordinate(y)));
        self.flags.push(SimpleGlyphFlag::ON_CURVE_POINT);
    }

    fn into_glyph(self) -> Glyph {
        if self.coordinates.is_empty() {
            Glyph::Empty
        } else {
            Glyph::Simple(SimpleGlyph::new(
                self.end_pts_of_contours,
                self.flags,
                self.coordinates,
            ))
        }
    }
}

fn round_coordinate(value: f32) -> i16 {
    // `as` saturates out of range values.
    value.round() as i16
}

pub(crate) struct CharStringParser<'a> {
    pub stack: ArgumentsStack<'a>,
    builder: Builder,
    pub x: f32,
    pub y: f32,
    // Used to track if a moveto operator has been encountered before other path building operators.
    // Adobe Technical Note #5177 - The Type 2 Charstring Format:
    // > Every character path and subpath must begin with one of the moveto operators. If the
    // > current path is open when a moveto operator is encountered, the path is closed before
    // > performing the moveto operation.
    pub has_move_to: bool,
    pub width_parsed: bool,
    pub stems_len: u32,
    pub has_endchar: bool,
}

/// Execute `char_string` and return the outline it draws.
pub(crate) fn parse_char_string<'a>(
    char_string: &'a [u8],
    global_subr_index: &Index<'a>,
    local_subr_index: Option<&Index<'a>>,
) -> Result<Glyph, CFFError> {
    let mut data = [0.0; MAX_ARGUMENTS_STACK_LEN];
    let mut parser = CharStringParser {
        stack: ArgumentsStack::new(&mut data),
        builder: Builder::default(),
        x: 0.0,
        y: 0.0,
        has_move_to: false,
        width_parsed: false,
        stems_len: 0,
        has_endchar: false,
    };

    parser.execute(char_string, global_subr_index, local_subr_index)?;

    if !parser.has_endchar {
        return Err(CFFError::MissingEndChar);
    }

    Ok(parser.builder.into_glyph())
}

impl<'a> CharStringParser<'a> {
    fn execute<'data>(
        &mut self,
        char_string: &'data [u8],
        global_subr_index: &Index<'data>,
        local_subr_index: Option<&Index<'data>>,
    ) -> Result<(), CFFError> {
        let mut call_stack: Vec<ReadCtxt<'data>> = Vec::with_capacity(STACK_LIMIT);
        let mut s = ReadScope::new(char_string).ctxt();

        loop {
            if !s.bytes_available() {
                // Running off the end of a subroutine behaves like `return`.
                match call_stack.pop() {
                    Some(caller) => {
                        s = caller;
                        continue;
                    }
                    None => break,
                }
            }

            let op = s.read_u8()?;
            match op {
                operator::HORIZONTAL_STEM
                | operator::VERTICAL_STEM
                | operator::HORIZONTAL_STEM_HINT_MASK
                | operator::VERTICAL_STEM_HINT_MASK => {
                    // If the stack length is uneven, then the first value is a `width`.
                    let len = if self.stack.len() % 2 == 1 && !self.width_parsed {
                        self.stack.len() - 1
                    } else {
                        self.stack.len()
                    };
                    self.width_parsed = true;
                    self.stems_len += len as u32 >> 1;

                    // We are ignoring the hint operators.
                    self.stack.clear();
                }
                operator::HSBW => {
                    // sbx wx: side bearing and advance width have no effect on the outline
                    if self.stack.len() != 2 {
                        warn!("hsbw with {} operands", self.stack.len());
                    }
                    self.width_parsed = true;
                    self.stack.clear();
                }
                operator::COUNTER_MASK => {
                    // Pending operands are an implicit vstem.
                    let mut len = self.stack.len();
                    if len % 2 == 1 && !self.width_parsed {
                        len -= 1;
                    }
                    self.width_parsed = true;
                    self.stems_len += len as u32 >> 1;
                    self.stack.clear();

                    let mask_len =
                        usize::try_from((self.stems_len + 7) >> 3).map_err(ParseError::from)?;
                    s.skip(mask_len)?;
                }
                operator::MOVE_TO => {
                    let offset = self.handle_width(3);
                    self.parse_move_to(offset)?;
                }
                operator::HORIZONTAL_MOVE_TO => {
                    let offset = self.handle_width(2);
                    self.parse_horizontal_move_to(offset)?;
                }
                operator::VERTICAL_MOVE_TO => {
                    let offset = self.handle_width(2);
                    self.parse_vertical_move_to(offset)?;
                }
                operator::LINE_TO => self.parse_line_to()?,
                operator::HORIZONTAL_LINE_TO => self.parse_horizontal_line_to()?,
                operator::VERTICAL_LINE_TO => self.parse_vertical_line_to()?,
                operator::CURVE_TO => self.parse_curve_to()?,
                operator::CURVE_LINE => self.parse_curve_line()?,
                operator::LINE_CURVE => self.parse_line_curve()?,
                operator::VV_CURVE_TO => self.parse_vv_curve_to()?,
                operator::HH_CURVE_TO => self.parse_hh_curve_to()?,
                operator::VH_CURVE_TO => self.parse_vh_curve_to()?,
                operator::HV_CURVE_TO => self.parse_hv_curve_to()?,
                operator::CALL_LOCAL_SUBROUTINE | operator::CALL_GLOBAL_SUBROUTINE => {
                    if self.stack.is_empty() {
                        return Err(CFFError::InvalidArgumentsStackLength);
                    }

                    if call_stack.len() == STACK_LIMIT {
                        return Err(CFFError::NestingLimitReached);
                    }

                    let subrs = if op == operator::CALL_LOCAL_SUBROUTINE {
                        local_subr_index.ok_or(CFFError::InvalidSubroutineIndex)?
                    } else {
                        global_subr_index
                    };
                    let subroutine_bias = calc_subroutine_bias(subrs.len());
                    let index = conv_subroutine_index(self.stack.pop(), subroutine_bias)?;
                    let char_string = subrs
                        .read_object(index)
                        .ok_or(CFFError::InvalidSubroutineIndex)?;

                    let caller = std::mem::replace(&mut s, ReadScope::new(char_string).ctxt());
                    call_stack.push(caller);
                }
                operator::RETURN => match call_stack.pop() {
                    Some(caller) => s = caller,
                    None => break,
                },
                operator::ENDCHAR => {
                    if !self.width_parsed && (self.stack.len() == 1 || self.stack.len() == 5) {
                        self.stack.pop();
                    }
                    if !self.stack.is_empty() {
                        // seac style accented characters are not composed
                        warn!("ignoring {} endchar operands", self.stack.len());
                        self.stack.clear();
                    }
                    self.width_parsed = true;
                    self.builder.close()?;
                    self.has_endchar = true;
                    break;
                }
                TWO_BYTE_OPERATOR_MARK => {
                    let op2 = s.read_u8()?;
                    match op2 {
                        escape::VERTICAL_MOVE_TO => {
                            let offset = self.handle_width(2);
                            self.parse_vertical_move_to(offset)?;
                        }
                        escape::LINE_TO => self.parse_line_to()?,
                        escape::HORIZONTAL_LINE_TO => self.parse_horizontal_line_to()?,
                        escape::MOVE_TO => {
                            let offset = self.handle_width(3);
                            self.parse_move_to(offset)?;
                        }
                        escape::CURVE_TO => self.parse_curve_to()?,
                        _ => {
                            warn!("unsupported charstring operator 12 {}", op2);
                            self.stack.clear();
                        }
                    }
                }
                operator::SHORT_INT => {
                    let n = s.read_i16be()?;
                    self.stack.push(f32::from(n))?;
                }
                32..=246 => {
                    self.stack.push(parse_int1(op))?;
                }
                247..=250 => {
                    self.stack.push(parse_int2(op, &mut s)?)?;
                }
                251..=254 => {
                    self.stack.push(parse_int3(op, &mut s)?)?;
                }
                operator::FIXED_16_16 => {
                    self.stack.push(parse_fixed(&mut s)?)?;
                }
                _ => {
                    warn!("unsupported charstring operator {}", op);
                    self.stack.clear();
                }
            }
        }

        Ok(())
    }

    /// Returns the index of the first operand, skipping a leading width if present.
    ///
    /// A width is present when the first stack clearing operator sees `expected + 1` operands
    /// where it expects `expected`.
    fn handle_width(&mut self, len_with_width: usize) -> usize {
        let offset = if !self.width_parsed && self.stack.len() == len_with_width {
            1
        } else {
            0
        };
        self.width_parsed = true;
        offset
    }

    fn begin_contour(&mut self) -> Result<(), CFFError> {
        self.has_move_to = true;
        self.builder.move_to(self.x, self.y)?;
        self.stack.clear();
        Ok(())
    }

    pub fn parse_move_to(&mut self, offset: usize) -> Result<(), CFFError> {
        // dx1 dy1

        if self.stack.len() != offset + 2 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        self.x += self.stack.at(offset);
        self.y += self.stack.at(offset + 1);
        self.begin_contour()
    }

    pub fn parse_horizontal_move_to(&mut self, offset: usize) -> Result<(), CFFError> {
        // dx1

        if self.stack.len() != offset + 1 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        self.x += self.stack.at(offset);
        self.begin_contour()
    }

    pub fn parse_vertical_move_to(&mut self, offset: usize) -> Result<(), CFFError> {
        // dy1

        if self.stack.len() != offset + 1 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        self.y += self.stack.at(offset);
        self.begin_contour()
    }

    pub fn parse_line_to(&mut self) -> Result<(), CFFError> {
        // {dxa dya}+

        if !self.has_move_to {
            return Err(CFFError::MissingMoveTo);
        }

        if self.stack.len() % 2 == 1 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() {
            self.x += self.stack.at(i);
            self.y += self.stack.at(i + 1);
            self.builder.line_to(self.x, self.y);
            i += 2;
        }

        self.stack.clear();
        Ok(())
    }

    pub fn parse_horizontal_line_to(&mut self) -> Result<(), CFFError> {
        // dx1 {dya dxb}*
        //     {dxa dyb}+
        self.parse_alternating_line_to(true)
    }

    pub fn parse_vertical_line_to(&mut self) -> Result<(), CFFError> {
        // dy1 {dxa dyb}*
        //     {dya dxb}+
        self.parse_alternating_line_to(false)
    }

    fn parse_alternating_line_to(&mut self, mut horizontal: bool) -> Result<(), CFFError> {
        if !self.has_move_to {
            return Err(CFFError::MissingMoveTo);
        }

        if self.stack.is_empty() {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        for i in 0..self.stack.len() {
            if horizontal {
                self.x += self.stack.at(i);
            } else {
                self.y += self.stack.at(i);
            }
            self.builder.line_to(self.x, self.y);
            horizontal = !horizontal;
        }

        self.stack.clear();
        Ok(())
    }

    pub fn parse_curve_to(&mut self) -> Result<(), CFFError> {
        // {dxa dya dxb dyb dxc dyc}+

        if !self.has_move_to {
            return Err(CFFError::MissingMoveTo);
        }

        if self.stack.is_empty() || self.stack.len() % 6 != 0 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() {
            self.curve_from(i);
            i += 6;
        }

        self.stack.clear();
        Ok(())
    }

    pub fn parse_curve_line(&mut self) -> Result<(), CFFError> {
        // {dxa dya dxb dyb dxc dyc}+ dxd dyd

        if !self.has_move_to {
            return Err(CFFError::MissingMoveTo);
        }

        if self.stack.len() < 8 || (self.stack.len() - 2) % 6 != 0 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() - 2 {
            self.curve_from(i);
            i += 6;
        }

        self.x += self.stack.at(i);
        self.y += self.stack.at(i + 1);
        self.builder.line_to(self.x, self.y);

        self.stack.clear();
        Ok(())
    }

    pub fn parse_line_curve(&mut self) -> Result<(), CFFError> {
        // {dxa dya}+ dxb dyb dxc dyc dxd dyd

        if !self.has_move_to {
            return Err(CFFError::MissingMoveTo);
        }

        if self.stack.len() < 8 || (self.stack.len() - 6) % 2 == 1 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        let mut i = 0;
        while i < self.stack.len() - 6 {
            self.x += self.stack.at(i);
            self.y += self.stack.at(i + 1);
            self.builder.line_to(self.x, self.y);
            i += 2;
        }

        self.curve_from(i);

        self.stack.clear();
        Ok(())
    }

    /// Draw the curve whose six relative operands start at `i`.
    fn curve_from(&mut self, i: usize) {
        let x1 = self.x + self.stack.at(i);
        let y1 = self.y + self.stack.at(i + 1);
        let x2 = x1 + self.stack.at(i + 2);
        let y2 = y1 + self.stack.at(i + 3);
        self.x = x2 + self.stack.at(i + 4);
        self.y = y2 + self.stack.at(i + 5);
        self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
    }

    pub fn parse_hh_curve_to(&mut self) -> Result<(), CFFError> {
        // dy1? {dxa dxb dyb dxc}+

        if !self.has_move_to {
            return Err(CFFError::MissingMoveTo);
        }

        let mut i = 0;

        // The odd argument count indicates an Y position.
        if self.stack.len() % 2 == 1 {
            self.y += self.stack.at(0);
            i += 1;
        }

        if self.stack.len() == i || (self.stack.len() - i) % 4 != 0 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        while i < self.stack.len() {
            let x1 = self.x + self.stack.at(i);
            let y1 = self.y;
            let x2 = x1 + self.stack.at(i + 1);
            let y2 = y1 + self.stack.at(i + 2);
            self.x = x2 + self.stack.at(i + 3);
            self.y = y2;

            self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
            i += 4;
        }

        self.stack.clear();
        Ok(())
    }

    pub fn parse_vv_curve_to(&mut self) -> Result<(), CFFError> {
        // dx1? {dya dxb dyb dyc}+

        if !self.has_move_to {
            return Err(CFFError::MissingMoveTo);
        }

        let mut i = 0;

        // The odd argument count indicates an X position.
        if self.stack.len() % 2 == 1 {
            self.x += self.stack.at(0);
            i += 1;
        }

        if self.stack.len() == i || (self.stack.len() - i) % 4 != 0 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        while i < self.stack.len() {
            let x1 = self.x;
            let y1 = self.y + self.stack.at(i);
            let x2 = x1 + self.stack.at(i + 1);
            let y2 = y1 + self.stack.at(i + 2);
            self.x = x2;
            self.y = y2 + self.stack.at(i + 3);

            self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
            i += 4;
        }

        self.stack.clear();
        Ok(())
    }

    pub fn parse_hv_curve_to(&mut self) -> Result<(), CFFError> {
        // dx1 dx2 dy2 dy3 {dya dxb dyb dxc dxd dxe dye dyf}* dxf?
        //                 {dxa dxb dyb dyc dyd dxe dye dxf}+ dyf?
        self.parse_alternating_curve_to(true)
    }

    pub fn parse_vh_curve_to(&mut self) -> Result<(), CFFError> {
        // dy1 dx2 dy2 dx3 {dxa dxb dyb dyc dyd dxe dye dxf}* dyf?
        //                 {dya dxb dyb dxc dxd dxe dye dyf}+ dxf?
        self.parse_alternating_curve_to(false)
    }

    fn parse_alternating_curve_to(&mut self, mut horizontal: bool) -> Result<(), CFFError> {
        if !self.has_move_to {
            return Err(CFFError::MissingMoveTo);
        }

        if self.stack.len() < 4 {
            return Err(CFFError::InvalidArgumentsStackLength);
        }

        self.stack.reverse();
        while !self.stack.is_empty() {
            if self.stack.len() < 4 {
                return Err(CFFError::InvalidArgumentsStackLength);
            }

            if horizontal {
                let x1 = self.x + self.stack.pop();
                let y1 = self.y;
                let x2 = x1 + self.stack.pop();
                let y2 = y1 + self.stack.pop();
                self.y = y2 + self.stack.pop();
                self.x = x2 + self.pop_last_delta();
                self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
            } else {
                let x1 = self.x;
                let y1 = self.y + self.stack.pop();
                let x2 = x1 + self.stack.pop();
                let y2 = y1 + self.stack.pop();
                self.x = x2 + self.stack.pop();
                self.y = y2 + self.pop_last_delta();
                self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
            }
            horizontal = !horizontal;
        }

        Ok(())
    }

    // The final curve may carry one extra delta for the axis it would otherwise leave unchanged.
    fn pop_last_delta(&mut self) -> f32 {
        if self.stack.len() == 1 {
            self.stack.pop()
        } else {
            0.0
        }
    }
}

// CharString number parsing functions

fn parse_int1(op: u8) -> f32 {
    f32::from(i16::from(op) - 139)
}

fn parse_int2(op: u8, s: &mut ReadCtxt<'_>) -> Result<f32, CFFError> {
    let b1 = s.read_u8()?;
    let n = (i16::from(op) - 247) * 256 + i16::from(b1) + 108;
    debug_assert!((108..=1131).contains(&n));
    Ok(f32::from(n))
}

fn parse_int3(op: u8, s: &mut ReadCtxt<'_>) -> Result<f32, CFFError> {
    let b1 = s.read_u8()?;
    let n = -(i16::from(op) - 251) * 256 - i16::from(b1) - 108;
    debug_assert!((-1131..=-108).contains(&n));
    Ok(f32::from(n))
}

fn parse_fixed(s: &mut ReadCtxt<'_>) -> Result<f32, CFFError> {
    let n = s.read::<Fixed>()?;
    Ok(f32::from(n).trunc())
}

// Conversions from biased subr index operands to unbiased value
pub(crate) fn conv_subroutine_index(index: f32, bias: u16) -> Result<usize, CFFError> {
    let index = index as i32;
    let index = index
        .checked_add(i32::from(bias))
        .ok_or(CFFError::InvalidSubroutineIndex)?;
    usize::try_from(index).map_err(|_| CFFError::InvalidSubroutineIndex)
}

/// Bias added to subroutine numbers, from the number of subroutines in the INDEX.
///
/// Adobe Technical Note #5176, Chapter 16 "Local / Global Subrs INDEXes"
pub fn calc_subroutine_bias(len: usize) -> u16 {
    if len < 1240 {
        107
    } else if len < 33900 {
        1131
    } else {
        32768
    }
}
