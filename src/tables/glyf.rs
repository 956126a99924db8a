//! Parsing of the `glyf` table.
//!
//! > This table contains information that describes the glyphs in the font in the TrueType outline
//! > format. Information regarding the rasterizer (scaler) refers to the TrueType rasterizer.
//!
//! — <https://docs.microsoft.com/en-us/typography/opentype/spec/glyf>
//!
//! Glyphs are decoded eagerly and independently: a glyph whose record is malformed is logged
//! and replaced with `Glyph::Empty` so one bad outline never takes the rest of the font with it.

use std::fmt::Write as _;
use std::ops::Range;

use bitflags::bitflags;
use itertools::Itertools;
use log::warn;

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be, U8};
use crate::error::ParseError;
use crate::tables::loca::LocaTable;
use crate::tables::F2Dot14;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[rustfmt::skip]
    pub struct SimpleGlyphFlag: u8 {
        const ON_CURVE_POINT                       = 0b00000001;
        const X_SHORT_VECTOR                       = 0b00000010;
        const Y_SHORT_VECTOR                       = 0b00000100;
        const REPEAT_FLAG                          = 0b00001000;
        const X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR = 0b00010000;
        const Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR = 0b00100000;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct CompositeGlyphFlag: u16 {
        /// Bit 0: If this is set, the arguments are 16-bit (uint16 or int16); otherwise, they are
        /// bytes (uint8 or int8).
        const ARG_1_AND_2_ARE_WORDS = 0x0001;
        /// Bit 1: If this is set, the arguments are signed xy values; otherwise, they are unsigned
        /// point numbers.
        const ARGS_ARE_XY_VALUES = 0x0002;
        /// Bit 2: For the xy values if the preceding is true.
        const ROUND_XY_TO_GRID = 0x0004;
        /// Bit 3: This indicates that there is a simple scale for the component. Otherwise, scale = 1.0.
        const WE_HAVE_A_SCALE = 0x0008;
        /// Bit 5: Indicates at least one more glyph after this one.
        const MORE_COMPONENTS = 0x0020;
        /// Bit 6: The x direction will use a different scale from the y direction.
        const WE_HAVE_AN_X_AND_Y_SCALE = 0x0040;
        /// Bit 7: There is a 2 by 2 transformation that will be used to scale the component.
        const WE_HAVE_A_TWO_BY_TWO = 0x0080;
        /// Bit 8: Following the last component are instructions for the composite character.
        const WE_HAVE_INSTRUCTIONS = 0x0100;
        /// Bit 9: Use the advance width and side bearings of this component.
        const USE_MY_METRICS = 0x0200;
        /// Bit 10: If set, the components of the compound glyph overlap.
        const OVERLAP_COMPOUND = 0x0400;
        /// Bit 11: The composite is designed to have the component offset scaled.
        const SCALED_COMPONENT_OFFSET = 0x0800;
        /// Bit 12: The composite is designed not to have the component offset scaled.
        const UNSCALED_COMPONENT_OFFSET = 0x1000;
    }
}

/// `glyf` table, decoded into one `Glyph` per `loca` entry.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/glyf>
#[derive(Debug, PartialEq, Clone)]
pub struct GlyfTable {
    pub glyphs: Vec<Glyph>,
}

/// A glyph outline from either a `glyf` table or a CFF charstring.
#[derive(Debug, PartialEq, Clone)]
pub enum Glyph {
    /// No outline data: equal `loca` entries, zero contours, or a malformed record.
    Empty,
    Simple(SimpleGlyph),
    Composite(CompositeGlyph),
}

#[derive(Debug, PartialEq, Clone)]
pub struct SimpleGlyph {
    pub end_pts_of_contours: Vec<u16>,
    pub instructions: Vec<u8>,
    pub flags: Vec<SimpleGlyphFlag>,
    /// Absolute point positions.
    pub coordinates: Vec<Point>,
    pub bounding_box: BoundingBox,
    pub point_form: PointForm,
}

/// How the points of a simple glyph are written in its outline text and compared when matching.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PointForm {
    /// Each point as an offset from the previous one, the first from the origin. This is how
    /// `glyf` stores them.
    Delta,
    /// Absolute positions, as a CFF charstring draws them.
    Absolute,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompositeGlyph {
    pub glyphs: Vec<CompositeGlyphComponent>,
    pub instructions: Vec<u8>,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompositeGlyphComponent {
    pub flags: CompositeGlyphFlag,
    pub glyph_index: u16,
    pub argument1: CompositeGlyphArgument,
    pub argument2: CompositeGlyphArgument,
    pub scale: Option<CompositeGlyphScale>,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphArgument {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphScale {
    Scale(F2Dot14),
    XY { x_scale: F2Dot14, y_scale: F2Dot14 },
    Matrix([[F2Dot14; 2]; 2]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point(pub i16, pub i16);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x_min: i16,
    pub x_max: i16,
    pub y_min: i16,
    pub y_max: i16,
}

impl ReadBinaryDep for GlyfTable {
    /// The `loca` table and, for `maxp` version 1.0 fonts, `maxp.maxContours`.
    type Args<'a> = (&'a LocaTable<'a>, Option<u16>);
    type HostType<'a> = GlyfTable;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (loca, max_contours): (&'a LocaTable<'a>, Option<u16>),
    ) -> Result<GlyfTable, ParseError> {
        let scope = ctxt.scope();
        let glyphs = (0..loca.num_glyphs())
            .map(|glyph_id| match loca.glyph_range(glyph_id) {
                Some(range) if range.is_empty() => Glyph::Empty,
                Some(range) => match read_glyph(&scope, range, max_contours) {
                    Ok(glyph) => glyph,
                    Err(err) => {
                        warn!("glyph {}: unable to read outline: {}", glyph_id, err);
                        Glyph::Empty
                    }
                },
                None => {
                    warn!("glyph {}: loca offsets decrease", glyph_id);
                    Glyph::Empty
                }
            })
            .collect();

        Ok(GlyfTable { glyphs })
    }
}

fn read_glyph(
    scope: &ReadScope<'_>,
    range: Range<usize>,
    max_contours: Option<u16>,
) -> Result<Glyph, ParseError> {
    scope
        .offset_length(range.start, range.len())?
        .read_dep::<Glyph>(max_contours)
}

impl GlyfTable {
    pub fn num_glyphs(&self) -> usize {
        self.glyphs.len()
    }

    pub fn get(&self, glyph_id: u16) -> Option<&Glyph> {
        self.glyphs.get(usize::from(glyph_id))
    }
}

impl ReadBinaryDep for Glyph {
    type Args<'a> = Option<u16>;
    type HostType<'a> = Glyph;

    fn read_dep(ctxt: &mut ReadCtxt<'_>, max_contours: Option<u16>) -> Result<Glyph, ParseError> {
        let number_of_contours = ctxt.read_i16be()?;
        if let Some(max_contours) = max_contours {
            // More contours than any simple glyph may have marks the glyph as invalid.
            if i32::from(number_of_contours) > i32::from(max_contours) {
                return Err(ParseError::LimitExceeded);
            }
        }
        let bounding_box = ctxt.read::<BoundingBox>()?;

        match number_of_contours {
            0 => Ok(Glyph::Empty),
            n if n > 0 => {
                // Cast is safe as we've checked the value is positive above
                let glyph = ctxt.read_dep::<SimpleGlyph>((n as u16, bounding_box))?;
                Ok(Glyph::Simple(glyph))
            }
            _ => {
                let glyph = ctxt.read_dep::<CompositeGlyph>(bounding_box)?;
                Ok(Glyph::Composite(glyph))
            }
        }
    }
}

impl Glyph {
    pub fn is_empty(&self) -> bool {
        matches!(self, Glyph::Empty)
    }

    pub fn as_simple(&self) -> Option<&SimpleGlyph> {
        match self {
            Glyph::Simple(glyph) => Some(glyph),
            _ => None,
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Glyph::Empty => None,
            Glyph::Simple(glyph) => Some(glyph.bounding_box),
            Glyph::Composite(glyph) => Some(glyph.bounding_box),
        }
    }

    /// Number of outline points, 0 for empty and composite glyphs.
    pub fn point_count(&self) -> usize {
        self.as_simple().map_or(0, |glyph| glyph.coordinates.len())
    }

    /// Render the outline in its text form.
    ///
    /// Simple glyphs become `x,y` pairs joined by `|`, in the glyph's `PointForm`. Composite
    /// glyphs become a bracketed list of their component records. Empty glyphs become the
    /// empty string.
    pub fn to_text(&self) -> String {
        match self {
            Glyph::Empty => String::new(),
            Glyph::Simple(glyph) => glyph
                .outline_points()
                .map(|Point(x, y)| format!("{},{}", x, y))
                .join("|"),
            Glyph::Composite(glyph) => {
                let components = glyph.glyphs.iter().map(|c| c.to_text()).join(",");
                format!("[{}]", components)
            }
        }
    }
}

impl ReadBinaryDep for SimpleGlyph {
    type Args<'a> = (u16, BoundingBox);
    type HostType<'a> = SimpleGlyph;

    fn read_dep(
        ctxt: &mut ReadCtxt<'_>,
        (number_of_contours, bounding_box): (u16, BoundingBox),
    ) -> Result<SimpleGlyph, ParseError> {
        let number_of_contours = usize::from(number_of_contours);
        let end_pts_of_contours = ctxt.read_array::<U16Be>(number_of_contours)?.to_vec();
        let instruction_length = ctxt.read::<U16Be>()?;
        let instructions = ctxt.read_slice(usize::from(instruction_length))?.to_vec();
        // end_pts_of_contours stores the index of the end points.
        // Therefore the number of coordinates is the last index + 1
        let number_of_coordinates = end_pts_of_contours
            .last()
            .map_or(0, |&last| usize::from(last) + 1);

        let mut flags = Vec::with_capacity(number_of_coordinates);
        while flags.len() < number_of_coordinates {
            let flag = ctxt.read::<SimpleGlyphFlag>()?;
            let count = if flag.is_repeated() {
                usize::from(ctxt.read::<U8>()?) + 1 // + 1 to include the current entry
            } else {
                1
            };
            let count = count.min(number_of_coordinates - flags.len());
            flags.extend(std::iter::repeat(flag).take(count));
        }

        let mut x_deltas = Vec::with_capacity(number_of_coordinates);
        for flag in &flags {
            let dx = if flag.x_is_short() {
                i16::from(ctxt.read::<U8>()?) * flag.x_short_sign()
            } else if flag.x_is_same_or_positive() {
                0
            } else {
                ctxt.read::<I16Be>()?
            };
            x_deltas.push(dx);
        }

        // Coordinates are deltas against the previous point, the first one against (0, 0).
        let mut coordinates = Vec::with_capacity(number_of_coordinates);
        let mut prev_point = Point(0, 0);
        for (flag, dx) in flags.iter().zip(x_deltas) {
            let dy = if flag.y_is_short() {
                i16::from(ctxt.read::<U8>()?) * flag.y_short_sign()
            } else if flag.y_is_same_or_positive() {
                0
            } else {
                ctxt.read::<I16Be>()?
            };
            prev_point = Point(prev_point.0.wrapping_add(dx), prev_point.1.wrapping_add(dy));
            coordinates.push(prev_point);
        }

        Ok(SimpleGlyph {
            end_pts_of_contours,
            instructions,
            flags,
            coordinates,
            bounding_box,
            point_form: PointForm::Delta,
        })
    }
}

impl SimpleGlyph {
    /// Build a glyph from absolute points, computing its bounding box.
    ///
    /// The glyph uses `PointForm::Absolute`; see `with_point_form`.
    pub fn new(
        end_pts_of_contours: Vec<u16>,
        flags: Vec<SimpleGlyphFlag>,
        coordinates: Vec<Point>,
    ) -> Self {
        let bounding_box = BoundingBox::from_points(&coordinates).unwrap_or_default();
        SimpleGlyph {
            end_pts_of_contours,
            instructions: Vec::new(),
            flags,
            coordinates,
            bounding_box,
            point_form: PointForm::Absolute,
        }
    }

    pub fn with_point_form(mut self, point_form: PointForm) -> Self {
        self.point_form = point_form;
        self
    }

    /// The points as written in the outline text.
    ///
    /// For `PointForm::Delta` the offsets are recovered with wrapping arithmetic, so they equal
    /// the stored `glyf` deltas even where accumulating them overflowed.
    pub fn outline_points(&self) -> impl Iterator<Item = Point> + '_ {
        let point_form = self.point_form;
        self.coordinates
            .iter()
            .scan(Point(0, 0), move |prev, &point| {
                let Point(prev_x, prev_y) = std::mem::replace(prev, point);
                Some(match point_form {
                    PointForm::Absolute => point,
                    PointForm::Delta => {
                        Point(point.0.wrapping_sub(prev_x), point.1.wrapping_sub(prev_y))
                    }
                })
            })
    }

    pub fn contours(&self) -> impl Iterator<Item = &[Point]> {
        self.end_pts_of_contours.iter().scan(0, move |i, &end| {
            let start = *i;
            let end = usize::from(end);
            *i = end + 1;
            self.coordinates.get(start..=end)
        })
    }
}

impl ReadFrom for SimpleGlyphFlag {
    type ReadType = U8;

    fn read_from(flag: u8) -> Self {
        SimpleGlyphFlag::from_bits_truncate(flag)
    }
}

impl SimpleGlyphFlag {
    pub fn is_on_curve(self) -> bool {
        self.contains(Self::ON_CURVE_POINT)
    }

    pub fn x_is_short(self) -> bool {
        self.contains(Self::X_SHORT_VECTOR)
    }

    pub fn y_is_short(self) -> bool {
        self.contains(Self::Y_SHORT_VECTOR)
    }

    pub fn is_repeated(self) -> bool {
        self.contains(Self::REPEAT_FLAG)
    }

    pub fn x_short_sign(self) -> i16 {
        if self.x_is_same_or_positive() {
            1
        } else {
            -1
        }
    }

    pub fn y_short_sign(self) -> i16 {
        if self.y_is_same_or_positive() {
            1
        } else {
            -1
        }
    }

    pub fn x_is_same_or_positive(self) -> bool {
        self.contains(Self::X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR)
    }

    pub fn y_is_same_or_positive(self) -> bool {
        self.contains(Self::Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR)
    }
}

impl ReadBinaryDep for CompositeGlyph {
    type Args<'a> = BoundingBox;
    type HostType<'a> = CompositeGlyph;

    fn read_dep(
        ctxt: &mut ReadCtxt<'_>,
        bounding_box: BoundingBox,
    ) -> Result<CompositeGlyph, ParseError> {
        let mut have_instructions = false;
        let mut glyphs = Vec::new();
        loop {
            let flags = ctxt.read::<CompositeGlyphFlag>()?;
            let component = ctxt.read_dep::<CompositeGlyphComponent>(flags)?;
            have_instructions |= flags.we_have_instructions();
            glyphs.push(component);

            if !flags.more_components() {
                break;
            }
        }

        let instructions = if have_instructions {
            let length = usize::from(ctxt.read::<U16Be>()?);
            ctxt.read_slice(length)?.to_vec()
        } else {
            Vec::new()
        };

        Ok(CompositeGlyph {
            glyphs,
            instructions,
            bounding_box,
        })
    }
}

impl ReadFrom for CompositeGlyphFlag {
    type ReadType = U16Be;

    fn read_from(flag: u16) -> Self {
        CompositeGlyphFlag::from_bits_retain(flag)
    }
}

impl CompositeGlyphFlag {
    pub fn arg_1_and_2_are_words(self) -> bool {
        self.contains(Self::ARG_1_AND_2_ARE_WORDS)
    }

    pub fn args_are_xy_values(self) -> bool {
        self.contains(Self::ARGS_ARE_XY_VALUES)
    }

    pub fn we_have_a_scale(self) -> bool {
        self.contains(Self::WE_HAVE_A_SCALE)
    }

    pub fn we_have_an_x_and_y_scale(self) -> bool {
        self.contains(Self::WE_HAVE_AN_X_AND_Y_SCALE)
    }

    pub fn we_have_a_two_by_two(self) -> bool {
        self.contains(Self::WE_HAVE_A_TWO_BY_TWO)
    }

    pub fn more_components(self) -> bool {
        self.contains(Self::MORE_COMPONENTS)
    }

    pub fn we_have_instructions(self) -> bool {
        self.contains(Self::WE_HAVE_INSTRUCTIONS)
    }
}

impl ReadBinaryDep for CompositeGlyphArgument {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep(ctxt: &mut ReadCtxt<'_>, flags: CompositeGlyphFlag) -> Result<Self, ParseError> {
        let arg = match (flags.arg_1_and_2_are_words(), flags.args_are_xy_values()) {
            (true, true) => CompositeGlyphArgument::I16(ctxt.read_i16be()?),
            (true, false) => CompositeGlyphArgument::U16(ctxt.read_u16be()?),
            (false, true) => CompositeGlyphArgument::I8(ctxt.read_i8()?),
            (false, false) => CompositeGlyphArgument::U8(ctxt.read_u8()?),
        };

        Ok(arg)
    }
}

impl ReadBinaryDep for CompositeGlyphComponent {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep(ctxt: &mut ReadCtxt<'_>, flags: CompositeGlyphFlag) -> Result<Self, ParseError> {
        let glyph_index = ctxt.read_u16be()?;
        let argument1 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;
        let argument2 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;

        let scale = if flags.we_have_a_scale() {
            Some(CompositeGlyphScale::Scale(ctxt.read::<F2Dot14>()?))
        } else if flags.we_have_an_x_and_y_scale() {
            Some(CompositeGlyphScale::XY {
                x_scale: ctxt.read::<F2Dot14>()?,
                y_scale: ctxt.read::<F2Dot14>()?,
            })
        } else if flags.we_have_a_two_by_two() {
            Some(CompositeGlyphScale::Matrix([
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
            ]))
        } else {
            None
        };

        Ok(CompositeGlyphComponent {
            flags,
            glyph_index,
            argument1,
            argument2,
            scale,
        })
    }
}

impl CompositeGlyphComponent {
    /// The transform as `[xScale, scale01, scale10, yScale]`, zero for absent entries.
    pub fn scale_values(&self) -> [f32; 4] {
        match self.scale {
            None => [0.; 4],
            Some(CompositeGlyphScale::Scale(scale)) => {
                let scale = f32::from(scale);
                [scale, 0., 0., scale]
            }
            Some(CompositeGlyphScale::XY { x_scale, y_scale }) => {
                [f32::from(x_scale), 0., 0., f32::from(y_scale)]
            }
            Some(CompositeGlyphScale::Matrix([[a, b], [c, d]])) => {
                [f32::from(a), f32::from(b), f32::from(c), f32::from(d)]
            }
        }
    }

    fn to_text(&self) -> String {
        let [x_scale, scale01, scale10, y_scale] = self.scale_values();
        let mut text = String::new();
        // Writing to a String cannot fail.
        let _ = write!(
            text,
            "{{flags:{},glyphIndex:{},arg1:{},arg2:{},xScale:{:?},scale01:{:?},scale10:{:?},yScale:{:?}}}",
            self.flags.bits(),
            self.glyph_index,
            i32::from(self.argument1),
            i32::from(self.argument2),
            x_scale,
            scale01,
            scale10,
            y_scale
        );
        text
    }
}

impl ReadBinary for BoundingBox {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let x_min = ctxt.read::<I16Be>()?;
        let y_min = ctxt.read::<I16Be>()?;
        let x_max = ctxt.read::<I16Be>()?;
        let y_max = ctxt.read::<I16Be>()?;

        Ok(BoundingBox {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }
}

impl BoundingBox {
    /// Calculate xMin, xMax and yMin, yMax from a collection of `Points`
    ///
    /// Returns `None` if `points` is empty.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let &Point(initial_x, initial_y) = points.first()?;
        let initial = BoundingBox {
            x_min: initial_x,
            x_max: initial_x,
            y_min: initial_y,
            y_max: initial_y,
        };

        Some(points.iter().fold(initial, |bounding_box, &Point(x, y)| BoundingBox {
            x_min: bounding_box.x_min.min(x),
            x_max: bounding_box.x_max.max(x),
            y_min: bounding_box.y_min.min(y),
            y_max: bounding_box.y_max.max(y),
        }))
    }
}

impl From<CompositeGlyphArgument> for i32 {
    fn from(arg: CompositeGlyphArgument) -> Self {
        match arg {
            CompositeGlyphArgument::U8(value) => i32::from(value),
            CompositeGlyphArgument::I8(value) => i32::from(value),
            CompositeGlyphArgument::U16(value) => i32::from(value),
            CompositeGlyphArgument::I16(value) => i32::from(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::IndexToLocFormat;

    const BBOX: [u8; 8] = [0, 0, 0, 0, 0, 100, 0, 100];

    fn glyph_header(number_of_contours: i16) -> Vec<u8> {
        let mut data = number_of_contours.to_be_bytes().to_vec();
        data.extend_from_slice(&BBOX);
        data
    }

    /// One contour, three points, all short positive deltas sharing a repeated flag.
    pub(crate) fn repeated_flag_glyph() -> Vec<u8> {
        let mut data = glyph_header(1);
        data.extend_from_slice(&[0, 2]); // endPtsOfContours
        data.extend_from_slice(&[0, 0]); // instructionLength
        data.extend_from_slice(&[0x3F, 2]); // flag with REPEAT_FLAG, repeated twice more
        data.extend_from_slice(&[10, 20, 30]); // x
        data.extend_from_slice(&[5, 5, 5]); // y
        data
    }

    #[test]
    fn test_read_simple_glyph_with_repeat() {
        let data = repeated_flag_glyph();
        let glyph = ReadScope::new(&data).read_dep::<Glyph>(None).unwrap();
        let simple = glyph.as_simple().unwrap();
        assert_eq!(
            simple.coordinates,
            vec![Point(10, 5), Point(30, 10), Point(60, 15)]
        );
        assert!(simple.flags.iter().all(|flag| flag.is_on_curve()));
        assert_eq!(simple.point_form, PointForm::Delta);
        assert_eq!(glyph.to_text(), "10,5|20,5|30,5");
        assert_eq!(glyph.point_count(), 3);
    }

    #[test]
    fn test_read_simple_glyph_mixed_vectors() {
        let mut data = glyph_header(1);
        data.extend_from_slice(&[0, 2, 0, 0]);
        data.extend_from_slice(&[0x01, 0x31, 0x06]);
        data.extend_from_slice(&[0xFF, 0xFB, 3]); // x: -5 as i16, same, -3 short
        data.extend_from_slice(&[0x00, 0x64, 50]); // y: 100 as i16, same, -50 short
        let glyph = ReadScope::new(&data).read_dep::<Glyph>(None).unwrap();
        assert_eq!(glyph.to_text(), "-5,100|0,0|-3,-50");
        assert_eq!(
            glyph.as_simple().unwrap().coordinates,
            vec![Point(-5, 100), Point(-5, 100), Point(-8, 50)]
        );
    }

    #[test]
    fn test_text_keeps_deltas_that_overflow() {
        let mut data = glyph_header(1);
        data.extend_from_slice(&[0, 1, 0, 0]);
        data.extend_from_slice(&[0x21, 0x21]); // word x, same y
        data.extend_from_slice(&30000i16.to_be_bytes());
        data.extend_from_slice(&30000i16.to_be_bytes());
        let glyph = ReadScope::new(&data).read_dep::<Glyph>(None).unwrap();
        assert_eq!(glyph.as_simple().unwrap().coordinates[1], Point(-5536, 0));
        assert_eq!(glyph.to_text(), "30000,0|30000,0");
    }

    #[test]
    fn test_absolute_point_form() {
        let points = vec![Point(0, 0), Point(500, 0), Point(500, 500), Point(0, 500)];
        let flags = vec![SimpleGlyphFlag::ON_CURVE_POINT; 4];
        let absolute = SimpleGlyph::new(vec![3], flags, points);
        let delta = absolute.clone().with_point_form(PointForm::Delta);
        assert_eq!(Glyph::Simple(absolute).to_text(), "0,0|500,0|500,500|0,500");
        assert_eq!(Glyph::Simple(delta).to_text(), "0,0|500,0|0,500|-500,0");
    }

    #[test]
    fn test_last_end_point_matches_point_count() {
        let mut data = glyph_header(2);
        data.extend_from_slice(&[0, 0, 0, 1, 0, 0]);
        data.extend_from_slice(&[0x37, 0x37]);
        data.extend_from_slice(&[1, 1, 1, 1]);
        let glyph = ReadScope::new(&data).read_dep::<Glyph>(None).unwrap();
        let simple = glyph.as_simple().unwrap();
        assert_eq!(
            usize::from(*simple.end_pts_of_contours.last().unwrap()),
            simple.coordinates.len() - 1
        );
        assert_eq!(simple.contours().count(), 2);
    }

    #[test]
    fn test_read_composite_glyph() {
        let mut data = glyph_header(-1);
        data.extend_from_slice(&[0x00, 0x2B, 0, 1]);
        data.extend_from_slice(&100i16.to_be_bytes());
        data.extend_from_slice(&(-20i16).to_be_bytes());
        data.extend_from_slice(&[0x20, 0x00]); // scale 0.5
        data.extend_from_slice(&[0x00, 0x02, 0, 2, 5, 0xFB]);

        let glyph = ReadScope::new(&data).read_dep::<Glyph>(None).unwrap();
        match &glyph {
            Glyph::Composite(composite) => {
                assert_eq!(composite.glyphs.len(), 2);
                assert_eq!(composite.glyphs[1].argument2, CompositeGlyphArgument::I8(-5));
            }
            _ => panic!("expected composite glyph"),
        }
        assert_eq!(
            glyph.to_text(),
            "[{flags:43,glyphIndex:1,arg1:100,arg2:-20,xScale:0.5,scale01:0.0,scale10:0.0,yScale:0.5},\
             {flags:2,glyphIndex:2,arg1:5,arg2:-5,xScale:0.0,scale01:0.0,scale10:0.0,yScale:0.0}]"
        );
    }

    #[test]
    fn test_zero_contours_is_empty() {
        let data = glyph_header(0);
        let glyph = ReadScope::new(&data).read_dep::<Glyph>(None).unwrap();
        assert_eq!(glyph, Glyph::Empty);
        assert_eq!(glyph.to_text(), "");
    }

    #[test]
    fn test_too_many_contours() {
        let data = repeated_flag_glyph();
        assert_eq!(
            ReadScope::new(&data).read_dep::<Glyph>(Some(0)).err(),
            Some(ParseError::LimitExceeded)
        );
    }

    #[test]
    fn test_glyf_table_degrades_per_glyph() {
        let mut glyf = repeated_flag_glyph(); // 0..22
        glyf.extend_from_slice(&glyph_header(1)); // 22..32, truncated after the header
        glyf.extend_from_slice(&glyph_header(5)); // 32..42, more contours than maxp allows

        // glyph 1 is empty and glyph 4 has decreasing offsets
        let offsets: Vec<u8> = [0u32, 22, 22, 32, 42, 30]
            .iter()
            .flat_map(|o| o.to_be_bytes())
            .collect();

        let loca = ReadScope::new(&offsets)
            .read_dep::<LocaTable<'_>>((5, IndexToLocFormat::Long))
            .unwrap();
        let table = ReadScope::new(&glyf)
            .read_dep::<GlyfTable>((&loca, Some(2)))
            .unwrap();

        assert_eq!(table.num_glyphs(), 5);
        assert!(table.get(0).unwrap().as_simple().is_some());
        for glyph_id in 1..5 {
            assert_eq!(table.get(glyph_id), Some(&Glyph::Empty));
        }
        assert_eq!(table.get(5), None);
    }

    #[test]
    fn test_bounding_box_from_points() {
        let points = [Point(3, -1), Point(-2, 7), Point(0, 0)];
        assert_eq!(
            BoundingBox::from_points(&points),
            Some(BoundingBox {
                x_min: -2,
                x_max: 3,
                y_min: -1,
                y_max: 7
            })
        );
        assert_eq!(BoundingBox::from_points(&[]), None);
    }
}
