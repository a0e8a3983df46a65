//! Context command encoding and decoding
//!
//! Each command is written as `[TAG][PAYLOAD]`. Multi-byte integers are
//! little-endian. Sprite and sprite-sheet names travel as indices resolved
//! through a [`SpriteIndex`] supplied by the caller.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::bitmap::{pack_pixels, unpack_pixels};
use crate::command::{
    Alignment, Bitmap, ColorPair, Command, CommandTag, Curve, CurveKind, Direction, Point,
    PointDataType, Rgb, ScaleAxis, SegmentCap, Side, SpriteLine, SpriteSubLine, Wireframe,
    WireframeEdge,
};
use crate::display::PixelDepth;
use crate::quantize::{
    angle_offset_from_i16, angle_offset_to_i16, opacity_from_u8, opacity_to_u8,
    rotation_from_u16, rotation_to_u16, scale_from_i16, scale_to_i16,
};

/// Size of the `DrawBitmap` header preceding the pixel data
pub const DRAW_BITMAP_HEADER_LEN: usize = 2 + 2 + 2 + 4 + 1 + 2;

/// Most points a point list can carry
pub const MAX_POINTS: usize = u8::MAX as usize;

/// Curve kinds packed into one path type byte
const CURVES_PER_BYTE: usize = 4;
const CURVE_BIT_WIDTH: usize = 2;

/// Errors that can occur while encoding or decoding commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Payload ended before the command did
    Truncated,
    /// Tag byte is not a known command
    UnknownTag(u8),
    /// Enum byte or structural value is invalid
    InvalidValue,
    /// List length outside what the wire format can carry
    OutOfRange,
    /// Sprite sheet name or index has no registered sheet
    UnknownSpriteSheet,
    /// Sprite name or index not found in the selected sheet
    UnknownSprite,
    /// Sprite drawn with no sprite sheet selected
    NoSpriteSheetSelected,
}

/// Resolves sprite-sheet and sprite names to wire indices and back
pub trait SpriteIndex {
    /// Index assigned to a sprite sheet
    fn sheet_index(&self, sheet: &str) -> Option<u8>;

    /// Name of the sprite sheet at `index`
    fn sheet_name(&self, index: u8) -> Option<&str>;

    /// Index of a sprite within its sheet
    fn sprite_index(&self, sheet: &str, sprite: &str) -> Option<u16>;

    /// Name of the sprite at `index` within a sheet
    fn sprite_name(&self, sheet: &str, index: u16) -> Option<&str>;

    /// Number of sprites in a sheet (0 if unknown)
    fn sprite_count(&self, sheet: &str) -> usize;

    /// Returns true if sprite indices in this sheet need two bytes
    fn uses_wide_indices(&self, sheet: &str) -> bool {
        self.sprite_count(sheet) > u8::MAX as usize
    }
}

/// A [`SpriteIndex`] with no sprite sheets
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSprites;

impl SpriteIndex for NoSprites {
    fn sheet_index(&self, _sheet: &str) -> Option<u8> {
        None
    }

    fn sheet_name(&self, _index: u8) -> Option<&str> {
        None
    }

    fn sprite_index(&self, _sheet: &str, _sprite: &str) -> Option<u16> {
        None
    }

    fn sprite_name(&self, _sheet: &str, _index: u16) -> Option<&str> {
        None
    }

    fn sprite_count(&self, _sheet: &str) -> usize {
        0
    }
}

/// Little-endian byte sink
struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn new(tag: CommandTag) -> Self {
        let mut bytes = Vec::with_capacity(16);
        bytes.push(tag.to_byte());
        Self { bytes }
    }

    fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn i8(&mut self, value: i8) {
        self.bytes.push(value as u8);
    }

    fn u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn i16(&mut self, value: i16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }
}

/// Little-endian byte source
struct Reader<'b> {
    bytes: &'b [u8],
    position: usize,
}

impl<'b> Reader<'b> {
    fn new(bytes: &'b [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'b [u8], CodecError> {
        let end = self.position.checked_add(len).ok_or(CodecError::Truncated)?;
        let slice = self
            .bytes
            .get(self.position..end)
            .ok_or(CodecError::Truncated)?;
        self.position = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.u8()? as i8)
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i16(&mut self) -> Result<i16, CodecError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn bool(&mut self) -> Result<bool, CodecError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(CodecError::InvalidValue),
        }
    }
}

fn write_points(w: &mut Writer, points: &[Point], data_type: PointDataType) {
    for point in points {
        match data_type {
            PointDataType::Int8 => {
                w.i8(point.x as i8);
                w.i8(point.y as i8);
            }
            PointDataType::Int16 => {
                w.i16(point.x as i16);
                w.i16(point.y as i16);
            }
            PointDataType::Float => {
                w.f32(point.x);
                w.f32(point.y);
            }
        }
    }
}

fn read_points(
    r: &mut Reader<'_>,
    count: usize,
    data_type: PointDataType,
) -> Result<Vec<Point>, CodecError> {
    (0..count)
        .map(|_| {
            Ok(match data_type {
                PointDataType::Int8 => Point::new(r.i8()? as f32, r.i8()? as f32),
                PointDataType::Int16 => Point::new(r.i16()? as f32, r.i16()? as f32),
                PointDataType::Float => Point::new(r.f32()?, r.f32()?),
            })
        })
        .collect()
}

/// `[pointDataType][count][points...]`
fn write_point_list(w: &mut Writer, points: &[Point], min: usize) -> Result<(), CodecError> {
    if points.len() < min || points.len() > MAX_POINTS {
        return Err(CodecError::OutOfRange);
    }
    let data_type = PointDataType::for_points(points);
    w.u8(data_type.to_byte());
    w.u8(points.len() as u8);
    write_points(w, points, data_type);
    Ok(())
}

fn read_point_list(r: &mut Reader<'_>) -> Result<Vec<Point>, CodecError> {
    let data_type = PointDataType::from_byte(r.u8()?).ok_or(CodecError::InvalidValue)?;
    let count = r.u8()? as usize;
    read_points(r, count, data_type)
}

fn write_color_pairs(w: &mut Writer, pairs: &[ColorPair]) -> Result<(), CodecError> {
    if pairs.is_empty() || pairs.len() > u8::MAX as usize {
        return Err(CodecError::OutOfRange);
    }
    w.u8(pairs.len() as u8);
    for pair in pairs {
        w.u8(pair.from);
        w.u8(pair.to);
    }
    Ok(())
}

fn read_color_pairs(r: &mut Reader<'_>) -> Result<Vec<ColorPair>, CodecError> {
    let count = r.u8()? as usize;
    (0..count)
        .map(|_| Ok(ColorPair::new(r.u8()?, r.u8()?)))
        .collect()
}

/// Check a chain of curves of one kind sharing end points
pub fn is_valid_curve_chain(kind: CurveKind, points: usize) -> bool {
    let per_curve = kind.control_points() - 1;
    points > per_curve && (points - 1) % per_curve == 0
}

/// Check the control point counts of a path
pub fn is_valid_path(curves: &[Curve]) -> bool {
    !curves.is_empty()
        && curves.iter().enumerate().all(|(index, curve)| {
            let expected = curve.kind.control_points() - usize::from(index > 0);
            curve.control_points.len() == expected
        })
}

/// Check a wireframe's point, edge and index bounds
pub fn is_valid_wireframe(wireframe: &Wireframe) -> bool {
    let points = wireframe.points.len();
    (2..=MAX_POINTS).contains(&points)
        && (1..=u8::MAX as usize).contains(&wireframe.edges.len())
        && wireframe
            .edges
            .iter()
            .all(|edge| (edge.start as usize) < points && (edge.end as usize) < points)
}

/// Encodes commands, tracking the sprite sheet selected along the way
pub struct CommandEncoder<'a, N: SpriteIndex + ?Sized> {
    names: &'a N,
    selected_sheet: Option<String>,
}

impl<'a, N: SpriteIndex + ?Sized> CommandEncoder<'a, N> {
    /// Create an encoder with no sprite sheet selected
    pub fn new(names: &'a N) -> Self {
        Self {
            names,
            selected_sheet: None,
        }
    }

    /// Start from an already selected sprite sheet
    pub fn with_sprite_sheet(mut self, sheet: Option<&str>) -> Self {
        self.selected_sheet = sheet.map(ToString::to_string);
        self
    }

    /// Sprite sheet selected after the commands encoded so far
    pub fn selected_sheet(&self) -> Option<&str> {
        self.selected_sheet.as_deref()
    }

    fn write_sprite_index(&self, w: &mut Writer, sheet: &str, sprite: &str) -> Result<(), CodecError> {
        let index = self
            .names
            .sprite_index(sheet, sprite)
            .ok_or(CodecError::UnknownSprite)?;
        if self.names.uses_wide_indices(sheet) {
            w.u16(index);
        } else {
            w.u8(u8::try_from(index).map_err(|_| CodecError::OutOfRange)?);
        }
        Ok(())
    }

    fn write_sprite_lines(&self, lines: &[SpriteLine]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        for line in lines {
            let mut sub_lines = Writer { bytes: Vec::new() };
            for sub_line in line {
                let sheet = sub_line.sprite_sheet_name.as_str();
                let sheet_index = self
                    .names
                    .sheet_index(sheet)
                    .ok_or(CodecError::UnknownSpriteSheet)?;
                if sub_line.sprite_names.len() > u8::MAX as usize {
                    return Err(CodecError::OutOfRange);
                }
                sub_lines.u8(sheet_index);
                sub_lines.u8(sub_line.sprite_names.len() as u8);
                for sprite in &sub_line.sprite_names {
                    self.write_sprite_index(&mut sub_lines, sheet, sprite)?;
                }
            }
            let len = u16::try_from(sub_lines.bytes.len()).map_err(|_| CodecError::OutOfRange)?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(&sub_lines.bytes);
        }
        Ok(out)
    }

    /// Encode one command as `[TAG][PAYLOAD]`
    ///
    /// Nothing is written on error, so a failed command never leaves a
    /// partial encoding behind.
    pub fn encode(&mut self, command: &Command) -> Result<Vec<u8>, CodecError> {
        let mut w = Writer::new(command.tag());

        match command {
            Command::Show
            | Command::Clear
            | Command::SaveContext
            | Command::RestoreContext
            | Command::ClearRotation
            | Command::ResetAlignment
            | Command::ClearCrop
            | Command::ClearRotationCrop
            | Command::ResetBitmapScale
            | Command::ResetSpriteColors
            | Command::ResetSpriteScale => {}

            Command::SetColor { color_index, color } => {
                w.extend(&[*color_index, color.r, color.g, color.b]);
            }
            Command::SetColorOpacity {
                color_index,
                opacity,
            } => {
                w.u8(*color_index);
                w.u8(opacity_to_u8(*opacity));
            }
            Command::SetOpacity { opacity } => w.u8(opacity_to_u8(*opacity)),

            Command::SelectBackgroundColor { color_index }
            | Command::SelectFillColor { color_index }
            | Command::SelectLineColor { color_index } => w.u8(*color_index),

            Command::SetIgnoreFill(value)
            | Command::SetIgnoreLine(value)
            | Command::SetFillBackground(value) => w.u8(u8::from(*value)),

            Command::SetLineWidth { line_width } => w.u16(*line_width),
            Command::SetRotation { rotation } => w.u16(rotation_to_u16(*rotation)),

            Command::SetHorizontalAlignment(alignment)
            | Command::SetVerticalAlignment(alignment)
            | Command::SetSpritesAlignment(alignment)
            | Command::SetSpritesLineAlignment(alignment) => w.u8(alignment.to_byte()),

            Command::SetSegmentStartCap(cap)
            | Command::SetSegmentEndCap(cap)
            | Command::SetSegmentCap(cap) => w.u8(cap.to_byte()),

            Command::SetSegmentStartRadius(radius)
            | Command::SetSegmentEndRadius(radius)
            | Command::SetSegmentRadius(radius) => w.u16(*radius),

            Command::SetCrop { crop, .. } | Command::SetRotationCrop { crop, .. } => w.u16(*crop),

            Command::SelectBitmapColor(pair) | Command::SelectSpriteColor(pair) => {
                w.u8(pair.from);
                w.u8(pair.to);
            }
            Command::SelectBitmapColors(pairs) | Command::SelectSpriteColors(pairs) => {
                write_color_pairs(&mut w, pairs)?;
            }

            Command::SetBitmapScale { scale, .. } | Command::SetSpriteScale { scale, .. } => {
                if !scale.is_finite() {
                    return Err(CodecError::InvalidValue);
                }
                w.i16(scale_to_i16(*scale));
            }

            Command::SetSpritesLineHeight(height) => w.u16(*height),
            Command::SetSpritesDirection(direction) | Command::SetSpritesLineDirection(direction) => {
                w.u8(direction.to_byte())
            }
            Command::SetSpritesSpacing(spacing) | Command::SetSpritesLineSpacing(spacing) => {
                w.i16(*spacing)
            }

            Command::ClearRect {
                x,
                y,
                width,
                height,
            } => {
                w.i16(*x);
                w.i16(*y);
                w.u16(*width);
                w.u16(*height);
            }
            Command::DrawRect {
                offset_x,
                offset_y,
                width,
                height,
            } => {
                w.i16(*offset_x);
                w.i16(*offset_y);
                w.u16(*width);
                w.u16(*height);
            }
            Command::DrawRoundRect {
                offset_x,
                offset_y,
                width,
                height,
                border_radius,
            } => {
                w.i16(*offset_x);
                w.i16(*offset_y);
                w.u16(*width);
                w.u16(*height);
                w.u8(*border_radius);
            }
            Command::DrawCircle {
                offset_x,
                offset_y,
                radius,
            } => {
                w.i16(*offset_x);
                w.i16(*offset_y);
                w.u16(*radius);
            }
            Command::DrawArc {
                offset_x,
                offset_y,
                radius,
                start_angle,
                angle_offset,
            } => {
                w.i16(*offset_x);
                w.i16(*offset_y);
                w.u16(*radius);
                w.u16(rotation_to_u16(*start_angle));
                w.i16(angle_offset_to_i16(*angle_offset));
            }
            Command::DrawEllipse {
                offset_x,
                offset_y,
                radius_x,
                radius_y,
            } => {
                w.i16(*offset_x);
                w.i16(*offset_y);
                w.u16(*radius_x);
                w.u16(*radius_y);
            }
            Command::DrawArcEllipse {
                offset_x,
                offset_y,
                radius_x,
                radius_y,
                start_angle,
                angle_offset,
            } => {
                w.i16(*offset_x);
                w.i16(*offset_y);
                w.u16(*radius_x);
                w.u16(*radius_y);
                w.u16(rotation_to_u16(*start_angle));
                w.i16(angle_offset_to_i16(*angle_offset));
            }
            Command::DrawSegment {
                start_x,
                start_y,
                end_x,
                end_y,
            } => {
                w.i16(*start_x);
                w.i16(*start_y);
                w.i16(*end_x);
                w.i16(*end_y);
            }
            Command::DrawSegments { points } | Command::DrawPolygon { points } => {
                write_point_list(&mut w, points, 2)?;
            }
            Command::DrawRegularPolygon {
                offset_x,
                offset_y,
                radius,
                number_of_sides,
            } => {
                w.i16(*offset_x);
                w.i16(*offset_y);
                w.u16(*radius);
                w.u8(*number_of_sides);
            }
            Command::DrawWireframe(wireframe) => {
                if !is_valid_wireframe(wireframe) {
                    return Err(CodecError::OutOfRange);
                }
                write_point_list(&mut w, &wireframe.points, 2)?;
                w.u8(wireframe.edges.len() as u8);
                for edge in &wireframe.edges {
                    w.u8(edge.start);
                    w.u8(edge.end);
                }
            }
            Command::DrawBezierCurve {
                kind,
                control_points,
            } => {
                if *kind == CurveKind::Segment || control_points.len() != kind.control_points() {
                    return Err(CodecError::InvalidValue);
                }
                write_points(&mut w, control_points, PointDataType::Int16);
            }
            Command::DrawBezierCurves {
                kind,
                control_points,
            } => {
                if *kind == CurveKind::Segment || !is_valid_curve_chain(*kind, control_points.len()) {
                    return Err(CodecError::InvalidValue);
                }
                write_point_list(&mut w, control_points, 2)?;
            }
            Command::DrawPath { curves, .. } => {
                if !is_valid_path(curves) || curves.len() > u8::MAX as usize {
                    return Err(CodecError::InvalidValue);
                }
                let points: Vec<Point> = curves
                    .iter()
                    .flat_map(|curve| curve.control_points.iter().copied())
                    .collect();
                if points.len() > MAX_POINTS {
                    return Err(CodecError::OutOfRange);
                }
                let data_type = PointDataType::for_points(&points);
                w.u8(data_type.to_byte());
                w.u8(curves.len() as u8);
                w.u8(points.len() as u8);
                let mut kinds = alloc::vec![0u8; curves.len().div_ceil(CURVES_PER_BYTE)];
                for (index, curve) in curves.iter().enumerate() {
                    let shift = (index % CURVES_PER_BYTE) * CURVE_BIT_WIDTH;
                    kinds[index / CURVES_PER_BYTE] |= curve.kind.to_bits() << shift;
                }
                w.extend(&kinds);
                write_points(&mut w, &points, data_type);
            }

            Command::DrawBitmap {
                offset_x,
                offset_y,
                bitmap,
            } => {
                if !bitmap.is_valid() {
                    return Err(CodecError::InvalidValue);
                }
                let data = pack_pixels(bitmap).ok_or(CodecError::InvalidValue)?;
                let data_len = u16::try_from(data.len()).map_err(|_| CodecError::OutOfRange)?;
                w.i16(*offset_x);
                w.i16(*offset_y);
                w.u16(bitmap.width);
                w.u32(bitmap.pixels.len() as u32);
                w.u8(bitmap.number_of_colors);
                w.u16(data_len);
                w.extend(&data);
            }

            Command::SelectSpriteSheet { name } => {
                let index = self
                    .names
                    .sheet_index(name)
                    .ok_or(CodecError::UnknownSpriteSheet)?;
                w.u8(index);
                self.selected_sheet = Some(name.clone());
            }
            Command::DrawSprite {
                offset_x,
                offset_y,
                name,
            } => {
                let sheet = self
                    .selected_sheet
                    .as_deref()
                    .ok_or(CodecError::NoSpriteSheetSelected)?;
                w.i16(*offset_x);
                w.i16(*offset_y);
                self.write_sprite_index(&mut w, sheet, name)?;
            }
            Command::DrawSprites {
                offset_x,
                offset_y,
                lines,
            } => {
                let body = self.write_sprite_lines(lines)?;
                let len = u16::try_from(body.len()).map_err(|_| CodecError::OutOfRange)?;
                w.i16(*offset_x);
                w.i16(*offset_y);
                w.u16(len);
                w.extend(&body);
            }
        }

        Ok(w.bytes)
    }

    /// Encode a sequence of commands back to back
    pub fn encode_all<'c, I>(&mut self, commands: I) -> Result<Vec<u8>, CodecError>
    where
        I: IntoIterator<Item = &'c Command>,
    {
        let mut out = Vec::new();
        for command in commands {
            out.extend_from_slice(&self.encode(command)?);
        }
        Ok(out)
    }
}

/// Decodes commands, tracking the sprite sheet selected along the way
pub struct CommandDecoder<'a, N: SpriteIndex + ?Sized> {
    names: &'a N,
    selected_sheet: Option<String>,
}

impl<'a, N: SpriteIndex + ?Sized> CommandDecoder<'a, N> {
    /// Create a decoder with no sprite sheet selected
    pub fn new(names: &'a N) -> Self {
        Self {
            names,
            selected_sheet: None,
        }
    }

    /// Start from an already selected sprite sheet
    pub fn with_sprite_sheet(mut self, sheet: Option<&str>) -> Self {
        self.selected_sheet = sheet.map(ToString::to_string);
        self
    }

    fn read_sprite_name(&self, r: &mut Reader<'_>, sheet: &str) -> Result<String, CodecError> {
        let index = if self.names.uses_wide_indices(sheet) {
            r.u16()?
        } else {
            r.u8()? as u16
        };
        self.names
            .sprite_name(sheet, index)
            .map(ToString::to_string)
            .ok_or(CodecError::UnknownSprite)
    }

    fn read_sprite_lines(&self, bytes: &[u8]) -> Result<Vec<SpriteLine>, CodecError> {
        let mut r = Reader::new(bytes);
        let mut lines = Vec::new();
        while r.position < bytes.len() {
            let len = r.u16()? as usize;
            let mut line_reader = Reader::new(r.take(len)?);
            let mut line = SpriteLine::new();
            while line_reader.position < len {
                let sheet_index = line_reader.u8()?;
                let sheet = self
                    .names
                    .sheet_name(sheet_index)
                    .ok_or(CodecError::UnknownSpriteSheet)?;
                let count = line_reader.u8()? as usize;
                let sprite_names = (0..count)
                    .map(|_| self.read_sprite_name(&mut line_reader, sheet))
                    .collect::<Result<Vec<_>, _>>()?;
                line.push(SpriteSubLine {
                    sprite_sheet_name: sheet.to_string(),
                    sprite_names,
                });
            }
            lines.push(line);
        }
        Ok(lines)
    }

    /// Decode one command from the front of `bytes`
    ///
    /// Returns the command and the number of bytes it used.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<(Command, usize), CodecError> {
        use CommandTag as T;

        let mut r = Reader::new(bytes);
        let tag_byte = r.u8()?;
        let tag = CommandTag::from_byte(tag_byte).ok_or(CodecError::UnknownTag(tag_byte))?;
        let alignment = |r: &mut Reader<'_>| {
            Alignment::from_byte(r.u8()?).ok_or(CodecError::InvalidValue)
        };
        let cap = |r: &mut Reader<'_>| SegmentCap::from_byte(r.u8()?).ok_or(CodecError::InvalidValue);
        let direction =
            |r: &mut Reader<'_>| Direction::from_byte(r.u8()?).ok_or(CodecError::InvalidValue);

        let command = match tag {
            T::Show => Command::Show,
            T::Clear => Command::Clear,
            T::SetColor => Command::SetColor {
                color_index: r.u8()?,
                color: Rgb::new(r.u8()?, r.u8()?, r.u8()?),
            },
            T::SetColorOpacity => Command::SetColorOpacity {
                color_index: r.u8()?,
                opacity: opacity_from_u8(r.u8()?),
            },
            T::SetOpacity => Command::SetOpacity {
                opacity: opacity_from_u8(r.u8()?),
            },
            T::SaveContext => Command::SaveContext,
            T::RestoreContext => Command::RestoreContext,
            T::SelectBackgroundColor => Command::SelectBackgroundColor {
                color_index: r.u8()?,
            },
            T::SelectFillColor => Command::SelectFillColor {
                color_index: r.u8()?,
            },
            T::SelectLineColor => Command::SelectLineColor {
                color_index: r.u8()?,
            },
            T::SetIgnoreFill => Command::SetIgnoreFill(r.bool()?),
            T::SetIgnoreLine => Command::SetIgnoreLine(r.bool()?),
            T::SetFillBackground => Command::SetFillBackground(r.bool()?),
            T::SetLineWidth => Command::SetLineWidth {
                line_width: r.u16()?,
            },
            T::SetRotation => Command::SetRotation {
                rotation: rotation_from_u16(r.u16()?),
            },
            T::ClearRotation => Command::ClearRotation,
            T::SetHorizontalAlignment => Command::SetHorizontalAlignment(alignment(&mut r)?),
            T::SetVerticalAlignment => Command::SetVerticalAlignment(alignment(&mut r)?),
            T::ResetAlignment => Command::ResetAlignment,
            T::SetSegmentStartCap => Command::SetSegmentStartCap(cap(&mut r)?),
            T::SetSegmentEndCap => Command::SetSegmentEndCap(cap(&mut r)?),
            T::SetSegmentCap => Command::SetSegmentCap(cap(&mut r)?),
            T::SetSegmentStartRadius => Command::SetSegmentStartRadius(r.u16()?),
            T::SetSegmentEndRadius => Command::SetSegmentEndRadius(r.u16()?),
            T::SetSegmentRadius => Command::SetSegmentRadius(r.u16()?),
            T::SetCropTop | T::SetCropRight | T::SetCropBottom | T::SetCropLeft => {
                let side = Side::ALL[(tag.to_byte() - T::SetCropTop.to_byte()) as usize];
                Command::SetCrop {
                    side,
                    crop: r.u16()?,
                }
            }
            T::ClearCrop => Command::ClearCrop,
            T::SetRotationCropTop
            | T::SetRotationCropRight
            | T::SetRotationCropBottom
            | T::SetRotationCropLeft => {
                let side = Side::ALL[(tag.to_byte() - T::SetRotationCropTop.to_byte()) as usize];
                Command::SetRotationCrop {
                    side,
                    crop: r.u16()?,
                }
            }
            T::ClearRotationCrop => Command::ClearRotationCrop,
            T::SelectBitmapColor => Command::SelectBitmapColor(ColorPair::new(r.u8()?, r.u8()?)),
            T::SelectBitmapColors => Command::SelectBitmapColors(read_color_pairs(&mut r)?),
            T::SetBitmapScaleX | T::SetBitmapScaleY | T::SetBitmapScale => Command::SetBitmapScale {
                axis: match tag {
                    T::SetBitmapScaleX => ScaleAxis::X,
                    T::SetBitmapScaleY => ScaleAxis::Y,
                    _ => ScaleAxis::Both,
                },
                scale: scale_from_i16(r.i16()?),
            },
            T::ResetBitmapScale => Command::ResetBitmapScale,
            T::SelectSpriteColor => Command::SelectSpriteColor(ColorPair::new(r.u8()?, r.u8()?)),
            T::SelectSpriteColors => Command::SelectSpriteColors(read_color_pairs(&mut r)?),
            T::ResetSpriteColors => Command::ResetSpriteColors,
            T::SetSpriteScaleX | T::SetSpriteScaleY | T::SetSpriteScale => Command::SetSpriteScale {
                axis: match tag {
                    T::SetSpriteScaleX => ScaleAxis::X,
                    T::SetSpriteScaleY => ScaleAxis::Y,
                    _ => ScaleAxis::Both,
                },
                scale: scale_from_i16(r.i16()?),
            },
            T::ResetSpriteScale => Command::ResetSpriteScale,
            T::SetSpritesLineHeight => Command::SetSpritesLineHeight(r.u16()?),
            T::SetSpritesDirection => Command::SetSpritesDirection(direction(&mut r)?),
            T::SetSpritesLineDirection => Command::SetSpritesLineDirection(direction(&mut r)?),
            T::SetSpritesSpacing => Command::SetSpritesSpacing(r.i16()?),
            T::SetSpritesLineSpacing => Command::SetSpritesLineSpacing(r.i16()?),
            T::SetSpritesAlignment => Command::SetSpritesAlignment(alignment(&mut r)?),
            T::SetSpritesLineAlignment => Command::SetSpritesLineAlignment(alignment(&mut r)?),
            T::ClearRect => Command::ClearRect {
                x: r.i16()?,
                y: r.i16()?,
                width: r.u16()?,
                height: r.u16()?,
            },
            T::DrawRect => Command::DrawRect {
                offset_x: r.i16()?,
                offset_y: r.i16()?,
                width: r.u16()?,
                height: r.u16()?,
            },
            T::DrawRoundRect => Command::DrawRoundRect {
                offset_x: r.i16()?,
                offset_y: r.i16()?,
                width: r.u16()?,
                height: r.u16()?,
                border_radius: r.u8()?,
            },
            T::DrawCircle => Command::DrawCircle {
                offset_x: r.i16()?,
                offset_y: r.i16()?,
                radius: r.u16()?,
            },
            T::DrawArc => Command::DrawArc {
                offset_x: r.i16()?,
                offset_y: r.i16()?,
                radius: r.u16()?,
                start_angle: rotation_from_u16(r.u16()?),
                angle_offset: angle_offset_from_i16(r.i16()?),
            },
            T::DrawEllipse => Command::DrawEllipse {
                offset_x: r.i16()?,
                offset_y: r.i16()?,
                radius_x: r.u16()?,
                radius_y: r.u16()?,
            },
            T::DrawArcEllipse => Command::DrawArcEllipse {
                offset_x: r.i16()?,
                offset_y: r.i16()?,
                radius_x: r.u16()?,
                radius_y: r.u16()?,
                start_angle: rotation_from_u16(r.u16()?),
                angle_offset: angle_offset_from_i16(r.i16()?),
            },
            T::DrawSegment => Command::DrawSegment {
                start_x: r.i16()?,
                start_y: r.i16()?,
                end_x: r.i16()?,
                end_y: r.i16()?,
            },
            T::DrawSegments => Command::DrawSegments {
                points: read_point_list(&mut r)?,
            },
            T::DrawRegularPolygon => Command::DrawRegularPolygon {
                offset_x: r.i16()?,
                offset_y: r.i16()?,
                radius: r.u16()?,
                number_of_sides: r.u8()?,
            },
            T::DrawPolygon => Command::DrawPolygon {
                points: read_point_list(&mut r)?,
            },
            T::DrawWireframe => {
                let points = read_point_list(&mut r)?;
                let count = r.u8()? as usize;
                let edges = (0..count)
                    .map(|_| {
                        Ok(WireframeEdge {
                            start: r.u8()?,
                            end: r.u8()?,
                        })
                    })
                    .collect::<Result<Vec<_>, CodecError>>()?;
                Command::DrawWireframe(Wireframe { points, edges })
            }
            T::DrawQuadraticBezierCurve | T::DrawCubicBezierCurve => {
                let kind = if tag == T::DrawCubicBezierCurve {
                    CurveKind::Cubic
                } else {
                    CurveKind::Quadratic
                };
                Command::DrawBezierCurve {
                    kind,
                    control_points: read_points(&mut r, kind.control_points(), PointDataType::Int16)?,
                }
            }
            T::DrawQuadraticBezierCurves | T::DrawCubicBezierCurves => Command::DrawBezierCurves {
                kind: if tag == T::DrawCubicBezierCurves {
                    CurveKind::Cubic
                } else {
                    CurveKind::Quadratic
                },
                control_points: read_point_list(&mut r)?,
            },
            T::DrawPath | T::DrawClosedPath => {
                let data_type =
                    PointDataType::from_byte(r.u8()?).ok_or(CodecError::InvalidValue)?;
                let curve_count = r.u8()? as usize;
                let _point_count = r.u8()?;
                let kinds = r.take(curve_count.div_ceil(CURVES_PER_BYTE))?;
                let mut curves = Vec::with_capacity(curve_count);
                for index in 0..curve_count {
                    let shift = (index % CURVES_PER_BYTE) * CURVE_BIT_WIDTH;
                    let bits = (kinds[index / CURVES_PER_BYTE] >> shift) & 0b11;
                    let kind = CurveKind::from_bits(bits).ok_or(CodecError::InvalidValue)?;
                    let count = kind.control_points() - usize::from(index > 0);
                    curves.push(Curve {
                        kind,
                        control_points: read_points(&mut r, count, data_type)?,
                    });
                }
                Command::DrawPath {
                    closed: tag == T::DrawClosedPath,
                    curves,
                }
            }
            T::DrawBitmap => {
                let offset_x = r.i16()?;
                let offset_y = r.i16()?;
                let width = r.u16()?;
                let pixel_count = r.u32()? as usize;
                let number_of_colors = r.u8()?;
                let data_len = r.u16()? as usize;
                let data = r.take(data_len)?;
                let depth =
                    PixelDepth::for_colors(number_of_colors).ok_or(CodecError::InvalidValue)?;
                let pixels =
                    unpack_pixels(data, pixel_count, depth).ok_or(CodecError::Truncated)?;
                if width == 0 {
                    return Err(CodecError::InvalidValue);
                }
                let height = pixel_count.div_ceil(width as usize) as u16;
                Command::DrawBitmap {
                    offset_x,
                    offset_y,
                    bitmap: Bitmap {
                        width,
                        height,
                        number_of_colors,
                        pixels,
                    },
                }
            }
            T::SelectSpriteSheet => {
                let index = r.u8()?;
                let name = self
                    .names
                    .sheet_name(index)
                    .ok_or(CodecError::UnknownSpriteSheet)?
                    .to_string();
                self.selected_sheet = Some(name.clone());
                Command::SelectSpriteSheet { name }
            }
            T::DrawSprite => {
                let offset_x = r.i16()?;
                let offset_y = r.i16()?;
                let sheet = self
                    .selected_sheet
                    .as_deref()
                    .ok_or(CodecError::NoSpriteSheetSelected)?;
                Command::DrawSprite {
                    offset_x,
                    offset_y,
                    name: self.read_sprite_name(&mut r, sheet)?,
                }
            }
            T::DrawSprites => {
                let offset_x = r.i16()?;
                let offset_y = r.i16()?;
                let len = r.u16()? as usize;
                let body = r.take(len)?;
                Command::DrawSprites {
                    offset_x,
                    offset_y,
                    lines: self.read_sprite_lines(body)?,
                }
            }
        };

        Ok((command, r.position))
    }

    /// Decode every command in `bytes`
    pub fn decode_all(&mut self, mut bytes: &[u8]) -> Result<Vec<Command>, CodecError> {
        let mut commands = Vec::new();
        while !bytes.is_empty() {
            let (command, used) = self.decode(bytes)?;
            commands.push(command);
            bytes = &bytes[used..];
        }
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    /// One sheet "glyphs" at index 0 holding sprites "a", "b", "c"
    struct Glyphs;

    impl SpriteIndex for Glyphs {
        fn sheet_index(&self, sheet: &str) -> Option<u8> {
            (sheet == "glyphs").then_some(0)
        }

        fn sheet_name(&self, index: u8) -> Option<&str> {
            (index == 0).then_some("glyphs")
        }

        fn sprite_index(&self, sheet: &str, sprite: &str) -> Option<u16> {
            if sheet != "glyphs" {
                return None;
            }
            ["a", "b", "c"].iter().position(|s| *s == sprite).map(|i| i as u16)
        }

        fn sprite_name(&self, sheet: &str, index: u16) -> Option<&str> {
            if sheet != "glyphs" {
                return None;
            }
            ["a", "b", "c"].get(index as usize).copied()
        }

        fn sprite_count(&self, sheet: &str) -> usize {
            if sheet == "glyphs" {
                3
            } else {
                0
            }
        }
    }

    fn encode(command: &Command) -> Result<Vec<u8>, CodecError> {
        CommandEncoder::new(&NoSprites).encode(command)
    }

    #[test]
    fn test_encode_set_color() {
        let bytes = encode(&Command::SetColor {
            color_index: 1,
            color: Rgb::new(255, 0, 0),
        })
        .unwrap();
        assert_eq!(bytes, vec![2, 1, 255, 0, 0]);
    }

    #[test]
    fn test_encode_draw_circle() {
        let bytes = encode(&Command::DrawCircle {
            offset_x: 50,
            offset_y: -2,
            radius: 10,
        })
        .unwrap();
        assert_eq!(bytes, vec![58, 50, 0, 0xFE, 0xFF, 10, 0]);
    }

    #[test]
    fn test_encode_rotation_and_scale() {
        let rotation = encode(&Command::SetRotation {
            rotation: core::f32::consts::PI,
        })
        .unwrap();
        assert_eq!(rotation, vec![14, 0xFF, 0x7F]);

        let scale = encode(&Command::SetBitmapScale {
            axis: ScaleAxis::Both,
            scale: 2.0,
        })
        .unwrap();
        assert_eq!(scale, vec![39, 0xE8, 0x03]);
    }

    #[test]
    fn test_encode_point_list_picks_smallest_type() {
        let bytes = encode(&Command::DrawPolygon {
            points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(5.0, -8.0)],
        })
        .unwrap();
        assert_eq!(bytes, vec![65, 0, 3, 0, 0, 10, 0, 5, 0xF8]);
    }

    #[test]
    fn test_encode_rejects_short_point_list() {
        let result = encode(&Command::DrawSegments {
            points: vec![Point::new(0.0, 0.0)],
        });
        assert_eq!(result, Err(CodecError::OutOfRange));
    }

    #[test]
    fn test_encode_path_packs_curve_kinds() {
        let curves = vec![
            Curve {
                kind: CurveKind::Segment,
                control_points: vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0)],
            },
            Curve {
                kind: CurveKind::Quadratic,
                control_points: vec![Point::new(6.0, 2.0), Point::new(4.0, 4.0)],
            },
            Curve {
                kind: CurveKind::Cubic,
                control_points: vec![
                    Point::new(2.0, 6.0),
                    Point::new(0.0, 6.0),
                    Point::new(0.0, 0.0),
                ],
            },
        ];
        let bytes = encode(&Command::DrawPath {
            closed: true,
            curves: curves.clone(),
        })
        .unwrap();
        assert_eq!(bytes[0], CommandTag::DrawClosedPath.to_byte());
        assert_eq!(bytes[1], PointDataType::Int8.to_byte());
        assert_eq!(bytes[2], 3); // curves
        assert_eq!(bytes[3], 7); // points
        assert_eq!(bytes[4], 0b10_01_00);

        let (decoded, used) = CommandDecoder::new(&NoSprites).decode(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(
            decoded,
            Command::DrawPath {
                closed: true,
                curves
            }
        );
    }

    #[test]
    fn test_encode_bitmap_header() {
        let bitmap = Bitmap {
            width: 4,
            height: 2,
            number_of_colors: 2,
            pixels: vec![1, 0, 1, 0, 0, 1, 0, 1],
        };
        let bytes = encode(&Command::DrawBitmap {
            offset_x: 1,
            offset_y: 2,
            bitmap,
        })
        .unwrap();
        assert_eq!(bytes.len(), 1 + DRAW_BITMAP_HEADER_LEN + 1);
        assert_eq!(&bytes[5..7], &[4, 0]); // width
        assert_eq!(&bytes[7..11], &[8, 0, 0, 0]); // pixel count
        assert_eq!(bytes[11], 2); // colors
        assert_eq!(&bytes[12..14], &[1, 0]); // data length
        assert_eq!(bytes[14], 0b1010_0101);
    }

    #[test]
    fn test_sprite_requires_selected_sheet() {
        let mut encoder = CommandEncoder::new(&Glyphs);
        let draw = Command::DrawSprite {
            offset_x: 0,
            offset_y: 0,
            name: "b".into(),
        };
        assert_eq!(encoder.encode(&draw), Err(CodecError::NoSpriteSheetSelected));

        let select = encoder
            .encode(&Command::SelectSpriteSheet {
                name: "glyphs".into(),
            })
            .unwrap();
        assert_eq!(select, vec![74, 0]);
        assert_eq!(encoder.selected_sheet(), Some("glyphs"));

        let bytes = encoder.encode(&draw).unwrap();
        assert_eq!(bytes, vec![75, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_unknown_sprite() {
        let mut encoder = CommandEncoder::new(&Glyphs).with_sprite_sheet(Some("glyphs"));
        let result = encoder.encode(&Command::DrawSprite {
            offset_x: 0,
            offset_y: 0,
            name: "z".into(),
        });
        assert_eq!(result, Err(CodecError::UnknownSprite));
    }

    #[test]
    fn test_draw_sprites_layout_bytes() {
        let lines = vec![vec![SpriteSubLine {
            sprite_sheet_name: "glyphs".into(),
            sprite_names: vec!["c".into(), "a".into()],
        }]];
        let command = Command::DrawSprites {
            offset_x: 10,
            offset_y: 20,
            lines,
        };
        let bytes = CommandEncoder::new(&Glyphs).encode(&command).unwrap();
        assert_eq!(bytes, vec![76, 10, 0, 20, 0, 6, 0, 4, 0, 0, 2, 2, 0]);

        let (decoded, _) = CommandDecoder::new(&Glyphs).decode(&bytes).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn test_decode_stream() {
        let commands = vec![
            Command::SelectFillColor { color_index: 3 },
            Command::SetSegmentCap(SegmentCap::Round),
            Command::SetCrop {
                side: Side::Left,
                crop: 7,
            },
            Command::DrawSegment {
                start_x: 0,
                start_y: 0,
                end_x: 10,
                end_y: 10,
            },
            Command::Show,
        ];
        let bytes = CommandEncoder::new(&NoSprites)
            .encode_all(commands.iter())
            .unwrap();
        let decoded = CommandDecoder::new(&NoSprites).decode_all(&bytes).unwrap();
        assert_eq!(decoded, commands);
    }

    #[test]
    fn test_decode_errors() {
        let mut decoder = CommandDecoder::new(&NoSprites);
        assert_eq!(decoder.decode(&[200]), Err(CodecError::UnknownTag(200)));
        assert_eq!(decoder.decode(&[58, 1, 0]), Err(CodecError::Truncated));
        assert_eq!(decoder.decode(&[16, 9]), Err(CodecError::InvalidValue));
        assert_eq!(decoder.decode(&[]), Err(CodecError::Truncated));
    }

    #[test]
    fn test_curve_chain_validation() {
        assert!(is_valid_curve_chain(CurveKind::Quadratic, 3));
        assert!(is_valid_curve_chain(CurveKind::Quadratic, 5));
        assert!(!is_valid_curve_chain(CurveKind::Quadratic, 4));
        assert!(is_valid_curve_chain(CurveKind::Cubic, 7));
        assert!(!is_valid_curve_chain(CurveKind::Cubic, 1));
    }
}
