//! Display context command vocabulary
//!
//! [`Command`] is the closed set of operations a host can ask of a display.
//! Each variant carries only the fields it needs; sprite and sprite-sheet
//! references are by name and resolve to indices at encode time.

use alloc::string::String;
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One-byte command identifier on the wire
///
/// Values are the declaration index. New commands are appended; existing
/// values never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandTag {
    Show,
    Clear,

    SetColor,
    SetColorOpacity,
    SetOpacity,

    SaveContext,
    RestoreContext,

    SelectBackgroundColor,
    SelectFillColor,
    SelectLineColor,

    SetIgnoreFill,
    SetIgnoreLine,
    SetFillBackground,

    SetLineWidth,
    SetRotation,
    ClearRotation,

    SetHorizontalAlignment,
    SetVerticalAlignment,
    ResetAlignment,

    SetSegmentStartCap,
    SetSegmentEndCap,
    SetSegmentCap,

    SetSegmentStartRadius,
    SetSegmentEndRadius,
    SetSegmentRadius,

    SetCropTop,
    SetCropRight,
    SetCropBottom,
    SetCropLeft,
    ClearCrop,

    SetRotationCropTop,
    SetRotationCropRight,
    SetRotationCropBottom,
    SetRotationCropLeft,
    ClearRotationCrop,

    SelectBitmapColor,
    SelectBitmapColors,
    SetBitmapScaleX,
    SetBitmapScaleY,
    SetBitmapScale,
    ResetBitmapScale,

    SelectSpriteColor,
    SelectSpriteColors,
    ResetSpriteColors,
    SetSpriteScaleX,
    SetSpriteScaleY,
    SetSpriteScale,
    ResetSpriteScale,

    SetSpritesLineHeight,
    SetSpritesDirection,
    SetSpritesLineDirection,
    SetSpritesSpacing,
    SetSpritesLineSpacing,
    SetSpritesAlignment,
    SetSpritesLineAlignment,

    ClearRect,

    DrawRect,
    DrawRoundRect,
    DrawCircle,
    DrawArc,
    DrawEllipse,
    DrawArcEllipse,
    DrawSegment,
    DrawSegments,
    DrawRegularPolygon,
    DrawPolygon,
    DrawWireframe,
    DrawQuadraticBezierCurve,
    DrawQuadraticBezierCurves,
    DrawCubicBezierCurve,
    DrawCubicBezierCurves,
    DrawPath,
    DrawClosedPath,

    DrawBitmap,

    SelectSpriteSheet,
    DrawSprite,
    DrawSprites,
}

impl CommandTag {
    /// Every tag, in wire order
    pub const ALL: [CommandTag; 77] = {
        use CommandTag::*;
        [
            Show,
            Clear,
            SetColor,
            SetColorOpacity,
            SetOpacity,
            SaveContext,
            RestoreContext,
            SelectBackgroundColor,
            SelectFillColor,
            SelectLineColor,
            SetIgnoreFill,
            SetIgnoreLine,
            SetFillBackground,
            SetLineWidth,
            SetRotation,
            ClearRotation,
            SetHorizontalAlignment,
            SetVerticalAlignment,
            ResetAlignment,
            SetSegmentStartCap,
            SetSegmentEndCap,
            SetSegmentCap,
            SetSegmentStartRadius,
            SetSegmentEndRadius,
            SetSegmentRadius,
            SetCropTop,
            SetCropRight,
            SetCropBottom,
            SetCropLeft,
            ClearCrop,
            SetRotationCropTop,
            SetRotationCropRight,
            SetRotationCropBottom,
            SetRotationCropLeft,
            ClearRotationCrop,
            SelectBitmapColor,
            SelectBitmapColors,
            SetBitmapScaleX,
            SetBitmapScaleY,
            SetBitmapScale,
            ResetBitmapScale,
            SelectSpriteColor,
            SelectSpriteColors,
            ResetSpriteColors,
            SetSpriteScaleX,
            SetSpriteScaleY,
            SetSpriteScale,
            ResetSpriteScale,
            SetSpritesLineHeight,
            SetSpritesDirection,
            SetSpritesLineDirection,
            SetSpritesSpacing,
            SetSpritesLineSpacing,
            SetSpritesAlignment,
            SetSpritesLineAlignment,
            ClearRect,
            DrawRect,
            DrawRoundRect,
            DrawCircle,
            DrawArc,
            DrawEllipse,
            DrawArcEllipse,
            DrawSegment,
            DrawSegments,
            DrawRegularPolygon,
            DrawPolygon,
            DrawWireframe,
            DrawQuadraticBezierCurve,
            DrawQuadraticBezierCurves,
            DrawCubicBezierCurve,
            DrawCubicBezierCurves,
            DrawPath,
            DrawClosedPath,
            DrawBitmap,
            SelectSpriteSheet,
            DrawSprite,
            DrawSprites,
        ]
    };

    /// Parse a tag from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Returns true if this command may appear inside a sprite program
    pub fn is_sprite_context(self) -> bool {
        use CommandTag::*;
        !matches!(
            self,
            Show | Clear
                | SetColor
                | SetColorOpacity
                | SetOpacity
                | SaveContext
                | RestoreContext
                | SelectBackgroundColor
                | SetFillBackground
                | SetSpritesLineHeight
                | SetSpritesDirection
                | SetSpritesLineDirection
                | SetSpritesSpacing
                | SetSpritesLineSpacing
                | SetSpritesAlignment
                | SetSpritesLineAlignment
                | SelectSpriteSheet
                | DrawSprites
        )
    }

    /// Returns true if this command puts pixels on the screen
    pub fn is_draw(self) -> bool {
        self.to_byte() >= CommandTag::ClearRect.to_byte()
            && self != CommandTag::SelectSpriteSheet
    }
}

/// Placement of a shape relative to its offset, per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Alignment {
    Start,
    #[default]
    Center,
    End,
}

impl Alignment {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Alignment::Start),
            1 => Some(Alignment::Center),
            2 => Some(Alignment::End),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Fraction of the size the origin moves back by
    pub fn factor(self) -> f32 {
        match self {
            Alignment::Start => 0.0,
            Alignment::Center => 0.5,
            Alignment::End => 1.0,
        }
    }
}

/// End shape of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SegmentCap {
    #[default]
    Flat,
    Round,
}

impl SegmentCap {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SegmentCap::Flat),
            1 => Some(SegmentCap::Round),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Layout direction for sprite runs and lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Direction {
    Right,
    Left,
    Up,
    Down,
}

impl Direction {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Direction::Right),
            1 => Some(Direction::Left),
            2 => Some(Direction::Up),
            3 => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Returns true for left and right
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Right | Direction::Left)
    }

    /// Unit step along this direction in screen space (y grows down)
    pub fn unit(self) -> (f32, f32) {
        match self {
            Direction::Right => (1.0, 0.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
        }
    }
}

/// Edge of a crop region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];
}

/// Which scale component a scale command writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScaleAxis {
    X,
    Y,
    Both,
}

/// Curve segment kind inside a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CurveKind {
    Segment,
    Quadratic,
    Cubic,
}

impl CurveKind {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(CurveKind::Segment),
            1 => Some(CurveKind::Quadratic),
            2 => Some(CurveKind::Cubic),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u8 {
        self as u8
    }

    /// Control points of a standalone curve of this kind
    pub fn control_points(self) -> usize {
        match self {
            CurveKind::Segment => 2,
            CurveKind::Quadratic => 3,
            CurveKind::Cubic => 4,
        }
    }
}

/// Encoding used for a list of points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PointDataType {
    Int8,
    Int16,
    Float,
}

impl PointDataType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(PointDataType::Int8),
            1 => Some(PointDataType::Int16),
            2 => Some(PointDataType::Float),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Bytes used by one point
    pub fn point_size(self) -> usize {
        match self {
            PointDataType::Int8 => 2,
            PointDataType::Int16 => 4,
            PointDataType::Float => 8,
        }
    }

    /// Smallest encoding that holds every coordinate exactly
    pub fn for_points(points: &[Point]) -> Self {
        let integral = points
            .iter()
            .all(|p| p.x as i32 as f32 == p.x && p.y as i32 as f32 == p.y);
        if !integral {
            return PointDataType::Float;
        }
        let fits = |min: f32, max: f32| {
            points
                .iter()
                .all(|p| p.x >= min && p.x <= max && p.y >= min && p.y <= max)
        };
        if fits(i8::MIN as f32, i8::MAX as f32) {
            PointDataType::Int8
        } else if fits(i16::MIN as f32, i16::MAX as f32) {
            PointDataType::Int16
        } else {
            PointDataType::Float
        }
    }
}

/// 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `#rgb` (the `#` is optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let nibble = |c: u8| (c as char).to_digit(16).map(|d| d as u8);
        let bytes = digits.as_bytes();
        match bytes.len() {
            3 => {
                let r = nibble(bytes[0])?;
                let g = nibble(bytes[1])?;
                let b = nibble(bytes[2])?;
                Some(Self::new(r * 17, g * 17, b * 17))
            }
            6 => {
                let byte = |i: usize| Some(nibble(bytes[i])? << 4 | nibble(bytes[i + 1])?);
                Some(Self::new(byte(0)?, byte(2)?, byte(4)?))
            }
            _ => None,
        }
    }

    /// Format as lowercase `#rrggbb`
    pub fn to_hex(&self) -> String {
        alloc::format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// 2D point in display pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One curve of a path
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Curve {
    pub kind: CurveKind,
    /// Control points; every curve after the first omits its start point
    pub control_points: Vec<Point>,
}

/// Edge between two wireframe points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WireframeEdge {
    pub start: u8,
    pub end: u8,
}

/// Point cloud joined by edges
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wireframe {
    pub points: Vec<Point>,
    pub edges: Vec<WireframeEdge>,
}

/// Remaps a bitmap or sprite color index to a color-table index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColorPair {
    /// Bitmap or sprite color index
    pub from: u8,
    /// Color-table index
    pub to: u8,
}

impl ColorPair {
    pub const fn new(from: u8, to: u8) -> Self {
        Self { from, to }
    }
}

/// Indexed-color image
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bitmap {
    pub width: u16,
    pub height: u16,
    pub number_of_colors: u8,
    /// Row-major bitmap color indices; the last row may be short
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Check the pixel count and pixel values
    pub fn is_valid(&self) -> bool {
        if self.width == 0 || self.height == 0 || self.number_of_colors < 2 {
            return false;
        }
        let width = self.width as usize;
        let height = self.height as usize;
        let count = self.pixels.len();
        let min = width * (height - 1) + 1;
        let max = width * height;
        count >= min
            && count <= max
            && self.pixels.iter().all(|&p| p < self.number_of_colors)
    }
}

/// Sprites drawn from one sheet within a line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpriteSubLine {
    pub sprite_sheet_name: String,
    pub sprite_names: Vec<String>,
}

/// One line of a `DrawSprites` layout
pub type SpriteLine = Vec<SpriteSubLine>;

/// A display context command
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Command {
    Show,
    Clear,

    SetColor { color_index: u8, color: Rgb },
    SetColorOpacity { color_index: u8, opacity: f32 },
    SetOpacity { opacity: f32 },

    SaveContext,
    RestoreContext,

    SelectBackgroundColor { color_index: u8 },
    SelectFillColor { color_index: u8 },
    SelectLineColor { color_index: u8 },

    SetIgnoreFill(bool),
    SetIgnoreLine(bool),
    SetFillBackground(bool),

    SetLineWidth { line_width: u16 },
    /// Rotation in radians
    SetRotation { rotation: f32 },
    ClearRotation,

    SetHorizontalAlignment(Alignment),
    SetVerticalAlignment(Alignment),
    ResetAlignment,

    SetSegmentStartCap(SegmentCap),
    SetSegmentEndCap(SegmentCap),
    SetSegmentCap(SegmentCap),

    SetSegmentStartRadius(u16),
    SetSegmentEndRadius(u16),
    SetSegmentRadius(u16),

    SetCrop { side: Side, crop: u16 },
    ClearCrop,
    SetRotationCrop { side: Side, crop: u16 },
    ClearRotationCrop,

    SelectBitmapColor(ColorPair),
    SelectBitmapColors(Vec<ColorPair>),
    SetBitmapScale { axis: ScaleAxis, scale: f32 },
    ResetBitmapScale,

    SelectSpriteColor(ColorPair),
    SelectSpriteColors(Vec<ColorPair>),
    ResetSpriteColors,
    SetSpriteScale { axis: ScaleAxis, scale: f32 },
    ResetSpriteScale,

    SetSpritesLineHeight(u16),
    SetSpritesDirection(Direction),
    SetSpritesLineDirection(Direction),
    SetSpritesSpacing(i16),
    SetSpritesLineSpacing(i16),
    SetSpritesAlignment(Alignment),
    SetSpritesLineAlignment(Alignment),

    ClearRect { x: i16, y: i16, width: u16, height: u16 },

    DrawRect { offset_x: i16, offset_y: i16, width: u16, height: u16 },
    DrawRoundRect { offset_x: i16, offset_y: i16, width: u16, height: u16, border_radius: u8 },
    DrawCircle { offset_x: i16, offset_y: i16, radius: u16 },
    /// Angles in radians
    DrawArc { offset_x: i16, offset_y: i16, radius: u16, start_angle: f32, angle_offset: f32 },
    DrawEllipse { offset_x: i16, offset_y: i16, radius_x: u16, radius_y: u16 },
    DrawArcEllipse {
        offset_x: i16,
        offset_y: i16,
        radius_x: u16,
        radius_y: u16,
        start_angle: f32,
        angle_offset: f32,
    },
    DrawSegment { start_x: i16, start_y: i16, end_x: i16, end_y: i16 },
    DrawSegments { points: Vec<Point> },
    DrawRegularPolygon { offset_x: i16, offset_y: i16, radius: u16, number_of_sides: u8 },
    DrawPolygon { points: Vec<Point> },
    DrawWireframe(Wireframe),
    /// A single quadratic or cubic curve
    DrawBezierCurve { kind: CurveKind, control_points: Vec<Point> },
    /// A chain of quadratic or cubic curves sharing end points
    DrawBezierCurves { kind: CurveKind, control_points: Vec<Point> },
    DrawPath { closed: bool, curves: Vec<Curve> },

    DrawBitmap { offset_x: i16, offset_y: i16, bitmap: Bitmap },

    SelectSpriteSheet { name: String },
    DrawSprite { offset_x: i16, offset_y: i16, name: String },
    DrawSprites { offset_x: i16, offset_y: i16, lines: Vec<SpriteLine> },
}

impl Command {
    /// Wire tag for this command
    pub fn tag(&self) -> CommandTag {
        use CommandTag as T;
        match self {
            Command::Show => T::Show,
            Command::Clear => T::Clear,
            Command::SetColor { .. } => T::SetColor,
            Command::SetColorOpacity { .. } => T::SetColorOpacity,
            Command::SetOpacity { .. } => T::SetOpacity,
            Command::SaveContext => T::SaveContext,
            Command::RestoreContext => T::RestoreContext,
            Command::SelectBackgroundColor { .. } => T::SelectBackgroundColor,
            Command::SelectFillColor { .. } => T::SelectFillColor,
            Command::SelectLineColor { .. } => T::SelectLineColor,
            Command::SetIgnoreFill(_) => T::SetIgnoreFill,
            Command::SetIgnoreLine(_) => T::SetIgnoreLine,
            Command::SetFillBackground(_) => T::SetFillBackground,
            Command::SetLineWidth { .. } => T::SetLineWidth,
            Command::SetRotation { .. } => T::SetRotation,
            Command::ClearRotation => T::ClearRotation,
            Command::SetHorizontalAlignment(_) => T::SetHorizontalAlignment,
            Command::SetVerticalAlignment(_) => T::SetVerticalAlignment,
            Command::ResetAlignment => T::ResetAlignment,
            Command::SetSegmentStartCap(_) => T::SetSegmentStartCap,
            Command::SetSegmentEndCap(_) => T::SetSegmentEndCap,
            Command::SetSegmentCap(_) => T::SetSegmentCap,
            Command::SetSegmentStartRadius(_) => T::SetSegmentStartRadius,
            Command::SetSegmentEndRadius(_) => T::SetSegmentEndRadius,
            Command::SetSegmentRadius(_) => T::SetSegmentRadius,
            Command::SetCrop { side, .. } => match side {
                Side::Top => T::SetCropTop,
                Side::Right => T::SetCropRight,
                Side::Bottom => T::SetCropBottom,
                Side::Left => T::SetCropLeft,
            },
            Command::ClearCrop => T::ClearCrop,
            Command::SetRotationCrop { side, .. } => match side {
                Side::Top => T::SetRotationCropTop,
                Side::Right => T::SetRotationCropRight,
                Side::Bottom => T::SetRotationCropBottom,
                Side::Left => T::SetRotationCropLeft,
            },
            Command::ClearRotationCrop => T::ClearRotationCrop,
            Command::SelectBitmapColor(_) => T::SelectBitmapColor,
            Command::SelectBitmapColors(_) => T::SelectBitmapColors,
            Command::SetBitmapScale { axis, .. } => match axis {
                ScaleAxis::X => T::SetBitmapScaleX,
                ScaleAxis::Y => T::SetBitmapScaleY,
                ScaleAxis::Both => T::SetBitmapScale,
            },
            Command::ResetBitmapScale => T::ResetBitmapScale,
            Command::SelectSpriteColor(_) => T::SelectSpriteColor,
            Command::SelectSpriteColors(_) => T::SelectSpriteColors,
            Command::ResetSpriteColors => T::ResetSpriteColors,
            Command::SetSpriteScale { axis, .. } => match axis {
                ScaleAxis::X => T::SetSpriteScaleX,
                ScaleAxis::Y => T::SetSpriteScaleY,
                ScaleAxis::Both => T::SetSpriteScale,
            },
            Command::ResetSpriteScale => T::ResetSpriteScale,
            Command::SetSpritesLineHeight(_) => T::SetSpritesLineHeight,
            Command::SetSpritesDirection(_) => T::SetSpritesDirection,
            Command::SetSpritesLineDirection(_) => T::SetSpritesLineDirection,
            Command::SetSpritesSpacing(_) => T::SetSpritesSpacing,
            Command::SetSpritesLineSpacing(_) => T::SetSpritesLineSpacing,
            Command::SetSpritesAlignment(_) => T::SetSpritesAlignment,
            Command::SetSpritesLineAlignment(_) => T::SetSpritesLineAlignment,
            Command::ClearRect { .. } => T::ClearRect,
            Command::DrawRect { .. } => T::DrawRect,
            Command::DrawRoundRect { .. } => T::DrawRoundRect,
            Command::DrawCircle { .. } => T::DrawCircle,
            Command::DrawArc { .. } => T::DrawArc,
            Command::DrawEllipse { .. } => T::DrawEllipse,
            Command::DrawArcEllipse { .. } => T::DrawArcEllipse,
            Command::DrawSegment { .. } => T::DrawSegment,
            Command::DrawSegments { .. } => T::DrawSegments,
            Command::DrawRegularPolygon { .. } => T::DrawRegularPolygon,
            Command::DrawPolygon { .. } => T::DrawPolygon,
            Command::DrawWireframe(_) => T::DrawWireframe,
            Command::DrawBezierCurve { kind, .. } => match kind {
                CurveKind::Cubic => T::DrawCubicBezierCurve,
                _ => T::DrawQuadraticBezierCurve,
            },
            Command::DrawBezierCurves { kind, .. } => match kind {
                CurveKind::Cubic => T::DrawCubicBezierCurves,
                _ => T::DrawQuadraticBezierCurves,
            },
            Command::DrawPath { closed, .. } => {
                if *closed {
                    T::DrawClosedPath
                } else {
                    T::DrawPath
                }
            }
            Command::DrawBitmap { .. } => T::DrawBitmap,
            Command::SelectSpriteSheet { .. } => T::SelectSpriteSheet,
            Command::DrawSprite { .. } => T::DrawSprite,
            Command::DrawSprites { .. } => T::DrawSprites,
        }
    }
}

/// A command inside a stored program
///
/// Hidden instructions stay in the program but are skipped when it runs
/// and left out when it is serialized.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instruction {
    pub command: Command,
    pub hide: bool,
}

impl Instruction {
    /// An instruction that is skipped at dispatch time
    pub fn hidden(command: Command) -> Self {
        Self {
            command,
            hide: true,
        }
    }
}

impl From<Command> for Instruction {
    fn from(command: Command) -> Self {
        Self {
            command,
            hide: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_values_are_declaration_order() {
        for (index, tag) in CommandTag::ALL.iter().enumerate() {
            assert_eq!(tag.to_byte() as usize, index);
            assert_eq!(CommandTag::from_byte(index as u8), Some(*tag));
        }
        assert!(CommandTag::from_byte(77).is_none());
    }

    #[test]
    fn test_pinned_tag_values() {
        assert_eq!(CommandTag::Show.to_byte(), 0);
        assert_eq!(CommandTag::SetLineWidth.to_byte(), 13);
        assert_eq!(CommandTag::ClearRect.to_byte(), 55);
        assert_eq!(CommandTag::DrawCircle.to_byte(), 58);
        assert_eq!(CommandTag::DrawBitmap.to_byte(), 73);
        assert_eq!(CommandTag::DrawSprites.to_byte(), 76);
    }

    #[test]
    fn test_sprite_context_tags() {
        assert!(CommandTag::DrawSprite.is_sprite_context());
        assert!(CommandTag::SelectFillColor.is_sprite_context());
        assert!(!CommandTag::Show.is_sprite_context());
        assert!(!CommandTag::SetColor.is_sprite_context());
        assert!(!CommandTag::DrawSprites.is_sprite_context());
    }

    #[test]
    fn test_draw_tags() {
        assert!(CommandTag::DrawRect.is_draw());
        assert!(CommandTag::DrawSprite.is_draw());
        assert!(!CommandTag::SelectSpriteSheet.is_draw());
        assert!(!CommandTag::SetRotation.is_draw());
    }

    #[test]
    fn test_command_tag_by_variant() {
        let crop = Command::SetCrop {
            side: Side::Bottom,
            crop: 4,
        };
        assert_eq!(crop.tag(), CommandTag::SetCropBottom);

        let scale = Command::SetSpriteScale {
            axis: ScaleAxis::Y,
            scale: 2.0,
        };
        assert_eq!(scale.tag(), CommandTag::SetSpriteScaleY);

        let path = Command::DrawPath {
            closed: true,
            curves: Vec::new(),
        };
        assert_eq!(path.tag(), CommandTag::DrawClosedPath);
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(Rgb::from_hex("#ff0000"), Some(Rgb::new(255, 0, 0)));
        assert_eq!(Rgb::from_hex("0a0B0c"), Some(Rgb::new(10, 11, 12)));
        assert_eq!(Rgb::from_hex("#f80"), Some(Rgb::new(255, 136, 0)));
        assert_eq!(Rgb::from_hex("#ff00"), None);
        assert_eq!(Rgb::from_hex("#gg0000"), None);
        assert_eq!(Rgb::new(1, 2, 255).to_hex(), "#0102ff");
    }

    #[test]
    fn test_point_data_type_selection() {
        let small = [Point::new(-5.0, 100.0), Point::new(127.0, -128.0)];
        assert_eq!(PointDataType::for_points(&small), PointDataType::Int8);

        let medium = [Point::new(0.0, 300.0)];
        assert_eq!(PointDataType::for_points(&medium), PointDataType::Int16);

        let fractional = [Point::new(0.5, 1.0)];
        assert_eq!(PointDataType::for_points(&fractional), PointDataType::Float);
    }

    #[test]
    fn test_bitmap_validity() {
        let bitmap = Bitmap {
            width: 3,
            height: 2,
            number_of_colors: 2,
            pixels: alloc::vec![0, 1, 0, 1],
        };
        assert!(bitmap.is_valid());

        let short = Bitmap {
            pixels: alloc::vec![0, 1, 0],
            ..bitmap.clone()
        };
        assert!(!short.is_valid());

        let bad_pixel = Bitmap {
            pixels: alloc::vec![0, 1, 2, 1],
            ..bitmap
        };
        assert!(!bad_pixel.is_valid());
    }

    #[test]
    fn test_hidden_instruction() {
        let instruction = Instruction::hidden(Command::Show);
        assert!(instruction.hide);
        let visible: Instruction = Command::Show.into();
        assert!(!visible.hide);
    }
}
