//! Engine error types
//!
//! Every variant is raised before any state mutation or transport write for
//! the failing call, so a rejected call leaves the device and the preview
//! exactly as they were.

use core::fmt;

use eidolon_protocol::CodecError;

use crate::traits::TransportError;

/// Geometry a draw or setter cannot accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GeometryError {
    /// Segment start and end are the same point
    ZeroLengthSegment,
    /// Regular polygon with fewer than three sides
    TooFewSides,
    /// Point list shorter than the primitive needs
    TooFewPoints,
    /// Line width larger than the canvas
    LineWidthExceedsCanvas,
    /// Path with no curves or mismatched control point counts
    InvalidPath,
    /// Sprites nested deeper than the state stack allows
    SpriteDepthExceeded,
}

/// Errors returned by engine operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    /// Color, bitmap-color or sprite-color index outside the color table
    InvalidIndex,
    /// Geometry rejected before mutation
    InvalidGeometry(GeometryError),
    /// Opacity, hex color, scale or bitmap outside its valid range
    InvalidValue,
    /// Command not allowed where it was used
    InvalidCommand,
    /// A sprite transitively draws itself
    CyclicSprite,
    /// Sprite drawn with no sprite sheet selected
    NoSpriteSheetSelected,
    /// Sprite name not found in the selected sheet
    SpriteNotFound,
    /// Sprite sheet name not registered
    SpriteSheetNotFound,
    /// Palette name not found in the selected sheet
    PaletteNotFound,
    /// Palette swap name not found in the sheet or sprite
    PaletteSwapNotFound,
    /// One encoded command is larger than a command batch
    CommandTooLarge,
    /// `restoreContext` with no saved context
    NothingToRestore,
    /// Command encoding or decoding failed
    Codec(CodecError),
    /// The transport refused the bytes
    Transport(TransportError),
    /// The engine has been torn down
    TornDown,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::ZeroLengthSegment => write!(f, "segment has zero length"),
            GeometryError::TooFewSides => write!(f, "polygon needs at least 3 sides"),
            GeometryError::TooFewPoints => write!(f, "not enough points"),
            GeometryError::LineWidthExceedsCanvas => write!(f, "line width exceeds canvas"),
            GeometryError::InvalidPath => write!(f, "invalid path curves"),
            GeometryError::SpriteDepthExceeded => write!(f, "sprites nested too deeply"),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidIndex => write!(f, "color index out of range"),
            EngineError::InvalidGeometry(e) => write!(f, "invalid geometry: {e}"),
            EngineError::InvalidValue => write!(f, "value out of range"),
            EngineError::InvalidCommand => write!(f, "command not allowed here"),
            EngineError::CyclicSprite => write!(f, "sprite draws itself"),
            EngineError::NoSpriteSheetSelected => write!(f, "no sprite sheet selected"),
            EngineError::SpriteNotFound => write!(f, "sprite not found"),
            EngineError::SpriteSheetNotFound => write!(f, "sprite sheet not found"),
            EngineError::PaletteNotFound => write!(f, "palette not found"),
            EngineError::PaletteSwapNotFound => write!(f, "palette swap not found"),
            EngineError::CommandTooLarge => write!(f, "command larger than a batch"),
            EngineError::NothingToRestore => write!(f, "no saved context to restore"),
            EngineError::Codec(e) => write!(f, "codec error: {e:?}"),
            EngineError::Transport(e) => write!(f, "transport error: {e:?}"),
            EngineError::TornDown => write!(f, "engine torn down"),
        }
    }
}

impl std::error::Error for GeometryError {}
impl std::error::Error for EngineError {}

impl From<GeometryError> for EngineError {
    fn from(e: GeometryError) -> Self {
        EngineError::InvalidGeometry(e)
    }
}

impl From<CodecError> for EngineError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::UnknownSprite => EngineError::SpriteNotFound,
            CodecError::UnknownSpriteSheet => EngineError::SpriteSheetNotFound,
            CodecError::NoSpriteSheetSelected => EngineError::NoSpriteSheetSelected,
            other => EngineError::Codec(other),
        }
    }
}

impl From<TransportError> for EngineError {
    fn from(e: TransportError) -> Self {
        EngineError::Transport(e)
    }
}
