//! Minimal-change updates to the context state
//!
//! Callers describe the state they want as a list of [`StateChange`]s. The
//! helper compares each against the canonical state, applies only the ones
//! that differ and reports their keys. An empty report means the call was
//! redundant and nothing may be emitted for it.

use eidolon_protocol::quantize::{normalize_radians, rotation_to_u16, round_scale};
use eidolon_protocol::{Alignment, Direction, SegmentCap, Side};

use super::context::{default_bitmap_color_indices, default_sprite_color_indices, ContextState};

/// Names one field of [`ContextState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateKey {
    BackgroundColorIndex,
    FillColorIndex,
    LineColorIndex,
    IgnoreFill,
    IgnoreLine,
    FillBackground,
    LineWidth,
    Rotation,
    HorizontalAlignment,
    VerticalAlignment,
    SegmentStartCap,
    SegmentEndCap,
    SegmentStartRadius,
    SegmentEndRadius,
    Crop(Side),
    RotationCrop(Side),
    BitmapColorIndices,
    BitmapScaleX,
    BitmapScaleY,
    SpriteColorIndices,
    SpriteScaleX,
    SpriteScaleY,
    SpriteSheetName,
    SpritesLineHeight,
    SpritesDirection,
    SpritesLineDirection,
    SpritesSpacing,
    SpritesLineSpacing,
    SpritesAlignment,
    SpritesLineAlignment,
}

impl StateKey {
    /// Every key, crops expanded per side
    pub const ALL: [StateKey; 36] = [
        StateKey::BackgroundColorIndex,
        StateKey::FillColorIndex,
        StateKey::LineColorIndex,
        StateKey::IgnoreFill,
        StateKey::IgnoreLine,
        StateKey::FillBackground,
        StateKey::LineWidth,
        StateKey::Rotation,
        StateKey::HorizontalAlignment,
        StateKey::VerticalAlignment,
        StateKey::SegmentStartCap,
        StateKey::SegmentEndCap,
        StateKey::SegmentStartRadius,
        StateKey::SegmentEndRadius,
        StateKey::Crop(Side::Top),
        StateKey::Crop(Side::Right),
        StateKey::Crop(Side::Bottom),
        StateKey::Crop(Side::Left),
        StateKey::RotationCrop(Side::Top),
        StateKey::RotationCrop(Side::Right),
        StateKey::RotationCrop(Side::Bottom),
        StateKey::RotationCrop(Side::Left),
        StateKey::BitmapColorIndices,
        StateKey::BitmapScaleX,
        StateKey::BitmapScaleY,
        StateKey::SpriteColorIndices,
        StateKey::SpriteScaleX,
        StateKey::SpriteScaleY,
        StateKey::SpriteSheetName,
        StateKey::SpritesLineHeight,
        StateKey::SpritesDirection,
        StateKey::SpritesLineDirection,
        StateKey::SpritesSpacing,
        StateKey::SpritesLineSpacing,
        StateKey::SpritesAlignment,
        StateKey::SpritesLineAlignment,
    ];
}

/// A requested value for one key
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    BackgroundColorIndex(u8),
    FillColorIndex(u8),
    LineColorIndex(u8),
    IgnoreFill(bool),
    IgnoreLine(bool),
    FillBackground(bool),
    LineWidth(u16),
    Rotation(f32),
    HorizontalAlignment(Alignment),
    VerticalAlignment(Alignment),
    SegmentStartCap(SegmentCap),
    SegmentEndCap(SegmentCap),
    SegmentStartRadius(u16),
    SegmentEndRadius(u16),
    Crop(Side, u16),
    RotationCrop(Side, u16),
    BitmapColorIndices(Vec<u8>),
    BitmapScaleX(f32),
    BitmapScaleY(f32),
    SpriteColorIndices(Vec<u8>),
    SpriteScaleX(f32),
    SpriteScaleY(f32),
    SpriteSheetName(Option<String>),
    SpritesLineHeight(u16),
    SpritesDirection(Direction),
    SpritesLineDirection(Direction),
    SpritesSpacing(i16),
    SpritesLineSpacing(i16),
    SpritesAlignment(Alignment),
    SpritesLineAlignment(Alignment),
}

impl StateChange {
    /// Key this change writes
    pub fn key(&self) -> StateKey {
        match self {
            StateChange::BackgroundColorIndex(_) => StateKey::BackgroundColorIndex,
            StateChange::FillColorIndex(_) => StateKey::FillColorIndex,
            StateChange::LineColorIndex(_) => StateKey::LineColorIndex,
            StateChange::IgnoreFill(_) => StateKey::IgnoreFill,
            StateChange::IgnoreLine(_) => StateKey::IgnoreLine,
            StateChange::FillBackground(_) => StateKey::FillBackground,
            StateChange::LineWidth(_) => StateKey::LineWidth,
            StateChange::Rotation(_) => StateKey::Rotation,
            StateChange::HorizontalAlignment(_) => StateKey::HorizontalAlignment,
            StateChange::VerticalAlignment(_) => StateKey::VerticalAlignment,
            StateChange::SegmentStartCap(_) => StateKey::SegmentStartCap,
            StateChange::SegmentEndCap(_) => StateKey::SegmentEndCap,
            StateChange::SegmentStartRadius(_) => StateKey::SegmentStartRadius,
            StateChange::SegmentEndRadius(_) => StateKey::SegmentEndRadius,
            StateChange::Crop(side, _) => StateKey::Crop(*side),
            StateChange::RotationCrop(side, _) => StateKey::RotationCrop(*side),
            StateChange::BitmapColorIndices(_) => StateKey::BitmapColorIndices,
            StateChange::BitmapScaleX(_) => StateKey::BitmapScaleX,
            StateChange::BitmapScaleY(_) => StateKey::BitmapScaleY,
            StateChange::SpriteColorIndices(_) => StateKey::SpriteColorIndices,
            StateChange::SpriteScaleX(_) => StateKey::SpriteScaleX,
            StateChange::SpriteScaleY(_) => StateKey::SpriteScaleY,
            StateChange::SpriteSheetName(_) => StateKey::SpriteSheetName,
            StateChange::SpritesLineHeight(_) => StateKey::SpritesLineHeight,
            StateChange::SpritesDirection(_) => StateKey::SpritesDirection,
            StateChange::SpritesLineDirection(_) => StateKey::SpritesLineDirection,
            StateChange::SpritesSpacing(_) => StateKey::SpritesSpacing,
            StateChange::SpritesLineSpacing(_) => StateKey::SpritesLineSpacing,
            StateChange::SpritesAlignment(_) => StateKey::SpritesAlignment,
            StateChange::SpritesLineAlignment(_) => StateKey::SpritesLineAlignment,
        }
    }

    /// Snap rotations and scales to what the wire can carry
    fn normalized(self) -> Self {
        match self {
            StateChange::Rotation(r) => StateChange::Rotation(normalize_radians(r)),
            StateChange::BitmapScaleX(s) => StateChange::BitmapScaleX(round_scale(s)),
            StateChange::BitmapScaleY(s) => StateChange::BitmapScaleY(round_scale(s)),
            StateChange::SpriteScaleX(s) => StateChange::SpriteScaleX(round_scale(s)),
            StateChange::SpriteScaleY(s) => StateChange::SpriteScaleY(round_scale(s)),
            other => other,
        }
    }

    /// Check if two values of the same key would encode identically
    ///
    /// Rotations compare by their wire value, so a change finer than one
    /// step is redundant.
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (StateChange::Rotation(a), StateChange::Rotation(b)) => {
                rotation_to_u16(*a) == rotation_to_u16(*b)
            }
            _ => self == other,
        }
    }

    /// Current value of `key` in `state`
    pub fn current(state: &ContextState, key: StateKey) -> Self {
        match key {
            StateKey::BackgroundColorIndex => {
                StateChange::BackgroundColorIndex(state.background_color_index)
            }
            StateKey::FillColorIndex => StateChange::FillColorIndex(state.fill_color_index),
            StateKey::LineColorIndex => StateChange::LineColorIndex(state.line_color_index),
            StateKey::IgnoreFill => StateChange::IgnoreFill(state.ignore_fill),
            StateKey::IgnoreLine => StateChange::IgnoreLine(state.ignore_line),
            StateKey::FillBackground => StateChange::FillBackground(state.fill_background),
            StateKey::LineWidth => StateChange::LineWidth(state.line_width),
            StateKey::Rotation => StateChange::Rotation(state.rotation),
            StateKey::HorizontalAlignment => {
                StateChange::HorizontalAlignment(state.horizontal_alignment)
            }
            StateKey::VerticalAlignment => StateChange::VerticalAlignment(state.vertical_alignment),
            StateKey::SegmentStartCap => StateChange::SegmentStartCap(state.segment_start_cap),
            StateKey::SegmentEndCap => StateChange::SegmentEndCap(state.segment_end_cap),
            StateKey::SegmentStartRadius => {
                StateChange::SegmentStartRadius(state.segment_start_radius)
            }
            StateKey::SegmentEndRadius => StateChange::SegmentEndRadius(state.segment_end_radius),
            StateKey::Crop(side) => StateChange::Crop(side, state.crop.get(side)),
            StateKey::RotationCrop(side) => {
                StateChange::RotationCrop(side, state.rotation_crop.get(side))
            }
            StateKey::BitmapColorIndices => {
                StateChange::BitmapColorIndices(state.bitmap_color_indices.clone())
            }
            StateKey::BitmapScaleX => StateChange::BitmapScaleX(state.bitmap_scale_x),
            StateKey::BitmapScaleY => StateChange::BitmapScaleY(state.bitmap_scale_y),
            StateKey::SpriteColorIndices => {
                StateChange::SpriteColorIndices(state.sprite_color_indices.clone())
            }
            StateKey::SpriteScaleX => StateChange::SpriteScaleX(state.sprite_scale_x),
            StateKey::SpriteScaleY => StateChange::SpriteScaleY(state.sprite_scale_y),
            StateKey::SpriteSheetName => StateChange::SpriteSheetName(state.sprite_sheet_name.clone()),
            StateKey::SpritesLineHeight => StateChange::SpritesLineHeight(state.sprites_line_height),
            StateKey::SpritesDirection => StateChange::SpritesDirection(state.sprites_direction),
            StateKey::SpritesLineDirection => {
                StateChange::SpritesLineDirection(state.sprites_line_direction)
            }
            StateKey::SpritesSpacing => StateChange::SpritesSpacing(state.sprites_spacing),
            StateKey::SpritesLineSpacing => StateChange::SpritesLineSpacing(state.sprites_line_spacing),
            StateKey::SpritesAlignment => StateChange::SpritesAlignment(state.sprites_alignment),
            StateKey::SpritesLineAlignment => {
                StateChange::SpritesLineAlignment(state.sprites_line_alignment)
            }
        }
    }

    fn apply(self, state: &mut ContextState) {
        match self {
            StateChange::BackgroundColorIndex(v) => state.background_color_index = v,
            StateChange::FillColorIndex(v) => state.fill_color_index = v,
            StateChange::LineColorIndex(v) => state.line_color_index = v,
            StateChange::IgnoreFill(v) => state.ignore_fill = v,
            StateChange::IgnoreLine(v) => state.ignore_line = v,
            StateChange::FillBackground(v) => state.fill_background = v,
            StateChange::LineWidth(v) => state.line_width = v,
            StateChange::Rotation(v) => state.rotation = v,
            StateChange::HorizontalAlignment(v) => state.horizontal_alignment = v,
            StateChange::VerticalAlignment(v) => state.vertical_alignment = v,
            StateChange::SegmentStartCap(v) => state.segment_start_cap = v,
            StateChange::SegmentEndCap(v) => state.segment_end_cap = v,
            StateChange::SegmentStartRadius(v) => state.segment_start_radius = v,
            StateChange::SegmentEndRadius(v) => state.segment_end_radius = v,
            StateChange::Crop(side, v) => state.crop.set(side, v),
            StateChange::RotationCrop(side, v) => state.rotation_crop.set(side, v),
            StateChange::BitmapColorIndices(v) => state.bitmap_color_indices = v,
            StateChange::BitmapScaleX(v) => state.bitmap_scale_x = v,
            StateChange::BitmapScaleY(v) => state.bitmap_scale_y = v,
            StateChange::SpriteColorIndices(v) => state.sprite_color_indices = v,
            StateChange::SpriteScaleX(v) => state.sprite_scale_x = v,
            StateChange::SpriteScaleY(v) => state.sprite_scale_y = v,
            StateChange::SpriteSheetName(v) => state.sprite_sheet_name = v,
            StateChange::SpritesLineHeight(v) => state.sprites_line_height = v,
            StateChange::SpritesDirection(v) => state.sprites_direction = v,
            StateChange::SpritesLineDirection(v) => state.sprites_line_direction = v,
            StateChange::SpritesSpacing(v) => state.sprites_spacing = v,
            StateChange::SpritesLineSpacing(v) => state.sprites_line_spacing = v,
            StateChange::SpritesAlignment(v) => state.sprites_alignment = v,
            StateChange::SpritesLineAlignment(v) => state.sprites_line_alignment = v,
        }
    }
}

/// Owner of the canonical [`ContextState`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateHelper {
    state: ContextState,
}

impl StateHelper {
    pub fn new(number_of_colors: u8) -> Self {
        Self {
            state: ContextState::new(number_of_colors),
        }
    }

    /// Start from an existing state
    pub fn from_state(state: ContextState) -> Self {
        Self { state }
    }

    /// Read-only view of the canonical state
    pub fn state(&self) -> &ContextState {
        &self.state
    }

    /// Keys whose requested value differs from the canonical state
    ///
    /// When a key appears more than once the last request wins.
    pub fn diff(&self, partial: &[StateChange]) -> Vec<StateKey> {
        let mut scratch = self.state.clone();
        for change in partial {
            change.clone().normalized().apply(&mut scratch);
        }
        let mut changed = Vec::new();
        for change in partial {
            let key = change.key();
            if !changed.contains(&key) && !self.same_key(&scratch, key) {
                changed.push(key);
            }
        }
        changed
    }

    fn same_key(&self, other: &ContextState, key: StateKey) -> bool {
        StateChange::current(&self.state, key).same_value(&StateChange::current(other, key))
    }

    /// Apply only the differing keys and report them
    pub fn update(&mut self, partial: Vec<StateChange>) -> Vec<StateKey> {
        let changed = self.diff(&partial);
        for change in partial {
            if changed.contains(&change.key()) {
                change.normalized().apply(&mut self.state);
            }
        }
        changed
    }

    /// Apply a single change, returning true if it changed anything
    pub fn set(&mut self, change: StateChange) -> bool {
        !self.update(vec![change]).is_empty()
    }

    /// Replace the whole state, reporting every key that changed
    pub fn replace(&mut self, state: ContextState) -> Vec<StateKey> {
        let changed: Vec<StateKey> = StateKey::ALL
            .iter()
            .copied()
            .filter(|key| !self.same_key(&state, *key))
            .collect();
        self.state = state;
        changed
    }

    /// Restore documented defaults at the current color table size
    pub fn reset(&mut self) -> Vec<StateKey> {
        let defaults = ContextState::new(self.state.number_of_colors());
        self.replace(defaults)
    }

    /// Resize the color-index tables for a new color table size
    ///
    /// Indices that fall outside the new table are reset to their defaults.
    pub fn resize(&mut self, number_of_colors: u8) -> Vec<StateKey> {
        let mut state = self.state.clone();
        state.bitmap_color_indices = default_bitmap_color_indices(number_of_colors);
        state.sprite_color_indices = default_sprite_color_indices(number_of_colors);
        for index in [
            &mut state.background_color_index,
            &mut state.fill_color_index,
            &mut state.line_color_index,
        ] {
            if *index >= number_of_colors {
                *index = number_of_colors.saturating_sub(1);
            }
        }
        self.replace(state)
    }
}
