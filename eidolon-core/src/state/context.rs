//! Canonical drawing context
//!
//! One [`ContextState`] lives per engine. It is only mutated through
//! [`StateHelper`](super::StateHelper) so that change detection stays exact.

use eidolon_protocol::{Alignment, Direction, SegmentCap, Side};

/// Color table size before the device reports its pixel depth
pub const DEFAULT_NUMBER_OF_COLORS: u8 = 16;

/// Crop amounts per side, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Insets {
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
    pub left: u16,
}

impl Insets {
    pub fn get(&self, side: Side) -> u16 {
        match side {
            Side::Top => self.top,
            Side::Right => self.right,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
        }
    }

    pub fn set(&mut self, side: Side, value: u16) {
        match side {
            Side::Top => self.top = value,
            Side::Right => self.right = value,
            Side::Bottom => self.bottom = value,
            Side::Left => self.left = value,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Insets::default()
    }
}

/// Every drawing parameter the device and preview share
#[derive(Debug, Clone, PartialEq)]
pub struct ContextState {
    pub background_color_index: u8,
    pub fill_color_index: u8,
    pub line_color_index: u8,
    pub ignore_fill: bool,
    pub ignore_line: bool,
    pub fill_background: bool,
    pub line_width: u16,
    /// Radians, normalized to `[0, 2π)`
    pub rotation: f32,
    pub horizontal_alignment: Alignment,
    pub vertical_alignment: Alignment,
    pub segment_start_cap: SegmentCap,
    pub segment_end_cap: SegmentCap,
    pub segment_start_radius: u16,
    pub segment_end_radius: u16,
    /// Pre-rotation clip
    pub crop: Insets,
    /// Post-rotation clip in the shape's own frame
    pub rotation_crop: Insets,
    /// Bitmap color index to color-table index
    pub bitmap_color_indices: Vec<u8>,
    pub bitmap_scale_x: f32,
    pub bitmap_scale_y: f32,
    /// Sprite color index to color-table index
    pub sprite_color_indices: Vec<u8>,
    pub sprite_scale_x: f32,
    pub sprite_scale_y: f32,
    pub sprite_sheet_name: Option<String>,
    pub sprites_line_height: u16,
    pub sprites_direction: Direction,
    pub sprites_line_direction: Direction,
    pub sprites_spacing: i16,
    pub sprites_line_spacing: i16,
    pub sprites_alignment: Alignment,
    pub sprites_line_alignment: Alignment,
}

impl Default for ContextState {
    fn default() -> Self {
        Self::new(DEFAULT_NUMBER_OF_COLORS)
    }
}

impl ContextState {
    /// Default state for a color table of `number_of_colors` entries
    pub fn new(number_of_colors: u8) -> Self {
        Self {
            background_color_index: 0,
            fill_color_index: 1,
            line_color_index: 1,
            ignore_fill: false,
            ignore_line: false,
            fill_background: false,
            line_width: 0,
            rotation: 0.0,
            horizontal_alignment: Alignment::Center,
            vertical_alignment: Alignment::Center,
            segment_start_cap: SegmentCap::Flat,
            segment_end_cap: SegmentCap::Flat,
            segment_start_radius: 1,
            segment_end_radius: 1,
            crop: Insets::default(),
            rotation_crop: Insets::default(),
            bitmap_color_indices: default_bitmap_color_indices(number_of_colors),
            bitmap_scale_x: 1.0,
            bitmap_scale_y: 1.0,
            sprite_color_indices: default_sprite_color_indices(number_of_colors),
            sprite_scale_x: 1.0,
            sprite_scale_y: 1.0,
            sprite_sheet_name: None,
            sprites_line_height: 0,
            sprites_direction: Direction::Right,
            sprites_line_direction: Direction::Down,
            sprites_spacing: 0,
            sprites_line_spacing: 0,
            sprites_alignment: Alignment::Start,
            sprites_line_alignment: Alignment::Start,
        }
    }

    /// Size of the color table this state indexes
    pub fn number_of_colors(&self) -> u8 {
        self.sprite_color_indices.len() as u8
    }

    /// Check that a color-table index is in range
    pub fn is_valid_color_index(&self, index: u8) -> bool {
        (index as usize) < self.sprite_color_indices.len()
    }
}

/// Bitmap colors all start on color 0
pub fn default_bitmap_color_indices(number_of_colors: u8) -> Vec<u8> {
    vec![0; number_of_colors as usize]
}

/// Sprite colors start as the identity mapping
pub fn default_sprite_color_indices(number_of_colors: u8) -> Vec<u8> {
    (0..number_of_colors).collect()
}
