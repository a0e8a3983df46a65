//! Sprite composition
//!
//! Drawing a sprite pushes the parent context onto a bounded stack, runs the
//! sprite's program against a fresh sub-context and pops the parent back.
//! Nested sprites resolve within the sheet of the sprite that draws them.
//! A sprite tree is checked for cycles and depth before anything is emitted.

use heapless::Vec as BoundedVec;
use log::warn;

use eidolon_protocol::{ColorPair, Direction, Point};

use crate::error::{EngineError, GeometryError};
use crate::queue::SpriteFrame;
use crate::state::ContextState;

use super::sheet::{PaletteSwap, SpriteSheet};

/// Deepest sprite nesting
pub const MAX_SPRITE_DEPTH: usize = 16;

/// One sprite being drawn
#[derive(Debug, Clone)]
pub struct SpriteLevel {
    pub sheet_name: String,
    pub sprite_name: String,
    /// Context to restore when the sprite is done
    pub parent: ContextState,
    /// Placement of the sprite in its parent
    pub frame: SpriteFrame,
}

/// Sprites currently being drawn, outermost first
#[derive(Debug, Default)]
pub struct SpriteStack {
    levels: BoundedVec<SpriteLevel, MAX_SPRITE_DEPTH>,
}

impl SpriteStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Innermost sprite
    pub fn current(&self) -> Option<&SpriteLevel> {
        self.levels.last()
    }

    /// Names of the active sprites, outermost first
    pub fn active_names(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(|l| l.sprite_name.as_str())
    }

    /// Placement chain for entries recorded at the current depth
    pub fn frames(&self) -> Vec<SpriteFrame> {
        self.levels.iter().map(|l| l.frame).collect()
    }

    pub fn push(&mut self, level: SpriteLevel) -> Result<(), EngineError> {
        self.levels.push(level).map_err(|level| {
            warn!("Sprite '{}' nested too deeply", level.sprite_name);
            EngineError::from(GeometryError::SpriteDepthExceeded)
        })
    }

    pub fn pop(&mut self) -> Option<SpriteLevel> {
        self.levels.pop()
    }

    /// Drop every level, returning the outermost parent context
    pub fn unwind(&mut self) -> Option<ContextState> {
        let outermost = if self.levels.is_empty() {
            None
        } else {
            Some(self.levels.swap_remove(0).parent)
        };
        self.levels.clear();
        outermost
    }
}

/// Check that `sprite` and everything it draws exists, is acyclic and fits
/// the stack on top of `active`
pub fn check_sprite_tree<'a>(
    sheet: &'a SpriteSheet,
    sprite: &'a str,
    active: &[&'a str],
) -> Result<(), EngineError> {
    let mut path = active.to_vec();
    visit(sheet, sprite, &mut path)
}

fn visit<'a>(sheet: &'a SpriteSheet, name: &'a str, path: &mut Vec<&'a str>) -> Result<(), EngineError> {
    if path.contains(&name) {
        warn!("Sprite '{}' draws itself via {:?}", name, path);
        return Err(EngineError::CyclicSprite);
    }
    if path.len() >= MAX_SPRITE_DEPTH {
        warn!("Sprite '{}' would nest deeper than {}", name, MAX_SPRITE_DEPTH);
        return Err(GeometryError::SpriteDepthExceeded.into());
    }
    let sprite = sheet.sprite(name).ok_or_else(|| {
        warn!("Sprite '{}' not found in sheet '{}'", name, sheet.name);
        EngineError::SpriteNotFound
    })?;
    path.push(name);
    for nested in sprite.nested_sprites() {
        visit(sheet, nested, path)?;
    }
    path.pop();
    Ok(())
}

/// Sprite color selections for a palette swap placed at `offset`
///
/// Sprite color `i` maps to color-table index `swap[i] + offset`.
pub fn palette_swap_pairs(
    swap: &PaletteSwap,
    offset: u8,
    state: &ContextState,
) -> Result<Vec<ColorPair>, EngineError> {
    let number_of_colors = state.number_of_colors() as usize;
    if swap.sprite_color_indices.len() > number_of_colors {
        warn!("Palette swap '{}' is larger than the color table", swap.name);
        return Err(EngineError::InvalidIndex);
    }
    swap.sprite_color_indices
        .iter()
        .enumerate()
        .map(|(from, &to)| {
            let to = to as usize + offset as usize;
            if to >= number_of_colors {
                warn!("Palette swap '{}' maps past the color table", swap.name);
                return Err(EngineError::InvalidIndex);
            }
            Ok(ColorPair::new(from as u8, to as u8))
        })
        .collect()
}

/// Line direction actually used with `direction`
///
/// Lines must stack across the sprite direction; a parallel request falls
/// back to down for horizontal sprites and right for vertical ones.
pub fn effective_line_direction(direction: Direction, requested: Direction) -> Direction {
    if requested.is_horizontal() != direction.is_horizontal() {
        requested
    } else if direction.is_horizontal() {
        Direction::Down
    } else {
        Direction::Right
    }
}

/// Centers of laid out sprites relative to the layout origin
///
/// `lines` holds the scaled `(width, height)` of each sprite, line by line.
pub fn layout_sprites(lines: &[Vec<(f32, f32)>], state: &ContextState) -> Vec<Vec<Point>> {
    let direction = state.sprites_direction;
    let line_direction = effective_line_direction(direction, state.sprites_line_direction);
    let horizontal = direction.is_horizontal();
    let along = |(w, h): (f32, f32)| if horizontal { w } else { h };
    let across = |(w, h): (f32, f32)| if horizontal { h } else { w };
    let spacing = state.sprites_spacing as f32;
    let line_spacing = state.sprites_line_spacing as f32;

    let lengths: Vec<f32> = lines
        .iter()
        .map(|line| {
            let sum: f32 = line.iter().map(|s| along(*s)).sum();
            sum + spacing * line.len().saturating_sub(1) as f32
        })
        .collect();
    let widest = lengths.iter().copied().fold(0.0, f32::max);

    let (dx, dy) = direction.unit();
    let (lx, ly) = line_direction.unit();
    let along_sign = dx + dy;
    let line_sign = lx + ly;

    let mut line_cursor = 0.0;
    let mut placed = Vec::with_capacity(lines.len());
    for (line, length) in lines.iter().zip(&lengths) {
        let extent = line.iter().map(|s| across(*s)).fold(0.0, f32::max);
        let thickness = extent.max(state.sprites_line_height as f32);
        let line_low = if line_sign > 0.0 {
            line_cursor
        } else {
            line_cursor - thickness
        };

        let mut cursor = along_sign * (widest - length) * state.sprites_line_alignment.factor();
        let mut centers = Vec::with_capacity(line.len());
        for &size in line {
            let a = along(size);
            let c = across(size);
            let along_center = cursor + along_sign * a / 2.0;
            let across_center =
                line_low + (thickness - c) * state.sprites_alignment.factor() + c / 2.0;
            centers.push(if horizontal {
                Point::new(along_center, across_center)
            } else {
                Point::new(across_center, along_center)
            });
            cursor += along_sign * (a + spacing);
        }
        placed.push(centers);
        line_cursor += line_sign * (thickness + line_spacing);
    }
    placed
}
