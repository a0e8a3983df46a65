//! Sprite sheets and sprite composition

pub mod compositor;
pub mod sheet;

pub use compositor::{
    check_sprite_tree, effective_line_direction, layout_sprites, palette_swap_pairs, SpriteLevel,
    SpriteStack, MAX_SPRITE_DEPTH,
};
pub use sheet::{Palette, PaletteSwap, Sprite, SpriteSheet, SpriteSheetRegistry};
