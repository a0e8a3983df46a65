//! Sprite sheet definitions and the sheet registry
//!
//! Sprites, palettes and palette swaps are kept in declaration order; a
//! sprite's position in its sheet is its wire index. Sheets are immutable
//! once registered and replaced wholesale on re-upload.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use eidolon_protocol::{Command, CommandEncoder, Instruction, Rgb, SpriteIndex};

use crate::error::EngineError;

/// Sprite-color-index to color-table-index remap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteSwap {
    pub name: String,
    pub number_of_colors: u8,
    /// Color-table index for each sprite color index
    pub sprite_color_indices: Vec<u8>,
}

/// Colors copied straight into the color table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub name: String,
    pub number_of_colors: u8,
    pub colors: Vec<Rgb>,
    /// Per-color opacity; fully opaque when absent
    pub opacities: Option<Vec<f32>>,
}

/// Named, reusable command program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub commands: Vec<Instruction>,
    /// Swaps usable only with this sprite
    #[serde(default)]
    pub palette_swaps: Vec<PaletteSwap>,
}

impl Sprite {
    pub fn new(name: impl Into<String>, width: u16, height: u16) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            commands: Vec::new(),
            palette_swaps: Vec::new(),
        }
    }

    /// Append a command to the program
    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Commands that run, in order
    pub fn visible_commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(|i| !i.hide).map(|i| &i.command)
    }

    pub fn palette_swap(&self, name: &str) -> Option<&PaletteSwap> {
        self.palette_swaps.iter().find(|s| s.name == name)
    }

    /// Names of the sprites this program draws directly
    pub fn nested_sprites(&self) -> impl Iterator<Item = &str> {
        self.visible_commands().filter_map(|command| match command {
            Command::DrawSprite { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Named collection of sprites, palettes and palette swaps
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpriteSheet {
    pub name: String,
    pub sprites: Vec<Sprite>,
    #[serde(default)]
    pub palettes: Vec<Palette>,
    #[serde(default)]
    pub palette_swaps: Vec<PaletteSwap>,
}

impl SpriteSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn sprite(&self, name: &str) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.name == name)
    }

    pub fn sprite_index(&self, name: &str) -> Option<usize> {
        self.sprites.iter().position(|s| s.name == name)
    }

    pub fn palette(&self, name: &str) -> Option<&Palette> {
        self.palettes.iter().find(|p| p.name == name)
    }

    pub fn palette_swap(&self, name: &str) -> Option<&PaletteSwap> {
        self.palette_swaps.iter().find(|s| s.name == name)
    }

    /// Check programs and palettes before the sheet is registered
    pub fn validate(&self) -> Result<(), EngineError> {
        for sprite in &self.sprites {
            if let Some(command) = sprite
                .visible_commands()
                .find(|c| !c.tag().is_sprite_context())
            {
                warn!(
                    "Sprite '{}' uses {:?}, which is not allowed in a sprite",
                    sprite.name,
                    command.tag()
                );
                return Err(EngineError::InvalidCommand);
            }
        }
        for palette in &self.palettes {
            let opacities_match = palette
                .opacities
                .as_ref()
                .map_or(true, |o| o.len() == palette.colors.len());
            if palette.colors.len() != palette.number_of_colors as usize || !opacities_match {
                warn!("Palette '{}' color count mismatch", palette.name);
                return Err(EngineError::InvalidValue);
            }
        }
        let swaps = self
            .palette_swaps
            .iter()
            .chain(self.sprites.iter().flat_map(|s| s.palette_swaps.iter()));
        for swap in swaps {
            if swap.sprite_color_indices.len() != swap.number_of_colors as usize {
                warn!("Palette swap '{}' length mismatch", swap.name);
                return Err(EngineError::InvalidValue);
            }
        }
        Ok(())
    }

    /// Upload blob for the device
    ///
    /// Layout: `[u16 count][u16 offset per sprite]` then per sprite
    /// `[u16 width][u16 height][u16 commands length][commands]`. Offsets are
    /// absolute from the start of the blob. Hidden commands are left out.
    pub fn to_blob<N: SpriteIndex + ?Sized>(&self, names: &N) -> Result<Vec<u8>, EngineError> {
        let count = u16::try_from(self.sprites.len()).map_err(|_| EngineError::InvalidValue)?;
        let header_len = 2 + 2 * self.sprites.len();

        let mut offsets = Vec::with_capacity(self.sprites.len());
        let mut body = Vec::new();
        for sprite in &self.sprites {
            let mut encoder = CommandEncoder::new(names).with_sprite_sheet(Some(&self.name));
            let commands = encoder.encode_all(sprite.visible_commands())?;
            let commands_len = u16::try_from(commands.len()).map_err(|_| EngineError::InvalidValue)?;

            let offset = u16::try_from(header_len + body.len()).map_err(|_| EngineError::InvalidValue)?;
            offsets.push(offset);
            body.extend_from_slice(&sprite.width.to_le_bytes());
            body.extend_from_slice(&sprite.height.to_le_bytes());
            body.extend_from_slice(&commands_len.to_le_bytes());
            body.extend_from_slice(&commands);
        }

        let mut blob = Vec::with_capacity(header_len + body.len());
        blob.extend_from_slice(&count.to_le_bytes());
        for offset in offsets {
            blob.extend_from_slice(&offset.to_le_bytes());
        }
        blob.extend_from_slice(&body);
        debug!("Sprite sheet '{}' blob is {} bytes", self.name, blob.len());
        Ok(blob)
    }

    /// Encode the definition as postcard bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        postcard::to_allocvec(self).map_err(|_| EngineError::InvalidValue)
    }

    /// Decode a definition written by [`SpriteSheet::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        postcard::from_bytes(bytes).map_err(|_| EngineError::InvalidValue)
    }
}

/// Registered sheets; a sheet's position is its wire index
#[derive(Debug, Clone, Default)]
pub struct SpriteSheetRegistry {
    sheets: Vec<SpriteSheet>,
}

impl SpriteSheetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sheet, replacing one of the same name in place
    ///
    /// Returns the sheet's index.
    pub fn register(&mut self, sheet: SpriteSheet) -> Result<u8, EngineError> {
        if let Some(index) = self.sheets.iter().position(|s| s.name == sheet.name) {
            self.sheets[index] = sheet;
            return Ok(index as u8);
        }
        let index = u8::try_from(self.sheets.len()).map_err(|_| EngineError::InvalidIndex)?;
        self.sheets.push(sheet);
        Ok(index)
    }

    pub fn get(&self, name: &str) -> Option<&SpriteSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn clear(&mut self) {
        self.sheets.clear();
    }
}

impl SpriteIndex for SpriteSheetRegistry {
    fn sheet_index(&self, sheet: &str) -> Option<u8> {
        self.sheets
            .iter()
            .position(|s| s.name == sheet)
            .map(|i| i as u8)
    }

    fn sheet_name(&self, index: u8) -> Option<&str> {
        self.sheets.get(index as usize).map(|s| s.name.as_str())
    }

    fn sprite_index(&self, sheet: &str, sprite: &str) -> Option<u16> {
        self.get(sheet)?.sprite_index(sprite).map(|i| i as u16)
    }

    fn sprite_name(&self, sheet: &str, index: u16) -> Option<&str> {
        self.get(sheet)?
            .sprites
            .get(index as usize)
            .map(|s| s.name.as_str())
    }

    fn sprite_count(&self, sheet: &str) -> usize {
        self.get(sheet).map_or(0, |s| s.sprites.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> SpriteSheet {
        let mut sheet = SpriteSheet::new("ui");
        sheet.sprites.push(
            Sprite::new("dot", 4, 4).with_command(Command::DrawCircle {
                offset_x: 2,
                offset_y: 2,
                radius: 2,
            }),
        );
        sheet.sprites.push(
            Sprite::new("pair", 8, 4).with_command(Command::DrawSprite {
                offset_x: 2,
                offset_y: 2,
                name: "dot".into(),
            }),
        );
        sheet
    }

    #[test]
    fn test_registry_indices() {
        let mut registry = SpriteSheetRegistry::new();
        assert_eq!(registry.register(SpriteSheet::new("a")), Ok(0));
        assert_eq!(registry.register(sheet()), Ok(1));
        assert_eq!(registry.register(sheet()), Ok(1));
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.sheet_index("ui"), Some(1));
        assert_eq!(registry.sheet_name(0), Some("a"));
        assert_eq!(registry.sprite_index("ui", "pair"), Some(1));
        assert_eq!(registry.sprite_name("ui", 0), Some("dot"));
        assert_eq!(registry.sprite_count("missing"), 0);
    }

    #[test]
    fn test_blob_layout() {
        let mut registry = SpriteSheetRegistry::new();
        registry.register(sheet()).unwrap();
        let blob = registry.get("ui").unwrap().to_blob(&registry).unwrap();

        assert_eq!(&blob[0..2], &[2, 0]);
        // First sprite starts right after the offset table
        assert_eq!(u16::from_le_bytes([blob[2], blob[3]]), 6);
        // drawCircle: tag + i16 + i16 + u16
        assert_eq!(&blob[6..12], &[4, 0, 4, 0, 7, 0]);
        assert_eq!(blob[12], 58);
        let second = u16::from_le_bytes([blob[4], blob[5]]) as usize;
        assert_eq!(second, 12 + 7);
        assert_eq!(&blob[second..second + 4], &[8, 0, 4, 0]);
        // drawSprite with a one-byte index
        assert_eq!(&blob[second + 6..], &[75, 2, 0, 2, 0, 0]);
    }

    #[test]
    fn test_hidden_commands_left_out() {
        let mut sheet = SpriteSheet::new("ui");
        let mut sprite = Sprite::new("blank", 1, 1);
        sprite.commands.push(Instruction::hidden(Command::DrawRect {
            offset_x: 0,
            offset_y: 0,
            width: 1,
            height: 1,
        }));
        sheet.sprites.push(sprite);
        let blob = sheet.to_blob(&eidolon_protocol::NoSprites).unwrap();
        assert_eq!(blob, vec![1, 0, 4, 0, 1, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_validate_rejects_non_sprite_commands() {
        let mut bad = sheet();
        bad.sprites[0].commands.push(Command::Show.into());
        assert_eq!(bad.validate(), Err(EngineError::InvalidCommand));
        assert!(sheet().validate().is_ok());
    }

    #[test]
    fn test_validate_palette_lengths() {
        let mut bad = sheet();
        bad.palettes.push(Palette {
            name: "p".into(),
            number_of_colors: 3,
            colors: vec![Rgb::BLACK; 2],
            opacities: None,
        });
        assert_eq!(bad.validate(), Err(EngineError::InvalidValue));
    }

    #[test]
    fn test_postcard_persistence() {
        let original = sheet();
        let bytes = original.to_bytes().unwrap();
        assert_eq!(SpriteSheet::from_bytes(&bytes).unwrap(), original);
        assert!(SpriteSheet::from_bytes(&[0xff]).is_err());
    }

    #[test]
    fn test_nested_sprites() {
        let sheet = sheet();
        let nested: Vec<&str> = sheet.sprite("pair").unwrap().nested_sprites().collect();
        assert_eq!(nested, vec!["dot"]);
    }
}
