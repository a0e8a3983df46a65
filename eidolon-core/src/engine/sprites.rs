//! Sprite sheets, palettes and sprite drawing

use log::{debug, info, warn};

use eidolon_protocol::messages::MAX_SPRITE_SHEET_CHUNK;
use eidolon_protocol::{Alignment, Command, CommandTag, HostMessage, Point, SpriteLine};

use crate::dispatch;
use crate::error::EngineError;
use crate::geometry::{shapes, Shape};
use crate::queue::{DrawEntry, DrawStyle, SpriteFrame};
use crate::sprite::{
    check_sprite_tree, layout_sprites, palette_swap_pairs, Sprite, SpriteLevel, SpriteSheet,
};
use crate::state::{ContextState, EngineEvent, StateChange};
use crate::traits::{RasterizationBackend, Transport, TransportError};

use super::Engine;

impl<'ch, B: RasterizationBackend, T: Transport> Engine<'ch, B, T> {
    /// Register a sprite sheet and send it to the device
    ///
    /// Re-uploading a name replaces that sheet and keeps its index. Returns
    /// the sheet's index.
    pub fn upload_sprite_sheet(&mut self, sheet: SpriteSheet) -> Result<u8, EngineError> {
        self.check_top_level()?;
        sheet.validate()?;
        let name = sheet.name.clone();
        let mut sheets = self.sheets.clone();
        let sheet_index = sheets.register(sheet)?;
        let blob = sheets
            .get(&name)
            .ok_or(EngineError::SpriteSheetNotFound)?
            .to_blob(&sheets)?;
        self.sheets = sheets;
        info!(
            "Uploading sprite sheet '{}' as {} ({} bytes)",
            name,
            sheet_index,
            blob.len()
        );

        if !self.is_connected() {
            self.emit_event(EngineEvent::SpriteSheetUploadProgress {
                sheet_name: name,
                progress: 100,
            });
            return Ok(sheet_index);
        }
        let mut sent = 0;
        for data in blob.chunks(MAX_SPRITE_SHEET_CHUNK) {
            let frame = HostMessage::SpriteSheetChunk {
                sheet_index,
                offset: sent as u32,
                data,
            }
            .to_frame()
            .map_err(TransportError::from)?;
            self.send_frame(&frame)?;
            sent += data.len();
            let progress = (sent * 100 / blob.len()) as u8;
            self.emit_event(EngineEvent::SpriteSheetUploadProgress {
                sheet_name: name.clone(),
                progress,
            });
        }
        Ok(sheet_index)
    }

    /// Select the sheet later `draw_sprite` calls resolve names in
    pub fn select_sprite_sheet(&mut self, name: &str, flush: bool) -> Result<(), EngineError> {
        self.check_allowed(CommandTag::SelectSpriteSheet)?;
        if self.sheets.get(name).is_none() {
            warn!("Sprite sheet '{}' not uploaded", name);
            return Err(EngineError::SpriteSheetNotFound);
        }
        self.update_state(
            vec![StateChange::SpriteSheetName(Some(name.to_string()))],
            Command::SelectSpriteSheet {
                name: name.to_string(),
            },
            flush,
        )
    }

    /// Sheet that sprite names resolve in right now
    ///
    /// Inside a sprite this is the sheet of the sprite being drawn.
    fn current_sheet_name(&self) -> Result<String, EngineError> {
        if let Some(level) = self.sprites.current() {
            return Ok(level.sheet_name.clone());
        }
        self.helper.state().sprite_sheet_name.clone().ok_or_else(|| {
            warn!("No sprite sheet selected");
            EngineError::NoSpriteSheetSelected
        })
    }

    fn current_sheet(&self) -> Result<&SpriteSheet, EngineError> {
        let name = self.current_sheet_name()?;
        self.sheets.get(&name).ok_or_else(|| {
            warn!("Sprite sheet '{}' not uploaded", name);
            EngineError::SpriteSheetNotFound
        })
    }

    /// Draw a sprite from the current sheet
    pub fn draw_sprite(&mut self, offset_x: i16, offset_y: i16, name: &str, flush: bool) -> Result<(), EngineError> {
        self.check_allowed(CommandTag::DrawSprite)?;
        let sheet_name = self.current_sheet_name()?;
        let sheet = self.current_sheet()?;
        let active: Vec<&str> = self.sprites.active_names().collect();
        check_sprite_tree(sheet, name, &active)?;
        let sprite = sheet.sprite(name).cloned().ok_or(EngineError::SpriteNotFound)?;

        let command = Command::DrawSprite {
            offset_x,
            offset_y,
            name: name.to_string(),
        };
        let bytes = self.encode(&command)?;
        let offset = Point::new(offset_x as f32, offset_y as f32);
        self.compose(&sheet_name, &sprite, offset, false)?;
        self.send(bytes, flush)
    }

    /// Lay out and draw lines of sprites starting at the offset
    pub fn draw_sprites(
        &mut self,
        offset_x: i16,
        offset_y: i16,
        lines: &[SpriteLine],
        flush: bool,
    ) -> Result<(), EngineError> {
        self.check_allowed(CommandTag::DrawSprites)?;
        let mut resolved: Vec<Vec<(String, Sprite)>> = Vec::with_capacity(lines.len());
        for line in lines {
            let mut sprites = Vec::new();
            for sub_line in line {
                let sheet = self.sheets.get(&sub_line.sprite_sheet_name).ok_or_else(|| {
                    warn!("Sprite sheet '{}' not uploaded", sub_line.sprite_sheet_name);
                    EngineError::SpriteSheetNotFound
                })?;
                for name in &sub_line.sprite_names {
                    check_sprite_tree(sheet, name, &[])?;
                    let sprite = sheet.sprite(name).cloned().ok_or(EngineError::SpriteNotFound)?;
                    sprites.push((sheet.name.clone(), sprite));
                }
            }
            resolved.push(sprites);
        }

        let state = self.helper.state();
        let (scale_x, scale_y) = (state.sprite_scale_x.abs(), state.sprite_scale_y.abs());
        let sizes: Vec<Vec<(f32, f32)>> = resolved
            .iter()
            .map(|line| {
                line.iter()
                    .map(|(_, s)| (s.width as f32 * scale_x, s.height as f32 * scale_y))
                    .collect()
            })
            .collect();
        let centers = layout_sprites(&sizes, state);

        let command = Command::DrawSprites {
            offset_x,
            offset_y,
            lines: lines.to_vec(),
        };
        let bytes = self.encode(&command)?;
        let mark = self.queue.pending().len();
        for (line, line_centers) in resolved.iter().zip(&centers) {
            for ((sheet_name, sprite), center) in line.iter().zip(line_centers) {
                let offset = Point::new(offset_x as f32 + center.x, offset_y as f32 + center.y);
                if let Err(e) = self.compose(sheet_name, sprite, offset, true) {
                    self.queue.truncate_pending(mark);
                    return Err(e);
                }
            }
        }
        self.send(bytes, flush)
    }

    /// Run a sprite program in its own sub-context
    ///
    /// The parent context is restored whether or not the program succeeds;
    /// on failure every entry it recorded is dropped again.
    fn compose(&mut self, sheet_name: &str, sprite: &Sprite, offset: Point, centered: bool) -> Result<(), EngineError> {
        let parent = self.helper.state().clone();
        let geometry = if centered {
            let mut placement = parent.clone();
            placement.horizontal_alignment = Alignment::Center;
            placement.vertical_alignment = Alignment::Center;
            shapes::sprite(offset, sprite.width, sprite.height, &placement)
        } else {
            shapes::sprite(offset, sprite.width, sprite.height, &parent)
        };
        let frame = SpriteFrame {
            geometry,
            scale_x: parent.sprite_scale_x,
            scale_y: parent.sprite_scale_y,
            width: sprite.width as f32,
            height: sprite.height as f32,
        };

        let mark = self.queue.pending().len();
        if !self.in_sprite() && self.config.clear_box_on_draw {
            let shape = Shape::Clear {
                width: geometry.local_box.width,
                height: geometry.local_box.height,
            };
            let mut entry = DrawEntry::new(geometry, shape, DrawStyle::from_state(&parent, None));
            entry.clear_box = true;
            self.queue.record(entry);
        }

        let mut sub = ContextState::new(parent.number_of_colors());
        sub.sprite_color_indices = parent.sprite_color_indices.clone();
        sub.sprite_sheet_name = Some(sheet_name.to_string());
        let level = SpriteLevel {
            sheet_name: sheet_name.to_string(),
            sprite_name: sprite.name.clone(),
            parent,
            frame,
        };
        if let Err(e) = self.sprites.push(level) {
            self.queue.truncate_pending(mark);
            return Err(e);
        }
        self.helper.replace(sub);
        debug!(
            "Drawing sprite '{}' at depth {}",
            sprite.name,
            self.sprites.depth()
        );

        let result = sprite
            .visible_commands()
            .try_for_each(|command| dispatch::run_command(self, command, false));

        if let Some(level) = self.sprites.pop() {
            self.helper.replace(level.parent);
        }
        if let Err(e) = result {
            warn!("Sprite '{}' failed: {:?}", sprite.name, e);
            self.queue.truncate_pending(mark);
            return Err(e);
        }
        Ok(())
    }

    /// Copy a palette of the selected sheet into the color table
    pub fn select_palette(&mut self, name: &str, offset: u8, flush: bool) -> Result<(), EngineError> {
        self.check_top_level()?;
        let palette = self
            .current_sheet()?
            .palette(name)
            .cloned()
            .ok_or_else(|| {
                warn!("Palette '{}' not found", name);
                EngineError::PaletteNotFound
            })?;
        debug!("Selecting palette '{}' at offset {}", name, offset);
        self.apply_palette_colors(&palette.colors, palette.opacities.as_deref(), offset, flush)
    }

    /// Remap sprite colors through a palette swap of the current sheet
    pub fn select_palette_swap(&mut self, name: &str, offset: u8, flush: bool) -> Result<(), EngineError> {
        self.check_allowed(CommandTag::SelectSpriteColors)?;
        let swap = self.current_sheet()?.palette_swap(name).ok_or_else(|| {
            warn!("Palette swap '{}' not found", name);
            EngineError::PaletteSwapNotFound
        })?;
        let pairs = palette_swap_pairs(swap, offset, self.helper.state())?;
        self.select_sprite_colors(&pairs, flush)
    }

    /// Remap sprite colors through a swap defined on one sprite
    pub fn select_sprite_palette_swap(
        &mut self,
        sprite_name: &str,
        name: &str,
        offset: u8,
        flush: bool,
    ) -> Result<(), EngineError> {
        self.check_allowed(CommandTag::SelectSpriteColors)?;
        let sprite = self.current_sheet()?.sprite(sprite_name).ok_or_else(|| {
            warn!("Sprite '{}' not found", sprite_name);
            EngineError::SpriteNotFound
        })?;
        let swap = sprite.palette_swap(name).ok_or_else(|| {
            warn!("Palette swap '{}' not found on sprite '{}'", name, sprite_name);
            EngineError::PaletteSwapNotFound
        })?;
        let pairs = palette_swap_pairs(swap, offset, self.helper.state())?;
        self.select_sprite_colors(&pairs, flush)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{connected_engine, context_bytes, context_frames};
    use super::*;
    use eidolon_protocol::messages::MSG_SPRITE_SHEET_CHUNK;
    use eidolon_protocol::{ColorPair, Rgb, SpriteSubLine};

    use crate::error::GeometryError;
    use crate::sprite::{Palette, PaletteSwap, MAX_SPRITE_DEPTH};
    use crate::state::EventChannel;

    fn sheet() -> SpriteSheet {
        let mut sheet = SpriteSheet::new("glyphs");
        sheet.sprites.push(
            Sprite::new("dot", 8, 8)
                .with_command(Command::SelectFillColor { color_index: 2 })
                .with_command(Command::DrawCircle {
                    offset_x: 4,
                    offset_y: 4,
                    radius: 3,
                }),
        );
        sheet.sprites.push(Sprite::new("pair", 16, 8).with_command(Command::DrawSprite {
            offset_x: 4,
            offset_y: 4,
            name: "dot".into(),
        }));
        sheet.palettes.push(Palette {
            name: "warm".into(),
            number_of_colors: 3,
            colors: vec![Rgb::new(255, 0, 0), Rgb::new(255, 128, 0), Rgb::new(255, 255, 0)],
            opacities: None,
        });
        sheet.palette_swaps.push(PaletteSwap {
            name: "shift".into(),
            number_of_colors: 3,
            sprite_color_indices: vec![0, 1, 2],
        });
        sheet
    }

    fn loop_sheet() -> SpriteSheet {
        let mut sheet = SpriteSheet::new("loops");
        sheet.sprites.push(Sprite::new("a", 4, 4).with_command(Command::DrawSprite {
            offset_x: 0,
            offset_y: 0,
            name: "b".into(),
        }));
        sheet.sprites.push(Sprite::new("b", 4, 4).with_command(Command::DrawSprite {
            offset_x: 0,
            offset_y: 0,
            name: "a".into(),
        }));
        sheet
    }

    #[test]
    fn test_upload_sends_chunks_and_progress() {
        let channel = EventChannel::new();
        let mut engine = connected_engine().with_events(channel.sender());
        assert_eq!(engine.upload_sprite_sheet(sheet()).unwrap(), 0);

        let chunks: Vec<_> = engine
            .transport()
            .unwrap()
            .frames
            .iter()
            .filter(|f| f.msg_type == MSG_SPRITE_SHEET_CHUNK)
            .collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload[0], 0);
        assert_eq!(
            channel.try_receive().ok(),
            Some(EngineEvent::SpriteSheetUploadProgress {
                sheet_name: "glyphs".into(),
                progress: 100
            })
        );
    }

    #[test]
    fn test_upload_rejects_top_level_commands() {
        let mut engine = connected_engine();
        let mut bad = SpriteSheet::new("bad");
        bad.sprites.push(Sprite::new("s", 4, 4).with_command(Command::Show));
        assert_eq!(engine.upload_sprite_sheet(bad), Err(EngineError::InvalidCommand));
        assert!(engine.sprite_sheets().is_empty());
    }

    #[test]
    fn test_draw_sprite_requires_selection() {
        let mut engine = connected_engine();
        engine.upload_sprite_sheet(sheet()).unwrap();
        assert_eq!(
            engine.draw_sprite(0, 0, "dot", true),
            Err(EngineError::NoSpriteSheetSelected)
        );
        assert_eq!(
            engine.select_sprite_sheet("nope", true),
            Err(EngineError::SpriteSheetNotFound)
        );
    }

    #[test]
    fn test_draw_sprite_records_nested_entries() {
        let mut engine = connected_engine();
        engine.upload_sprite_sheet(sheet()).unwrap();
        engine.select_sprite_sheet("glyphs", false).unwrap();
        let before = engine.state().clone();

        engine.draw_sprite(20, 20, "pair", true).unwrap();
        assert_eq!(engine.state(), &before);

        // Clear box for the outer sprite, then the circle two levels down
        let pending = engine.queue().pending();
        assert_eq!(pending.len(), 2);
        assert!(matches!(pending[0].shape, Shape::Clear { .. }));
        assert_eq!(pending[1].chain.len(), 2);
        assert!(!pending[1].clear_box);
        assert_eq!(pending[1].style.fill, Some(2));
        assert!(pending[1].style.color_map.is_some());

        let sent = context_bytes(&engine);
        assert_eq!(&sent[sent.len() - 6..], &[75, 20, 0, 20, 0, 1]);
    }

    #[test]
    fn test_missing_sprite_sends_nothing() {
        let mut engine = connected_engine();
        engine.upload_sprite_sheet(sheet()).unwrap();
        engine.select_sprite_sheet("glyphs", true).unwrap();
        let frames = context_frames(&engine);

        assert_eq!(
            engine.draw_sprite(0, 0, "missing", true),
            Err(EngineError::SpriteNotFound)
        );
        assert!(engine.queue().pending().is_empty());
        assert_eq!(context_frames(&engine), frames);
    }

    #[test]
    fn test_cycle_leaves_state_unchanged() {
        let mut engine = connected_engine();
        engine.upload_sprite_sheet(loop_sheet()).unwrap();
        engine.select_sprite_sheet("loops", true).unwrap();
        let before = engine.state().clone();
        let frames = context_frames(&engine);

        assert_eq!(engine.draw_sprite(0, 0, "a", true), Err(EngineError::CyclicSprite));
        assert_eq!(engine.state(), &before);
        assert!(engine.queue().pending().is_empty());
        assert_eq!(context_frames(&engine), frames);
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let mut sheet = SpriteSheet::new("deep");
        for level in 0..=MAX_SPRITE_DEPTH {
            let mut sprite = Sprite::new(format!("s{level}"), 2, 2);
            if level < MAX_SPRITE_DEPTH {
                sprite = sprite.with_command(Command::DrawSprite {
                    offset_x: 0,
                    offset_y: 0,
                    name: format!("s{}", level + 1),
                });
            }
            sheet.sprites.push(sprite);
        }
        let mut engine = connected_engine();
        engine.upload_sprite_sheet(sheet).unwrap();
        engine.select_sprite_sheet("deep", true).unwrap();
        assert_eq!(
            engine.draw_sprite(0, 0, "s0", true),
            Err(EngineError::InvalidGeometry(GeometryError::SpriteDepthExceeded))
        );
        assert_eq!(engine.draw_sprite(0, 0, "s1", true), Ok(()));
    }

    #[test]
    fn test_select_palette_writes_only_its_range() {
        let mut engine = connected_engine();
        engine.upload_sprite_sheet(sheet()).unwrap();
        engine.select_sprite_sheet("glyphs", true).unwrap();
        engine.set_color(7, Rgb::new(1, 2, 3), true).unwrap();

        engine.select_palette("warm", 5, true).unwrap();
        let colors = engine.colors().colors();
        assert_eq!(colors[5], Rgb::new(255, 0, 0));
        assert_eq!(colors[7], Rgb::new(255, 255, 0));
        assert_eq!(colors[4], Rgb::BLACK);
        assert_eq!(colors[8], Rgb::BLACK);

        assert_eq!(engine.select_palette("warm", 14, true), Err(EngineError::InvalidIndex));
        assert_eq!(engine.select_palette("cold", 0, true), Err(EngineError::PaletteNotFound));
    }

    #[test]
    fn test_palette_swap_offsets_sprite_colors() {
        let mut engine = connected_engine();
        engine.upload_sprite_sheet(sheet()).unwrap();
        engine.select_sprite_sheet("glyphs", true).unwrap();
        engine.select_palette_swap("shift", 4, true).unwrap();
        assert_eq!(&engine.state().sprite_color_indices[..4], &[4, 5, 6, 3]);

        let sent = context_bytes(&engine);
        let tail = [
            CommandTag::SelectSpriteColors.to_byte(),
            3,
            0,
            4,
            1,
            5,
            2,
            6,
        ];
        assert!(sent.ends_with(&tail));
        assert_eq!(
            engine.select_sprite_palette_swap("dot", "shift", 0, true),
            Err(EngineError::PaletteSwapNotFound)
        );
    }

    #[test]
    fn test_draw_sprites_lays_out_a_line() {
        let mut engine = connected_engine();
        engine.upload_sprite_sheet(sheet()).unwrap();
        engine.set_sprites_spacing(2, false).unwrap();
        let line = vec![SpriteSubLine {
            sprite_sheet_name: "glyphs".into(),
            sprite_names: vec!["dot".into(), "dot".into()],
        }];
        engine.draw_sprites(10, 10, &[line], true).unwrap();

        let clears: Vec<_> = engine
            .queue()
            .pending()
            .iter()
            .filter(|e| matches!(e.shape, Shape::Clear { .. }))
            .map(|e| e.geometry.world_box.x)
            .collect();
        assert_eq!(clears, vec![10.0, 20.0]);
    }

    #[test]
    fn test_sprite_color_pairs_inside_sprites() {
        let mut engine = connected_engine();
        let mut sheet = sheet();
        sheet.sprites.push(
            Sprite::new("tinted", 8, 8)
                .with_command(Command::SelectSpriteColor(ColorPair::new(2, 9)))
                .with_command(Command::DrawSprite {
                    offset_x: 4,
                    offset_y: 4,
                    name: "dot".into(),
                }),
        );
        engine.upload_sprite_sheet(sheet).unwrap();
        engine.select_sprite_sheet("glyphs", true).unwrap();
        engine.draw_sprite(0, 0, "tinted", true).unwrap();

        let circle = engine.queue().pending().last().unwrap();
        assert_eq!(circle.style.color_map.as_ref().map(|m| m[2]), Some(9));
        assert_eq!(engine.state().sprite_color_indices[2], 2);
    }
}
