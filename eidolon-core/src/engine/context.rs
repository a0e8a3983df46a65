//! Colors and context state setters
//!
//! Each setter validates, diffs against the canonical state and returns
//! early on a redundant call, so repeating a value sends nothing.

use log::{debug, trace, warn};

use eidolon_protocol::quantize::{degrees_to_radians, floor};
use eidolon_protocol::{
    Alignment, Brightness, ColorPair, Command, Direction, HostMessage, Rgb, ScaleAxis, SegmentCap,
    Side,
};

use crate::error::{EngineError, GeometryError};
use crate::state::context::default_sprite_color_indices;
use crate::state::{ContextState, EngineEvent, StateChange, StateKey};
use crate::traits::{RasterizationBackend, Transport, TransportError};

use super::Engine;

impl<'ch, B: RasterizationBackend, T: Transport> Engine<'ch, B, T> {
    /// Apply `changes` and send `command` unless nothing changed
    pub(super) fn update_state(
        &mut self,
        changes: Vec<StateChange>,
        command: Command,
        flush: bool,
    ) -> Result<(), EngineError> {
        self.check_allowed(command.tag())?;
        if self.helper.diff(&changes).is_empty() {
            trace!("{:?} is redundant", command.tag());
            return Ok(());
        }
        let bytes = self.encode(&command)?;
        let changed = self.helper.update(changes);
        self.send(bytes, flush)?;
        self.emit_event(EngineEvent::ContextState { changed });
        Ok(())
    }

    fn check_color_index(&self, index: u8) -> Result<(), EngineError> {
        if self.helper.state().is_valid_color_index(index) {
            Ok(())
        } else {
            warn!(
                "Color index {} out of range (0..{})",
                index,
                self.helper.state().number_of_colors()
            );
            Err(EngineError::InvalidIndex)
        }
    }

    fn check_line_width(&self, line_width: u16) -> Result<(), EngineError> {
        if line_width > self.width.max(self.height) {
            warn!("Line width {} exceeds the {}x{} canvas", line_width, self.width, self.height);
            return Err(GeometryError::LineWidthExceedsCanvas.into());
        }
        Ok(())
    }

    fn check_finite(value: f32) -> Result<(), EngineError> {
        if value.is_finite() {
            Ok(())
        } else {
            warn!("Value {} is not finite", value);
            Err(EngineError::InvalidValue)
        }
    }

    /// Check a color-index table sized to the color table
    fn check_index_table(&self, table: &[u8]) -> Result<(), EngineError> {
        let number_of_colors = self.helper.state().number_of_colors() as usize;
        if table.len() != number_of_colors {
            warn!("Index table of {} entries, expected {}", table.len(), number_of_colors);
            return Err(EngineError::InvalidValue);
        }
        table.iter().try_for_each(|index| self.check_color_index(*index))
    }

    /// Check a list of color selections
    fn check_pairs(&self, pairs: &[ColorPair]) -> Result<(), EngineError> {
        let number_of_colors = self.helper.state().number_of_colors() as usize;
        if pairs.is_empty() || pairs.len() > number_of_colors {
            warn!("{} color selections for a {} color table", pairs.len(), number_of_colors);
            return Err(EngineError::InvalidValue);
        }
        pairs.iter().try_for_each(|pair| {
            self.check_color_index(pair.from)?;
            self.check_color_index(pair.to)
        })
    }

    // Colors

    /// Replace one color-table entry
    pub fn set_color(&mut self, color_index: u8, color: Rgb, flush: bool) -> Result<(), EngineError> {
        self.check_top_level()?;
        let mut colors = self.colors.clone();
        if !colors.set_color(color_index, color)? {
            return Ok(());
        }
        let bytes = self.encode(&Command::SetColor { color_index, color })?;
        self.colors = colors;
        self.send(bytes, flush)?;
        self.emit_event(EngineEvent::Color { color_index, color });
        self.replay();
        Ok(())
    }

    /// Replace one color-table entry from `#rrggbb` or `#rgb`
    pub fn set_color_hex(&mut self, color_index: u8, hex: &str, flush: bool) -> Result<(), EngineError> {
        let color = Rgb::from_hex(hex).ok_or_else(|| {
            warn!("Invalid color '{}'", hex);
            EngineError::InvalidValue
        })?;
        self.set_color(color_index, color, flush)
    }

    /// Replace the opacity of one color-table entry
    pub fn set_color_opacity(
        &mut self,
        color_index: u8,
        opacity: f32,
        flush: bool,
    ) -> Result<(), EngineError> {
        self.check_top_level()?;
        let mut colors = self.colors.clone();
        if !colors.set_color_opacity(color_index, opacity)? {
            return Ok(());
        }
        let command = Command::SetColorOpacity {
            color_index,
            opacity,
        };
        let bytes = self.encode(&command)?;
        self.colors = colors;
        self.send(bytes, flush)?;
        self.emit_event(EngineEvent::ColorOpacity {
            color_index,
            opacity,
        });
        self.replay();
        Ok(())
    }

    /// Set the opacity of every color-table entry
    pub fn set_opacity(&mut self, opacity: f32, flush: bool) -> Result<(), EngineError> {
        self.check_top_level()?;
        let mut colors = self.colors.clone();
        if !colors.set_opacity(opacity)? {
            return Ok(());
        }
        let bytes = self.encode(&Command::SetOpacity { opacity })?;
        self.colors = colors;
        self.send(bytes, flush)?;
        self.emit_event(EngineEvent::Opacity { opacity });
        self.replay();
        Ok(())
    }

    /// Change the global brightness
    ///
    /// Brightness travels in its own frame, so batched commands go out first.
    pub fn set_brightness(&mut self, brightness: Brightness) -> Result<(), EngineError> {
        self.check_top_level()?;
        if self.colors.brightness() == brightness {
            return Ok(());
        }
        let frame = HostMessage::SetBrightness(brightness)
            .to_frame()
            .map_err(TransportError::from)?;
        self.send_frame(&frame)?;
        self.colors.set_brightness(brightness);
        debug!("Brightness set to {:?}", brightness);
        self.emit_event(EngineEvent::Brightness(brightness));
        self.replay();
        Ok(())
    }

    /// Copy palette entries into the color table starting at `offset`
    ///
    /// One `SetColor` and one `SetColorOpacity` go out per entry that
    /// actually changes.
    pub(super) fn apply_palette_colors(
        &mut self,
        palette_colors: &[Rgb],
        palette_opacities: Option<&[f32]>,
        offset: u8,
        flush: bool,
    ) -> Result<(), EngineError> {
        let mut colors = self.colors.clone();
        if !colors.apply_palette(palette_colors, palette_opacities, offset)? {
            trace!("Palette at offset {} is redundant", offset);
            return Ok(());
        }

        let mut commands = Vec::new();
        let mut events = Vec::new();
        for i in 0..palette_colors.len() {
            let color_index = offset + i as u8;
            let color = colors.colors()[color_index as usize];
            let opacity = colors.opacities()[color_index as usize];
            if self.colors.color(color_index) != Some(color) {
                commands.push(Command::SetColor { color_index, color });
                events.push(EngineEvent::Color { color_index, color });
            }
            let old = self.colors.opacities()[color_index as usize];
            if floor(255.0 * old) != floor(255.0 * opacity) {
                commands.push(Command::SetColorOpacity {
                    color_index,
                    opacity,
                });
                events.push(EngineEvent::ColorOpacity {
                    color_index,
                    opacity,
                });
            }
        }
        let encoded = commands
            .iter()
            .map(|command| self.encode(command))
            .collect::<Result<Vec<_>, _>>()?;

        self.colors = colors;
        for bytes in encoded {
            self.send(bytes, false)?;
        }
        if flush {
            self.flush()?;
        }
        for event in events {
            self.emit_event(event);
        }
        self.replay();
        Ok(())
    }

    // Saved contexts

    /// Push a copy of the context state
    pub fn save_context(&mut self, flush: bool) -> Result<(), EngineError> {
        self.check_top_level()?;
        let bytes = self.encode(&Command::SaveContext)?;
        self.saved.push(self.helper.state().clone());
        debug!("Saved context ({} deep)", self.saved.len());
        self.send(bytes, flush)
    }

    /// Pop the last saved context state
    pub fn restore_context(&mut self, flush: bool) -> Result<(), EngineError> {
        self.check_top_level()?;
        if self.saved.is_empty() {
            warn!("No saved context to restore");
            return Err(EngineError::NothingToRestore);
        }
        let bytes = self.encode(&Command::RestoreContext)?;
        let Some(state) = self.saved.pop() else {
            return Err(EngineError::NothingToRestore);
        };
        let changed = self.helper.replace(state);
        self.send(bytes, flush)?;
        if !changed.is_empty() {
            self.emit_event(EngineEvent::ContextState { changed });
        }
        Ok(())
    }

    // Color selection

    pub fn select_background_color(&mut self, color_index: u8, flush: bool) -> Result<(), EngineError> {
        self.check_color_index(color_index)?;
        self.update_state(
            vec![StateChange::BackgroundColorIndex(color_index)],
            Command::SelectBackgroundColor { color_index },
            flush,
        )
    }

    pub fn select_fill_color(&mut self, color_index: u8, flush: bool) -> Result<(), EngineError> {
        self.check_color_index(color_index)?;
        self.update_state(
            vec![StateChange::FillColorIndex(color_index)],
            Command::SelectFillColor { color_index },
            flush,
        )
    }

    pub fn select_line_color(&mut self, color_index: u8, flush: bool) -> Result<(), EngineError> {
        self.check_color_index(color_index)?;
        self.update_state(
            vec![StateChange::LineColorIndex(color_index)],
            Command::SelectLineColor { color_index },
            flush,
        )
    }

    pub fn set_ignore_fill(&mut self, ignore_fill: bool, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::IgnoreFill(ignore_fill)],
            Command::SetIgnoreFill(ignore_fill),
            flush,
        )
    }

    pub fn set_ignore_line(&mut self, ignore_line: bool, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::IgnoreLine(ignore_line)],
            Command::SetIgnoreLine(ignore_line),
            flush,
        )
    }

    /// Draw background-colored bitmap pixels instead of skipping them
    pub fn set_fill_background(&mut self, fill_background: bool, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::FillBackground(fill_background)],
            Command::SetFillBackground(fill_background),
            flush,
        )
    }

    pub fn set_line_width(&mut self, line_width: u16, flush: bool) -> Result<(), EngineError> {
        self.check_line_width(line_width)?;
        self.update_state(
            vec![StateChange::LineWidth(line_width)],
            Command::SetLineWidth { line_width },
            flush,
        )
    }

    // Rotation and alignment

    /// Set the rotation in radians
    pub fn set_rotation(&mut self, rotation: f32, flush: bool) -> Result<(), EngineError> {
        Self::check_finite(rotation)?;
        self.update_state(
            vec![StateChange::Rotation(rotation)],
            Command::SetRotation { rotation },
            flush,
        )
    }

    pub fn set_rotation_degrees(&mut self, degrees: f32, flush: bool) -> Result<(), EngineError> {
        Self::check_finite(degrees)?;
        self.set_rotation(degrees_to_radians(degrees), flush)
    }

    pub fn clear_rotation(&mut self, flush: bool) -> Result<(), EngineError> {
        self.update_state(vec![StateChange::Rotation(0.0)], Command::ClearRotation, flush)
    }

    pub fn set_horizontal_alignment(&mut self, alignment: Alignment, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::HorizontalAlignment(alignment)],
            Command::SetHorizontalAlignment(alignment),
            flush,
        )
    }

    pub fn set_vertical_alignment(&mut self, alignment: Alignment, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::VerticalAlignment(alignment)],
            Command::SetVerticalAlignment(alignment),
            flush,
        )
    }

    /// Center both axes
    pub fn reset_alignment(&mut self, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![
                StateChange::HorizontalAlignment(Alignment::Center),
                StateChange::VerticalAlignment(Alignment::Center),
            ],
            Command::ResetAlignment,
            flush,
        )
    }

    // Segments

    pub fn set_segment_start_cap(&mut self, cap: SegmentCap, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SegmentStartCap(cap)],
            Command::SetSegmentStartCap(cap),
            flush,
        )
    }

    pub fn set_segment_end_cap(&mut self, cap: SegmentCap, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SegmentEndCap(cap)],
            Command::SetSegmentEndCap(cap),
            flush,
        )
    }

    /// Set both segment caps
    pub fn set_segment_cap(&mut self, cap: SegmentCap, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SegmentStartCap(cap), StateChange::SegmentEndCap(cap)],
            Command::SetSegmentCap(cap),
            flush,
        )
    }

    pub fn set_segment_start_radius(&mut self, radius: u16, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SegmentStartRadius(radius)],
            Command::SetSegmentStartRadius(radius),
            flush,
        )
    }

    pub fn set_segment_end_radius(&mut self, radius: u16, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SegmentEndRadius(radius)],
            Command::SetSegmentEndRadius(radius),
            flush,
        )
    }

    /// Set both segment radii
    pub fn set_segment_radius(&mut self, radius: u16, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![
                StateChange::SegmentStartRadius(radius),
                StateChange::SegmentEndRadius(radius),
            ],
            Command::SetSegmentRadius(radius),
            flush,
        )
    }

    // Crops

    /// Trim one side of every later draw before rotation
    pub fn set_crop(&mut self, side: Side, crop: u16, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::Crop(side, crop)],
            Command::SetCrop { side, crop },
            flush,
        )
    }

    pub fn clear_crop(&mut self, flush: bool) -> Result<(), EngineError> {
        let changes = Side::ALL.iter().map(|side| StateChange::Crop(*side, 0)).collect();
        self.update_state(changes, Command::ClearCrop, flush)
    }

    /// Trim one side of every later draw in its own rotated frame
    pub fn set_rotation_crop(&mut self, side: Side, crop: u16, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::RotationCrop(side, crop)],
            Command::SetRotationCrop { side, crop },
            flush,
        )
    }

    pub fn clear_rotation_crop(&mut self, flush: bool) -> Result<(), EngineError> {
        let changes = Side::ALL
            .iter()
            .map(|side| StateChange::RotationCrop(*side, 0))
            .collect();
        self.update_state(changes, Command::ClearRotationCrop, flush)
    }

    // Bitmaps

    /// Draw bitmap color `from` with color index `to`
    pub fn select_bitmap_color(&mut self, from: u8, to: u8, flush: bool) -> Result<(), EngineError> {
        let pair = ColorPair::new(from, to);
        self.check_pairs(&[pair])?;
        let mut table = self.helper.state().bitmap_color_indices.clone();
        table[from as usize] = to;
        self.update_state(
            vec![StateChange::BitmapColorIndices(table)],
            Command::SelectBitmapColor(pair),
            flush,
        )
    }

    pub fn select_bitmap_colors(&mut self, pairs: &[ColorPair], flush: bool) -> Result<(), EngineError> {
        self.check_pairs(pairs)?;
        let mut table = self.helper.state().bitmap_color_indices.clone();
        for pair in pairs {
            table[pair.from as usize] = pair.to;
        }
        self.update_state(
            vec![StateChange::BitmapColorIndices(table)],
            Command::SelectBitmapColors(pairs.to_vec()),
            flush,
        )
    }

    pub fn set_bitmap_scale(&mut self, axis: ScaleAxis, scale: f32, flush: bool) -> Result<(), EngineError> {
        Self::check_finite(scale)?;
        let changes = match axis {
            ScaleAxis::X => vec![StateChange::BitmapScaleX(scale)],
            ScaleAxis::Y => vec![StateChange::BitmapScaleY(scale)],
            ScaleAxis::Both => vec![
                StateChange::BitmapScaleX(scale),
                StateChange::BitmapScaleY(scale),
            ],
        };
        self.update_state(changes, Command::SetBitmapScale { axis, scale }, flush)
    }

    pub fn reset_bitmap_scale(&mut self, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::BitmapScaleX(1.0), StateChange::BitmapScaleY(1.0)],
            Command::ResetBitmapScale,
            flush,
        )
    }

    // Sprite colors and scale

    /// Draw sprite color `from` with color index `to`
    pub fn select_sprite_color(&mut self, from: u8, to: u8, flush: bool) -> Result<(), EngineError> {
        let pair = ColorPair::new(from, to);
        self.check_pairs(&[pair])?;
        let mut table = self.helper.state().sprite_color_indices.clone();
        table[from as usize] = to;
        self.update_state(
            vec![StateChange::SpriteColorIndices(table)],
            Command::SelectSpriteColor(pair),
            flush,
        )
    }

    pub fn select_sprite_colors(&mut self, pairs: &[ColorPair], flush: bool) -> Result<(), EngineError> {
        self.check_pairs(pairs)?;
        let mut table = self.helper.state().sprite_color_indices.clone();
        for pair in pairs {
            table[pair.from as usize] = pair.to;
        }
        self.update_state(
            vec![StateChange::SpriteColorIndices(table)],
            Command::SelectSpriteColors(pairs.to_vec()),
            flush,
        )
    }

    pub fn reset_sprite_colors(&mut self, flush: bool) -> Result<(), EngineError> {
        let table = default_sprite_color_indices(self.helper.state().number_of_colors());
        self.update_state(
            vec![StateChange::SpriteColorIndices(table)],
            Command::ResetSpriteColors,
            flush,
        )
    }

    pub fn set_sprite_scale(&mut self, axis: ScaleAxis, scale: f32, flush: bool) -> Result<(), EngineError> {
        Self::check_finite(scale)?;
        let changes = match axis {
            ScaleAxis::X => vec![StateChange::SpriteScaleX(scale)],
            ScaleAxis::Y => vec![StateChange::SpriteScaleY(scale)],
            ScaleAxis::Both => vec![
                StateChange::SpriteScaleX(scale),
                StateChange::SpriteScaleY(scale),
            ],
        };
        self.update_state(changes, Command::SetSpriteScale { axis, scale }, flush)
    }

    pub fn reset_sprite_scale(&mut self, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SpriteScaleX(1.0), StateChange::SpriteScaleY(1.0)],
            Command::ResetSpriteScale,
            flush,
        )
    }

    // Sprite layout

    pub fn set_sprites_line_height(&mut self, line_height: u16, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SpritesLineHeight(line_height)],
            Command::SetSpritesLineHeight(line_height),
            flush,
        )
    }

    pub fn set_sprites_direction(&mut self, direction: Direction, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SpritesDirection(direction)],
            Command::SetSpritesDirection(direction),
            flush,
        )
    }

    pub fn set_sprites_line_direction(&mut self, direction: Direction, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SpritesLineDirection(direction)],
            Command::SetSpritesLineDirection(direction),
            flush,
        )
    }

    pub fn set_sprites_spacing(&mut self, spacing: i16, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SpritesSpacing(spacing)],
            Command::SetSpritesSpacing(spacing),
            flush,
        )
    }

    pub fn set_sprites_line_spacing(&mut self, spacing: i16, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SpritesLineSpacing(spacing)],
            Command::SetSpritesLineSpacing(spacing),
            flush,
        )
    }

    pub fn set_sprites_alignment(&mut self, alignment: Alignment, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SpritesAlignment(alignment)],
            Command::SetSpritesAlignment(alignment),
            flush,
        )
    }

    pub fn set_sprites_line_alignment(&mut self, alignment: Alignment, flush: bool) -> Result<(), EngineError> {
        self.update_state(
            vec![StateChange::SpritesLineAlignment(alignment)],
            Command::SetSpritesLineAlignment(alignment),
            flush,
        )
    }

    // Whole-state updates

    /// Move the context to a partial state, one setter per changed key
    ///
    /// Every change is checked before any is applied. When a key repeats,
    /// the last value wins.
    pub fn set_context_state(&mut self, changes: Vec<StateChange>, flush: bool) -> Result<(), EngineError> {
        self.check_live()?;
        changes.iter().try_for_each(|change| self.check_change(change))?;
        let changed = self.helper.diff(&changes);
        debug!("Context update touches {} keys", changed.len());
        for key in changed {
            if let Some(change) = changes.iter().rev().find(|c| c.key() == key) {
                self.apply_change(change.clone())?;
            }
        }
        if flush {
            self.flush()?;
        }
        Ok(())
    }

    fn check_change(&self, change: &StateChange) -> Result<(), EngineError> {
        match change {
            StateChange::BackgroundColorIndex(index)
            | StateChange::FillColorIndex(index)
            | StateChange::LineColorIndex(index) => self.check_color_index(*index),
            StateChange::LineWidth(line_width) => self.check_line_width(*line_width),
            StateChange::Rotation(value)
            | StateChange::BitmapScaleX(value)
            | StateChange::BitmapScaleY(value)
            | StateChange::SpriteScaleX(value)
            | StateChange::SpriteScaleY(value) => Self::check_finite(*value),
            StateChange::BitmapColorIndices(table) | StateChange::SpriteColorIndices(table) => {
                self.check_index_table(table)
            }
            StateChange::SpriteSheetName(Some(name)) => match self.sheets.get(name) {
                Some(_) => Ok(()),
                None => {
                    warn!("Sprite sheet '{}' not uploaded", name);
                    Err(EngineError::SpriteSheetNotFound)
                }
            },
            _ => Ok(()),
        }
    }

    fn apply_change(&mut self, change: StateChange) -> Result<(), EngineError> {
        match change {
            StateChange::BackgroundColorIndex(i) => self.select_background_color(i, false),
            StateChange::FillColorIndex(i) => self.select_fill_color(i, false),
            StateChange::LineColorIndex(i) => self.select_line_color(i, false),
            StateChange::IgnoreFill(v) => self.set_ignore_fill(v, false),
            StateChange::IgnoreLine(v) => self.set_ignore_line(v, false),
            StateChange::FillBackground(v) => self.set_fill_background(v, false),
            StateChange::LineWidth(v) => self.set_line_width(v, false),
            StateChange::Rotation(v) => self.set_rotation(v, false),
            StateChange::HorizontalAlignment(v) => self.set_horizontal_alignment(v, false),
            StateChange::VerticalAlignment(v) => self.set_vertical_alignment(v, false),
            StateChange::SegmentStartCap(v) => self.set_segment_start_cap(v, false),
            StateChange::SegmentEndCap(v) => self.set_segment_end_cap(v, false),
            StateChange::SegmentStartRadius(v) => self.set_segment_start_radius(v, false),
            StateChange::SegmentEndRadius(v) => self.set_segment_end_radius(v, false),
            StateChange::Crop(side, v) => self.set_crop(side, v, false),
            StateChange::RotationCrop(side, v) => self.set_rotation_crop(side, v, false),
            StateChange::BitmapColorIndices(table) => {
                let pairs = changed_pairs(&self.helper.state().bitmap_color_indices, &table);
                if pairs.is_empty() {
                    return Ok(());
                }
                self.select_bitmap_colors(&pairs, false)
            }
            StateChange::BitmapScaleX(v) => self.set_bitmap_scale(ScaleAxis::X, v, false),
            StateChange::BitmapScaleY(v) => self.set_bitmap_scale(ScaleAxis::Y, v, false),
            StateChange::SpriteColorIndices(table) => {
                let pairs = changed_pairs(&self.helper.state().sprite_color_indices, &table);
                if pairs.is_empty() {
                    return Ok(());
                }
                self.select_sprite_colors(&pairs, false)
            }
            StateChange::SpriteScaleX(v) => self.set_sprite_scale(ScaleAxis::X, v, false),
            StateChange::SpriteScaleY(v) => self.set_sprite_scale(ScaleAxis::Y, v, false),
            StateChange::SpriteSheetName(Some(name)) => self.select_sprite_sheet(&name, false),
            StateChange::SpriteSheetName(None) => {
                // The device has no command for deselecting a sheet
                let changed = self.helper.update(vec![StateChange::SpriteSheetName(None)]);
                if !changed.is_empty() {
                    self.emit_event(EngineEvent::ContextState { changed });
                }
                Ok(())
            }
            StateChange::SpritesLineHeight(v) => self.set_sprites_line_height(v, false),
            StateChange::SpritesDirection(v) => self.set_sprites_direction(v, false),
            StateChange::SpritesLineDirection(v) => self.set_sprites_line_direction(v, false),
            StateChange::SpritesSpacing(v) => self.set_sprites_spacing(v, false),
            StateChange::SpritesLineSpacing(v) => self.set_sprites_line_spacing(v, false),
            StateChange::SpritesAlignment(v) => self.set_sprites_alignment(v, false),
            StateChange::SpritesLineAlignment(v) => self.set_sprites_line_alignment(v, false),
        }
    }

    /// Reset the context to defaults on both ends
    ///
    /// Saved contexts are kept.
    pub fn reset_context(&mut self, flush: bool) -> Result<(), EngineError> {
        let defaults = ContextState::new(self.helper.state().number_of_colors());
        let changes = StateKey::ALL
            .iter()
            .map(|key| StateChange::current(&defaults, *key))
            .collect();
        self.set_context_state(changes, flush)
    }
}

/// Selections that turn `current` into `target`
fn changed_pairs(current: &[u8], target: &[u8]) -> Vec<ColorPair> {
    current
        .iter()
        .zip(target)
        .enumerate()
        .filter(|(_, (old, new))| old != new)
        .map(|(from, (_, to))| ColorPair::new(from as u8, *to))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing::{connected_engine, context_bytes};
    use super::*;
    use eidolon_protocol::CommandTag;

    use crate::state::context::default_bitmap_color_indices;
    use crate::state::EventChannel;

    #[test]
    fn test_redundant_setter_sends_nothing() {
        let mut engine = connected_engine();
        engine.select_fill_color(3, true).unwrap();
        let sent = context_bytes(&engine);
        assert_eq!(sent, vec![CommandTag::SelectFillColor.to_byte(), 3]);

        engine.select_fill_color(3, true).unwrap();
        assert_eq!(context_bytes(&engine), sent);
    }

    #[test]
    fn test_rotation_within_one_wire_step_sends_nothing() {
        let mut engine = connected_engine();
        engine.set_rotation(1.0, true).unwrap();
        let sent = context_bytes(&engine);
        assert_eq!(sent.len(), 3);

        engine.set_rotation(1.0 + 2e-5, true).unwrap();
        assert_eq!(context_bytes(&engine), sent);
        assert_eq!(engine.state().rotation, 1.0);
    }

    #[test]
    fn test_invalid_index_leaves_state() {
        let mut engine = connected_engine();
        assert_eq!(engine.select_line_color(16, true), Err(EngineError::InvalidIndex));
        assert_eq!(engine.state().line_color_index, 1);
        assert!(context_bytes(&engine).is_empty());
    }

    #[test]
    fn test_line_width_bounded_by_canvas() {
        let mut engine = connected_engine();
        assert_eq!(
            engine.set_line_width(641, false),
            Err(EngineError::InvalidGeometry(GeometryError::LineWidthExceedsCanvas))
        );
        engine.set_line_width(640, false).unwrap();
        assert_eq!(engine.state().line_width, 640);
    }

    #[test]
    fn test_batched_until_flush() {
        let mut engine = connected_engine();
        engine.set_ignore_fill(true, false).unwrap();
        engine.set_ignore_line(true, false).unwrap();
        assert!(context_bytes(&engine).is_empty());
        assert_eq!(engine.batched().len(), 4);

        engine.flush().unwrap();
        assert_eq!(
            context_bytes(&engine),
            vec![
                CommandTag::SetIgnoreFill.to_byte(),
                1,
                CommandTag::SetIgnoreLine.to_byte(),
                1
            ]
        );
    }

    #[test]
    fn test_save_restore_round_trip() {
        let mut engine = connected_engine();
        engine.set_rotation_degrees(90.0, false).unwrap();
        let before = engine.state().clone();

        engine.save_context(false).unwrap();
        engine.set_crop(Side::Left, 4, false).unwrap();
        engine.select_fill_color(5, false).unwrap();
        engine.restore_context(false).unwrap();
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.restore_context(false), Err(EngineError::NothingToRestore));
    }

    #[test]
    fn test_color_setters_replay_and_emit() {
        let channel = EventChannel::new();
        let mut engine = connected_engine().with_events(channel.sender());

        engine.set_color_hex(1, "#ff0000", true).unwrap();
        assert_eq!(
            channel.try_receive().ok(),
            Some(EngineEvent::Color {
                color_index: 1,
                color: Rgb::new(255, 0, 0)
            })
        );
        assert_eq!(engine.backend().replays, 1);

        engine.set_color(1, Rgb::new(255, 0, 0), true).unwrap();
        assert!(channel.try_receive().is_err());
        assert_eq!(engine.backend().replays, 1);

        assert_eq!(engine.set_color_hex(1, "red", true), Err(EngineError::InvalidValue));
        assert_eq!(engine.set_opacity(1.5, true), Err(EngineError::InvalidValue));
    }

    #[test]
    fn test_color_opacity_byte_resolution() {
        let mut engine = connected_engine();
        engine.set_color_opacity(2, 0.5, true).unwrap();
        let sent = context_bytes(&engine).len();
        engine.set_color_opacity(2, 0.5001, true).unwrap();
        assert_eq!(context_bytes(&engine).len(), sent);
    }

    #[test]
    fn test_brightness_frame() {
        let mut engine = connected_engine();
        engine.set_brightness(Brightness::VeryHigh).unwrap();
        assert_eq!(engine.colors().brightness(), Brightness::VeryHigh);
        let frames = &engine.transport().unwrap().frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_slice(), &[Brightness::VeryHigh.to_byte()]);

        engine.set_brightness(Brightness::VeryHigh).unwrap();
        assert_eq!(engine.transport().unwrap().frames.len(), 1);
    }

    #[test]
    fn test_bitmap_color_selection() {
        let mut engine = connected_engine();
        engine.select_bitmap_color(1, 7, false).unwrap();
        assert_eq!(engine.state().bitmap_color_indices[1], 7);
        assert_eq!(engine.select_bitmap_colors(&[], false), Err(EngineError::InvalidValue));
        assert_eq!(
            engine.select_bitmap_color(16, 0, false),
            Err(EngineError::InvalidIndex)
        );
    }

    #[test]
    fn test_scale_must_be_finite() {
        let mut engine = connected_engine();
        assert_eq!(
            engine.set_bitmap_scale(ScaleAxis::X, f32::NAN, false),
            Err(EngineError::InvalidValue)
        );
        engine.set_sprite_scale(ScaleAxis::Both, 2.0, false).unwrap();
        assert_eq!(engine.state().sprite_scale_x, 2.0);
        assert_eq!(engine.state().sprite_scale_y, 2.0);
        engine.reset_sprite_scale(false).unwrap();
        assert_eq!(engine.state().sprite_scale_y, 1.0);
    }

    #[test]
    fn test_clear_crop_resets_every_side() {
        let mut engine = connected_engine();
        engine.set_crop(Side::Top, 3, false).unwrap();
        engine.set_crop(Side::Right, 5, false).unwrap();
        engine.clear_crop(false).unwrap();
        assert!(engine.state().crop.is_zero());
    }

    #[test]
    fn test_context_state_one_command_per_key() {
        let channel = EventChannel::new();
        let mut engine = connected_engine().with_events(channel.sender());
        engine
            .set_context_state(
                vec![
                    StateChange::FillColorIndex(1),
                    StateChange::LineColorIndex(4),
                    StateChange::SegmentStartRadius(3),
                ],
                true,
            )
            .unwrap();
        assert_eq!(
            context_bytes(&engine),
            vec![
                CommandTag::SelectLineColor.to_byte(),
                4,
                CommandTag::SetSegmentStartRadius.to_byte(),
                3,
                0
            ]
        );
        assert_eq!(
            channel.try_receive().ok(),
            Some(EngineEvent::ContextState {
                changed: vec![StateKey::LineColorIndex]
            })
        );
    }

    #[test]
    fn test_context_state_checks_before_applying() {
        let mut engine = connected_engine();
        let result = engine.set_context_state(
            vec![StateChange::FillColorIndex(4), StateChange::LineWidth(9000)],
            true,
        );
        assert!(result.is_err());
        assert_eq!(engine.state().fill_color_index, 1);
        assert!(context_bytes(&engine).is_empty());
    }

    #[test]
    fn test_reset_context() {
        let mut engine = connected_engine();
        engine.set_sprites_spacing(4, false).unwrap();
        engine.select_sprite_color(2, 9, false).unwrap();
        engine.reset_context(true).unwrap();
        assert_eq!(engine.state().sprites_spacing, 0);
        assert_eq!(
            engine.state().sprite_color_indices,
            default_sprite_color_indices(16)
        );
        assert_eq!(
            engine.state().bitmap_color_indices,
            default_bitmap_color_indices(16)
        );
    }

    #[test]
    fn test_changed_pairs() {
        let pairs = changed_pairs(&[0, 1, 2], &[0, 5, 2]);
        assert_eq!(pairs, vec![ColorPair::new(1, 5)]);
    }
}
