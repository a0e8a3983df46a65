//! Color table, per-color opacity and global brightness
//!
//! Every drawable color is an index into the color table. The effective
//! opacity of index `i` is `opacities[i] * brightness.opacity()`.

use log::warn;

use eidolon_protocol::quantize::floor;
use eidolon_protocol::{Brightness, Rgb};

use crate::error::EngineError;
use crate::traits::Paint;

/// Color table plus opacity and brightness
#[derive(Debug, Clone, PartialEq)]
pub struct ColorModel {
    colors: Vec<Rgb>,
    opacities: Vec<f32>,
    brightness: Brightness,
}

impl Default for ColorModel {
    fn default() -> Self {
        Self::new(crate::state::DEFAULT_NUMBER_OF_COLORS, Brightness::default())
    }
}

impl ColorModel {
    /// All-black table of `number_of_colors` fully opaque entries
    pub fn new(number_of_colors: u8, brightness: Brightness) -> Self {
        Self {
            colors: vec![Rgb::BLACK; number_of_colors as usize],
            opacities: vec![1.0; number_of_colors as usize],
            brightness,
        }
    }

    pub fn number_of_colors(&self) -> u8 {
        self.colors.len() as u8
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn opacities(&self) -> &[f32] {
        &self.opacities
    }

    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    pub fn color(&self, index: u8) -> Option<Rgb> {
        self.colors.get(index as usize).copied()
    }

    fn check_index(&self, index: u8) -> Result<usize, EngineError> {
        if (index as usize) < self.colors.len() {
            Ok(index as usize)
        } else {
            warn!("Color index {} out of range (0..{})", index, self.colors.len());
            Err(EngineError::InvalidIndex)
        }
    }

    fn check_opacity(opacity: f32) -> Result<(), EngineError> {
        if (0.0..=1.0).contains(&opacity) {
            Ok(())
        } else {
            warn!("Opacity {} outside 0..=1", opacity);
            Err(EngineError::InvalidValue)
        }
    }

    /// Replace one color, returning true if it changed
    pub fn set_color(&mut self, index: u8, color: Rgb) -> Result<bool, EngineError> {
        let index = self.check_index(index)?;
        if self.colors[index] == color {
            return Ok(false);
        }
        self.colors[index] = color;
        Ok(true)
    }

    /// Replace one opacity, returning true if it changed at byte resolution
    pub fn set_color_opacity(&mut self, index: u8, opacity: f32) -> Result<bool, EngineError> {
        let index = self.check_index(index)?;
        Self::check_opacity(opacity)?;
        if floor(255.0 * self.opacities[index]) == floor(255.0 * opacity) {
            return Ok(false);
        }
        self.opacities[index] = opacity;
        Ok(true)
    }

    /// Write every opacity, returning true if any changed
    pub fn set_opacity(&mut self, opacity: f32) -> Result<bool, EngineError> {
        Self::check_opacity(opacity)?;
        let target = floor(255.0 * opacity);
        if self.opacities.iter().all(|o| floor(255.0 * o) == target) {
            return Ok(false);
        }
        self.opacities.iter_mut().for_each(|o| *o = opacity);
        Ok(true)
    }

    /// Returns true if the level changed
    pub fn set_brightness(&mut self, brightness: Brightness) -> bool {
        let changed = self.brightness != brightness;
        self.brightness = brightness;
        changed
    }

    /// Reset to an all-black table of a new size
    pub fn resize(&mut self, number_of_colors: u8) {
        self.colors = vec![Rgb::BLACK; number_of_colors as usize];
        self.opacities = vec![1.0; number_of_colors as usize];
    }

    /// Copy palette entries into `offset..offset + colors.len()`
    ///
    /// Entries outside that range are untouched. Missing opacities count as
    /// fully opaque. Returns true if any entry changed.
    pub fn apply_palette(
        &mut self,
        colors: &[Rgb],
        opacities: Option<&[f32]>,
        offset: u8,
    ) -> Result<bool, EngineError> {
        let start = offset as usize;
        let end = start + colors.len();
        if end > self.colors.len() {
            warn!(
                "Palette of {} colors at offset {} overflows a {} color table",
                colors.len(),
                offset,
                self.colors.len()
            );
            return Err(EngineError::InvalidIndex);
        }
        if let Some(opacities) = opacities {
            opacities.iter().try_for_each(|o| Self::check_opacity(*o))?;
        }

        let mut changed = false;
        for (i, color) in colors.iter().enumerate() {
            let opacity = opacities.and_then(|o| o.get(i)).copied().unwrap_or(1.0);
            let slot = start + i;
            if self.colors[slot] != *color || self.opacities[slot] != opacity {
                self.colors[slot] = *color;
                self.opacities[slot] = opacity;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Per-color opacity times brightness
    pub fn effective_opacity(&self, index: u8) -> f32 {
        let opacity = self.opacities.get(index as usize).copied().unwrap_or(1.0);
        opacity * self.brightness.opacity()
    }

    /// Drawable paint for a color-table index
    pub fn paint(&self, index: u8) -> Paint {
        let color = self.color(index).unwrap_or(Rgb::BLACK);
        Paint::new(color, self.effective_opacity(index))
    }

    /// Paint for an index looked up through a remap table first
    ///
    /// Without a table the index addresses the color table directly.
    pub fn resolve(&self, index: u8, color_map: Option<&[u8]>) -> Paint {
        let index = match color_map {
            Some(map) => map.get(index as usize).copied().unwrap_or(index),
            None => index,
        };
        self.paint(index)
    }
}
