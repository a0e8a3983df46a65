//! Two-stage draw recorder
//!
//! Draw calls land in the pending list with a snapshot of everything they
//! need to render. `commit` swaps pending into committed, and only the
//! committed frame is ever replayed onto the preview. Recolors replay the
//! committed frame again without recording anything new.

use log::debug;

use eidolon_protocol::Point;

use crate::color::ColorModel;
use crate::geometry::{BoundingBox, DrawGeometry, Shape};
use crate::state::ContextState;
use crate::traits::{Paint, RasterizationBackend};

/// Colors a draw uses, captured when it was recorded
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawStyle {
    /// Fill color index, `None` when fill is ignored
    pub fill: Option<u8>,
    /// Line color index, `None` when the line is ignored
    pub line: Option<u8>,
    pub line_width: f32,
    pub background: u8,
    pub fill_background: bool,
    /// Bitmap color index to drawing color index
    pub bitmap_colors: Vec<u8>,
    /// Sprite color table in effect, set only inside sprites
    pub color_map: Option<Vec<u8>>,
}

impl DrawStyle {
    /// Snapshot the colors of `state`
    pub fn from_state(state: &ContextState, color_map: Option<&[u8]>) -> Self {
        Self {
            fill: (!state.ignore_fill).then_some(state.fill_color_index),
            line: (!state.ignore_line).then_some(state.line_color_index),
            line_width: state.line_width as f32,
            background: state.background_color_index,
            fill_background: state.fill_background,
            bitmap_colors: state.bitmap_color_indices.clone(),
            color_map: color_map.map(<[u8]>::to_vec),
        }
    }

    fn paint(&self, index: u8, colors: &ColorModel) -> Paint {
        colors.resolve(index, self.color_map.as_deref())
    }

    fn background_paint(&self, colors: &ColorModel) -> Paint {
        // The background always addresses the color table directly
        colors.paint(self.background)
    }
}

/// Placement of one sprite level around the entries it contains
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteFrame {
    pub geometry: DrawGeometry,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Unscaled sprite size
    pub width: f32,
    pub height: f32,
}

impl SpriteFrame {
    fn apply<B: RasterizationBackend>(&self, backend: &mut B) {
        apply_geometry(backend, &self.geometry);
        backend.scale(self.scale_x, self.scale_y);
        backend.translate(-self.width / 2.0, -self.height / 2.0);
    }
}

/// One replayable draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawEntry {
    /// Enclosing sprites, outermost first
    pub chain: Vec<SpriteFrame>,
    pub geometry: DrawGeometry,
    pub shape: Shape,
    pub style: DrawStyle,
    /// Clear `geometry.world_box` to the background first
    pub clear_box: bool,
}

impl DrawEntry {
    pub fn new(geometry: DrawGeometry, shape: Shape, style: DrawStyle) -> Self {
        Self {
            chain: Vec::new(),
            geometry,
            shape,
            style,
            clear_box: false,
        }
    }

    /// Render onto `backend` with the current colors
    pub fn draw<B: RasterizationBackend>(&self, backend: &mut B, colors: &ColorModel) {
        let style = &self.style;
        backend.save();
        for frame in &self.chain {
            frame.apply(backend);
        }
        if self.clear_box {
            backend.clear_rect(&self.geometry.world_box, style.background_paint(colors));
        }
        apply_geometry(backend, &self.geometry);

        match &self.shape {
            Shape::Clear { width, height } => {
                let rect = BoundingBox::centered(*width, *height);
                backend.clear_rect(&rect, style.background_paint(colors));
            }
            Shape::Bitmap {
                bitmap,
                scale_x,
                scale_y,
            } => {
                if *scale_x != 0.0 && *scale_y != 0.0 {
                    backend.scale(*scale_x, *scale_y);
                    let pixels: Vec<Option<Paint>> = bitmap
                        .pixels
                        .iter()
                        .map(|&pixel| {
                            let index = style.bitmap_colors.get(pixel as usize).copied()?;
                            let table_index = match &style.color_map {
                                Some(map) => map.get(index as usize).copied().unwrap_or(index),
                                None => index,
                            };
                            if table_index == style.background && !style.fill_background {
                                None
                            } else {
                                Some(colors.paint(table_index))
                            }
                        })
                        .collect();
                    let origin = Point::new(
                        -(bitmap.width as f32) / 2.0,
                        -(bitmap.height as f32) / 2.0,
                    );
                    backend.blit(origin.x, origin.y, bitmap.width, &pixels);
                }
            }
            shape => {
                if let Some(path) = shape.path() {
                    if shape.is_fillable() {
                        if let Some(fill) = style.fill {
                            backend.fill_path(&path, style.paint(fill, colors));
                        }
                    }
                    if let Some(line) = style.line {
                        // Open outlines are only visible as strokes
                        let width = if shape.is_fillable() {
                            style.line_width
                        } else {
                            style.line_width.max(1.0)
                        };
                        if width > 0.0 {
                            backend.stroke_path(&path, style.paint(line, colors), width);
                        }
                    }
                }
            }
        }
        backend.restore();
    }
}

fn apply_geometry<B: RasterizationBackend>(backend: &mut B, geometry: &DrawGeometry) {
    if let Some(crop) = &geometry.crop {
        backend.clip_rect(crop);
    }
    backend.translate(geometry.frame.origin.x, geometry.frame.origin.y);
    if geometry.frame.rotation != 0.0 {
        backend.rotate(geometry.frame.rotation);
    }
    if let Some(rotation_crop) = &geometry.rotation_crop {
        backend.clip_rect(rotation_crop);
    }
}

/// Pending and committed draw lists
#[derive(Debug, Clone, Default)]
pub struct DrawQueue {
    pending: Vec<DrawEntry>,
    committed: Vec<DrawEntry>,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: DrawEntry) {
        self.pending.push(entry);
    }

    pub fn record_all(&mut self, entries: impl IntoIterator<Item = DrawEntry>) {
        self.pending.extend(entries);
    }

    pub fn pending(&self) -> &[DrawEntry] {
        &self.pending
    }

    pub fn committed(&self) -> &[DrawEntry] {
        &self.committed
    }

    /// Make the pending frame the committed one
    pub fn commit(&mut self) {
        debug!("Committing {} draw entries", self.pending.len());
        self.committed = core::mem::take(&mut self.pending);
    }

    /// Drop pending entries recorded after the first `len`
    pub fn truncate_pending(&mut self, len: usize) {
        self.pending.truncate(len);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.pending.clear();
        self.committed.clear();
    }

    /// Render the committed frame over a background-filled canvas
    pub fn replay<B: RasterizationBackend>(
        &self,
        backend: &mut B,
        colors: &ColorModel,
        canvas: &BoundingBox,
    ) {
        backend.save();
        backend.clear_rect(canvas, colors.paint(0));
        for entry in &self.committed {
            entry.draw(backend, colors);
        }
        backend.restore();
    }
}
