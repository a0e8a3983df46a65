//! Recording rasterization backend
//!
//! Stands in for a real pixel surface. Every call the engine makes during a
//! replay is kept as a [`RasterOp`], so a caller can inspect exactly what
//! the preview would have painted.

use log::trace;

use eidolon_core::geometry::BoundingBox;
use eidolon_core::traits::{Paint, Path, RasterizationBackend};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum RasterOp {
    Save,
    Restore,
    Translate { x: f32, y: f32 },
    Rotate { radians: f32 },
    Scale { x: f32, y: f32 },
    ClipRect(BoundingBox),
    ClearRect { rect: BoundingBox, background: Paint },
    Fill { path: Path, paint: Paint },
    Stroke { path: Path, paint: Paint, width: f32 },
    Blit {
        x: f32,
        y: f32,
        width: u16,
        pixels: Vec<Option<Paint>>,
    },
}

/// Backend that records instead of painting
///
/// Each replay of the committed frame starts with a full-canvas clear at
/// save depth one; [`RecordingBackend::frames`] splits the log there.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    ops: Vec<RasterOp>,
    depth: usize,
    max_depth: usize,
    frame_starts: Vec<usize>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call since creation or the last [`take`](Self::take)
    pub fn ops(&self) -> &[RasterOp] {
        &self.ops
    }

    /// Drain the log
    pub fn take(&mut self) -> Vec<RasterOp> {
        self.frame_starts.clear();
        core::mem::take(&mut self.ops)
    }

    /// Number of replays recorded
    pub fn replays(&self) -> usize {
        self.frame_starts.len()
    }

    /// Ops of each recorded replay, oldest first
    pub fn frames(&self) -> Vec<&[RasterOp]> {
        let mut frames = Vec::with_capacity(self.frame_starts.len());
        for (i, &start) in self.frame_starts.iter().enumerate() {
            let end = self
                .frame_starts
                .get(i + 1)
                .copied()
                .unwrap_or(self.ops.len());
            frames.push(&self.ops[start..end]);
        }
        frames
    }

    /// Ops of the most recent replay
    pub fn last_frame(&self) -> &[RasterOp] {
        match self.frame_starts.last() {
            Some(&start) => &self.ops[start..],
            None => &[],
        }
    }

    /// Paints of every fill in the most recent replay
    pub fn fills(&self) -> Vec<Paint> {
        self.last_frame()
            .iter()
            .filter_map(|op| match op {
                RasterOp::Fill { paint, .. } => Some(*paint),
                _ => None,
            })
            .collect()
    }

    /// Paints of every stroke in the most recent replay
    pub fn strokes(&self) -> Vec<Paint> {
        self.last_frame()
            .iter()
            .filter_map(|op| match op {
                RasterOp::Stroke { paint, .. } => Some(*paint),
                _ => None,
            })
            .collect()
    }

    /// Check that every save has been matched by a restore
    pub fn is_balanced(&self) -> bool {
        self.depth == 0
    }

    /// Deepest save nesting seen
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl RasterizationBackend for RecordingBackend {
    fn save(&mut self) {
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        self.ops.push(RasterOp::Save);
    }

    fn restore(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.ops.push(RasterOp::Restore);
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.ops.push(RasterOp::Translate { x, y });
    }

    fn rotate(&mut self, radians: f32) {
        self.ops.push(RasterOp::Rotate { radians });
    }

    fn scale(&mut self, x: f32, y: f32) {
        self.ops.push(RasterOp::Scale { x, y });
    }

    fn clip_rect(&mut self, rect: &BoundingBox) {
        self.ops.push(RasterOp::ClipRect(*rect));
    }

    fn clear_rect(&mut self, rect: &BoundingBox, background: Paint) {
        if self.depth == 1 {
            // The save before this clear opened the replay
            let start = self.ops.len().saturating_sub(1);
            trace!("Replay {} starts at op {}", self.frame_starts.len(), start);
            self.frame_starts.push(start);
        }
        self.ops.push(RasterOp::ClearRect {
            rect: *rect,
            background,
        });
    }

    fn fill_path(&mut self, path: &Path, paint: Paint) {
        self.ops.push(RasterOp::Fill {
            path: path.clone(),
            paint,
        });
    }

    fn stroke_path(&mut self, path: &Path, paint: Paint, width: f32) {
        self.ops.push(RasterOp::Stroke {
            path: path.clone(),
            paint,
            width,
        });
    }

    fn blit(&mut self, x: f32, y: f32, width: u16, pixels: &[Option<Paint>]) {
        self.ops.push(RasterOp::Blit {
            x,
            y,
            width,
            pixels: pixels.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidolon_protocol::Rgb;

    fn paint(r: u8) -> Paint {
        Paint::new(Rgb::new(r, 0, 0), 1.0)
    }

    fn replay(backend: &mut RecordingBackend, fill: u8) {
        let canvas = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        backend.save();
        backend.clear_rect(&canvas, paint(0));
        backend.save();
        backend.clear_rect(&canvas, paint(0));
        backend.fill_path(&Path::rect(&canvas), paint(fill));
        backend.restore();
        backend.restore();
    }

    #[test]
    fn test_frames_split_on_replay() {
        let mut backend = RecordingBackend::new();
        replay(&mut backend, 1);
        replay(&mut backend, 2);
        assert_eq!(backend.replays(), 2);
        assert_eq!(backend.frames()[0].len(), 7);
        assert_eq!(backend.fills(), vec![paint(2)]);
        assert!(backend.is_balanced());
        assert_eq!(backend.max_depth(), 2);
    }

    #[test]
    fn test_take_resets_frames() {
        let mut backend = RecordingBackend::new();
        replay(&mut backend, 1);
        assert_eq!(backend.take().len(), 7);
        assert_eq!(backend.replays(), 0);
        assert!(backend.last_frame().is_empty());
    }
}
