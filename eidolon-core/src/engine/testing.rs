//! Backend and transport doubles for engine tests

use eidolon_protocol::messages::MSG_CONTEXT_COMMANDS;
use eidolon_protocol::Frame;

use crate::config::EngineConfig;
use crate::geometry::BoundingBox;
use crate::traits::{Paint, Path, RasterizationBackend, Transport, TransportError};

use super::Engine;

/// Counts what reaches the backend
#[derive(Debug, Default)]
pub struct CountingBackend {
    depth: usize,
    /// Committed-frame replays
    pub replays: usize,
    pub fills: Vec<Paint>,
    pub strokes: usize,
    pub blits: usize,
}

impl RasterizationBackend for CountingBackend {
    fn save(&mut self) {
        self.depth += 1;
    }

    fn restore(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn translate(&mut self, _x: f32, _y: f32) {}

    fn rotate(&mut self, _radians: f32) {}

    fn scale(&mut self, _x: f32, _y: f32) {}

    fn clip_rect(&mut self, _rect: &BoundingBox) {}

    fn clear_rect(&mut self, _rect: &BoundingBox, _background: Paint) {
        // A replay clears the canvas right after its own save
        if self.depth == 1 {
            self.replays += 1;
        }
    }

    fn fill_path(&mut self, _path: &Path, paint: Paint) {
        self.fills.push(paint);
    }

    fn stroke_path(&mut self, _path: &Path, _paint: Paint, _width: f32) {
        self.strokes += 1;
    }

    fn blit(&mut self, _x: f32, _y: f32, _width: u16, _pixels: &[Option<Paint>]) {
        self.blits += 1;
    }
}

/// Records every frame written to the link
#[derive(Debug, Default)]
pub struct FrameLog {
    pub frames: Vec<Frame>,
    pub offline: bool,
}

impl Transport for FrameLog {
    fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if self.offline {
            return Err(TransportError::Disconnected);
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.offline
    }
}

pub fn connected_engine() -> Engine<'static, CountingBackend, FrameLog> {
    Engine::new(EngineConfig::new(), CountingBackend::default())
        .unwrap()
        .with_transport(FrameLog::default())
}

/// Every context command byte sent so far, batches concatenated
pub fn context_bytes<B: RasterizationBackend>(engine: &Engine<'_, B, FrameLog>) -> Vec<u8> {
    engine
        .transport()
        .map(|log| {
            log.frames
                .iter()
                .filter(|f| f.msg_type == MSG_CONTEXT_COMMANDS)
                .flat_map(|f| f.payload.iter().copied())
                .collect()
        })
        .unwrap_or_default()
}

/// Number of context command frames sent so far
pub fn context_frames<B: RasterizationBackend>(engine: &Engine<'_, B, FrameLog>) -> usize {
    engine.transport().map_or(0, |log| {
        log.frames
            .iter()
            .filter(|f| f.msg_type == MSG_CONTEXT_COMMANDS)
            .count()
    })
}
