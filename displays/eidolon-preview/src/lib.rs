//! Local preview surface for the Eidolon display engine
//!
//! This crate provides:
//! - `RecordingBackend`, a rasterization backend that records every call
//!   the engine makes while replaying the committed frame
//! - `RecordingTransport`, an in-memory link that keeps every frame sent to
//!   the device
//! - `device_reply` for building the bytes a device sends back
//!
//! # Architecture
//!
//! The engine drives two consumers from one call sequence: the device over
//! the transport, and the preview through the backend. Pairing the two
//! recorders gives a host a complete picture of both sides, which is what
//! the end-to-end tests in `tests/` check.

pub mod link;
pub mod recorder;

use eidolon_core::config::ConfigError;
use eidolon_core::{Engine, EngineConfig};

pub use link::{device_reply, RecordingTransport};
pub use recorder::{RasterOp, RecordingBackend};

/// Engine drawing onto a recording backend over a recording transport
pub type PreviewEngine<'ch> = Engine<'ch, RecordingBackend, RecordingTransport>;

/// Build a connected preview engine
pub fn preview_engine<'ch>(config: EngineConfig) -> Result<PreviewEngine<'ch>, ConfigError> {
    Ok(Engine::new(config, RecordingBackend::new())?.with_transport(RecordingTransport::new()))
}
