//! Host-side core of the display context engine
//!
//! This crate holds everything that does not depend on a concrete link or
//! a concrete rasterizer:
//!
//! - Context state, saved contexts and link readiness
//! - Color table and brightness
//! - Bounding boxes and clip regions for every primitive
//! - The draw queue that feeds the preview
//! - Sprite sheets and sprite composition
//! - Command batching and dispatch
//! - Configuration loading

#![deny(unsafe_code)]

pub mod batch;
pub mod color;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod queue;
pub mod sprite;
pub mod state;
pub mod traits;

pub use config::EngineConfig;
pub use dispatch::{run_command, run_command_bytes, run_commands, run_instruction};
pub use engine::Engine;
pub use error::{EngineError, GeometryError};
pub use traits::{RasterizationBackend, Transport, TransportError};
