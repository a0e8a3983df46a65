//! Display Context Protocol
//!
//! This crate defines the byte-level protocol between a host and a remote,
//! resource-constrained display. The host keeps all drawing state; the device
//! executes a stream of context commands against its own framebuffer.
//!
//! # Link Framing
//!
//! All messages travel inside a simple binary frame:
//! ```text
//! ┌───────┬────────┬──────┬─────────────┬──────────┐
//! │ START │ LENGTH │ TYPE │ PAYLOAD     │ CHECKSUM │
//! │ 1B    │ 1B     │ 1B   │ 0–250B      │ 1B       │
//! └───────┴────────┴──────┴─────────────┴──────────┘
//! ```
//!
//! # Context Commands
//!
//! A `ContextCommands` frame carries a batch of commands, each encoded as a
//! one-byte [`CommandTag`] followed by its payload. Tags are append-only: a
//! new command takes the next unused value and old values are never reused.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod bitmap;
pub mod codec;
pub mod command;
pub mod display;
pub mod frame;
pub mod messages;
pub mod quantize;

pub use bitmap::{pack_pixels, packed_len, unpack_pixels};
pub use codec::{CodecError, CommandDecoder, CommandEncoder, NoSprites, SpriteIndex};
pub use command::{
    Alignment, Bitmap, ColorPair, Command, CommandTag, Curve, CurveKind, Direction, Instruction,
    Point, PointDataType, Rgb, ScaleAxis, SegmentCap, Side, SpriteLine, SpriteSubLine, Wireframe,
    WireframeEdge,
};
pub use display::{Brightness, DisplayInformation, PixelDepth};
pub use frame::{Frame, FrameError, FrameParser, FRAME_START, MAX_PAYLOAD_SIZE};
pub use messages::{DeviceMessage, HostMessage};
