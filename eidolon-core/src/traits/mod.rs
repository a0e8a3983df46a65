//! Backend abstraction traits
//!
//! These traits define the interface between the engine and the two
//! consumers of its command stream: the local rasterizer and the link to the
//! device.

pub mod raster;
pub mod transport;

pub use raster::{Paint, Path, PathElement, RasterizationBackend};
pub use transport::{Transport, TransportError};
