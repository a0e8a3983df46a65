//! Bounding boxes and clip regions for every primitive
//!
//! The clip pipeline for one draw runs in this order:
//! 1. `crop`, in the parent's unrotated space
//! 2. translate and rotate into the shape's local frame
//! 3. `rotation_crop`, in the shape's own rotated space

pub mod bounds;
pub mod shapes;

pub use bounds::{outer_padding, rotate_bounding_box, rotate_point, BoundingBox};
pub use shapes::{crop_rect, DrawGeometry, LocalFrame, Shape};
