//! Rasterization backend trait for the local preview
//!
//! The engine never touches pixels itself. During draw-queue replay it
//! describes each primitive as transforms, clips and paths in the device's
//! coordinate space, and the backend turns those into pixels.

use eidolon_protocol::{Point, Rgb};

use crate::geometry::BoundingBox;

/// Effective drawable color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Rgb,
    /// Per-color opacity times brightness
    pub opacity: f32,
}

impl Paint {
    pub const fn new(color: Rgb, opacity: f32) -> Self {
        Self { color, opacity }
    }
}

/// One element of a [`Path`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathElement {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    /// Circular arc; angles in radians, clockwise in screen space
    Arc {
        center: Point,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        counterclockwise: bool,
    },
    /// Axis-aligned elliptical arc
    Ellipse {
        center: Point,
        radius_x: f32,
        radius_y: f32,
        start_angle: f32,
        end_angle: f32,
        counterclockwise: bool,
    },
    Close,
}

/// Outline built from move, line, curve and arc elements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn move_to(&mut self, point: Point) -> &mut Self {
        self.elements.push(PathElement::MoveTo(point));
        self
    }

    pub fn line_to(&mut self, point: Point) -> &mut Self {
        self.elements.push(PathElement::LineTo(point));
        self
    }

    pub fn quad_to(&mut self, control: Point, end: Point) -> &mut Self {
        self.elements.push(PathElement::QuadTo(control, end));
        self
    }

    pub fn cubic_to(&mut self, c1: Point, c2: Point, end: Point) -> &mut Self {
        self.elements.push(PathElement::CubicTo(c1, c2, end));
        self
    }

    pub fn arc(&mut self, center: Point, radius: f32, start_angle: f32, end_angle: f32) -> &mut Self {
        self.elements.push(PathElement::Arc {
            center,
            radius,
            start_angle,
            end_angle,
            counterclockwise: end_angle < start_angle,
        });
        self
    }

    pub fn ellipse(
        &mut self,
        center: Point,
        radius_x: f32,
        radius_y: f32,
        start_angle: f32,
        end_angle: f32,
    ) -> &mut Self {
        self.elements.push(PathElement::Ellipse {
            center,
            radius_x,
            radius_y,
            start_angle,
            end_angle,
            counterclockwise: end_angle < start_angle,
        });
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.elements.push(PathElement::Close);
        self
    }

    /// Closed polyline through `points`
    pub fn polygon(points: &[Point]) -> Self {
        let mut path = Path::new();
        for (index, point) in points.iter().enumerate() {
            if index == 0 {
                path.move_to(*point);
            } else {
                path.line_to(*point);
            }
        }
        path.close();
        path
    }

    /// Axis-aligned rectangle
    pub fn rect(rect: &BoundingBox) -> Self {
        Self::polygon(&rect.corners())
    }
}

/// Trait for the pixel surface behind the preview
///
/// Transform and clip calls nest between `save` and `restore` exactly like
/// a 2D canvas context.
pub trait RasterizationBackend {
    /// Push the current transform and clip
    fn save(&mut self);

    /// Pop the transform and clip pushed by the matching `save`
    fn restore(&mut self);

    fn translate(&mut self, x: f32, y: f32);

    fn rotate(&mut self, radians: f32);

    fn scale(&mut self, x: f32, y: f32);

    /// Intersect the clip with a rectangle in current coordinates
    fn clip_rect(&mut self, rect: &BoundingBox);

    /// Fill a rectangle with the background, ignoring opacity blending
    fn clear_rect(&mut self, rect: &BoundingBox, background: Paint);

    fn fill_path(&mut self, path: &Path, paint: Paint);

    fn stroke_path(&mut self, path: &Path, paint: Paint, width: f32);

    /// Draw a row-major pixel buffer with its top-left corner at `(x, y)`
    ///
    /// `None` pixels are transparent.
    fn blit(&mut self, x: f32, y: f32, width: u16, pixels: &[Option<Paint>]);
}
