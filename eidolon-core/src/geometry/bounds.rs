//! Axis-aligned boxes, box rotation and crop insets

use eidolon_protocol::Point;

use crate::state::Insets;

/// Axis-aligned rectangle in device or local pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box of the given size centered on the origin
    pub fn centered(width: f32, height: f32) -> Self {
        Self::new(-width / 2.0, -height / 2.0, width, height)
    }

    /// Smallest box holding every point
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Corners clockwise from the top-left
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ]
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grow by `pad` on every side
    pub fn pad(&self, pad: f32) -> Self {
        Self::new(
            self.x - pad,
            self.y - pad,
            self.width + 2.0 * pad,
            self.height + 2.0 * pad,
        )
    }

    /// Smallest box holding both
    pub fn union(&self, other: &BoundingBox) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(x, y, right - x, bottom - y)
    }

    /// Check if `other` lies entirely inside this box
    pub fn contains(&self, other: &BoundingBox) -> bool {
        const EPSILON: f32 = 1e-3;
        other.x >= self.x - EPSILON
            && other.y >= self.y - EPSILON
            && other.right() <= self.right() + EPSILON
            && other.bottom() <= self.bottom() + EPSILON
    }

    /// Trim each side by its inset
    pub fn inset(&self, insets: &Insets) -> Self {
        Self::new(
            self.x + insets.left as f32,
            self.y + insets.top as f32,
            self.width - insets.left as f32 - insets.right as f32,
            self.height - insets.top as f32 - insets.bottom as f32,
        )
    }

    /// Bounding box after rotating about this box's center
    pub fn rotate(&self, radians: f32) -> Self {
        rotate_bounding_box(self, radians)
    }
}

/// Rotate a box about its center and return the axis-aligned hull
///
/// The result always contains the input box's rotated corners, so rotating
/// back by the opposite angle never loses area.
pub fn rotate_bounding_box(bounds: &BoundingBox, radians: f32) -> BoundingBox {
    if radians == 0.0 {
        return *bounds;
    }
    let center = bounds.center();
    let (sin, cos) = radians.sin_cos();
    let hw = bounds.width / 2.0;
    let hh = bounds.height / 2.0;

    let rotated = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
        .map(|(x, y)| Point::new(x * cos - y * sin, x * sin + y * cos));

    // from_points only fails on an empty slice
    let hull = BoundingBox::from_points(&rotated).unwrap_or_default();
    hull.translate(center.x, center.y)
}

/// Rotate a point about the origin
pub fn rotate_point(point: Point, radians: f32) -> Point {
    let (sin, cos) = radians.sin_cos();
    Point::new(point.x * cos - point.y * sin, point.x * sin + point.y * cos)
}

/// Padding a stroke of `line_width` adds outside a shape
pub fn outer_padding(line_width: u16) -> f32 {
    (line_width as f32 / 2.0).ceil()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::{FRAC_PI_2, FRAC_PI_4};
    use proptest::prelude::*;

    #[test]
    fn test_from_points() {
        let points = [Point::new(3.0, -1.0), Point::new(-2.0, 4.0), Point::new(0.0, 0.0)];
        let bounds = BoundingBox::from_points(&points).unwrap();
        assert_eq!(bounds, BoundingBox::new(-2.0, -1.0, 5.0, 5.0));
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_rotate_quarter_turn_swaps_size() {
        let bounds = BoundingBox::new(0.0, 0.0, 20.0, 10.0);
        let rotated = rotate_bounding_box(&bounds, FRAC_PI_2);
        assert!((rotated.width - 10.0).abs() < 1e-4);
        assert!((rotated.height - 20.0).abs() < 1e-4);
        assert!((rotated.center().x - 10.0).abs() < 1e-4);
        assert!((rotated.center().y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotate_eighth_turn_grows() {
        let bounds = BoundingBox::centered(10.0, 10.0);
        let rotated = bounds.rotate(FRAC_PI_4);
        let diagonal = 10.0 * core::f32::consts::SQRT_2;
        assert!((rotated.width - diagonal).abs() < 1e-3);
        assert!(rotated.contains(&bounds));
    }

    #[test]
    fn test_inset_trims_each_side() {
        let insets = Insets {
            top: 1,
            right: 2,
            bottom: 3,
            left: 4,
        };
        let bounds = BoundingBox::new(0.0, 0.0, 20.0, 10.0).inset(&insets);
        assert_eq!(bounds, BoundingBox::new(4.0, 1.0, 14.0, 6.0));
    }

    #[test]
    fn test_outer_padding_rounds_up() {
        assert_eq!(outer_padding(0), 0.0);
        assert_eq!(outer_padding(1), 1.0);
        assert_eq!(outer_padding(4), 2.0);
        assert_eq!(outer_padding(5), 3.0);
    }

    proptest! {
        #[test]
        fn test_rotate_there_and_back_is_superset(
            x in -500.0f32..500.0,
            y in -500.0f32..500.0,
            width in 0.0f32..400.0,
            height in 0.0f32..400.0,
            theta in -7.0f32..7.0,
        ) {
            let bounds = BoundingBox::new(x, y, width, height);
            let back = rotate_bounding_box(&rotate_bounding_box(&bounds, theta), -theta);
            prop_assert!(back.area() * (1.0 + 1e-4) + 1e-3 >= bounds.area());
            prop_assert!(back.contains(&bounds));
        }
    }
}
