//! Per-primitive boxes, clip regions and local outlines
//!
//! Every draw resolves to a [`DrawGeometry`] plus a [`Shape`]. The geometry
//! says where the shape's local frame sits in its parent and which clips
//! apply, the shape describes the outline inside that frame. Box primitives
//! are centered on their frame origin; point primitives keep their points
//! relative to the center of their point hull.

use core::f32::consts::{FRAC_PI_2, PI, TAU};

use eidolon_protocol::{Bitmap, Curve, CurveKind, Point, SegmentCap, WireframeEdge};

use crate::error::GeometryError;
use crate::state::{ContextState, Insets};
use crate::traits::Path;

use super::bounds::{outer_padding, rotate_bounding_box, rotate_point, BoundingBox};

/// Placement of a shape's local frame in its parent
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalFrame {
    pub origin: Point,
    pub rotation: f32,
}

impl LocalFrame {
    /// Map a local point into the parent
    pub fn to_parent(&self, point: Point) -> Point {
        let rotated = rotate_point(point, self.rotation);
        Point::new(rotated.x + self.origin.x, rotated.y + self.origin.y)
    }
}

/// Boxes and clips for one draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawGeometry {
    /// Axis-aligned hull in the parent, cleared before drawing
    pub world_box: BoundingBox,
    /// Pre-rotation clip in the parent
    pub crop: Option<BoundingBox>,
    pub frame: LocalFrame,
    /// Padded shape box in local coordinates
    pub local_box: BoundingBox,
    /// Post-rotation clip in local coordinates
    pub rotation_crop: Option<BoundingBox>,
}

impl DrawGeometry {
    /// Geometry for a box of `size` padded by `pad`, placed by alignment
    ///
    /// `crop_rotated` picks whether the crop trims the rotated hull or the
    /// unrotated box; round shapes look the same at any rotation and use
    /// the unrotated one.
    pub fn aligned(
        offset: Point,
        width: f32,
        height: f32,
        pad: f32,
        state: &ContextState,
        crop_rotated: bool,
    ) -> Self {
        let padded_width = width + 2.0 * pad;
        let padded_height = height + 2.0 * pad;
        let x = offset.x - state.horizontal_alignment.factor() * padded_width;
        let y = offset.y - state.vertical_alignment.factor() * padded_height;
        let placed = BoundingBox::new(x, y, padded_width, padded_height);
        Self::framed(placed, state.rotation, state, crop_rotated)
    }

    /// Geometry for an already placed box rotated about its center
    pub fn framed(
        placed: BoundingBox,
        rotation: f32,
        state: &ContextState,
        crop_rotated: bool,
    ) -> Self {
        let rotated = rotate_bounding_box(&placed, rotation);
        let crop_base = if crop_rotated { rotated } else { placed };
        let local_box = BoundingBox::centered(placed.width, placed.height);
        Self {
            world_box: rotated.union(&placed),
            crop: crop_rect(&crop_base, &state.crop),
            frame: LocalFrame {
                origin: placed.center(),
                rotation,
            },
            local_box,
            rotation_crop: crop_rect(&local_box, &state.rotation_crop),
        }
    }
}

/// Crop region for `bounds`, or `None` when nothing is cropped
pub fn crop_rect(bounds: &BoundingBox, insets: &Insets) -> Option<BoundingBox> {
    if insets.is_zero() {
        None
    } else {
        Some(bounds.inset(insets))
    }
}

/// Outline of a primitive in its local frame
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect {
        width: f32,
        height: f32,
    },
    RoundRect {
        width: f32,
        height: f32,
        radius: f32,
    },
    Ellipse {
        radius_x: f32,
        radius_y: f32,
    },
    /// Pie wedge
    Arc {
        radius_x: f32,
        radius_y: f32,
        start_angle: f32,
        angle_offset: f32,
    },
    RegularPolygon {
        radius: f32,
        number_of_sides: u8,
    },
    Segment {
        start: Point,
        end: Point,
        start_radius: f32,
        end_radius: f32,
        start_cap: SegmentCap,
        end_cap: SegmentCap,
    },
    Polygon {
        points: Vec<Point>,
    },
    Wireframe {
        points: Vec<Point>,
        edges: Vec<WireframeEdge>,
    },
    /// Chain of curves; each entry omits its start point
    Curves {
        start: Point,
        curves: Vec<(CurveKind, Vec<Point>)>,
        closed: bool,
    },
    Bitmap {
        bitmap: Bitmap,
        scale_x: f32,
        scale_y: f32,
    },
    /// Background fill of the local box
    Clear {
        width: f32,
        height: f32,
    },
}

impl Shape {
    /// Check if the outline encloses an area that can be filled
    pub fn is_fillable(&self) -> bool {
        match self {
            Shape::Wireframe { .. } => false,
            Shape::Curves { closed, .. } => *closed,
            Shape::Bitmap { .. } | Shape::Clear { .. } => false,
            _ => true,
        }
    }

    /// Local outline, or `None` for pixel shapes
    pub fn path(&self) -> Option<Path> {
        let path = match self {
            Shape::Rect { width, height } | Shape::Clear { width, height } => {
                Path::rect(&BoundingBox::centered(*width, *height))
            }
            Shape::RoundRect {
                width,
                height,
                radius,
            } => round_rect_path(*width, *height, *radius),
            Shape::Ellipse { radius_x, radius_y } => {
                let mut path = Path::new();
                path.ellipse(Point::default(), *radius_x, *radius_y, 0.0, TAU)
                    .close();
                path
            }
            Shape::Arc {
                radius_x,
                radius_y,
                start_angle,
                angle_offset,
            } => {
                let mut path = Path::new();
                path.move_to(Point::default())
                    .ellipse(
                        Point::default(),
                        *radius_x,
                        *radius_y,
                        *start_angle,
                        start_angle + angle_offset,
                    )
                    .close();
                path
            }
            Shape::RegularPolygon {
                radius,
                number_of_sides,
            } => Path::polygon(&regular_polygon_points(*radius, *number_of_sides)),
            Shape::Segment {
                start,
                end,
                start_radius,
                end_radius,
                start_cap,
                end_cap,
            } => segment_path(*start, *end, *start_radius, *end_radius, *start_cap, *end_cap),
            Shape::Polygon { points } => Path::polygon(points),
            Shape::Wireframe { points, edges } => {
                let mut path = Path::new();
                for edge in edges {
                    if let (Some(a), Some(b)) =
                        (points.get(edge.start as usize), points.get(edge.end as usize))
                    {
                        path.move_to(*a).line_to(*b);
                    }
                }
                path
            }
            Shape::Curves {
                start,
                curves,
                closed,
            } => {
                let mut path = Path::new();
                path.move_to(*start);
                for (kind, points) in curves {
                    match (kind, points.as_slice()) {
                        (CurveKind::Segment, [end]) => path.line_to(*end),
                        (CurveKind::Quadratic, [c, end]) => path.quad_to(*c, *end),
                        (CurveKind::Cubic, [c1, c2, end]) => path.cubic_to(*c1, *c2, *end),
                        _ => &mut path,
                    };
                }
                if *closed {
                    path.close();
                }
                path
            }
            Shape::Bitmap { .. } => return None,
        };
        Some(path)
    }
}

/// Vertices of a regular polygon, the first on the positive x axis
pub fn regular_polygon_points(radius: f32, number_of_sides: u8) -> Vec<Point> {
    let step = TAU / number_of_sides as f32;
    (0..number_of_sides)
        .map(|i| {
            let (sin, cos) = (i as f32 * step).sin_cos();
            Point::new(radius * cos, radius * sin)
        })
        .collect()
}

fn round_rect_path(width: f32, height: f32, radius: f32) -> Path {
    let b = BoundingBox::centered(width, height);
    let r = radius.min(width / 2.0).min(height / 2.0).max(0.0);
    let mut path = Path::new();
    path.move_to(Point::new(b.x + r, b.y))
        .line_to(Point::new(b.right() - r, b.y))
        .arc(Point::new(b.right() - r, b.y + r), r, -FRAC_PI_2, 0.0)
        .line_to(Point::new(b.right(), b.bottom() - r))
        .arc(Point::new(b.right() - r, b.bottom() - r), r, 0.0, FRAC_PI_2)
        .line_to(Point::new(b.x + r, b.bottom()))
        .arc(Point::new(b.x + r, b.bottom() - r), r, FRAC_PI_2, PI)
        .line_to(Point::new(b.x, b.y + r))
        .arc(Point::new(b.x + r, b.y + r), r, PI, PI + FRAC_PI_2)
        .close();
    path
}

fn segment_path(
    start: Point,
    end: Point,
    r0: f32,
    r1: f32,
    start_cap: SegmentCap,
    end_cap: SegmentCap,
) -> Path {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let len = (dx * dx + dy * dy).sqrt();
    let mut path = Path::new();
    if len == 0.0 {
        return path;
    }
    // Unit normal, a quarter turn from the direction
    let (nx, ny) = (-dy / len, dx / len);
    let normal_angle = ny.atan2(nx);
    let offset = |p: Point, r: f32| Point::new(p.x + nx * r, p.y + ny * r);

    path.move_to(offset(start, r0)).line_to(offset(end, r1));
    match end_cap {
        SegmentCap::Round => path.arc(end, r1, normal_angle, normal_angle - PI),
        SegmentCap::Flat => path.line_to(offset(end, -r1)),
    };
    path.line_to(offset(start, -r0));
    if start_cap == SegmentCap::Round {
        path.arc(start, r0, normal_angle - PI, normal_angle - TAU);
    }
    path.close();
    path
}

/// Geometry of a rect or round rect
pub fn rect(offset: Point, width: f32, height: f32, state: &ContextState) -> DrawGeometry {
    let pad = outer_padding(state.line_width);
    DrawGeometry::aligned(offset, width, height, pad, state, true)
}

/// Geometry of a circle or circular arc
pub fn circle(offset: Point, radius: f32, state: &ContextState) -> DrawGeometry {
    let pad = outer_padding(state.line_width);
    let diameter = 2.0 * radius;
    DrawGeometry::aligned(offset, diameter, diameter, pad, state, false)
}

/// Geometry of an ellipse or elliptical arc
pub fn ellipse(offset: Point, radius_x: f32, radius_y: f32, state: &ContextState) -> DrawGeometry {
    let pad = outer_padding(state.line_width);
    DrawGeometry::aligned(offset, 2.0 * radius_x, 2.0 * radius_y, pad, state, true)
}

/// Geometry of a regular polygon
///
/// The padding grows by `1 / cos(π / n)` so the stroke at each vertex tip
/// stays inside the box.
pub fn regular_polygon(
    offset: Point,
    radius: f32,
    number_of_sides: u8,
    state: &ContextState,
) -> Result<DrawGeometry, GeometryError> {
    if number_of_sides < 3 {
        return Err(GeometryError::TooFewSides);
    }
    let shape_factor = 1.0 / (PI / number_of_sides as f32).cos();
    let pad = (outer_padding(state.line_width) * shape_factor).ceil();
    let diameter = 2.0 * radius;
    Ok(DrawGeometry::aligned(offset, diameter, diameter, pad, state, false))
}

/// Geometry and local outline of one segment
///
/// Segments ignore the context rotation. Their local frame sits at the
/// middle of the cap-extended segment with the segment running along +y.
pub fn segment(
    start: Point,
    end: Point,
    state: &ContextState,
) -> Result<(DrawGeometry, Shape), GeometryError> {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return Err(GeometryError::ZeroLengthSegment);
    }
    let pad = outer_padding(state.line_width);
    let r0 = state.segment_start_radius as f32;
    let r1 = state.segment_end_radius as f32;
    let cap_extension = |cap: SegmentCap, r: f32| match cap {
        SegmentCap::Round => r + pad,
        SegmentCap::Flat => pad,
    };
    let start_ext = cap_extension(state.segment_start_cap, r0);
    let end_ext = cap_extension(state.segment_end_cap, r1);
    let (ux, uy) = (dx / len, dy / len);

    let extended_start = Point::new(start.x - ux * start_ext, start.y - uy * start_ext);
    let extended_end = Point::new(end.x + ux * end_ext, end.y + uy * end_ext);
    let midpoint = Point::new(
        (extended_start.x + extended_end.x) / 2.0,
        (extended_start.y + extended_end.y) / 2.0,
    );
    let rotation = dy.atan2(dx) - FRAC_PI_2;

    let start_box = BoundingBox::new(start.x, start.y, 0.0, 0.0).pad(r0 + pad);
    let end_box = BoundingBox::new(end.x, end.y, 0.0, 0.0).pad(r1 + pad);
    let world_box = start_box.union(&end_box);

    let length = len + start_ext + end_ext;
    let width = (r0.max(r1) + pad) * 2.0;
    let local_box = BoundingBox::centered(width, length);

    let to_local = |p: Point| rotate_point(Point::new(p.x - midpoint.x, p.y - midpoint.y), -rotation);

    let geometry = DrawGeometry {
        world_box,
        crop: crop_rect(&world_box, &state.crop),
        frame: LocalFrame {
            origin: midpoint,
            rotation,
        },
        local_box,
        rotation_crop: crop_rect(&local_box, &state.rotation_crop),
    };
    let shape = Shape::Segment {
        start: to_local(start),
        end: to_local(end),
        start_radius: r0,
        end_radius: r1,
        start_cap: state.segment_start_cap,
        end_cap: state.segment_end_cap,
    };
    Ok((geometry, shape))
}

/// Geometry for point primitives, rotated about the center of their hull
///
/// Returns the geometry and the points moved into the local frame.
pub fn points(
    points: &[Point],
    min_points: usize,
    state: &ContextState,
) -> Result<(DrawGeometry, Vec<Point>), GeometryError> {
    if points.len() < min_points {
        return Err(GeometryError::TooFewPoints);
    }
    let hull = BoundingBox::from_points(points).ok_or(GeometryError::TooFewPoints)?;
    let placed = hull.pad(outer_padding(state.line_width));
    let center = placed.center();
    let local = points
        .iter()
        .map(|p| Point::new(p.x - center.x, p.y - center.y))
        .collect();
    Ok((DrawGeometry::framed(placed, state.rotation, state, true), local))
}

/// Geometry and local outline of a path
///
/// The first curve carries its start point; every later curve starts where
/// the previous one ended.
pub fn path(
    curves: &[Curve],
    closed: bool,
    state: &ContextState,
) -> Result<(DrawGeometry, Shape), GeometryError> {
    if !eidolon_protocol::codec::is_valid_path(curves) {
        return Err(GeometryError::InvalidPath);
    }
    let all: Vec<Point> = curves
        .iter()
        .flat_map(|c| c.control_points.iter().copied())
        .collect();
    let (geometry, local) = points(&all, 2, state)?;

    let mut cursor = local.iter().copied();
    let start = cursor.next().ok_or(GeometryError::InvalidPath)?;
    let mut chain = Vec::with_capacity(curves.len());
    for curve in curves {
        // Start points are shared with the previous curve
        let count = curve.kind.control_points() - 1;
        let points: Vec<Point> = cursor.by_ref().take(count).collect();
        chain.push((curve.kind, points));
    }
    let shape = Shape::Curves {
        start,
        curves: chain,
        closed,
    };
    Ok((geometry, shape))
}

/// Geometry and outline of a chain of same-kind bezier curves
pub fn bezier_chain(
    kind: CurveKind,
    control_points: &[Point],
    state: &ContextState,
) -> Result<(DrawGeometry, Shape), GeometryError> {
    if !eidolon_protocol::codec::is_valid_curve_chain(kind, control_points.len()) {
        return Err(GeometryError::InvalidPath);
    }
    let (geometry, local) = points(control_points, 2, state)?;
    let step = kind.control_points() - 1;
    let curves = local[1..]
        .chunks(step)
        .map(|chunk| (kind, chunk.to_vec()))
        .collect();
    let shape = Shape::Curves {
        start: local[0],
        curves,
        closed: false,
    };
    Ok((geometry, shape))
}

/// Geometry of a bitmap scaled by the bitmap scale
pub fn bitmap(offset: Point, bitmap: &Bitmap, state: &ContextState) -> DrawGeometry {
    let width = bitmap.width as f32 * state.bitmap_scale_x.abs();
    let height = bitmap.height as f32 * state.bitmap_scale_y.abs();
    DrawGeometry::aligned(offset, width, height, 0.0, state, true)
}

/// Geometry of a sprite scaled by the sprite scale
pub fn sprite(offset: Point, width: u16, height: u16, state: &ContextState) -> DrawGeometry {
    let width = width as f32 * state.sprite_scale_x.abs();
    let height = height as f32 * state.sprite_scale_y.abs();
    DrawGeometry::aligned(offset, width, height, 0.0, state, true)
}

/// Geometry of a background clear; unaligned and unrotated
pub fn clear_rect(x: f32, y: f32, width: f32, height: f32) -> DrawGeometry {
    let placed = BoundingBox::new(x, y, width, height);
    DrawGeometry {
        world_box: placed,
        crop: None,
        frame: LocalFrame {
            origin: placed.center(),
            rotation: 0.0,
        },
        local_box: BoundingBox::centered(width, height),
        rotation_crop: None,
    }
}
