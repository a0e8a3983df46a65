//! Draw primitives
//!
//! A draw computes all of its geometry first. Only when every piece is
//! valid does it encode, record into the pending queue and send.

use log::{trace, warn};

use eidolon_protocol::codec::is_valid_wireframe;
use eidolon_protocol::{Bitmap, Command, Curve, CurveKind, Point, Wireframe};

use crate::error::{EngineError, GeometryError};
use crate::geometry::{shapes, DrawGeometry, Shape};
use crate::queue::{DrawEntry, DrawStyle};
use crate::traits::{RasterizationBackend, Transport};

use super::Engine;

fn offset(x: i16, y: i16) -> Point {
    Point::new(x as f32, y as f32)
}

fn checked<V>(result: Result<V, GeometryError>) -> Result<V, EngineError> {
    result.map_err(|e| {
        warn!("Rejected draw: {:?}", e);
        EngineError::InvalidGeometry(e)
    })
}

fn check_angles(start_angle: f32, angle_offset: f32) -> Result<(), EngineError> {
    if start_angle.is_finite() && angle_offset.is_finite() {
        Ok(())
    } else {
        warn!("Arc angles {} + {} are not finite", start_angle, angle_offset);
        Err(EngineError::InvalidValue)
    }
}

impl<'ch, B: RasterizationBackend, T: Transport> Engine<'ch, B, T> {
    /// Encode `command`, record its shapes and send it
    pub(super) fn record(
        &mut self,
        command: Command,
        shapes: Vec<(DrawGeometry, Shape)>,
        flush: bool,
    ) -> Result<(), EngineError> {
        let bytes = self.encode(&command)?;
        let state = self.helper.state();
        let color_map = if self.in_sprite() {
            Some(state.sprite_color_indices.as_slice())
        } else {
            None
        };
        let style = DrawStyle::from_state(state, color_map);
        let chain = self.sprites.frames();
        // A clearRect already clears its own box
        let clear_box = self.config.clear_box_on_draw
            && !self.in_sprite()
            && !matches!(command, Command::ClearRect { .. });
        trace!("Recording {:?} ({} shapes)", command.tag(), shapes.len());
        self.queue.record_all(shapes.into_iter().map(|(geometry, shape)| DrawEntry {
            chain: chain.clone(),
            geometry,
            shape,
            style: style.clone(),
            clear_box,
        }));
        self.send(bytes, flush)
    }

    /// Fill a rectangle with the background color
    ///
    /// The rectangle is neither aligned, rotated nor cropped.
    pub fn clear_rect(&mut self, x: i16, y: i16, width: u16, height: u16, flush: bool) -> Result<(), EngineError> {
        let command = Command::ClearRect {
            x,
            y,
            width,
            height,
        };
        self.check_allowed(command.tag())?;
        let geometry = shapes::clear_rect(x as f32, y as f32, width as f32, height as f32);
        let shape = Shape::Clear {
            width: width as f32,
            height: height as f32,
        };
        self.record(command, vec![(geometry, shape)], flush)
    }

    pub fn draw_rect(
        &mut self,
        offset_x: i16,
        offset_y: i16,
        width: u16,
        height: u16,
        flush: bool,
    ) -> Result<(), EngineError> {
        let command = Command::DrawRect {
            offset_x,
            offset_y,
            width,
            height,
        };
        self.check_allowed(command.tag())?;
        let (w, h) = (width as f32, height as f32);
        let geometry = shapes::rect(offset(offset_x, offset_y), w, h, self.helper.state());
        let shape = Shape::Rect { width: w, height: h };
        self.record(command, vec![(geometry, shape)], flush)
    }

    pub fn draw_round_rect(
        &mut self,
        offset_x: i16,
        offset_y: i16,
        width: u16,
        height: u16,
        border_radius: u8,
        flush: bool,
    ) -> Result<(), EngineError> {
        let command = Command::DrawRoundRect {
            offset_x,
            offset_y,
            width,
            height,
            border_radius,
        };
        self.check_allowed(command.tag())?;
        let (w, h) = (width as f32, height as f32);
        let geometry = shapes::rect(offset(offset_x, offset_y), w, h, self.helper.state());
        let shape = Shape::RoundRect {
            width: w,
            height: h,
            radius: border_radius as f32,
        };
        self.record(command, vec![(geometry, shape)], flush)
    }

    pub fn draw_circle(&mut self, offset_x: i16, offset_y: i16, radius: u16, flush: bool) -> Result<(), EngineError> {
        let command = Command::DrawCircle {
            offset_x,
            offset_y,
            radius,
        };
        self.check_allowed(command.tag())?;
        let r = radius as f32;
        let geometry = shapes::circle(offset(offset_x, offset_y), r, self.helper.state());
        let shape = Shape::Ellipse {
            radius_x: r,
            radius_y: r,
        };
        self.record(command, vec![(geometry, shape)], flush)
    }

    /// Draw a pie wedge; angles in radians
    pub fn draw_arc(
        &mut self,
        offset_x: i16,
        offset_y: i16,
        radius: u16,
        start_angle: f32,
        angle_offset: f32,
        flush: bool,
    ) -> Result<(), EngineError> {
        check_angles(start_angle, angle_offset)?;
        let command = Command::DrawArc {
            offset_x,
            offset_y,
            radius,
            start_angle,
            angle_offset,
        };
        self.check_allowed(command.tag())?;
        let r = radius as f32;
        let geometry = shapes::circle(offset(offset_x, offset_y), r, self.helper.state());
        let shape = Shape::Arc {
            radius_x: r,
            radius_y: r,
            start_angle,
            angle_offset,
        };
        self.record(command, vec![(geometry, shape)], flush)
    }

    pub fn draw_ellipse(
        &mut self,
        offset_x: i16,
        offset_y: i16,
        radius_x: u16,
        radius_y: u16,
        flush: bool,
    ) -> Result<(), EngineError> {
        let command = Command::DrawEllipse {
            offset_x,
            offset_y,
            radius_x,
            radius_y,
        };
        self.check_allowed(command.tag())?;
        let (rx, ry) = (radius_x as f32, radius_y as f32);
        let geometry = shapes::ellipse(offset(offset_x, offset_y), rx, ry, self.helper.state());
        let shape = Shape::Ellipse {
            radius_x: rx,
            radius_y: ry,
        };
        self.record(command, vec![(geometry, shape)], flush)
    }

    /// Draw an elliptical pie wedge; angles in radians
    #[allow(clippy::too_many_arguments)]
    pub fn draw_arc_ellipse(
        &mut self,
        offset_x: i16,
        offset_y: i16,
        radius_x: u16,
        radius_y: u16,
        start_angle: f32,
        angle_offset: f32,
        flush: bool,
    ) -> Result<(), EngineError> {
        check_angles(start_angle, angle_offset)?;
        let command = Command::DrawArcEllipse {
            offset_x,
            offset_y,
            radius_x,
            radius_y,
            start_angle,
            angle_offset,
        };
        self.check_allowed(command.tag())?;
        let (rx, ry) = (radius_x as f32, radius_y as f32);
        let geometry = shapes::ellipse(offset(offset_x, offset_y), rx, ry, self.helper.state());
        let shape = Shape::Arc {
            radius_x: rx,
            radius_y: ry,
            start_angle,
            angle_offset,
        };
        self.record(command, vec![(geometry, shape)], flush)
    }

    pub fn draw_segment(
        &mut self,
        start_x: i16,
        start_y: i16,
        end_x: i16,
        end_y: i16,
        flush: bool,
    ) -> Result<(), EngineError> {
        let command = Command::DrawSegment {
            start_x,
            start_y,
            end_x,
            end_y,
        };
        self.check_allowed(command.tag())?;
        let segment = checked(shapes::segment(
            offset(start_x, start_y),
            offset(end_x, end_y),
            self.helper.state(),
        ))?;
        self.record(command, vec![segment], flush)
    }

    /// Draw consecutive segments through `points`
    pub fn draw_segments(&mut self, points: &[Point], flush: bool) -> Result<(), EngineError> {
        let command = Command::DrawSegments {
            points: points.to_vec(),
        };
        self.check_allowed(command.tag())?;
        if points.len() < 2 {
            return checked(Err(GeometryError::TooFewPoints));
        }
        let state = self.helper.state();
        let segments = points
            .windows(2)
            .map(|pair| checked(shapes::segment(pair[0], pair[1], state)))
            .collect::<Result<Vec<_>, _>>()?;
        self.record(command, segments, flush)
    }

    pub fn draw_regular_polygon(
        &mut self,
        offset_x: i16,
        offset_y: i16,
        radius: u16,
        number_of_sides: u8,
        flush: bool,
    ) -> Result<(), EngineError> {
        let command = Command::DrawRegularPolygon {
            offset_x,
            offset_y,
            radius,
            number_of_sides,
        };
        self.check_allowed(command.tag())?;
        let r = radius as f32;
        let geometry = checked(shapes::regular_polygon(
            offset(offset_x, offset_y),
            r,
            number_of_sides,
            self.helper.state(),
        ))?;
        let shape = Shape::RegularPolygon {
            radius: r,
            number_of_sides,
        };
        self.record(command, vec![(geometry, shape)], flush)
    }

    pub fn draw_polygon(&mut self, points: &[Point], flush: bool) -> Result<(), EngineError> {
        let command = Command::DrawPolygon {
            points: points.to_vec(),
        };
        self.check_allowed(command.tag())?;
        let (geometry, local) = checked(shapes::points(points, 2, self.helper.state()))?;
        let shape = Shape::Polygon { points: local };
        self.record(command, vec![(geometry, shape)], flush)
    }

    /// Stroke the edges of a wireframe; wireframes are never filled
    pub fn draw_wireframe(&mut self, wireframe: &Wireframe, flush: bool) -> Result<(), EngineError> {
        let command = Command::DrawWireframe(wireframe.clone());
        self.check_allowed(command.tag())?;
        if !is_valid_wireframe(wireframe) {
            warn!(
                "Invalid wireframe: {} points, {} edges",
                wireframe.points.len(),
                wireframe.edges.len()
            );
            return Err(EngineError::InvalidValue);
        }
        let (geometry, local) = checked(shapes::points(&wireframe.points, 2, self.helper.state()))?;
        let shape = Shape::Wireframe {
            points: local,
            edges: wireframe.edges.clone(),
        };
        self.record(command, vec![(geometry, shape)], flush)
    }

    /// Draw one quadratic or cubic curve
    pub fn draw_bezier_curve(
        &mut self,
        kind: CurveKind,
        control_points: &[Point],
        flush: bool,
    ) -> Result<(), EngineError> {
        check_bezier_kind(kind)?;
        if control_points.len() != kind.control_points() {
            return checked(Err(GeometryError::InvalidPath));
        }
        let command = Command::DrawBezierCurve {
            kind,
            control_points: control_points.to_vec(),
        };
        self.check_allowed(command.tag())?;
        let curve = checked(shapes::bezier_chain(kind, control_points, self.helper.state()))?;
        self.record(command, vec![curve], flush)
    }

    /// Draw a chain of same-kind curves sharing end points
    pub fn draw_bezier_curves(
        &mut self,
        kind: CurveKind,
        control_points: &[Point],
        flush: bool,
    ) -> Result<(), EngineError> {
        check_bezier_kind(kind)?;
        let command = Command::DrawBezierCurves {
            kind,
            control_points: control_points.to_vec(),
        };
        self.check_allowed(command.tag())?;
        let chain = checked(shapes::bezier_chain(kind, control_points, self.helper.state()))?;
        self.record(command, vec![chain], flush)
    }

    /// Draw a path of mixed curves, filled only when `closed`
    pub fn draw_path(&mut self, curves: &[Curve], closed: bool, flush: bool) -> Result<(), EngineError> {
        let command = Command::DrawPath {
            closed,
            curves: curves.to_vec(),
        };
        self.check_allowed(command.tag())?;
        let path = checked(shapes::path(curves, closed, self.helper.state()))?;
        self.record(command, vec![path], flush)
    }

    /// Draw a bitmap through the bitmap color table
    pub fn draw_bitmap(&mut self, offset_x: i16, offset_y: i16, bitmap: &Bitmap, flush: bool) -> Result<(), EngineError> {
        let state = self.helper.state();
        if !bitmap.is_valid() || bitmap.number_of_colors > state.number_of_colors() {
            warn!(
                "Invalid {}x{} bitmap of {} colors with {} pixels",
                bitmap.width,
                bitmap.height,
                bitmap.number_of_colors,
                bitmap.pixels.len()
            );
            return Err(EngineError::InvalidValue);
        }
        let command = Command::DrawBitmap {
            offset_x,
            offset_y,
            bitmap: bitmap.clone(),
        };
        self.check_allowed(command.tag())?;
        let state = self.helper.state();
        let geometry = shapes::bitmap(offset(offset_x, offset_y), bitmap, state);
        let shape = Shape::Bitmap {
            bitmap: bitmap.clone(),
            scale_x: state.bitmap_scale_x,
            scale_y: state.bitmap_scale_y,
        };
        self.record(command, vec![(geometry, shape)], flush)
    }
}

fn check_bezier_kind(kind: CurveKind) -> Result<(), EngineError> {
    if kind == CurveKind::Segment {
        warn!("Bezier curves must be quadratic or cubic");
        return Err(EngineError::InvalidValue);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{connected_engine, context_bytes};
    use super::*;
    use eidolon_protocol::{CommandTag, Rgb, WireframeEdge};

    use crate::geometry::BoundingBox;

    #[test]
    fn test_draw_records_and_sends() {
        let mut engine = connected_engine();
        engine.draw_circle(50, 50, 10, true).unwrap();
        assert_eq!(engine.queue().pending().len(), 1);
        let sent = context_bytes(&engine);
        assert_eq!(sent[0], CommandTag::DrawCircle.to_byte());

        let entry = &engine.queue().pending()[0];
        assert!(entry.clear_box);
        assert!(entry.chain.is_empty());
        assert_eq!(entry.geometry.world_box, BoundingBox::new(40.0, 40.0, 20.0, 20.0));
    }

    #[test]
    fn test_clear_rect_skips_extra_clear_box() {
        let mut engine = connected_engine();
        engine.clear_rect(0, 0, 20, 10, false).unwrap();
        engine.draw_rect(10, 10, 4, 4, false).unwrap();
        let pending = engine.queue().pending();
        assert!(!pending[0].clear_box);
        assert!(pending[1].clear_box);
    }

    #[test]
    fn test_style_snapshot_is_taken_at_record_time() {
        let mut engine = connected_engine();
        engine.select_fill_color(2, false).unwrap();
        engine.draw_rect(0, 0, 10, 10, false).unwrap();
        engine.select_fill_color(3, false).unwrap();
        assert_eq!(engine.queue().pending()[0].style.fill, Some(2));
    }

    #[test]
    fn test_zero_length_segment_rejected() {
        let mut engine = connected_engine();
        assert_eq!(
            engine.draw_segment(5, 5, 5, 5, true),
            Err(EngineError::InvalidGeometry(GeometryError::ZeroLengthSegment))
        );
        assert!(engine.queue().pending().is_empty());
        assert!(context_bytes(&engine).is_empty());
    }

    #[test]
    fn test_segments_checked_as_a_whole() {
        let mut engine = connected_engine();
        let points = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 0.0)];
        assert!(engine.draw_segments(&points, true).is_err());
        assert!(engine.queue().pending().is_empty());

        let points = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        engine.draw_segments(&points, true).unwrap();
        assert_eq!(engine.queue().pending().len(), 2);
    }

    #[test]
    fn test_polygon_needs_three_sides() {
        let mut engine = connected_engine();
        assert_eq!(
            engine.draw_regular_polygon(10, 10, 5, 2, true),
            Err(EngineError::InvalidGeometry(GeometryError::TooFewSides))
        );
        engine.draw_regular_polygon(10, 10, 5, 6, true).unwrap();
    }

    #[test]
    fn test_wireframe_edges_must_reference_points() {
        let mut engine = connected_engine();
        let wireframe = Wireframe {
            points: vec![Point::new(0.0, 0.0), Point::new(4.0, 4.0)],
            edges: vec![WireframeEdge { start: 0, end: 2 }],
        };
        assert_eq!(engine.draw_wireframe(&wireframe, true), Err(EngineError::InvalidValue));
    }

    #[test]
    fn test_bezier_curve_point_count() {
        let mut engine = connected_engine();
        let points = [Point::new(0.0, 0.0), Point::new(5.0, 9.0), Point::new(10.0, 0.0)];
        engine.draw_bezier_curve(CurveKind::Quadratic, &points, true).unwrap();
        assert_eq!(
            engine.draw_bezier_curve(CurveKind::Cubic, &points, true),
            Err(EngineError::InvalidGeometry(GeometryError::InvalidPath))
        );
        assert_eq!(
            engine.draw_bezier_curve(CurveKind::Segment, &points[..2], true),
            Err(EngineError::InvalidValue)
        );
    }

    #[test]
    fn test_bitmap_colors_bounded_by_table() {
        let mut engine = connected_engine();
        let bitmap = Bitmap {
            width: 2,
            height: 2,
            number_of_colors: 2,
            pixels: vec![0, 1, 1, 2],
        };
        assert_eq!(engine.draw_bitmap(0, 0, &bitmap, true), Err(EngineError::InvalidValue));

        let bitmap = Bitmap {
            pixels: vec![0, 1, 1, 0],
            ..bitmap
        };
        engine.draw_bitmap(0, 0, &bitmap, true).unwrap();
        assert_eq!(engine.queue().pending().len(), 1);
    }

    #[test]
    fn test_clear_rect_ignores_alignment() {
        let mut engine = connected_engine();
        engine.clear_rect(4, 6, 10, 8, true).unwrap();
        let entry = &engine.queue().pending()[0];
        assert_eq!(entry.geometry.world_box, BoundingBox::new(4.0, 6.0, 10.0, 8.0));
    }

    #[test]
    fn test_show_replays_committed_frame() {
        let mut engine = connected_engine();
        engine.set_color(1, Rgb::new(255, 0, 0), false).unwrap();
        engine.draw_circle(50, 50, 10, false).unwrap();
        engine.show().unwrap();
        assert_eq!(engine.queue().committed().len(), 1);
        assert!(engine.queue().pending().is_empty());
        assert_eq!(engine.backend().fills.last().map(|p| p.color), Some(Rgb::new(255, 0, 0)));
    }
}
