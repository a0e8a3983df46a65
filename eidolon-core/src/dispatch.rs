//! Command dispatch
//!
//! Runs [`Command`] values against an [`Engine`] exactly as the matching
//! API call would. Sprite programs replay through here, and hosts can feed
//! decoded command streams through it too.

use log::{debug, warn};

use eidolon_protocol::{Command, CommandDecoder, Instruction};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::traits::{RasterizationBackend, Transport};

/// Run one command
pub fn run_command<B, T>(engine: &mut Engine<'_, B, T>, command: &Command, flush: bool) -> Result<(), EngineError>
where
    B: RasterizationBackend,
    T: Transport,
{
    match command {
        Command::Show => engine.show(),
        Command::Clear => engine.clear(),

        Command::SetColor { color_index, color } => engine.set_color(*color_index, *color, flush),
        Command::SetColorOpacity {
            color_index,
            opacity,
        } => engine.set_color_opacity(*color_index, *opacity, flush),
        Command::SetOpacity { opacity } => engine.set_opacity(*opacity, flush),

        Command::SaveContext => engine.save_context(flush),
        Command::RestoreContext => engine.restore_context(flush),

        Command::SelectBackgroundColor { color_index } => {
            engine.select_background_color(*color_index, flush)
        }
        Command::SelectFillColor { color_index } => engine.select_fill_color(*color_index, flush),
        Command::SelectLineColor { color_index } => engine.select_line_color(*color_index, flush),

        Command::SetIgnoreFill(value) => engine.set_ignore_fill(*value, flush),
        Command::SetIgnoreLine(value) => engine.set_ignore_line(*value, flush),
        Command::SetFillBackground(value) => engine.set_fill_background(*value, flush),

        Command::SetLineWidth { line_width } => engine.set_line_width(*line_width, flush),
        Command::SetRotation { rotation } => engine.set_rotation(*rotation, flush),
        Command::ClearRotation => engine.clear_rotation(flush),

        Command::SetHorizontalAlignment(alignment) => {
            engine.set_horizontal_alignment(*alignment, flush)
        }
        Command::SetVerticalAlignment(alignment) => engine.set_vertical_alignment(*alignment, flush),
        Command::ResetAlignment => engine.reset_alignment(flush),

        Command::SetSegmentStartCap(cap) => engine.set_segment_start_cap(*cap, flush),
        Command::SetSegmentEndCap(cap) => engine.set_segment_end_cap(*cap, flush),
        Command::SetSegmentCap(cap) => engine.set_segment_cap(*cap, flush),
        Command::SetSegmentStartRadius(radius) => engine.set_segment_start_radius(*radius, flush),
        Command::SetSegmentEndRadius(radius) => engine.set_segment_end_radius(*radius, flush),
        Command::SetSegmentRadius(radius) => engine.set_segment_radius(*radius, flush),

        Command::SetCrop { side, crop } => engine.set_crop(*side, *crop, flush),
        Command::ClearCrop => engine.clear_crop(flush),
        Command::SetRotationCrop { side, crop } => engine.set_rotation_crop(*side, *crop, flush),
        Command::ClearRotationCrop => engine.clear_rotation_crop(flush),

        Command::SelectBitmapColor(pair) => engine.select_bitmap_color(pair.from, pair.to, flush),
        Command::SelectBitmapColors(pairs) => engine.select_bitmap_colors(pairs, flush),
        Command::SetBitmapScale { axis, scale } => engine.set_bitmap_scale(*axis, *scale, flush),
        Command::ResetBitmapScale => engine.reset_bitmap_scale(flush),

        Command::SelectSpriteColor(pair) => engine.select_sprite_color(pair.from, pair.to, flush),
        Command::SelectSpriteColors(pairs) => engine.select_sprite_colors(pairs, flush),
        Command::ResetSpriteColors => engine.reset_sprite_colors(flush),
        Command::SetSpriteScale { axis, scale } => engine.set_sprite_scale(*axis, *scale, flush),
        Command::ResetSpriteScale => engine.reset_sprite_scale(flush),

        Command::SetSpritesLineHeight(height) => engine.set_sprites_line_height(*height, flush),
        Command::SetSpritesDirection(direction) => engine.set_sprites_direction(*direction, flush),
        Command::SetSpritesLineDirection(direction) => {
            engine.set_sprites_line_direction(*direction, flush)
        }
        Command::SetSpritesSpacing(spacing) => engine.set_sprites_spacing(*spacing, flush),
        Command::SetSpritesLineSpacing(spacing) => engine.set_sprites_line_spacing(*spacing, flush),
        Command::SetSpritesAlignment(alignment) => engine.set_sprites_alignment(*alignment, flush),
        Command::SetSpritesLineAlignment(alignment) => {
            engine.set_sprites_line_alignment(*alignment, flush)
        }

        Command::ClearRect {
            x,
            y,
            width,
            height,
        } => engine.clear_rect(*x, *y, *width, *height, flush),
        Command::DrawRect {
            offset_x,
            offset_y,
            width,
            height,
        } => engine.draw_rect(*offset_x, *offset_y, *width, *height, flush),
        Command::DrawRoundRect {
            offset_x,
            offset_y,
            width,
            height,
            border_radius,
        } => engine.draw_round_rect(*offset_x, *offset_y, *width, *height, *border_radius, flush),
        Command::DrawCircle {
            offset_x,
            offset_y,
            radius,
        } => engine.draw_circle(*offset_x, *offset_y, *radius, flush),
        Command::DrawArc {
            offset_x,
            offset_y,
            radius,
            start_angle,
            angle_offset,
        } => engine.draw_arc(*offset_x, *offset_y, *radius, *start_angle, *angle_offset, flush),
        Command::DrawEllipse {
            offset_x,
            offset_y,
            radius_x,
            radius_y,
        } => engine.draw_ellipse(*offset_x, *offset_y, *radius_x, *radius_y, flush),
        Command::DrawArcEllipse {
            offset_x,
            offset_y,
            radius_x,
            radius_y,
            start_angle,
            angle_offset,
        } => engine.draw_arc_ellipse(
            *offset_x,
            *offset_y,
            *radius_x,
            *radius_y,
            *start_angle,
            *angle_offset,
            flush,
        ),
        Command::DrawSegment {
            start_x,
            start_y,
            end_x,
            end_y,
        } => engine.draw_segment(*start_x, *start_y, *end_x, *end_y, flush),
        Command::DrawSegments { points } => engine.draw_segments(points, flush),
        Command::DrawRegularPolygon {
            offset_x,
            offset_y,
            radius,
            number_of_sides,
        } => engine.draw_regular_polygon(*offset_x, *offset_y, *radius, *number_of_sides, flush),
        Command::DrawPolygon { points } => engine.draw_polygon(points, flush),
        Command::DrawWireframe(wireframe) => engine.draw_wireframe(wireframe, flush),
        Command::DrawBezierCurve {
            kind,
            control_points,
        } => engine.draw_bezier_curve(*kind, control_points, flush),
        Command::DrawBezierCurves {
            kind,
            control_points,
        } => engine.draw_bezier_curves(*kind, control_points, flush),
        Command::DrawPath { closed, curves } => engine.draw_path(curves, *closed, flush),

        Command::DrawBitmap {
            offset_x,
            offset_y,
            bitmap,
        } => engine.draw_bitmap(*offset_x, *offset_y, bitmap, flush),

        Command::SelectSpriteSheet { name } => engine.select_sprite_sheet(name, flush),
        Command::DrawSprite {
            offset_x,
            offset_y,
            name,
        } => engine.draw_sprite(*offset_x, *offset_y, name, flush),
        Command::DrawSprites {
            offset_x,
            offset_y,
            lines,
        } => engine.draw_sprites(*offset_x, *offset_y, lines, flush),
    }
}

/// Run one stored instruction, skipping it when hidden
pub fn run_instruction<B, T>(
    engine: &mut Engine<'_, B, T>,
    instruction: &Instruction,
    flush: bool,
) -> Result<(), EngineError>
where
    B: RasterizationBackend,
    T: Transport,
{
    if instruction.hide {
        return Ok(());
    }
    run_command(engine, &instruction.command, flush)
}

/// Run a list of commands with a single flush at the end
///
/// Stops at the first failure; commands before it stay applied.
pub fn run_commands<'c, B, T, I>(engine: &mut Engine<'_, B, T>, commands: I) -> Result<(), EngineError>
where
    B: RasterizationBackend,
    T: Transport,
    I: IntoIterator<Item = &'c Command>,
{
    let mut count = 0;
    for command in commands {
        if let Err(e) = run_command(engine, command, false) {
            warn!("Command {} ({:?}) failed: {:?}", count, command.tag(), e);
            return Err(e);
        }
        count += 1;
    }
    debug!("Ran {} commands", count);
    engine.flush()
}

/// Decode an encoded command stream and run it
///
/// The stream is decoded in full before anything runs, so a malformed
/// stream changes nothing.
pub fn run_command_bytes<B, T>(engine: &mut Engine<'_, B, T>, bytes: &[u8]) -> Result<(), EngineError>
where
    B: RasterizationBackend,
    T: Transport,
{
    let selected = engine.state().sprite_sheet_name.clone();
    let commands = CommandDecoder::new(engine.sprite_sheets())
        .with_sprite_sheet(selected.as_deref())
        .decode_all(bytes)
        .map_err(|e| {
            warn!("Failed to decode {} command bytes: {:?}", bytes.len(), e);
            EngineError::from(e)
        })?;
    run_commands(engine, &commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidolon_protocol::{CommandEncoder, NoSprites, Point, Rgb};

    use crate::config::EngineConfig;
    use crate::geometry::BoundingBox;
    use crate::traits::{Paint, Path, TransportError};
    use eidolon_protocol::Frame;

    struct Nothing;

    impl RasterizationBackend for Nothing {
        fn save(&mut self) {}
        fn restore(&mut self) {}
        fn translate(&mut self, _x: f32, _y: f32) {}
        fn rotate(&mut self, _radians: f32) {}
        fn scale(&mut self, _x: f32, _y: f32) {}
        fn clip_rect(&mut self, _rect: &BoundingBox) {}
        fn clear_rect(&mut self, _rect: &BoundingBox, _background: Paint) {}
        fn fill_path(&mut self, _path: &Path, _paint: Paint) {}
        fn stroke_path(&mut self, _path: &Path, _paint: Paint, _width: f32) {}
        fn blit(&mut self, _x: f32, _y: f32, _width: u16, _pixels: &[Option<Paint>]) {}
    }

    #[derive(Default)]
    struct Frames(Vec<Frame>);

    impl Transport for Frames {
        fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
            self.0.push(frame.clone());
            Ok(())
        }
    }

    fn engine() -> Engine<'static, Nothing, Frames> {
        Engine::new(EngineConfig::new(), Nothing)
            .unwrap()
            .with_transport(Frames::default())
    }

    #[test]
    fn test_run_commands_flushes_once() {
        let mut engine = engine();
        let commands = [
            Command::SelectFillColor { color_index: 2 },
            Command::SetLineWidth { line_width: 3 },
            Command::DrawCircle {
                offset_x: 10,
                offset_y: 10,
                radius: 4,
            },
        ];
        run_commands(&mut engine, &commands).unwrap();
        assert_eq!(engine.transport().unwrap().0.len(), 1);
        assert_eq!(engine.state().fill_color_index, 2);
        assert_eq!(engine.queue().pending().len(), 1);
    }

    #[test]
    fn test_hidden_instruction_skipped() {
        let mut engine = engine();
        let hidden = Instruction::hidden(Command::SelectFillColor { color_index: 4 });
        run_instruction(&mut engine, &hidden, true).unwrap();
        assert_eq!(engine.state().fill_color_index, 1);
        run_instruction(&mut engine, &hidden.command.clone().into(), true).unwrap();
        assert_eq!(engine.state().fill_color_index, 4);
    }

    #[test]
    fn test_run_command_bytes_matches_api() {
        let commands = vec![
            Command::SetColor {
                color_index: 1,
                color: Rgb::new(0, 255, 0),
            },
            Command::DrawPolygon {
                points: vec![Point::new(0.0, 0.0), Point::new(8.0, 0.0), Point::new(4.0, 6.0)],
            },
        ];
        let bytes = CommandEncoder::new(&NoSprites).encode_all(&commands).unwrap();

        let mut engine = engine();
        run_command_bytes(&mut engine, &bytes).unwrap();
        assert_eq!(engine.colors().color(1), Some(Rgb::new(0, 255, 0)));
        assert_eq!(engine.queue().pending().len(), 1);
        assert_eq!(engine.transport().unwrap().0[0].payload.as_slice(), bytes.as_slice());
    }

    #[test]
    fn test_malformed_bytes_change_nothing() {
        let mut engine = engine();
        assert!(run_command_bytes(&mut engine, &[8, 2, 200]).is_err());
        assert_eq!(engine.state().fill_color_index, 1);
        assert!(engine.transport().unwrap().0.is_empty());
    }
}
