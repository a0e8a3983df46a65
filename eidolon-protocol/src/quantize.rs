//! Fixed-point formats for angles, scales and opacities
//!
//! The device has no floating point unit, so every real-valued parameter
//! crosses the link as a scaled integer. Both sides must agree on these
//! conversions bit for bit.

use core::f32::consts::TAU;

/// Smallest bitmap or sprite scale
pub const MIN_SCALE: f32 = -50.0;

/// Largest bitmap or sprite scale
pub const MAX_SCALE: f32 = 50.0;

/// Resolution of a scale on the wire
pub const SCALE_STEP: f32 = 0.002;

/// Magnitude of a full-turn arc offset on the wire
pub const ANGLE_OFFSET_MAX: f32 = 32766.0;

/// `floor` without relying on the platform math library
pub fn floor(value: f32) -> f32 {
    let truncated = value as i64 as f32;
    if truncated > value {
        truncated - 1.0
    } else {
        truncated
    }
}

/// Round half away from zero
pub fn round(value: f32) -> f32 {
    if value < 0.0 {
        -floor(-value + 0.5)
    } else {
        floor(value + 0.5)
    }
}

/// Normalize an angle into `[0, 2π)`
pub fn normalize_radians(radians: f32) -> f32 {
    let normalized = radians - TAU * floor(radians / TAU);
    if normalized >= TAU || normalized < 0.0 {
        0.0
    } else {
        normalized
    }
}

/// Convert degrees to radians
pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * TAU / 360.0
}

/// Encode a rotation as a fraction of a full turn
pub fn rotation_to_u16(radians: f32) -> u16 {
    let turns = normalize_radians(radians) / TAU;
    floor(turns * u16::MAX as f32) as u16
}

/// Decode a rotation written by [`rotation_to_u16`]
pub fn rotation_from_u16(value: u16) -> f32 {
    value as f32 / u16::MAX as f32 * TAU
}

/// Clamp a scale into the supported range
pub fn clamp_scale(scale: f32) -> f32 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// Clamp and snap a scale to the wire resolution
pub fn round_scale(scale: f32) -> f32 {
    scale_from_i16(scale_to_i16(scale))
}

/// Encode a scale in units of [`SCALE_STEP`]
pub fn scale_to_i16(scale: f32) -> i16 {
    round(clamp_scale(scale) / SCALE_STEP) as i16
}

/// Decode a scale written by [`scale_to_i16`]
pub fn scale_from_i16(value: i16) -> f32 {
    value as f32 * SCALE_STEP
}

/// Encode a signed arc sweep, clamped to one turn either way
pub fn angle_offset_to_i16(radians: f32) -> i16 {
    let turns = radians.clamp(-TAU, TAU) / TAU;
    round(turns * ANGLE_OFFSET_MAX) as i16
}

/// Decode an arc sweep written by [`angle_offset_to_i16`]
pub fn angle_offset_from_i16(value: i16) -> f32 {
    value as f32 / ANGLE_OFFSET_MAX * TAU
}

/// Encode an opacity in `[0, 1]` as a byte
pub fn opacity_to_u8(opacity: f32) -> u8 {
    round(opacity.clamp(0.0, 1.0) * 255.0) as u8
}

/// Decode an opacity written by [`opacity_to_u8`]
pub fn opacity_from_u8(value: u8) -> f32 {
    value as f32 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    #[test]
    fn test_floor_and_round() {
        assert_eq!(floor(1.7), 1.0);
        assert_eq!(floor(-1.2), -2.0);
        assert_eq!(floor(3.0), 3.0);
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -3.0);
        assert_eq!(round(0.4), 0.0);
    }

    #[test]
    fn test_normalize_radians() {
        assert_eq!(normalize_radians(0.0), 0.0);
        assert!((normalize_radians(-PI / 2.0) - 3.0 * PI / 2.0).abs() < 1e-5);
        assert!((normalize_radians(5.0 * PI) - PI).abs() < 1e-4);
        assert_eq!(normalize_radians(TAU), 0.0);
    }

    #[test]
    fn test_rotation_format() {
        assert_eq!(rotation_to_u16(0.0), 0);
        assert_eq!(rotation_to_u16(PI), 32767);
        let decoded = rotation_from_u16(rotation_to_u16(PI / 3.0));
        assert!((decoded - PI / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_scale_format() {
        assert_eq!(scale_to_i16(1.0), 500);
        assert_eq!(scale_to_i16(-2.0), -1000);
        assert_eq!(scale_to_i16(80.0), 25000);
        assert_eq!(scale_to_i16(-80.0), -25000);
        assert!((round_scale(1.0007) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_angle_offset_format() {
        assert_eq!(angle_offset_to_i16(TAU), 32766);
        assert_eq!(angle_offset_to_i16(-TAU * 3.0), -32766);
        assert_eq!(angle_offset_to_i16(0.0), 0);
        let decoded = angle_offset_from_i16(angle_offset_to_i16(PI / 2.0));
        assert!((decoded - PI / 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_opacity_format() {
        assert_eq!(opacity_to_u8(1.0), 255);
        assert_eq!(opacity_to_u8(0.5), 128);
        assert_eq!(opacity_to_u8(0.0), 0);
        assert_eq!(opacity_to_u8(2.0), 255);
    }
}
