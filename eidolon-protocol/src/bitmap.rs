//! Bitmap pixel packing
//!
//! Pixels are packed most-significant bits first at the shallowest depth
//! that covers the bitmap's color count: 8, 4 or 2 pixels per byte.

use alloc::vec;
use alloc::vec::Vec;

use crate::command::Bitmap;
use crate::display::PixelDepth;

/// Bytes needed for `pixel_count` pixels at `depth`
pub fn packed_len(pixel_count: usize, depth: PixelDepth) -> usize {
    pixel_count.div_ceil(depth.pixels_per_byte())
}

/// Pack a bitmap's pixels
///
/// Returns `None` if the color count needs more than four bits or a pixel
/// is outside the bitmap's colors.
pub fn pack_pixels(bitmap: &Bitmap) -> Option<Vec<u8>> {
    let depth = PixelDepth::for_colors(bitmap.number_of_colors)?;
    let bits = depth.bits() as usize;
    let per_byte = depth.pixels_per_byte();
    let mut data = vec![0u8; packed_len(bitmap.pixels.len(), depth)];

    for (index, &pixel) in bitmap.pixels.iter().enumerate() {
        if pixel >= bitmap.number_of_colors {
            return None;
        }
        let slot = index % per_byte;
        let shift = 8 - bits - bits * slot;
        data[index / per_byte] |= pixel << shift;
    }
    Some(data)
}

/// Unpack `pixel_count` pixels written by [`pack_pixels`]
pub fn unpack_pixels(data: &[u8], pixel_count: usize, depth: PixelDepth) -> Option<Vec<u8>> {
    if data.len() < packed_len(pixel_count, depth) {
        return None;
    }
    let bits = depth.bits() as usize;
    let per_byte = depth.pixels_per_byte();
    let mask = (1u16 << bits) as u8 - 1;

    let pixels = (0..pixel_count)
        .map(|index| {
            let slot = index % per_byte;
            let shift = 8 - bits - bits * slot;
            (data[index / per_byte] >> shift) & mask
        })
        .collect();
    Some(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(number_of_colors: u8, pixels: Vec<u8>) -> Bitmap {
        Bitmap {
            width: pixels.len() as u16,
            height: 1,
            number_of_colors,
            pixels,
        }
    }

    #[test]
    fn test_pack_one_bit() {
        let data = pack_pixels(&bitmap(2, vec![1, 0, 1, 1, 0, 0, 0, 1, 1])).unwrap();
        assert_eq!(data, vec![0b1011_0001, 0b1000_0000]);
    }

    #[test]
    fn test_pack_two_bits() {
        let data = pack_pixels(&bitmap(4, vec![3, 0, 2, 1, 1])).unwrap();
        assert_eq!(data, vec![0b1100_1001, 0b0100_0000]);
    }

    #[test]
    fn test_pack_four_bits() {
        let data = pack_pixels(&bitmap(16, vec![0xA, 0x5, 0xF])).unwrap();
        assert_eq!(data, vec![0xA5, 0xF0]);
    }

    #[test]
    fn test_pack_rejects_out_of_range_pixel() {
        assert!(pack_pixels(&bitmap(2, vec![0, 2])).is_none());
        assert!(pack_pixels(&bitmap(32, vec![0])).is_none());
    }

    #[test]
    fn test_unpack_matches_pack() {
        let pixels = vec![3, 1, 0, 2, 2, 3, 1];
        let data = pack_pixels(&bitmap(4, pixels.clone())).unwrap();
        assert_eq!(unpack_pixels(&data, pixels.len(), PixelDepth::Two), Some(pixels));
        assert!(unpack_pixels(&data[..1], 7, PixelDepth::Two).is_none());
    }
}
