//! Display properties reported by or sent to the device

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Global display brightness level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Brightness {
    VeryLow,
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

// Wire format values
const BRIGHTNESS_VERY_LOW: u8 = 0;
const BRIGHTNESS_LOW: u8 = 1;
const BRIGHTNESS_MEDIUM: u8 = 2;
const BRIGHTNESS_HIGH: u8 = 3;
const BRIGHTNESS_VERY_HIGH: u8 = 4;

impl Brightness {
    /// Parse a brightness level from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            BRIGHTNESS_VERY_LOW => Some(Brightness::VeryLow),
            BRIGHTNESS_LOW => Some(Brightness::Low),
            BRIGHTNESS_MEDIUM => Some(Brightness::Medium),
            BRIGHTNESS_HIGH => Some(Brightness::High),
            BRIGHTNESS_VERY_HIGH => Some(Brightness::VeryHigh),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            Brightness::VeryLow => BRIGHTNESS_VERY_LOW,
            Brightness::Low => BRIGHTNESS_LOW,
            Brightness::Medium => BRIGHTNESS_MEDIUM,
            Brightness::High => BRIGHTNESS_HIGH,
            Brightness::VeryHigh => BRIGHTNESS_VERY_HIGH,
        }
    }

    /// Opacity multiplier applied to every color at this level
    pub fn opacity(self) -> f32 {
        match self {
            Brightness::VeryLow => 0.5,
            Brightness::Low => 0.7,
            Brightness::Medium => 0.9,
            Brightness::High => 0.95,
            Brightness::VeryHigh => 1.0,
        }
    }
}

/// Bits per pixel of the device framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PixelDepth {
    One,
    Two,
    Four,
}

impl PixelDepth {
    /// Every supported depth, shallowest first
    pub const ALL: [PixelDepth; 3] = [PixelDepth::One, PixelDepth::Two, PixelDepth::Four];

    /// Parse a pixel depth from its wire format byte (the enum index)
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            PixelDepth::One => 0,
            PixelDepth::Two => 1,
            PixelDepth::Four => 2,
        }
    }

    /// Bits used by one pixel
    pub fn bits(self) -> u8 {
        match self {
            PixelDepth::One => 1,
            PixelDepth::Two => 2,
            PixelDepth::Four => 4,
        }
    }

    /// Pixels packed into one byte
    pub fn pixels_per_byte(self) -> usize {
        8 / self.bits() as usize
    }

    /// Number of distinct colors this depth can index
    pub fn number_of_colors(self) -> u8 {
        1 << self.bits()
    }

    /// Shallowest depth able to index `number_of_colors` colors
    pub fn for_colors(number_of_colors: u8) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|depth| depth.number_of_colors() >= number_of_colors)
    }
}

/// Display properties reported by the device on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayInformation {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Framebuffer depth
    pub pixel_depth: PixelDepth,
}

/// Encoded size of [`DisplayInformation`]
pub const DISPLAY_INFORMATION_LEN: usize = 5;

impl DisplayInformation {
    /// Number of colors in the device color table
    pub fn number_of_colors(&self) -> u8 {
        self.pixel_depth.number_of_colors()
    }

    /// Encode as `[u16 width][u16 height][u8 pixel depth]`
    pub fn to_bytes(&self) -> [u8; DISPLAY_INFORMATION_LEN] {
        let width = self.width.to_le_bytes();
        let height = self.height.to_le_bytes();
        [width[0], width[1], height[0], height[1], self.pixel_depth.to_byte()]
    }

    /// Decode from the layout written by [`DisplayInformation::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < DISPLAY_INFORMATION_LEN {
            return None;
        }
        Some(Self {
            width: u16::from_le_bytes([bytes[0], bytes[1]]),
            height: u16::from_le_bytes([bytes[2], bytes[3]]),
            pixel_depth: PixelDepth::from_byte(bytes[4])?,
        })
    }
}
