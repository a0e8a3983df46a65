//! Engine configuration
//!
//! Configuration is read once at startup, from TOML text when the host has
//! it and from postcard bytes otherwise.

pub mod loader;

use serde::{Deserialize, Serialize};

use eidolon_protocol::{Brightness, MAX_PAYLOAD_SIZE};

use crate::state::DEFAULT_NUMBER_OF_COLORS;

/// Current config format version
pub const CONFIG_VERSION: u8 = 1;

/// Default display width before the device reports its own
pub const DEFAULT_WIDTH: u16 = 640;

/// Default display height before the device reports its own
pub const DEFAULT_HEIGHT: u16 = 400;

pub use loader::{log_config_summary, ConfigError};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Format version, checked for binary configs
    pub version: u8,
    /// Display width in pixels
    pub width: u16,
    /// Display height in pixels
    pub height: u16,
    /// Color table size: 2, 4 or 16
    pub number_of_colors: u8,
    /// Largest batch of encoded commands per link frame
    pub max_command_data_length: usize,
    /// Brightness before the device reports its own
    pub brightness: Brightness,
    /// Clear each shape's box on the preview before drawing it
    pub clear_box_on_draw: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            number_of_colors: DEFAULT_NUMBER_OF_COLORS,
            max_command_data_length: MAX_PAYLOAD_SIZE,
            brightness: Brightness::default(),
            clear_box_on_draw: true,
        }
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.number_of_colors, 2 | 4 | 16) {
            return Err(ConfigError::InvalidNumberOfColors(self.number_of_colors));
        }
        if self.max_command_data_length == 0 || self.max_command_data_length > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::InvalidBatchLength(self.max_command_data_length));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.number_of_colors, 16);
        assert_eq!(config.max_command_data_length, 250);
        assert_eq!(config.brightness, Brightness::Medium);
        assert!(config.clear_box_on_draw);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = EngineConfig {
            number_of_colors: 8,
            ..EngineConfig::new()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidNumberOfColors(8)));

        let config = EngineConfig {
            max_command_data_length: 251,
            ..EngineConfig::new()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidBatchLength(251)));

        let config = EngineConfig {
            height: 0,
            ..EngineConfig::new()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidDimensions));
    }
}
