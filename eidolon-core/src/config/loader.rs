//! Configuration loading
//!
//! Tries TOML first, falls back to binary postcard format. With neither
//! source the built-in defaults apply.

use core::fmt;
use core::str;

use log::{debug, info, warn};

use super::{EngineConfig, CONFIG_VERSION};

/// Configuration loading errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Deserialization failed
    Deserialize,
    /// Serialization failed
    Serialize,
    /// TOML parsing failed
    TomlParse,
    /// Invalid UTF-8 in TOML data
    InvalidUtf8,
    /// Config version mismatch
    VersionMismatch(u8),
    /// Color table size is not 2, 4 or 16
    InvalidNumberOfColors(u8),
    /// Batch length is zero or larger than a frame payload
    InvalidBatchLength(usize),
    /// Width or height is zero
    InvalidDimensions,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Deserialize => write!(f, "binary config could not be decoded"),
            ConfigError::Serialize => write!(f, "config could not be encoded"),
            ConfigError::TomlParse => write!(f, "TOML config could not be parsed"),
            ConfigError::InvalidUtf8 => write!(f, "TOML config is not valid UTF-8"),
            ConfigError::VersionMismatch(v) => {
                write!(f, "config version {} (expected {})", v, CONFIG_VERSION)
            }
            ConfigError::InvalidNumberOfColors(n) => {
                write!(f, "number_of_colors must be 2, 4 or 16, got {}", n)
            }
            ConfigError::InvalidBatchLength(n) => {
                write!(f, "max_command_data_length out of range: {}", n)
            }
            ConfigError::InvalidDimensions => write!(f, "width and height must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    /// Load configuration from whichever source is present
    ///
    /// TOML wins when both are given and parses. A source that is present
    /// but invalid is an error rather than a silent fallback to defaults.
    pub fn load(toml: Option<&[u8]>, binary: Option<&[u8]>) -> Result<Self, ConfigError> {
        info!("Loading engine configuration...");

        if let Some(data) = toml {
            match Self::from_toml(data) {
                Ok(config) => {
                    info!("Loaded configuration from TOML");
                    return Ok(config);
                }
                Err(e) if binary.is_some() => {
                    warn!("Failed to load TOML config: {}, trying binary", e);
                }
                Err(e) => return Err(e),
            }
        } else {
            debug!("No TOML config given, trying binary format");
        }

        match binary {
            Some(data) => {
                let config = Self::from_binary(data)?;
                info!("Loaded configuration from binary");
                Ok(config)
            }
            None => {
                info!("No configuration given, using defaults");
                Ok(Self::new())
            }
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(data: &[u8]) -> Result<Self, ConfigError> {
        debug!("Parsing {} bytes of TOML", data.len());

        let text = str::from_utf8(data).map_err(|_| ConfigError::InvalidUtf8)?;
        let config: EngineConfig = toml::from_str(text).map_err(|e| {
            warn!("TOML parse error: {}", e);
            ConfigError::TomlParse
        })?;

        config.validate()?;
        log_config_summary(&config);
        Ok(config)
    }

    /// Decode configuration from postcard bytes
    pub fn from_binary(data: &[u8]) -> Result<Self, ConfigError> {
        debug!("Decoding {} bytes of binary config", data.len());

        let config: EngineConfig =
            postcard::from_bytes(data).map_err(|_| ConfigError::Deserialize)?;

        if config.version != CONFIG_VERSION {
            warn!(
                "Config version mismatch: found {}, expected {}",
                config.version, CONFIG_VERSION
            );
            return Err(ConfigError::VersionMismatch(config.version));
        }

        config.validate()?;
        log_config_summary(&config);
        Ok(config)
    }

    /// Encode as postcard bytes
    pub fn to_binary(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Serialize)
    }
}

/// Log a summary of the loaded configuration
pub fn log_config_summary(config: &EngineConfig) {
    info!("Configuration loaded successfully");
    debug!("  display {}x{}", config.width, config.height);
    debug!("  {} colors", config.number_of_colors);
    debug!("  {} byte command batches", config.max_command_data_length);
    debug!("  brightness {:?}", config.brightness);
    debug!("  clear box on draw: {}", config.clear_box_on_draw);
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidolon_protocol::Brightness;

    #[test]
    fn test_load_toml() {
        let text = br#"
            width = 320
            height = 240
            number_of_colors = 4
            brightness = "very_high"
        "#;
        let config = EngineConfig::load(Some(text), None).unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.number_of_colors, 4);
        assert_eq!(config.brightness, Brightness::VeryHigh);
        // Missing keys keep their defaults
        assert_eq!(config.max_command_data_length, 250);
    }

    #[test]
    fn test_load_binary_roundtrip() {
        let config = EngineConfig {
            height: 200,
            clear_box_on_draw: false,
            ..EngineConfig::new()
        };
        let bytes = config.to_binary().unwrap();
        assert_eq!(EngineConfig::load(None, Some(&bytes)), Ok(config));
    }

    #[test_log::test]
    fn test_bad_toml_falls_back_to_binary() {
        let bytes = EngineConfig::new().to_binary().unwrap();
        let config = EngineConfig::load(Some(b"width = ["), Some(&bytes)).unwrap();
        assert_eq!(config, EngineConfig::new());
    }

    #[test_log::test]
    fn test_bad_toml_alone_is_an_error() {
        assert_eq!(
            EngineConfig::load(Some(b"width = ["), None),
            Err(ConfigError::TomlParse)
        );
        assert_eq!(
            EngineConfig::load(Some(&[0xff, 0xfe]), None),
            Err(ConfigError::InvalidUtf8)
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_eq!(
            EngineConfig::load(Some(b"number_of_colors = 3"), None),
            Err(ConfigError::InvalidNumberOfColors(3))
        );
    }

    #[test_log::test]
    fn test_version_mismatch() {
        let config = EngineConfig {
            version: 9,
            ..EngineConfig::new()
        };
        let bytes = config.to_binary().unwrap();
        assert_eq!(
            EngineConfig::from_binary(&bytes),
            Err(ConfigError::VersionMismatch(9))
        );
    }

    #[test]
    fn test_no_source_uses_defaults() {
        assert_eq!(EngineConfig::load(None, None), Ok(EngineConfig::new()));
    }
}
