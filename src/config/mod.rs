//! Configuration module for the Pixie16 list-mode tools
//!
//! Supports loading configuration from TOML files. Every section and field
//! is optional; missing values fall back to the defaults.
//!
//! # Example
//! ```ignore
//! let config = Config::load("pixie16.toml")?;
//! let events = read_list_mode_events(files, &config.reader)?;
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::emulator::EmulatorConfig;
use crate::reader::decoder::HeaderVariant;
use crate::reader::ReaderConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// List-mode reader settings
    #[serde(default)]
    pub reader: ReaderConfig,
    /// Synthetic data generator settings
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse fine but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reader.buffer_size == 0 {
            return Err(ConfigError::invalid("reader.buffer_size", "must be positive"));
        }
        if let Some(channels) = &self.reader.channels {
            if let Some(bad) = channels.iter().find(|&&ch| ch > 15) {
                return Err(ConfigError::invalid(
                    "reader.channels",
                    format!("channel {} out of range 0-15", bad),
                ));
            }
        }
        if HeaderVariant::from_header_length(self.emulator.header_length).is_none() {
            return Err(ConfigError::invalid(
                "emulator.header_length",
                format!(
                    "{} is not one of 4, 6, 8, 10, 12, 14, 16, 18",
                    self.emulator.header_length
                ),
            ));
        }
        if self.emulator.channels == 0 || self.emulator.channels > 16 {
            return Err(ConfigError::invalid("emulator.channels", "must be 1-16"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.reader.buffer_size, 1_000_000_000);
        assert_eq!(config.emulator.header_length, 4);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [reader]
            buffer_size = 65536
            max_events = 100
            channels = [0, 3, 15]
            stamp_chunks = true
            dump_dir = "/tmp/pixie-debug"

            [emulator]
            seed = 7
            num_events = 500
            header_length = 18
            crate_id = 1
            slot = 5
            channels = 4
            trace_length = 250
            mean_interval_ticks = 20
        "#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.reader.buffer_size, 65536);
        assert_eq!(config.reader.max_events, Some(100));
        assert_eq!(config.reader.channels, Some(vec![0, 3, 15]));
        assert!(config.reader.stamp_chunks);
        assert_eq!(
            config.reader.dump_dir.as_deref(),
            Some(Path::new("/tmp/pixie-debug"))
        );

        assert_eq!(config.emulator.seed, 7);
        assert_eq!(config.emulator.num_events, 500);
        assert_eq!(config.emulator.header_length, 18);
        assert_eq!(config.emulator.crate_id, 1);
        assert_eq!(config.emulator.slot, 5);
        assert_eq!(config.emulator.channels, 4);
        assert_eq!(config.emulator.trace_length, 250);
        assert_eq!(config.emulator.mean_interval_ticks, 20);
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let toml = r#"
            [reader]
            max_events = 10
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.reader.max_events, Some(10));
        assert_eq!(config.reader.buffer_size, 1_000_000_000);
        assert!(!config.reader.stamp_chunks);
    }

    #[test]
    fn zero_buffer_size_rejected() {
        let toml = r#"
            [reader]
            buffer_size = 0
        "#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("reader.buffer_size"));
    }

    #[test]
    fn out_of_range_channel_rejected() {
        let toml = r#"
            [reader]
            channels = [1, 16]
        "#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("channel 16"));
    }

    #[test]
    fn unknown_header_length_rejected() {
        let toml = r#"
            [emulator]
            header_length = 5
        "#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("emulator.header_length"));
    }

    #[test]
    fn bad_toml_rejected() {
        let err = Config::from_toml("[reader\nbuffer_size = 1").unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load("/nonexistent/pixie16.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
