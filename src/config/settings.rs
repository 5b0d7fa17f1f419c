//! Settings file support

use crate::audio::{BridgeConfig, SampleFormat, UnderflowFill, DEFAULT_BUFFER_COUNT, DEFAULT_QUEUE_LIMIT};
use crate::core::SyntheticConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name looked up next to the executable
pub const LOCAL_FILE_NAME: &str = "pinbridge.toml";

/// Settings loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Device playback buffers
    pub buffer_count: usize,

    /// Frames allowed to wait for a playback buffer
    pub queue_limit: usize,

    /// What a recycled buffer plays when no frame is waiting
    pub underflow_fill: UnderflowFill,

    /// Demo stream sample rate in Hz
    pub sample_rate: u32,

    /// Demo stream channel count
    pub channels: u16,

    /// Demo stream sample encoding
    pub sample_format: SampleFormat,

    /// Demo audio updates per second
    pub fps: f64,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log file path (empty = no file logging)
    pub log_file: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            buffer_count: DEFAULT_BUFFER_COUNT,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            underflow_fill: UnderflowFill::default(),
            sample_rate: 44100,
            channels: 2,
            sample_format: SampleFormat::Int16,
            fps: 60.0,
            log_level: "info".to_string(),
            log_file: String::new(),
        }
    }
}

impl BridgeSettings {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Parse settings from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load settings from the first file found in the default locations
    ///
    /// Searches in order:
    /// 1. Same directory as executable: pinbridge.toml
    /// 2. User config directory: pinbridge/config.toml
    pub fn load_default() -> Result<Self, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                debug!("Loading settings from {:?}", path);
                return Self::load(&path);
            }
        }

        debug!("No settings file found, using defaults");
        Ok(Self::default())
    }

    /// Candidate settings files, in priority order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                paths.push(exe_dir.join(LOCAL_FILE_NAME));
            }
        }
        if let Some(path) = Self::user_path() {
            paths.push(path);
        }

        paths
    }

    /// Per-user settings file
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pinbridge").join("config.toml"))
    }

    /// Save settings to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Log file, if one is configured
    pub fn log_file(&self) -> Option<&str> {
        if self.log_file.is_empty() {
            None
        } else {
            Some(&self.log_file)
        }
    }

    /// Convert to BridgeConfig
    pub fn to_bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            buffer_count: self.buffer_count,
            queue_limit: self.queue_limit,
            underflow_fill: self.underflow_fill,
        }
    }

    /// Demo core settings for the configured stream
    pub fn to_synthetic_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            format: self.sample_format,
            sample_rate: self.sample_rate,
            channels: self.channels,
            fps: self.fps,
            ..Default::default()
        }
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# pinbridge configuration

# Device playback buffers (default: 4)
buffer_count = 4

# Frames allowed to wait for a playback buffer before all are dropped (default: 10)
queue_limit = 10

# What a recycled buffer plays when no frame is waiting: "silence" or "repeat"
underflow_fill = "silence"

# Demo stream
sample_rate = 44100
channels = 2
sample_format = "int16"
fps = 60.0

# Log level: trace, debug, info, warn, error (default: info)
log_level = "info"

# Log file path (empty = no file logging)
log_file = ""
"#
        .to_string()
    }
}

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading/writing config file
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing TOML
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Error serializing config
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_matches_defaults() {
        let parsed = BridgeSettings::parse(&BridgeSettings::sample_config()).unwrap();
        assert_eq!(parsed, BridgeSettings::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed = BridgeSettings::parse("queue_limit = 3\nunderflow_fill = \"repeat\"\n").unwrap();
        assert_eq!(parsed.queue_limit, 3);
        assert_eq!(parsed.underflow_fill, UnderflowFill::Repeat);
        assert_eq!(parsed.buffer_count, DEFAULT_BUFFER_COUNT);
        assert_eq!(parsed.log_file(), None);
    }

    #[test]
    fn test_bad_value_rejected() {
        assert!(BridgeSettings::parse("underflow_fill = \"loop\"").is_err());
        assert!(BridgeSettings::parse("buffer_count = -1").is_err());
    }

    #[test]
    fn test_bridge_config_validation() {
        let settings = BridgeSettings {
            buffer_count: 0,
            ..Default::default()
        };
        assert!(settings.to_bridge_config().validate().is_err());
        assert!(BridgeSettings::default().to_bridge_config().validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("pinbridge-settings-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");
        let settings = BridgeSettings {
            buffer_count: 6,
            sample_format: SampleFormat::Float32,
            log_file: "bridge.log".to_string(),
            ..Default::default()
        };

        settings.save(&path).unwrap();
        let loaded = BridgeSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.log_file(), Some("bridge.log"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = BridgeSettings::load("/nonexistent/pinbridge.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/pinbridge.toml"));
    }
}
