//! Configuration structures for sharewatch.
//!
//! This module provides configuration types for all components:
//!
//! - [`WatchConfig`] - Engine settings (debouncing, recursion, ignore globs)
//! - [`OutputConfig`] - How the CLI renders events
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a configuration file only needs the fields it
//! overrides.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Output format for rendered events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum OutputFormat {
    /// One human-readable line per event.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Configuration for the change-detection engine.
///
/// # Examples
///
/// ```
/// use sw_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.debounce_ms, 100);
/// assert!(config.recursive);
/// assert!(config.ignore_patterns.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether change detection starts enabled.
    pub enabled: bool,

    /// Debounce window in milliseconds.
    ///
    /// `0` disables buffering: every change is reported as a coalesced
    /// event immediately.
    pub debounce_ms: u64,

    /// Whether directories are watched recursively.
    pub recursive: bool,

    /// Filename globs (`*.tmp`, `.*`) excluded from all processing.
    pub ignore_patterns: Vec<String>,

    /// Capacity of the channel carrying raw notifications from the OS
    /// watcher thread to the engine.
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 100,
            recursive: true,
            ignore_patterns: Vec::new(),
            channel_capacity: 256,
        }
    }
}

impl WatchConfig {
    /// Validates option values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if `channel_capacity` is zero
    /// or an ignore pattern is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "channel_capacity",
                "must be greater than zero",
            ));
        }

        if self.ignore_patterns.iter().any(String::is_empty) {
            return Err(ConfigError::invalid_option(
                "ignore_patterns",
                "patterns must not be empty",
            ));
        }

        Ok(())
    }
}

/// Configuration for event rendering in the CLI.
///
/// # Examples
///
/// ```
/// use sw_core::{OutputConfig, OutputFormat};
///
/// let config = OutputConfig::default();
/// assert_eq!(config.format, OutputFormat::Text);
/// assert!(!config.show_immediate);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Rendering format.
    pub format: OutputFormat,

    /// Also print immediate (pre-debounce) file and directory events.
    pub show_immediate: bool,
}

/// Root configuration for sharewatch.
///
/// # Examples
///
/// ```
/// use sw_core::Config;
///
/// let config = Config::default();
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// assert!(json.contains("debounce_ms"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine configuration.
    pub watch: WatchConfig,

    /// Output configuration.
    pub output: OutputConfig,
}

impl Config {
    /// Parses a configuration from a JSON string and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON and
    /// [`ConfigError::InvalidOption`] if validation fails.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// errors of [`Config::from_json`].
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::InvalidOption`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watch.validate()
    }
}
