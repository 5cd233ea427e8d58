//! Configuration module for plsl-rs
//!
//! This module handles application configuration including:
//! - Monitor timing (refresh period, buffer window, pseudo rate)
//! - Bus queue sizing
//! - Logging filter and optional log file
//! - The producers spawned alongside the monitor
//!
//! # Config Location
//!
//! The configuration is read from an explicit path when one is given,
//! otherwise from the platform config directory under `plsl-rs`:
//! - **Linux**: `~/.config/plsl-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/plsl-rs/config.toml`
//! - **Windows**: `%APPDATA%\plsl-rs\config.toml`
//!
//! When no file exists the defaults are used.
//!
//! # Example
//!
//! ```toml
//! [monitor]
//! refresh_ms = 20
//! buffer_duration_ms = 5000
//!
//! [[producers]]
//! kind = "sine"
//! name = "RandomDataStream"
//! rate_hz = 100.0
//! ```

pub mod producers;

pub use producers::*;

use crate::analysis::WindowFunction;
use crate::error::{PlslError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "plsl-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default monitor refresh period in milliseconds
pub const DEFAULT_REFRESH_MS: u64 = 20;

/// Default length of each channel buffer in milliseconds
pub const DEFAULT_BUFFER_DURATION_MS: u64 = 5000;

/// Default virtual rate of event channels
pub const DEFAULT_PSEUDO_RATE_HZ: f64 = 1000.0;

/// Default time spent discovering streams at startup
pub const DEFAULT_RESOLVE_WAIT_MS: u64 = 1000;

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Monitor loop configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Bus configuration
    #[serde(default)]
    pub bus: BusConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Producers started with the monitor
    #[serde(default)]
    pub producers: Vec<ProducerConfig>,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlslError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            PlslError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration to use.
    ///
    /// An explicit path must load; otherwise the default location is tried
    /// and defaults are returned if it does not exist.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {:?}", path);
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Save the configuration to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PlslError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, self.to_toml()?).map_err(|e| {
            PlslError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Render the configuration as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PlslError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Reject configurations the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
        for producer in &self.producers {
            producer.validate()?;
        }
        Ok(())
    }

    /// A demo configuration with one signal generator and one event generator
    pub fn sample() -> Self {
        Self {
            producers: vec![
                ProducerConfig::Sine(SineProducerConfig::default()),
                ProducerConfig::Events(EventProducerConfig::default()),
            ],
            ..Default::default()
        }
    }
}

// ==================== Monitor Config ====================

/// Monitor loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    /// Refresh period in milliseconds
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,

    /// Length of each channel buffer in milliseconds
    #[serde(default = "default_buffer_duration_ms")]
    pub buffer_duration_ms: u64,

    /// Virtual sampling rate of event channels
    #[serde(default = "default_pseudo_rate_hz")]
    pub pseudo_rate_hz: f64,

    /// Marker value written for each event
    #[serde(default = "default_impulse_value")]
    pub impulse_value: f64,

    /// Maximum chunks pulled from one stream per tick
    #[serde(default = "default_max_chunks_per_drain")]
    pub max_chunks_per_drain: usize,

    /// Whether event channels get a spectrum on their pseudo timeline
    #[serde(default = "default_true")]
    pub spectrum_for_events: bool,

    /// Window applied before the FFT
    #[serde(default)]
    pub window: WindowFunction,

    /// Time spent discovering streams at startup, in milliseconds
    #[serde(default = "default_resolve_wait_ms")]
    pub resolve_wait_ms: u64,

    /// Interval between display summaries in milliseconds
    #[serde(default = "default_summary_interval_ms")]
    pub summary_interval_ms: u64,
}

fn default_refresh_ms() -> u64 {
    DEFAULT_REFRESH_MS
}

fn default_buffer_duration_ms() -> u64 {
    DEFAULT_BUFFER_DURATION_MS
}

fn default_pseudo_rate_hz() -> f64 {
    DEFAULT_PSEUDO_RATE_HZ
}

fn default_impulse_value() -> f64 {
    1.0
}

fn default_max_chunks_per_drain() -> usize {
    crate::monitor::consumer::DEFAULT_MAX_CHUNKS_PER_DRAIN
}

fn default_true() -> bool {
    true
}

fn default_resolve_wait_ms() -> u64 {
    DEFAULT_RESOLVE_WAIT_MS
}

fn default_summary_interval_ms() -> u64 {
    1000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_ms: DEFAULT_REFRESH_MS,
            buffer_duration_ms: DEFAULT_BUFFER_DURATION_MS,
            pseudo_rate_hz: DEFAULT_PSEUDO_RATE_HZ,
            impulse_value: default_impulse_value(),
            max_chunks_per_drain: default_max_chunks_per_drain(),
            spectrum_for_events: true,
            window: WindowFunction::Rectangular,
            resolve_wait_ms: DEFAULT_RESOLVE_WAIT_MS,
            summary_interval_ms: default_summary_interval_ms(),
        }
    }
}

impl MonitorConfig {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn window_seconds(&self) -> f64 {
        self.buffer_duration_ms as f64 / 1000.0
    }

    pub fn resolve_wait(&self) -> Duration {
        Duration::from_millis(self.resolve_wait_ms)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_millis(self.summary_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_ms == 0 {
            return Err(PlslError::Config("monitor.refresh_ms must be > 0".into()));
        }
        if self.buffer_duration_ms == 0 {
            return Err(PlslError::Config(
                "monitor.buffer_duration_ms must be > 0".into(),
            ));
        }
        if !self.pseudo_rate_hz.is_finite() || self.pseudo_rate_hz <= 0.0 {
            return Err(PlslError::Config(format!(
                "monitor.pseudo_rate_hz must be positive, got {}",
                self.pseudo_rate_hz
            )));
        }
        if self.max_chunks_per_drain == 0 {
            return Err(PlslError::Config(
                "monitor.max_chunks_per_drain must be > 0".into(),
            ));
        }
        Ok(())
    }
}

// ==================== Bus Config ====================

/// Bus configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusConfig {
    /// Chunks an inlet can queue before the oldest is dropped
    #[serde(default = "default_inlet_queue_capacity")]
    pub inlet_queue_capacity: usize,
}

fn default_inlet_queue_capacity() -> usize {
    crate::bus::local::DEFAULT_INLET_QUEUE_CAPACITY
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            inlet_queue_capacity: default_inlet_queue_capacity(),
        }
    }
}

// ==================== Logging Config ====================

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Optional file receiving a copy of the log
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_filter() -> String {
    "info,plsl_rs=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.monitor.refresh_period(), Duration::from_millis(20));
        assert_eq!(config.monitor.window_seconds(), 5.0);
        assert_eq!(config.monitor.pseudo_rate_hz, 1000.0);
        assert!(config.producers.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [monitor]
            refresh_ms = 40
            "#,
        )
        .unwrap();
        assert_eq!(config.monitor.refresh_ms, 40);
        assert_eq!(config.monitor.buffer_duration_ms, DEFAULT_BUFFER_DURATION_MS);
        assert_eq!(config.bus, BusConfig::default());
    }

    #[test]
    fn test_validation_rejects_zero_refresh() {
        let mut config = AppConfig::default();
        config.monitor.refresh_ms = 0;
        assert!(matches!(config.validate(), Err(PlslError::Config(_))));
    }

    #[test]
    fn test_validation_rejects_bad_pseudo_rate() {
        let mut config = AppConfig::default();
        config.monitor.pseudo_rate_hz = 0.0;
        assert!(config.validate().is_err());
        config.monitor.pseudo_rate_hz = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = AppConfig::sample();
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::resolve(Some(&missing)).is_err());
    }
}
