//! Producer configuration
//!
//! Every producer started by `plsl-rs run` is described by one entry of the
//! `[[producers]]` array, tagged by `kind`.
//!
//! # Main Types
//!
//! - [`ProducerConfig`] - Tagged union of all producer kinds
//! - [`SineProducerConfig`] - Synthetic multi-channel sine generator
//! - [`EventProducerConfig`] - Periodic string events
//! - [`ReplayProducerConfig`] - Circular replay of WAV recordings in rate groups
//! - [`TcpEventsConfig`] - TCP line listener pushing events
//! - [`SerialProducerConfig`] - Serial line listener (numeric or events)
//! - [`MidiProducerConfig`] - MIDI keyboard triggers

use crate::error::{PlslError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One configured producer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProducerConfig {
    Sine(SineProducerConfig),
    Events(EventProducerConfig),
    Replay(ReplayProducerConfig),
    TcpEvents(TcpEventsConfig),
    Serial(SerialProducerConfig),
    Midi(MidiProducerConfig),
}

impl ProducerConfig {
    /// Short name used in logs and thread names
    pub fn kind(&self) -> &'static str {
        match self {
            ProducerConfig::Sine(_) => "sine",
            ProducerConfig::Events(_) => "events",
            ProducerConfig::Replay(_) => "replay",
            ProducerConfig::TcpEvents(_) => "tcp_events",
            ProducerConfig::Serial(_) => "serial",
            ProducerConfig::Midi(_) => "midi",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ProducerConfig::Sine(c) => c.validate(),
            ProducerConfig::Events(c) => {
                if c.interval_ms == 0 {
                    return Err(PlslError::Config(
                        "events producer: interval_ms must be > 0".into(),
                    ));
                }
                Ok(())
            }
            ProducerConfig::Replay(c) => c.validate(),
            ProducerConfig::TcpEvents(_) => Ok(()),
            ProducerConfig::Serial(c) => c.validate(),
            ProducerConfig::Midi(_) => Ok(()),
        }
    }
}

fn default_tick_ms() -> u64 {
    50
}

// ==================== Generators ====================

/// Multi-channel sine wave with uniform noise
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SineProducerConfig {
    pub name: String,
    pub stream_type: String,
    pub source_id: String,
    /// Nominal sampling rate in Hz
    pub rate_hz: f64,
    /// One channel per frequency, in Hz
    pub frequencies: Vec<f64>,
    pub amplitude: f64,
    /// Half-width of the uniform noise added to each sample
    pub noise_amplitude: f64,
    /// Producer tick period in milliseconds
    pub tick_ms: u64,
}

impl Default for SineProducerConfig {
    fn default() -> Self {
        Self {
            name: "RandomDataStream".to_string(),
            stream_type: "RandomData".to_string(),
            source_id: "random_data".to_string(),
            rate_hz: 100.0,
            frequencies: vec![3.0, 20.0, 40.0],
            amplitude: 10.0,
            noise_amplitude: 1.0,
            tick_ms: 20,
        }
    }
}

impl SineProducerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frequencies.is_empty() {
            return Err(PlslError::Config(format!(
                "sine producer {:?}: at least one frequency is required",
                self.name
            )));
        }
        validate_rate(&self.name, self.rate_hz)?;
        validate_tick(&self.name, self.tick_ms)
    }
}

/// Periodic string event generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventProducerConfig {
    pub name: String,
    pub stream_type: String,
    pub source_id: String,
    /// Text pushed for every event
    pub message: String,
    /// Interval between events in milliseconds
    pub interval_ms: u64,
}

impl Default for EventProducerConfig {
    fn default() -> Self {
        Self {
            name: "RandomStrStream".to_string(),
            stream_type: "RandomStr".to_string(),
            source_id: "random_str".to_string(),
            message: "foo".to_string(),
            interval_ms: 500,
        }
    }
}

// ==================== Replay ====================

/// Circular replay of recorded files, one outlet per group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayProducerConfig {
    /// Nominal tick period in milliseconds; actual elapsed time is measured
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    pub groups: Vec<ReplayGroupConfig>,
}

impl ReplayProducerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(PlslError::Config(
                "replay producer: at least one group is required".into(),
            ));
        }
        validate_tick("replay", self.tick_ms)?;
        for group in &self.groups {
            if group.files.is_empty() {
                return Err(PlslError::Config(format!(
                    "replay group {:?}: no files",
                    group.name
                )));
            }
        }
        Ok(())
    }
}

/// Files replayed together as one multi-channel stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayGroupConfig {
    pub name: String,
    pub stream_type: String,
    pub source_id: String,
    /// WAV files; each file contributes all of its channels, in order
    pub files: Vec<PathBuf>,
}

// ==================== Acquisition ====================

/// TCP listener turning received lines into events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TcpEventsConfig {
    pub name: String,
    pub stream_type: String,
    /// Address to bind, e.g. `0.0.0.0:8000`
    pub bind: String,
}

impl Default for TcpEventsConfig {
    fn default() -> Self {
        Self {
            name: "TcpListenStrStream".to_string(),
            stream_type: "TcpListenStr".to_string(),
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

impl TcpEventsConfig {
    /// Source id derived from the bound port, `tcp_listen_<port>`
    pub fn source_id(&self) -> String {
        let port = self.bind.rsplit(':').next().unwrap_or(&self.bind);
        format!("tcp_listen_{}", port)
    }
}

/// How lines received on a serial port are interpreted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SerialMode {
    /// Comma-separated integers, one sample per line
    #[default]
    Numeric,
    /// One debounced string event per line
    Events,
}

/// Serial line listener
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SerialProducerConfig {
    pub port: String,
    pub baud: u32,
    pub mode: SerialMode,
    /// Channel count expected in numeric mode
    pub channels: usize,
    /// Declared rate of the numeric stream
    pub rate_hz: f64,
    /// Minimum spacing of accepted events in events mode
    pub debounce_ms: u64,
}

impl Default for SerialProducerConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud: 115_200,
            mode: SerialMode::Numeric,
            channels: 6,
            rate_hz: 50.0,
            debounce_ms: 50,
        }
    }
}

impl SerialProducerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.mode == SerialMode::Numeric {
            if self.channels == 0 {
                return Err(PlslError::Config(format!(
                    "serial producer {:?}: channels must be > 0",
                    self.port
                )));
            }
            validate_rate(&self.port, self.rate_hz)?;
        }
        Ok(())
    }
}

/// MIDI keyboard trigger front-end
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MidiProducerConfig {
    pub name: String,
    pub stream_type: String,
    pub source_id: String,
    /// Substring of the input port name; first port when unset
    pub port_name: Option<String>,
    pub lowest_note: u8,
    pub highest_note: u8,
    /// Re-arm the start trigger when the lowest key is pressed
    pub reset_on_lowest_key: bool,
    /// Re-arm the start trigger when the highest key is pressed
    pub reset_on_highest_key: bool,
}

impl Default for MidiProducerConfig {
    fn default() -> Self {
        Self {
            name: "PianoStream".to_string(),
            stream_type: "Piano".to_string(),
            source_id: "piano".to_string(),
            port_name: None,
            lowest_note: 21,
            highest_note: 108,
            reset_on_lowest_key: true,
            reset_on_highest_key: true,
        }
    }
}

fn validate_rate(owner: &str, rate: f64) -> Result<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(PlslError::Config(format!(
            "{:?}: rate must be positive, got {}",
            owner, rate
        )));
    }
    Ok(())
}

fn validate_tick(owner: &str, tick_ms: u64) -> Result<()> {
    if tick_ms == 0 {
        return Err(PlslError::Config(format!(
            "{:?}: tick_ms must be > 0",
            owner
        )));
    }
    Ok(())
}
