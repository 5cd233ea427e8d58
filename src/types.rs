//! Core data types for plsl-rs
//!
//! This module contains the fundamental data structures shared by producers,
//! the bus, and the monitor.
//!
//! # Main Types
//!
//! - [`ChannelFormat`] - Closed set of wire formats a stream can declare
//! - [`StreamInfo`] - Immutable identity and shape of a stream
//! - [`Sample`] - One timestamped multi-channel sample
//! - [`Chunk`] - An ordered batch of samples delivered together
//!
//! # Rate-less streams
//!
//! A stream declaring a nominal rate of zero, or a variable-length string
//! format, carries sparse events instead of a regular signal. Such channels
//! are placed on a pseudo timeline by the monitor (see
//! [`crate::monitor::rasterizer`]).

use serde::{Deserialize, Serialize};

/// Data format of every channel in a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelFormat {
    /// 32-bit float, up to 24-bit precision measurements
    #[default]
    Float32,
    /// 64-bit float for universal numeric data
    Double64,
    /// Variable-length string, used for events and markers
    String,
    /// 32-bit integer
    Int32,
    /// 16-bit integer, typical for recorded audio-like sensors
    Int16,
    /// 8-bit integer
    Int8,
    /// 64-bit integer
    Int64,
}

impl ChannelFormat {
    /// Whether samples of this format are numeric scalars
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ChannelFormat::String)
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            ChannelFormat::Float32 => "float32",
            ChannelFormat::Double64 => "double64",
            ChannelFormat::String => "string",
            ChannelFormat::Int32 => "int32",
            ChannelFormat::Int16 => "int16",
            ChannelFormat::Int8 => "int8",
            ChannelFormat::Int64 => "int64",
        }
    }
}

impl std::fmt::Display for ChannelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Identity and shape of a stream on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Human readable stream name
    pub name: String,
    /// Content type (e.g. "ECG", "Breathing", "Markers")
    #[serde(rename = "type")]
    pub stream_type: String,
    /// Producer-chosen identifier that survives restarts
    pub source_id: String,
    /// Host the producer runs on
    pub hostname: String,
    /// Number of channels per sample
    pub channel_count: usize,
    /// Declared sampling rate in Hz, zero for irregular streams
    pub nominal_rate: f64,
    /// Format shared by every channel
    pub channel_format: ChannelFormat,
    /// Bus-assigned unique id, zero until the outlet is opened
    #[serde(default)]
    pub uid: u64,
}

impl StreamInfo {
    /// Create a new stream description
    pub fn new(
        name: impl Into<String>,
        stream_type: impl Into<String>,
        channel_count: usize,
        nominal_rate: f64,
        channel_format: ChannelFormat,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            stream_type: stream_type.into(),
            source_id: source_id.into(),
            hostname: String::new(),
            channel_count,
            nominal_rate,
            channel_format,
            uid: 0,
        }
    }

    /// Whether channels of this stream follow a regular sampling clock
    pub fn has_rate(&self) -> bool {
        self.channel_format.is_numeric() && self.nominal_rate > 0.0
    }

    /// Rate used to size buffers: nominal rate, or `pseudo_rate` for events
    pub fn effective_rate(&self, pseudo_rate: f64) -> f64 {
        if self.has_rate() {
            self.nominal_rate
        } else {
            pseudo_rate
        }
    }

    /// Label of the whole stream, `name(host) [type]`
    pub fn label(&self) -> String {
        format!("{}({}) [{}]", self.name, self.hostname, self.stream_type)
    }

    /// Label of one channel of the stream
    pub fn channel_label(&self, channel: usize) -> String {
        format!("{} channel {}", self.label(), channel)
    }
}

/// Per-channel payload of one sample
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl SampleValues {
    /// Number of channel values carried
    pub fn len(&self) -> usize {
        match self {
            SampleValues::Numeric(v) => v.len(),
            SampleValues::Text(v) => v.len(),
        }
    }

    /// Whether no channel values are carried
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric value of a channel, if this is a numeric sample
    pub fn numeric(&self, channel: usize) -> Option<f64> {
        match self {
            SampleValues::Numeric(v) => v.get(channel).copied(),
            SampleValues::Text(_) => None,
        }
    }
}

/// One multi-channel sample stamped on the bus clock
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub values: SampleValues,
    /// Seconds on the shared bus clock
    pub timestamp: f64,
}

impl Sample {
    pub fn numeric(values: Vec<f64>, timestamp: f64) -> Self {
        Self {
            values: SampleValues::Numeric(values),
            timestamp,
        }
    }

    pub fn text(values: Vec<String>, timestamp: f64) -> Self {
        Self {
            values: SampleValues::Text(values),
            timestamp,
        }
    }
}

/// Ordered batch of samples; insertion order is temporal order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub samples: Vec<Sample>,
}

impl Chunk {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
