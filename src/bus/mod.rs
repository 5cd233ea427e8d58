//! Streaming bus abstraction
//!
//! The bus is the only synchronization boundary between producers (outlets)
//! and consumers (inlets). Producers never share memory with the monitor;
//! they push samples to an [`Outlet`] and the monitor pulls them from an
//! [`Inlet`] with a zero-wait poll.
//!
//! # Clock
//!
//! Every bus exposes a monotonic [`BusClock`] shared by all producers and
//! consumers, so timestamps taken on one side can be compared on the other.

pub mod local;

pub use local::LocalBus;

use crate::error::Result;
use crate::types::{Chunk, StreamInfo};
use std::time::{Duration, Instant};

/// Monotonic clock shared across a bus, in seconds since the bus epoch
#[derive(Debug, Clone, Copy)]
pub struct BusClock {
    epoch: Instant,
}

impl BusClock {
    /// Create a clock whose zero is now
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Seconds elapsed since the bus epoch
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl Default for BusClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side handle of a stream
pub trait Outlet: Send {
    /// Description of the stream, including the bus-assigned uid
    fn info(&self) -> &StreamInfo;

    /// Push one numeric sample, stamped now when `timestamp` is `None`
    fn push_sample(&self, values: &[f64], timestamp: Option<f64>) -> Result<()>;

    /// Push one string sample (events/markers)
    fn push_text(&self, values: &[String], timestamp: Option<f64>) -> Result<()>;

    /// Push a chunk of numeric frames; `timestamp` stamps the last frame
    fn push_chunk(&self, frames: &[Vec<f64>], timestamp: f64) -> Result<()>;

    /// Whether any inlet is currently subscribed
    fn have_consumers(&self) -> bool;

    /// Current time on the bus clock this outlet stamps with
    fn clock(&self) -> f64;
}

/// Consumer side handle of a stream
#[cfg_attr(test, mockall::automock)]
pub trait Inlet: Send {
    /// Description of the stream this inlet reads
    fn info(&self) -> &StreamInfo;

    /// Pull the next available chunk.
    ///
    /// With a zero `timeout` this returns immediately, yielding an empty
    /// chunk when nothing is queued.
    fn pull_chunk(&mut self, timeout: Duration) -> Result<Chunk>;

    /// Chunks discarded because the inlet queue overflowed
    fn dropped_chunks(&self) -> u64;
}

/// A real-time streaming bus
pub trait Bus: Send + Sync {
    /// Announce a new stream and return its outlet
    fn open_outlet(&self, info: StreamInfo) -> Result<Box<dyn Outlet>>;

    /// Discover the streams currently announced, waiting up to `wait`
    fn resolve_streams(&self, wait: Duration) -> Vec<StreamInfo>;

    /// Subscribe to a resolved stream
    fn open_inlet(&self, info: &StreamInfo) -> Result<Box<dyn Inlet>>;

    /// Current time on the shared bus clock
    fn clock(&self) -> f64;
}

/// Per-frame timestamps for a chunk whose last frame is stamped `last`.
///
/// Regular streams are back-dated at their nominal rate; irregular streams
/// share one stamp for the whole chunk.
pub fn chunk_timestamps(count: usize, last: f64, nominal_rate: f64) -> Vec<f64> {
    if nominal_rate > 0.0 {
        (0..count)
            .map(|i| last - (count - 1 - i) as f64 / nominal_rate)
            .collect()
    } else {
        vec![last; count]
    }
}
