//! Non-blocking chunk drain
//!
//! Once per monitor tick every inlet is drained with zero-wait polls until
//! the bus reports nothing queued. A single empty poll ends the drain for
//! that stream, so a quiet stream costs exactly one poll per tick. A cap on
//! the number of chunks per drain bounds the loop even when a producer keeps
//! up with the consumer.

use crate::bus::Inlet;
use crate::types::{Chunk, SampleValues};
use std::time::Duration;

/// Default maximum number of chunks pulled from one inlet per tick
pub const DEFAULT_MAX_CHUNKS_PER_DRAIN: usize = 1024;

/// Why a drain stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainEnd {
    /// The bus reported no chunk available
    Empty,
    /// The per-tick chunk cap was reached; the rest waits for the next tick
    ChunkLimit,
    /// The inlet reported an error (typically the stream closed)
    Failed(String),
}

/// Samples collected from one stream during one tick
#[derive(Debug, Clone)]
pub struct DrainedStream {
    /// Per-channel values of regular streams, in arrival order
    pub channels: Vec<Vec<f64>>,
    /// Timestamps of every event sample of rate-less streams, in arrival order
    pub event_timestamps: Vec<f64>,
    /// Number of non-empty chunks pulled
    pub chunks: usize,
    /// Samples accepted into `channels` or `event_timestamps`
    pub samples: usize,
    /// Samples missing a value for at least one channel
    pub malformed: usize,
    pub ended_by: DrainEnd,
}

impl DrainedStream {
    fn new(channel_count: usize) -> Self {
        Self {
            channels: vec![Vec::new(); channel_count],
            event_timestamps: Vec::new(),
            chunks: 0,
            samples: 0,
            malformed: 0,
            ended_by: DrainEnd::Empty,
        }
    }

    fn absorb(&mut self, chunk: Chunk, has_rate: bool) {
        self.chunks += 1;

        for sample in chunk.samples {
            if !has_rate {
                self.event_timestamps.push(sample.timestamp);
                self.samples += 1;
                continue;
            }
            match &sample.values {
                // A partial frame would shift channels against each other
                SampleValues::Numeric(values) if values.len() == self.channels.len() => {
                    for (channel, &value) in self.channels.iter_mut().zip(values) {
                        channel.push(value);
                    }
                    self.samples += 1;
                }
                SampleValues::Numeric(values) => {
                    tracing::trace!(
                        "skipping frame of {} values, expected {}",
                        values.len(),
                        self.channels.len()
                    );
                    self.malformed += 1;
                }
                SampleValues::Text(_) => self.malformed += 1,
            }
        }
    }
}

/// Drains inlets without ever blocking
#[derive(Debug, Clone, Copy)]
pub struct ChunkConsumer {
    max_chunks: usize,
}

impl ChunkConsumer {
    pub fn new(max_chunks: usize) -> Self {
        Self {
            max_chunks: max_chunks.max(1),
        }
    }

    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    /// Pull every chunk currently queued on `inlet` and demultiplex it
    pub fn drain(&self, inlet: &mut dyn Inlet) -> DrainedStream {
        let (channel_count, has_rate) = {
            let info = inlet.info();
            (info.channel_count, info.has_rate())
        };
        let mut drained = DrainedStream::new(channel_count);

        for _ in 0..self.max_chunks {
            match inlet.pull_chunk(Duration::ZERO) {
                Ok(chunk) if chunk.is_empty() => return drained,
                Ok(chunk) => drained.absorb(chunk, has_rate),
                Err(e) => {
                    drained.ended_by = DrainEnd::Failed(e.to_string());
                    return drained;
                }
            }
        }

        drained.ended_by = DrainEnd::ChunkLimit;
        drained
    }
}

impl Default for ChunkConsumer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNKS_PER_DRAIN)
    }
}
