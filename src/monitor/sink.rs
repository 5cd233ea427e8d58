//! Display sinks
//!
//! The monitor publishes every updated channel to a [`DisplaySink`] once per
//! tick. A sink may render, log, or forward the view to another thread; it
//! must not block the monitor loop.
//!
//! # Main Types
//!
//! - [`ChannelView`] - Borrowed view of one channel after a tick
//! - [`ChannelFrame`] - Owned copy of a view, for crossing threads
//! - [`TracingSink`] - Periodic per-channel summaries through `tracing`
//! - [`ChannelSink`] - Forwards frames over a bounded crossbeam channel

use super::TickReport;
use crate::analysis::Spectrum;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Channel capacity for display messages (monitor -> UI).
/// 4096 frames is a few seconds of a dozen channels at 50 Hz.
pub const DISPLAY_CHANNEL_CAPACITY: usize = 4096;

/// One channel as it stands after a tick
#[derive(Debug, Clone, Copy)]
pub struct ChannelView<'a> {
    /// Position of the stream in discovery order
    pub stream_index: usize,
    pub channel: usize,
    pub label: &'a str,
    /// Whether the channel follows its nominal rate (false for events)
    pub has_rate: bool,
    /// Nominal rate, or the pseudo rate for events
    pub rate: f64,
    pub window_seconds: f64,
    /// Buffer contents, oldest first
    pub values: &'a [f64],
    pub spectrum: Option<&'a Spectrum>,
    /// Samples written this tick
    pub new_samples: usize,
}

impl ChannelView<'_> {
    /// Time axis matching `values`, `linspace(0, window_seconds, N)`
    pub fn time_axis(&self) -> Vec<f64> {
        linspace(0.0, self.window_seconds, self.values.len())
    }

    /// Root mean square of the buffer
    pub fn rms(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.values.iter().map(|v| v * v).sum();
        (sum_sq / self.values.len() as f64).sqrt()
    }

    pub fn to_frame(&self) -> ChannelFrame {
        ChannelFrame {
            stream_index: self.stream_index,
            channel: self.channel,
            label: self.label.to_string(),
            has_rate: self.has_rate,
            rate: self.rate,
            time: self.time_axis(),
            values: self.values.to_vec(),
            spectrum: self.spectrum.cloned(),
            new_samples: self.new_samples,
        }
    }
}

/// Owned snapshot of a channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFrame {
    pub stream_index: usize,
    pub channel: usize,
    pub label: String,
    pub has_rate: bool,
    pub rate: f64,
    pub time: Vec<f64>,
    pub values: Vec<f64>,
    pub spectrum: Option<Spectrum>,
    pub new_samples: usize,
}

/// `n` evenly spaced points from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Receives channel views from the monitor loop
pub trait DisplaySink: Send {
    /// Called for every channel updated on this tick
    fn publish(&mut self, view: &ChannelView<'_>);

    /// Called once after all channels of a tick were published
    fn on_tick_end(&mut self, _report: &TickReport) {}
}

// ==================== Tracing Sink ====================

#[derive(Debug, Clone, Copy, Default)]
struct ChannelSummary {
    rms: f64,
    peak: Option<(f64, f64)>,
    new_samples: usize,
}

/// Logs a summary line per channel every `interval`
pub struct TracingSink {
    interval: Duration,
    last_summary: Instant,
    summaries: BTreeMap<String, ChannelSummary>,
}

impl TracingSink {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_summary: Instant::now(),
            summaries: BTreeMap::new(),
        }
    }
}

impl DisplaySink for TracingSink {
    fn publish(&mut self, view: &ChannelView<'_>) {
        let entry = self.summaries.entry(view.label.to_string()).or_default();
        entry.rms = view.rms();
        entry.new_samples += view.new_samples;
        if let Some(spectrum) = view.spectrum {
            entry.peak = spectrum.peak();
        }
    }

    fn on_tick_end(&mut self, report: &TickReport) {
        if self.last_summary.elapsed() < self.interval {
            return;
        }
        self.last_summary = Instant::now();

        for (label, summary) in &mut self.summaries {
            match summary.peak {
                Some((freq, mag)) => tracing::info!(
                    "{}: +{} samples, rms {:.3}, peak {:.2} Hz ({:.1})",
                    label,
                    summary.new_samples,
                    summary.rms,
                    freq,
                    mag
                ),
                None => tracing::info!(
                    "{}: +{} samples, rms {:.3}",
                    label,
                    summary.new_samples,
                    summary.rms
                ),
            }
            summary.new_samples = 0;
        }
        tracing::debug!(
            "tick {}: dt {:.1} ms, {} samples, {} events",
            report.tick,
            report.dt * 1000.0,
            report.samples,
            report.events
        );
    }
}

// ==================== Channel Sink ====================

/// Messages sent from the monitor to a display thread
#[derive(Debug, Clone)]
pub enum DisplayMessage {
    Frame(ChannelFrame),
    TickEnd(TickReport),
}

/// Forwards owned frames to another thread without blocking
pub struct ChannelSink {
    tx: Sender<DisplayMessage>,
    dropped: u64,
}

impl ChannelSink {
    /// Create a sink and the receiver the display thread reads from
    pub fn new() -> (Self, Receiver<DisplayMessage>) {
        Self::with_capacity(DISPLAY_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<DisplayMessage>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx, dropped: 0 }, rx)
    }

    /// Messages discarded because the display thread fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn send(&mut self, msg: DisplayMessage) {
        match self.tx.try_send(msg) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => self.dropped += 1,
        }
    }
}

impl DisplaySink for ChannelSink {
    fn publish(&mut self, view: &ChannelView<'_>) {
        self.send(DisplayMessage::Frame(view.to_frame()));
    }

    fn on_tick_end(&mut self, report: &TickReport) {
        self.send(DisplayMessage::TickEnd(report.clone()));
    }
}
