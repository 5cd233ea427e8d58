//! Live stream monitor
//!
//! The monitor subscribes to every stream on the bus and, on a fixed timer
//! independent of any stream's rate, runs one tick:
//!
//! 1. Measure the elapsed time since the previous tick on the bus clock.
//! 2. Drain each inlet without blocking ([`consumer`]).
//! 3. Place events of rate-less streams on a pseudo timeline ([`rasterizer`]).
//! 4. Slide the channel buffers ([`ring_buffer`]).
//! 5. Recompute spectra of full, changed buffers.
//! 6. Publish every updated channel to a display sink ([`sink`]).
//!
//! # Main Types
//!
//! - [`MonitorSettings`] - Timing and sizing knobs of a session
//! - [`MonitorSession`] - Streams, channels, and buffers of one discovery pass
//! - [`MonitorLoop`] - Timer-driven state machine around a session
//! - [`MonitorHandle`] - Cross-thread control (stop, reload)
//!
//! # Lifecycle
//!
//! ```text
//! Init --(streams resolved)--> Running --(stop)--> Terminated
//!                                 |  ^
//!                                 +--+ reload
//! ```

pub mod consumer;
pub mod rasterizer;
pub mod ring_buffer;
pub mod sink;

pub use consumer::{ChunkConsumer, DrainEnd, DrainedStream};
pub use rasterizer::{Placement, PseudoTimelineRasterizer, RasterizeReport};
pub use ring_buffer::RingBuffer;
pub use sink::{ChannelFrame, ChannelSink, ChannelView, DisplayMessage, DisplaySink, TracingSink};

use crate::analysis::{SpectralPipeline, Spectrum, WindowFunction};
use crate::bus::{Bus, Inlet};
use crate::config::MonitorConfig;
use crate::error::{PlslError, Result};
use crate::types::StreamInfo;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Channel capacity for monitor events
const EVENT_CHANNEL_CAPACITY: usize = 16;

// ==================== Settings ====================

/// Runtime parameters of a monitor session
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub refresh: Duration,
    pub window_seconds: f64,
    pub pseudo_rate: f64,
    pub impulse: f64,
    pub max_chunks_per_drain: usize,
    pub spectrum_for_events: bool,
    pub window: WindowFunction,
    pub resolve_wait: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            refresh: config.refresh_period(),
            window_seconds: config.window_seconds(),
            pseudo_rate: config.pseudo_rate_hz,
            impulse: config.impulse_value,
            max_chunks_per_drain: config.max_chunks_per_drain,
            spectrum_for_events: config.spectrum_for_events,
            window: config.window,
            resolve_wait: config.resolve_wait(),
        }
    }
}

// ==================== Session ====================

/// Buffer and spectrum of one channel
#[derive(Debug, Clone)]
pub struct ChannelState {
    pub index: usize,
    pub label: String,
    pub buffer: RingBuffer,
    pub spectrum: Option<Spectrum>,
}

impl ChannelState {
    fn new(info: &StreamInfo, index: usize, capacity: usize) -> Self {
        Self {
            index,
            label: info.channel_label(index),
            buffer: RingBuffer::new(capacity),
            spectrum: None,
        }
    }
}

/// One subscribed stream and its channels
pub struct StreamState {
    pub info: StreamInfo,
    inlet: Box<dyn Inlet>,
    pub channels: Vec<ChannelState>,
    /// Nominal rate, or the pseudo rate for event streams
    pub rate: f64,
    /// The inlet failed; the stream is no longer drained
    pub lost: bool,
    dropped_seen: u64,
}

impl StreamState {
    fn new(inlet: Box<dyn Inlet>, settings: &MonitorSettings) -> Self {
        let info = inlet.info().clone();
        let rate = info.effective_rate(settings.pseudo_rate);
        let capacity = ring_buffer::capacity_for(rate, settings.window_seconds);
        let channels = (0..info.channel_count)
            .map(|i| ChannelState::new(&info, i, capacity))
            .collect();

        tracing::debug!(
            "Monitoring {} ({} ch, {} Hz{}, {} slots)",
            info.label(),
            info.channel_count,
            rate,
            if info.has_rate() { "" } else { " pseudo" },
            capacity
        );

        Self {
            info,
            inlet,
            channels,
            rate,
            lost: false,
            dropped_seen: 0,
        }
    }

    pub fn has_rate(&self) -> bool {
        self.info.has_rate()
    }
}

/// Counters describing one monitor tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Measured seconds since the previous tick
    pub dt: f64,
    /// Streams drained this tick
    pub streams: usize,
    /// Samples received from regular streams
    pub samples: usize,
    /// Events received from rate-less streams
    pub events: usize,
    pub channels_published: usize,
    pub spectra_computed: usize,
    /// Event placement counters, summed over event streams
    pub raster: RasterizeReport,
    /// Chunks discarded by the bus since the previous tick
    pub dropped_chunks: u64,
    pub malformed_samples: usize,
    pub lost_streams: usize,
}

/// All monitor state of one discovery pass
pub struct MonitorSession {
    settings: MonitorSettings,
    streams: Vec<StreamState>,
    consumer: ChunkConsumer,
    rasterizer: PseudoTimelineRasterizer,
    spectral: SpectralPipeline,
    last_tick: f64,
    ticks: u64,
}

impl MonitorSession {
    /// Resolve every stream on `bus` and subscribe to it.
    ///
    /// Fails with [`PlslError::StreamUnavailable`] when nothing is announced.
    pub fn open(bus: &dyn Bus, settings: MonitorSettings) -> Result<Self> {
        let infos = bus.resolve_streams(settings.resolve_wait);
        if infos.is_empty() {
            return Err(PlslError::StreamUnavailable);
        }

        let mut inlets = Vec::with_capacity(infos.len());
        for info in &infos {
            match bus.open_inlet(info) {
                Ok(inlet) => inlets.push(inlet),
                Err(e) => tracing::warn!("Skipping {}: {}", info.label(), e),
            }
        }
        if inlets.is_empty() {
            return Err(PlslError::StreamUnavailable);
        }

        tracing::info!("Resolved {} stream(s)", inlets.len());
        Ok(Self::from_inlets(inlets, settings, bus.clock()))
    }

    /// Build a session over already opened inlets, with `now` as the start time
    pub fn from_inlets(inlets: Vec<Box<dyn Inlet>>, settings: MonitorSettings, now: f64) -> Self {
        let streams = inlets
            .into_iter()
            .map(|inlet| StreamState::new(inlet, &settings))
            .collect();

        Self {
            consumer: ChunkConsumer::new(settings.max_chunks_per_drain),
            rasterizer: PseudoTimelineRasterizer::new(settings.pseudo_rate, settings.impulse),
            spectral: SpectralPipeline::with_window(settings.window),
            settings,
            streams,
            last_tick: now,
            ticks: 0,
        }
    }

    pub fn streams(&self) -> &[StreamState] {
        &self.streams
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Run one tick at bus time `now` and publish updated channels to `sink`
    pub fn tick(&mut self, now: f64, sink: &mut dyn DisplaySink) -> TickReport {
        let dt = (now - self.last_tick).max(0.0);
        self.last_tick = now;
        self.ticks += 1;

        let mut report = TickReport {
            tick: self.ticks,
            dt,
            ..Default::default()
        };

        let Self {
            settings,
            streams,
            consumer,
            rasterizer,
            spectral,
            ..
        } = self;

        for (stream_index, stream) in streams.iter_mut().enumerate() {
            if stream.lost {
                report.lost_streams += 1;
                continue;
            }
            report.streams += 1;

            let drained = consumer.drain(stream.inlet.as_mut());
            if drained.malformed > 0 {
                tracing::warn!(
                    "{}: skipped {} malformed sample(s)",
                    stream.info.label(),
                    drained.malformed
                );
                report.malformed_samples += drained.malformed;
            }

            let dropped = stream.inlet.dropped_chunks();
            if dropped > stream.dropped_seen {
                let delta = dropped - stream.dropped_seen;
                tracing::warn!("{}: bus dropped {} chunk(s)", stream.info.label(), delta);
                report.dropped_chunks += delta;
                stream.dropped_seen = dropped;
            }

            let has_rate = stream.has_rate();
            let spectrum_enabled = has_rate || settings.spectrum_for_events;

            // Rate-less channels advance every tick, with or without events
            let event_slice = if has_rate {
                report.samples += drained.samples;
                None
            } else {
                report.events += drained.event_timestamps.len();
                let (slice, raster) = rasterizer.rasterize(
                    dt,
                    now,
                    drained.event_timestamps.iter().copied(),
                );
                report.raster.merge(&raster);
                Some(slice)
            };

            for (channel, fresh) in stream.channels.iter_mut().zip(&drained.channels) {
                let new_samples: &[f64] = match &event_slice {
                    Some(slice) => slice,
                    None => fresh,
                };
                if new_samples.is_empty() {
                    continue;
                }

                channel.buffer.update(new_samples);

                // Zero fill would distort the spectrum until the window is real data
                if spectrum_enabled && channel.buffer.is_full() {
                    channel.spectrum =
                        Some(spectral.compute(channel.buffer.as_slice(), stream.rate));
                    report.spectra_computed += 1;
                }

                sink.publish(&ChannelView {
                    stream_index,
                    channel: channel.index,
                    label: &channel.label,
                    has_rate,
                    rate: stream.rate,
                    window_seconds: settings.window_seconds,
                    values: channel.buffer.as_slice(),
                    spectrum: channel.spectrum.as_ref(),
                    new_samples: new_samples.len(),
                });
                report.channels_published += 1;
            }

            if let DrainEnd::Failed(reason) = &drained.ended_by {
                tracing::warn!("Lost stream {}: {}", stream.info.label(), reason);
                stream.lost = true;
            } else if drained.ended_by == DrainEnd::ChunkLimit {
                tracing::debug!(
                    "{}: chunk limit reached, rest deferred",
                    stream.info.label()
                );
            }
        }

        tracing::trace!(
            "tick {}: {} samples, {} events, {} published",
            report.tick,
            report.samples,
            report.events,
            report.channels_published
        );
        sink.on_tick_end(&report);
        report
    }
}

// ==================== Loop ====================

/// Lifecycle of a [`MonitorLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Init,
    Running,
    Terminated,
}

/// Requests sent to a running monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Finish the current tick and terminate
    Stop,
    /// Re-resolve streams and rebuild the session
    Reload,
}

/// Handle for controlling a monitor from another thread
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: Sender<MonitorEvent>,
}

impl MonitorHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(MonitorEvent::Stop);
    }

    pub fn reload(&self) {
        let _ = self.tx.send(MonitorEvent::Reload);
    }
}

/// Fixed-period driver of a [`MonitorSession`]
pub struct MonitorLoop {
    bus: Arc<dyn Bus>,
    settings: MonitorSettings,
    sink: Box<dyn DisplaySink>,
    session: Option<MonitorSession>,
    state: MonitorState,
    running: Arc<AtomicBool>,
    event_rx: Receiver<MonitorEvent>,
    last_tick_time: Option<Instant>,
}

impl MonitorLoop {
    pub fn new(
        bus: Arc<dyn Bus>,
        settings: MonitorSettings,
        sink: Box<dyn DisplaySink>,
        running: Arc<AtomicBool>,
    ) -> (Self, MonitorHandle) {
        let (tx, event_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        let monitor = Self {
            bus,
            settings,
            sink,
            session: None,
            state: MonitorState::Init,
            running,
            event_rx,
            last_tick_time: None,
        };
        (monitor, MonitorHandle { tx })
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn session(&self) -> Option<&MonitorSession> {
        self.session.as_ref()
    }

    /// Resolve streams and enter `Running`
    pub fn start(&mut self) -> Result<()> {
        let session = MonitorSession::open(self.bus.as_ref(), self.settings.clone())?;
        self.session = Some(session);
        self.state = MonitorState::Running;
        Ok(())
    }

    /// Run until stopped.
    ///
    /// Startup errors (no stream on the bus) are returned before the first tick.
    pub fn run(&mut self) -> Result<()> {
        if self.state == MonitorState::Init {
            self.start()?;
        }
        tracing::info!(
            "Monitor running, refresh every {} ms",
            self.settings.refresh.as_millis()
        );

        while self.state == MonitorState::Running && self.running.load(Ordering::Relaxed) {
            self.process_events();
            if self.state != MonitorState::Running {
                break;
            }

            self.last_tick_time = Some(Instant::now());
            self.tick_once();
            self.rate_limit();
        }

        self.state = MonitorState::Terminated;
        self.session = None;
        tracing::info!("Monitor terminated");
        Ok(())
    }

    /// Run a single tick of the current session
    pub fn tick_once(&mut self) -> Option<TickReport> {
        let now = self.bus.clock();
        let session = self.session.as_mut()?;
        Some(session.tick(now, self.sink.as_mut()))
    }

    /// Apply pending stop and reload requests without ticking
    pub fn process_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                MonitorEvent::Stop => {
                    self.state = MonitorState::Terminated;
                    return;
                }
                MonitorEvent::Reload => self.reload(),
            }
        }
    }

    fn reload(&mut self) {
        tracing::info!("Reloading streams");
        match MonitorSession::open(self.bus.as_ref(), self.settings.clone()) {
            Ok(session) => self.session = Some(session),
            Err(e) => tracing::warn!("Reload failed, keeping current streams: {}", e),
        }
    }

    fn rate_limit(&self) {
        let target_interval = self.settings.refresh;
        let Some(last) = self.last_tick_time else {
            return;
        };

        let elapsed = last.elapsed();
        if elapsed < target_interval {
            let remaining = target_interval - elapsed;
            // Sleep most of the wait, spin the last millisecond
            if remaining > Duration::from_millis(2) {
                std::thread::sleep(remaining - Duration::from_millis(1));
            }
            while last.elapsed() < target_interval {
                std::hint::spin_loop();
            }
        } else {
            tracing::trace!("Tick overran refresh period by {:?}", elapsed - target_interval);
        }
    }
}
