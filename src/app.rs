//! Application wiring
//!
//! Builds the bus, the configured producers and the monitor loop from an
//! [`AppConfig`], and tears everything down again when the running flag is
//! cleared.
//!
//! # Main Types
//!
//! - [`App`] - Owns the bus, the producer threads and the shared running flag

use crate::acquisition::TcpEventListener;
use crate::bus::{Bus, LocalBus};
use crate::config::{AppConfig, ProducerConfig};
use crate::error::{Result, ResultExt};
use crate::monitor::{DisplaySink, MonitorHandle, MonitorLoop, MonitorSettings, TracingSink};
use crate::pacing::{spawn_producer, EventGenerator, Producer, ReplayProducer, SineGenerator};
use crate::types::StreamInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Name of the thread replaying recordings
const REPLAY_PRODUCER_NAME: &str = "replay";

/// Create one producer per configured entry, announcing their streams on `bus`
pub fn build_producers(
    bus: &dyn Bus,
    configs: &[ProducerConfig],
) -> Result<Vec<Box<dyn Producer>>> {
    let mut producers: Vec<Box<dyn Producer>> = Vec::with_capacity(configs.len());
    for (i, config) in configs.iter().enumerate() {
        let producer = build_producer(bus, config)
            .with_context(|| format!("producer {} ({})", i, config.kind()))?;
        producers.push(producer);
    }
    Ok(producers)
}

fn build_producer(bus: &dyn Bus, config: &ProducerConfig) -> Result<Box<dyn Producer>> {
    config.validate()?;
    match config {
        ProducerConfig::Sine(c) => Ok(Box::new(SineGenerator::new(bus, c.clone())?)),
        ProducerConfig::Events(c) => Ok(Box::new(EventGenerator::new(bus, c.clone())?)),
        ProducerConfig::Replay(c) => {
            let mut replay =
                ReplayProducer::new(REPLAY_PRODUCER_NAME, Duration::from_millis(c.tick_ms));
            for group in &c.groups {
                replay.add_group(bus, group)?;
            }
            Ok(Box::new(replay))
        }
        ProducerConfig::TcpEvents(c) => Ok(Box::new(TcpEventListener::bind(bus, c)?)),
        #[cfg(feature = "serial")]
        ProducerConfig::Serial(c) => Ok(Box::new(crate::acquisition::SerialListener::new(
            bus,
            c.clone(),
        )?)),
        #[cfg(not(feature = "serial"))]
        ProducerConfig::Serial(_) => Err(crate::error::PlslError::Config(
            "serial producer requires the `serial` feature".to_string(),
        )),
        #[cfg(feature = "midi")]
        ProducerConfig::Midi(c) => Ok(Box::new(crate::acquisition::MidiInputProducer::new(
            bus,
            c.clone(),
        )?)),
        #[cfg(not(feature = "midi"))]
        ProducerConfig::Midi(_) => Err(crate::error::PlslError::Config(
            "midi producer requires the `midi` feature".to_string(),
        )),
    }
}

/// A configured bus with its producers
pub struct App {
    config: AppConfig,
    bus: Arc<LocalBus>,
    running: Arc<AtomicBool>,
    producers: Vec<JoinHandle<()>>,
}

impl App {
    pub fn new(config: AppConfig, running: Arc<AtomicBool>) -> Result<Self> {
        config.validate()?;
        let bus = Arc::new(LocalBus::with_capacity(config.bus.inlet_queue_capacity));
        Ok(Self {
            config,
            bus,
            running,
            producers: Vec::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bus(&self) -> Arc<LocalBus> {
        self.bus.clone()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Spawn every configured producer on its own thread
    pub fn start_producers(&mut self) -> Result<()> {
        let producers = build_producers(self.bus.as_ref(), &self.config.producers)?;
        tracing::info!("Starting {} producer(s)", producers.len());
        for producer in producers {
            let handle = spawn_producer(producer, self.running.clone())?;
            self.producers.push(handle);
        }
        Ok(())
    }

    /// Streams visible on the bus after the configured discovery wait
    pub fn list_streams(&self) -> Vec<StreamInfo> {
        self.bus.resolve_streams(self.config.monitor.resolve_wait())
    }

    /// Run the monitor on the current thread with the given sink until stopped.
    ///
    /// `control` receives the monitor's handle before the first tick, so
    /// another thread can request a stop or a reload.
    pub fn run_monitor(
        &mut self,
        sink: Box<dyn DisplaySink>,
        control: impl FnOnce(MonitorHandle) -> Result<()>,
    ) -> Result<()> {
        let settings = MonitorSettings::from(&self.config.monitor);
        let bus: Arc<dyn Bus> = self.bus.clone();
        let (mut monitor, handle) = MonitorLoop::new(bus, settings, sink, self.running.clone());
        control(handle)?;
        monitor.run()
    }

    /// Start producers, run the monitor with a tracing sink, then shut down
    pub fn run(mut self, control: impl FnOnce(MonitorHandle) -> Result<()>) -> Result<()> {
        self.start_producers()?;
        let sink = TracingSink::new(self.config.monitor.summary_interval());
        let result = self.run_monitor(Box::new(sink), control);
        self.shutdown();
        result
    }

    /// Clear the running flag and wait for every producer thread
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for handle in self.producers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("A producer thread panicked");
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if !self.producers.is_empty() {
            self.shutdown();
        }
    }
}
