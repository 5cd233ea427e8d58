//! Producer threads
//!
//! Every producer owns its outlets and runs its own loop on a dedicated
//! thread until the shared running flag is cleared. Producers only talk to
//! the monitor through the bus.

use super::scheduler::PacingScheduler;
use super::source::ReplaySource;
use crate::bus::{Bus, Outlet};
use crate::config::ReplayGroupConfig;
use crate::error::{Result, ResultExt};
use crate::types::StreamInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep, so a stop request is seen promptly
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// A stream source driven by its own loop
pub trait Producer: Send {
    /// Name used for the thread and in logs
    fn name(&self) -> &str;

    /// Produce until `running` is cleared or a fatal error occurs
    fn run(&mut self, running: &AtomicBool) -> Result<()>;
}

/// Run `producer` on a named thread
pub fn spawn_producer(
    mut producer: Box<dyn Producer>,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let name = producer.name().to_string();
    std::thread::Builder::new()
        .name(format!("producer-{}", name))
        .spawn(move || {
            tracing::info!("Producer {} started", name);
            match producer.run(&running) {
                Ok(()) => tracing::info!("Producer {} stopped", name),
                Err(e) => tracing::error!("Producer {} failed: {}", name, e),
            }
        })
}

/// Sleep for `duration`, waking early when `running` is cleared.
///
/// Returns whether the producer should keep going.
pub fn sleep_while_running(duration: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !running.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// One recording and the outlet it is replayed to
struct ReplayStream {
    source: ReplaySource,
    outlet: Box<dyn Outlet>,
}

/// Replays finite recordings in a loop at their nominal rates
pub struct ReplayProducer {
    name: String,
    tick: Duration,
    scheduler: PacingScheduler,
    streams: Vec<ReplayStream>,
}

impl ReplayProducer {
    pub fn new(name: impl Into<String>, tick: Duration) -> Self {
        Self {
            name: name.into(),
            tick,
            scheduler: PacingScheduler::new(),
            streams: Vec::new(),
        }
    }

    /// Announce `info` on the bus and replay `source` to it.
    ///
    /// The stream's rate, channel count and format are taken from the source.
    pub fn add_stream(
        &mut self,
        bus: &dyn Bus,
        mut info: StreamInfo,
        source: ReplaySource,
    ) -> Result<()> {
        info.nominal_rate = source.rate();
        info.channel_count = source.channel_count();
        info.channel_format = source.format();
        let outlet = bus.open_outlet(info)?;

        // On failure the outlet is dropped and the stream forgotten again
        let group = self.scheduler.add_group(source.rate(), source.len())?;
        debug_assert_eq!(group, self.streams.len());
        tracing::debug!(
            "Replaying {} frames to {}",
            source.len(),
            outlet.info().label()
        );

        self.streams.push(ReplayStream { source, outlet });
        Ok(())
    }

    /// Decode a configured group of WAV files and add it as a stream
    pub fn add_group(&mut self, bus: &dyn Bus, group: &ReplayGroupConfig) -> Result<()> {
        let source = ReplaySource::from_wav_files(group.files.as_slice())
            .with_context(|| format!("replay group {:?}", group.name))?;
        let info = StreamInfo::new(
            group.name.clone(),
            group.stream_type.clone(),
            source.channel_count(),
            source.rate(),
            source.format(),
            group.source_id.clone(),
        );
        self.add_stream(bus, info, source)
    }

    pub fn scheduler(&self) -> &PacingScheduler {
        &self.scheduler
    }

    /// Advance by a measured `dt` and push each group's frames.
    ///
    /// Returns the number of frames pushed per group.
    pub fn step(&mut self, dt: f64) -> Result<Vec<usize>> {
        let plans = self.scheduler.advance(dt)?;
        let mut pushed = Vec::with_capacity(plans.len());

        for plan in plans {
            let stream = &self.streams[plan.group];
            if plan.is_empty() {
                pushed.push(0);
                continue;
            }
            let frames = stream.source.frames(&plan);
            stream.outlet.push_chunk(&frames, stream.outlet.clock())?;
            pushed.push(frames.len());
        }

        tracing::trace!("{}: pushed {:?}", self.name, pushed);
        Ok(pushed)
    }
}

impl Producer for ReplayProducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, running: &AtomicBool) -> Result<()> {
        let mut last = Instant::now();
        while sleep_while_running(self.tick, running) {
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64();
            last = now;
            self.step(dt)?;
        }
        Ok(())
    }
}
