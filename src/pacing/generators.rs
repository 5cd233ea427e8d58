//! Synthetic test streams
//!
//! [`SineGenerator`] emits a noisy multi-channel sine at a nominal rate,
//! paced by measured elapsed time like a replay. [`EventGenerator`] emits a
//! fixed string event on an interval.

use super::producer::{sleep_while_running, Producer};
use super::scheduler::FractionalCarry;
use crate::bus::{Bus, Outlet};
use crate::config::{EventProducerConfig, SineProducerConfig};
use crate::error::Result;
use crate::types::{ChannelFormat, StreamInfo};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

/// Sum of one sine per channel plus uniform noise
pub struct SineGenerator {
    config: SineProducerConfig,
    outlet: Box<dyn Outlet>,
    carry: FractionalCarry,
    /// Index of the next generated sample
    index: u64,
    rng: StdRng,
}

impl SineGenerator {
    pub fn new(bus: &dyn Bus, config: SineProducerConfig) -> Result<Self> {
        config.validate()?;
        let info = StreamInfo::new(
            config.name.clone(),
            config.stream_type.clone(),
            config.frequencies.len(),
            config.rate_hz,
            ChannelFormat::Float32,
            config.source_id.clone(),
        );
        let outlet = bus.open_outlet(info)?;

        Ok(Self {
            config,
            outlet,
            carry: FractionalCarry::new(),
            index: 0,
            rng: StdRng::from_entropy(),
        })
    }

    /// Use a fixed seed for the noise
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Next `count` frames of the signal
    pub fn generate(&mut self, count: usize) -> Vec<Vec<f64>> {
        let noise = self.config.noise_amplitude.abs();
        let mut frames = Vec::with_capacity(count);

        for _ in 0..count {
            let t = self.index as f64 / self.config.rate_hz;
            let frame = self
                .config
                .frequencies
                .iter()
                .map(|&f| {
                    let jitter = if noise > 0.0 {
                        self.rng.gen_range(-noise..=noise)
                    } else {
                        0.0
                    };
                    self.config.amplitude * (2.0 * PI * f * t).sin() + jitter
                })
                .collect();
            frames.push(frame);
            self.index += 1;
        }
        frames
    }

    /// Push the samples owed after `dt` seconds
    pub fn step(&mut self, dt: f64) -> Result<usize> {
        let count = self.carry.step(dt.max(0.0), self.config.rate_hz);
        if count == 0 {
            return Ok(0);
        }
        let frames = self.generate(count);
        self.outlet.push_chunk(&frames, self.outlet.clock())?;
        Ok(count)
    }
}

impl Producer for SineGenerator {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn run(&mut self, running: &AtomicBool) -> Result<()> {
        let tick = Duration::from_millis(self.config.tick_ms);
        let mut last = Instant::now();
        while sleep_while_running(tick, running) {
            let now = Instant::now();
            self.step(now.duration_since(last).as_secs_f64())?;
            last = now;
        }
        Ok(())
    }
}

/// Fixed string event pushed on an interval
pub struct EventGenerator {
    config: EventProducerConfig,
    outlet: Box<dyn Outlet>,
}

impl EventGenerator {
    pub fn new(bus: &dyn Bus, config: EventProducerConfig) -> Result<Self> {
        let info = StreamInfo::new(
            config.name.clone(),
            config.stream_type.clone(),
            1,
            0.0,
            ChannelFormat::String,
            config.source_id.clone(),
        );
        let outlet = bus.open_outlet(info)?;
        Ok(Self { config, outlet })
    }

    /// Push one event stamped now
    pub fn emit(&self) -> Result<()> {
        self.outlet
            .push_text(std::slice::from_ref(&self.config.message), None)
    }
}

impl Producer for EventGenerator {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn run(&mut self, running: &AtomicBool) -> Result<()> {
        let interval = Duration::from_millis(self.config.interval_ms);
        loop {
            self.emit()?;
            if !sleep_while_running(interval, running) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::types::SampleValues;

    fn quiet_sine() -> SineProducerConfig {
        SineProducerConfig {
            frequencies: vec![5.0],
            amplitude: 2.0,
            noise_amplitude: 0.0,
            rate_hz: 100.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_sine_values() {
        let bus = LocalBus::new();
        let mut sine = SineGenerator::new(&bus, quiet_sine()).unwrap();
        let frames = sine.generate(6);
        assert_eq!(frames[0], vec![0.0]);
        // 5 Hz at 100 Hz peaks at sample 5
        assert!((frames[5][0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_noise_is_bounded() {
        let bus = LocalBus::new();
        let config = SineProducerConfig {
            amplitude: 0.0,
            noise_amplitude: 1.0,
            ..Default::default()
        };
        let mut sine = SineGenerator::new(&bus, config).unwrap().with_seed(7);
        for frame in sine.generate(200) {
            assert_eq!(frame.len(), 3);
            assert!(frame.iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_sine_step_is_paced() {
        let bus = LocalBus::new();
        let mut sine = SineGenerator::new(&bus, quiet_sine()).unwrap();
        let info = bus.resolve_streams(Duration::ZERO).remove(0);
        let mut inlet = bus.open_inlet(&info).unwrap();

        // 0.025 s at 100 Hz owes 2.5 samples per step
        let pushed: usize = (0..4).map(|_| sine.step(0.025).unwrap()).sum();
        assert_eq!(pushed, 10);

        let mut received = 0;
        loop {
            let chunk = inlet.pull_chunk(Duration::ZERO).unwrap();
            if chunk.is_empty() {
                break;
            }
            received += chunk.len();
        }
        assert_eq!(received, 10);
    }

    #[test]
    fn test_event_generator_emits_text() {
        let bus = LocalBus::new();
        let events = EventGenerator::new(&bus, EventProducerConfig::default()).unwrap();
        let info = bus.resolve_streams(Duration::ZERO).remove(0);
        assert!(!info.has_rate());
        let mut inlet = bus.open_inlet(&info).unwrap();

        events.emit().unwrap();
        let chunk = inlet.pull_chunk(Duration::ZERO).unwrap();
        assert_eq!(
            chunk.samples[0].values,
            SampleValues::Text(vec!["foo".to_string()])
        );
    }
}
