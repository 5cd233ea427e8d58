//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use plsl_rs::bus::Inlet;
use plsl_rs::monitor::MonitorSettings;
use plsl_rs::types::{Sample, SampleValues};
use std::time::Duration;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(100)
}

/// Monitor settings that resolve instantly over a short window
pub fn fast_settings(window_seconds: f64) -> MonitorSettings {
    MonitorSettings {
        window_seconds,
        resolve_wait: Duration::ZERO,
        refresh: Duration::from_millis(10),
        ..Default::default()
    }
}

/// Pull every queued sample from `inlet` without waiting
pub fn drain_samples(inlet: &mut dyn Inlet) -> Vec<Sample> {
    let mut samples = Vec::new();
    loop {
        let chunk = inlet.pull_chunk(Duration::ZERO).expect("pull failed");
        if chunk.is_empty() {
            return samples;
        }
        samples.extend(chunk.samples);
    }
}

/// Numeric values of `samples` for one channel
pub fn channel_values(samples: &[Sample], channel: usize) -> Vec<f64> {
    samples
        .iter()
        .filter_map(|s| match &s.values {
            SampleValues::Numeric(v) => v.get(channel).copied(),
            SampleValues::Text(_) => None,
        })
        .collect()
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
