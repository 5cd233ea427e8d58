//! Integration tests for drift-free replay
//!
//! These tests drive replay producers by hand with measured tick lengths and
//! read the frames back through the in-process bus.

mod common;

use common::builders::{counting_source, write_wav, StreamInfoBuilder};
use common::{channel_values, drain_samples};
use plsl_rs::app::build_producers;
use plsl_rs::bus::{Bus, LocalBus};
use plsl_rs::config::{ProducerConfig, ReplayGroupConfig, ReplayProducerConfig};
use plsl_rs::pacing::ReplayProducer;
use std::time::Duration;

#[test]
fn test_ten_seconds_of_50ms_ticks_wrap_cleanly() {
    let bus = LocalBus::new();
    let mut producer = ReplayProducer::new("replay", Duration::from_millis(50));
    producer
        .add_stream(
            &bus,
            StreamInfoBuilder::new("ECG").build(),
            counting_source(100.0, 1, 1000),
        )
        .unwrap();
    let info = bus.resolve_streams(Duration::ZERO).remove(0);
    let mut inlet = bus.open_inlet(&info).unwrap();

    let mut total = 0;
    for _ in 0..200 {
        total += producer.step(0.05).unwrap()[0];
    }
    assert!((999..=1001).contains(&total), "pushed {}", total);

    let values = channel_values(&drain_samples(inlet.as_mut()), 0);
    assert_eq!(values.len(), total);
    for (i, v) in values.iter().enumerate() {
        assert_eq!(*v, (i % 1000) as f64);
    }
    let group = &producer.scheduler().groups()[0];
    assert_eq!(group.cursor(), total % 1000);
}

#[test]
fn test_irregular_ticks_stay_on_rate() {
    let bus = LocalBus::new();
    let mut producer = ReplayProducer::new("replay", Duration::from_millis(20));
    producer
        .add_stream(
            &bus,
            StreamInfoBuilder::new("Resp").channels(2).build(),
            counting_source(128.0, 2, 300),
        )
        .unwrap();

    let ticks = [0.013, 0.041, 0.002, 0.097, 0.020, 0.0, 0.055, 0.033];
    let mut elapsed = 0.0;
    let mut total = 0usize;
    for _ in 0..25 {
        for dt in ticks {
            elapsed += dt;
            total += producer.step(dt).unwrap()[0];
        }
    }
    let expected = elapsed * 128.0;
    assert!(
        (total as f64 - expected).abs() <= 1.0,
        "pushed {} for {:.3} s",
        total,
        elapsed
    );
}

#[test]
fn test_groups_advance_independently() {
    let bus = LocalBus::new();
    let mut producer = ReplayProducer::new("replay", Duration::from_millis(50));
    producer
        .add_stream(
            &bus,
            StreamInfoBuilder::new("ECG").build(),
            counting_source(256.0, 1, 2560),
        )
        .unwrap();
    producer
        .add_stream(
            &bus,
            StreamInfoBuilder::new("Acc").channels(3).build(),
            counting_source(32.0, 3, 320),
        )
        .unwrap();

    let mut totals = [0usize; 2];
    for _ in 0..40 {
        let pushed = producer.step(0.05).unwrap();
        totals[0] += pushed[0];
        totals[1] += pushed[1];
    }
    assert!((511..=513).contains(&totals[0]));
    assert!((63..=65).contains(&totals[1]));
}

#[test]
fn test_replay_group_from_wav_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ecg.wav");
    let samples: Vec<i16> = (0..64).collect();
    write_wav(&path, 16, &samples);

    let bus = LocalBus::new();
    let config = ProducerConfig::Replay(ReplayProducerConfig {
        tick_ms: 50,
        groups: vec![ReplayGroupConfig {
            name: "ECG".to_string(),
            stream_type: "Cardio".to_string(),
            source_id: "ecg".to_string(),
            files: vec![path],
        }],
    });
    let producers = build_producers(&bus, &[config]).unwrap();
    assert_eq!(producers.len(), 1);

    let streams = bus.resolve_streams(Duration::ZERO);
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].nominal_rate, 16.0);
    assert_eq!(streams[0].channel_count, 1);
}

#[test]
fn test_missing_wav_is_reported() {
    let bus = LocalBus::new();
    let config = ProducerConfig::Replay(ReplayProducerConfig {
        tick_ms: 50,
        groups: vec![ReplayGroupConfig {
            name: "ECG".to_string(),
            stream_type: "Cardio".to_string(),
            source_id: "ecg".to_string(),
            files: vec!["/nonexistent/ecg.wav".into()],
        }],
    });
    let err = build_producers(&bus, &[config]).err().unwrap();
    assert!(err.to_string().contains("ECG"));
    assert!(bus.resolve_streams(Duration::ZERO).is_empty());
}
