//! Producer side of the bus
//!
//! This module turns recordings and synthetic signals into streams:
//!
//! - [`scheduler`] - Fractional-carry pacing of circular reads
//! - [`source`] - WAV-backed replay sources
//! - [`producer`] - The [`Producer`] trait, thread spawning and the replay loop
//! - [`generators`] - Sine and event test generators

pub mod generators;
pub mod producer;
pub mod scheduler;
pub mod source;

pub use generators::{EventGenerator, SineGenerator};
pub use producer::{sleep_while_running, spawn_producer, Producer, ReplayProducer};
pub use scheduler::{FractionalCarry, PacingScheduler, RateGroup, ReadPlan};
pub use source::{ReplaySource, WavRecording};
