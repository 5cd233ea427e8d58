//! # plsl-rs: Real-time telemetry bus monitor
//!
//! Producers publish sampled streams and string event streams on a shared
//! bus; a fixed-period monitor drains every stream without blocking, keeps a
//! rolling window per channel and computes live spectra.
//!
//! ## Architecture
//!
//! - **Bus**: Outlets, inlets and a shared monotonic clock ([`bus::LocalBus`]
//!   runs in-process on crossbeam channels)
//! - **Pacing**: Drift-free replay of recordings and synthetic generators,
//!   each on its own producer thread
//! - **Acquisition**: TCP, serial and MIDI front-ends that only push to outlets
//! - **Monitor**: Zero-wait draining, ring buffers, the pseudo-timeline
//!   rasterizer for event streams, and display sinks
//! - **Analysis**: FFT magnitude spectra with `rustfft`
//!
//! ## Configuration
//!
//! Configuration is TOML, read from `--config` or the platform config
//! directory under `plsl-rs` (see [`config`]).
//!
//! ## Example
//!
//! ```ignore
//! use plsl_rs::{App, AppConfig};
//! use std::sync::{atomic::AtomicBool, Arc};
//!
//! fn main() -> plsl_rs::Result<()> {
//!     let running = Arc::new(AtomicBool::new(true));
//!     App::new(AppConfig::sample(), running)?.run(|_handle| Ok(()))
//! }
//! ```

pub mod acquisition;
pub mod analysis;
pub mod app;
pub mod bus;
pub mod config;
pub mod error;
pub mod monitor;
pub mod pacing;
pub mod types;

// Re-export commonly used types
pub use app::App;
pub use bus::{Bus, Inlet, LocalBus, Outlet};
pub use config::AppConfig;
pub use error::{PlslError, Result};
pub use monitor::{MonitorLoop, MonitorSession, MonitorSettings, TickReport};
pub use pacing::{PacingScheduler, Producer, ReplayProducer};
pub use types::{ChannelFormat, Chunk, Sample, StreamInfo};
