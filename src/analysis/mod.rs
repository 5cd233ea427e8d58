//! Analysis module for signal processing
//!
//! This module provides the frequency domain view of channel buffers:
//! - Magnitude spectrum over the full buffer window
//! - Peak detection

pub mod fft;

pub use fft::{SpectralPipeline, Spectrum, WindowFunction};
