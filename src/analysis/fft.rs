//! Spectral analysis of channel buffers
//!
//! Provides the per-tick magnitude spectrum shown next to every regular
//! channel:
//! - Real forward FFT over the whole buffer (no zero padding, no averaging)
//! - Unnormalised magnitude `|X_k|` for bins `k = 0 ..= N/2`
//! - DC bin computed but kept out of the exposed bins
//! - Optional window functions (rectangular by default)

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function type for FFT preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    /// Rectangular window (no windowing)
    #[default]
    Rectangular,
    /// Hann window (good general purpose)
    Hann,
    /// Hamming window (reduced side lobes)
    Hamming,
    /// Blackman window (very low side lobes)
    Blackman,
}

impl WindowFunction {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            WindowFunction::Rectangular => "Rectangular",
            WindowFunction::Hann => "Hann",
            WindowFunction::Hamming => "Hamming",
            WindowFunction::Blackman => "Blackman",
        }
    }

    /// Get all window functions
    pub fn all() -> &'static [WindowFunction] {
        &[
            WindowFunction::Rectangular,
            WindowFunction::Hann,
            WindowFunction::Hamming,
            WindowFunction::Blackman,
        ]
    }

    /// Compute window coefficient at position i out of n samples
    pub fn coefficient(&self, i: usize, n: usize) -> f64 {
        let n_f = n as f64;
        let i_f = i as f64;

        match self {
            WindowFunction::Rectangular => 1.0,
            WindowFunction::Hann => 0.5 * (1.0 - (2.0 * PI * i_f / n_f).cos()),
            WindowFunction::Hamming => 0.54 - 0.46 * (2.0 * PI * i_f / n_f).cos(),
            WindowFunction::Blackman => {
                // Clamp to 0.0: the formula is exactly 0 at endpoints but
                // floating-point representation of 0.42 and 0.08 can produce -ε.
                (0.42 - 0.5 * (2.0 * PI * i_f / n_f).cos() + 0.08 * (4.0 * PI * i_f / n_f).cos())
                    .max(0.0)
            }
        }
    }
}

/// Magnitude spectrum of one channel buffer, DC bin excluded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    /// Bin frequencies (Hz), starting at bin 1
    pub frequencies: Vec<f64>,
    /// Magnitudes matching `frequencies`
    pub magnitudes: Vec<f64>,
    /// Magnitude of the excluded zero-frequency bin
    pub dc: f64,
    /// Sample rate used for computation
    pub sample_rate: f64,
    /// Number of samples transformed
    pub sample_count: usize,
}

impl Spectrum {
    /// Frequency resolution (Hz per bin)
    pub fn frequency_resolution(&self) -> f64 {
        if self.sample_count == 0 {
            0.0
        } else {
            self.sample_rate / self.sample_count as f64
        }
    }

    /// Find the peak frequency and its magnitude
    pub fn peak(&self) -> Option<(f64, f64)> {
        let (idx, &max_mag) = self
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;

        Some((self.frequencies[idx], max_mag))
    }
}

/// Recomputes channel spectra; FFT plans are cached by the planner per length
pub struct SpectralPipeline {
    planner: FftPlanner<f64>,
    window: WindowFunction,
    scratch: Vec<Complex<f64>>,
}

impl SpectralPipeline {
    /// Create a pipeline with a rectangular window
    pub fn new() -> Self {
        Self::with_window(WindowFunction::Rectangular)
    }

    pub fn with_window(window: WindowFunction) -> Self {
        Self {
            planner: FftPlanner::new(),
            window,
            scratch: Vec::new(),
        }
    }

    pub fn window(&self) -> WindowFunction {
        self.window
    }

    /// Magnitude spectrum of the full `samples` window at `sample_rate` Hz.
    ///
    /// Bin `k` sits at `k * sample_rate / N`; bin 0 is reported as `dc` and
    /// left out of `frequencies`/`magnitudes`.
    pub fn compute(&mut self, samples: &[f64], sample_rate: f64) -> Spectrum {
        let n = samples.len();
        if n == 0 {
            return Spectrum {
                sample_rate,
                ..Default::default()
            };
        }

        self.scratch.clear();
        self.scratch.extend(
            samples
                .iter()
                .enumerate()
                .map(|(i, &s)| Complex::new(s * self.window.coefficient(i, n), 0.0)),
        );

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut self.scratch);

        let freq_resolution = sample_rate / n as f64;
        let num_bins = n / 2 + 1;

        let dc = self.scratch[0].norm();
        let frequencies: Vec<f64> = (1..num_bins).map(|k| k as f64 * freq_resolution).collect();
        let magnitudes: Vec<f64> = self.scratch[1..num_bins].iter().map(|c| c.norm()).collect();

        Spectrum {
            frequencies,
            magnitudes,
            dc,
            sample_rate,
            sample_count: n,
        }
    }
}

impl Default for SpectralPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_window_functions() {
        let n = 100;
        for window in WindowFunction::all() {
            for i in 0..n {
                let c = window.coefficient(i, n);
                assert!(
                    (0.0..=1.0 + 1e-12).contains(&c),
                    "Window {} coefficient {} out of range",
                    window.display_name(),
                    c
                );
            }
        }
    }

    #[test]
    fn test_peak_at_nearest_bin() {
        let sample_rate = 256.0;
        let n = 1280; // 5 s window, 0.2 Hz bins
        let freq = 10.33;

        let mut pipeline = SpectralPipeline::new();
        let spectrum = pipeline.compute(&sine(freq, sample_rate, n), sample_rate);

        let (peak_freq, _) = spectrum.peak().expect("Should find peak");
        let resolution = spectrum.frequency_resolution();
        let nearest = (freq / resolution).round() * resolution;
        assert!(
            (peak_freq - nearest).abs() < 1e-9,
            "Peak frequency {} should be the bin nearest {} ({})",
            peak_freq,
            freq,
            nearest
        );
    }

    #[test]
    fn test_bin_layout_excludes_dc() {
        let mut pipeline = SpectralPipeline::new();
        let spectrum = pipeline.compute(&vec![1.0; 200], 100.0);

        // N = 200 -> bins 0..=100, bin 0 dropped
        assert_eq!(spectrum.frequencies.len(), 100);
        assert_eq!(spectrum.magnitudes.len(), 100);
        assert!((spectrum.frequencies[0] - 0.5).abs() < 1e-12);
        assert!((spectrum.frequencies[99] - 50.0).abs() < 1e-12);

        // A constant signal puts everything in the DC bin, unnormalised
        assert!((spectrum.dc - 200.0).abs() < 1e-9);
        assert!(spectrum.magnitudes.iter().all(|&m| m < 1e-9));
    }

    #[test]
    fn test_magnitude_is_unnormalised() {
        let n = 100;
        let mut pipeline = SpectralPipeline::new();
        // Integer number of cycles: 5 cycles in 100 samples at 100 Hz -> 5 Hz
        let spectrum = pipeline.compute(&sine(5.0, 100.0, n), 100.0);
        let (freq, mag) = spectrum.peak().unwrap();
        assert!((freq - 5.0).abs() < 1e-9);
        assert!((mag - n as f64 / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_input() {
        let mut pipeline = SpectralPipeline::new();
        let spectrum = pipeline.compute(&[], 1000.0);
        assert!(spectrum.frequencies.is_empty());
        assert!(spectrum.peak().is_none());
    }

    #[test]
    fn test_odd_length() {
        let mut pipeline = SpectralPipeline::new();
        let spectrum = pipeline.compute(&sine(3.0, 30.0, 15), 30.0);
        // N = 15 -> bins 0..=7
        assert_eq!(spectrum.frequencies.len(), 7);
    }
}
