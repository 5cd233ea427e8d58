//! Fixed-capacity sliding window of samples for one channel.
//!
//! The buffer is zero-filled at construction, so its length is always its
//! capacity. Each update shifts the window left by the number of new samples
//! and writes them into the trailing slots; the oldest samples are evicted
//! first.

/// Sliding window holding the newest `capacity` samples of a channel
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<f64>,
    /// Samples written since construction, saturating at capacity
    filled: usize,
}

impl RingBuffer {
    /// Create a zero-filled buffer of `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity],
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whether every slot holds a real sample rather than initial zero fill
    pub fn is_full(&self) -> bool {
        self.filled >= self.data.len()
    }

    /// Number of real samples written so far (saturating at capacity)
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Buffer contents, oldest first
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Slide the window forward by `samples.len()` and append them.
    ///
    /// An empty slice leaves the buffer untouched. When more samples than
    /// the capacity arrive only the newest `capacity` are kept.
    pub fn update(&mut self, samples: &[f64]) {
        let n = self.data.len();
        let k = samples.len();
        if k == 0 || n == 0 {
            return;
        }

        if k >= n {
            self.data.copy_from_slice(&samples[k - n..]);
        } else {
            self.data.copy_within(k.., 0);
            self.data[n - k..].copy_from_slice(samples);
        }
        self.filled = (self.filled + k).min(n);
    }
}

/// Number of slots needed to hold `window_seconds` at `rate` Hz
pub fn capacity_for(rate: f64, window_seconds: f64) -> usize {
    if !rate.is_finite() || !window_seconds.is_finite() || rate <= 0.0 || window_seconds <= 0.0 {
        return 0;
    }
    (rate * window_seconds).floor() as usize
}
