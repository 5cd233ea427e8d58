//! Drift-free sample pacing
//!
//! A producer replaying a finite recording wakes up on a coarse timer, but
//! the number of samples it owes the bus depends on how much wall-clock time
//! actually passed. Each tick the scheduler converts the measured elapsed
//! time into an integer sample count per rate group:
//!
//! ```text
//! n_elapsed = dt * rate + carry
//! carry'    = n_elapsed mod 1
//! n_read    = floor(n_elapsed)
//! ```
//!
//! The fractional remainder is carried forward so that, over any run, the
//! number of emitted samples stays within one of `rate * elapsed`.
//!
//! # Main Types
//!
//! - [`FractionalCarry`] - Elapsed time to integer sample counts
//! - [`RateGroup`] - Carry plus circular read cursor for one recording
//! - [`ReadPlan`] - The frames to read for one group on one tick
//! - [`PacingScheduler`] - All rate groups of a producer

use crate::error::{PlslError, Result};

/// Converts elapsed seconds into whole sample counts, keeping the remainder
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FractionalCarry {
    carry: f64,
}

impl FractionalCarry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of a sample owed from previous steps, in `[0, 1)`
    pub fn carry(&self) -> f64 {
        self.carry
    }

    /// Samples due after `dt` seconds at `rate` Hz
    pub fn step(&mut self, dt: f64, rate: f64) -> usize {
        let n_elapsed = dt * rate + self.carry;
        let whole = n_elapsed.floor();
        self.carry = (n_elapsed - whole).clamp(0.0, 1.0);
        if self.carry >= 1.0 {
            // Rounding can leave exactly 1.0; fold it back into the count
            self.carry = 0.0;
            return whole as usize + 1;
        }
        whole as usize
    }
}

/// Pacing state of one recording replayed at its own rate
#[derive(Debug, Clone)]
pub struct RateGroup {
    rate: f64,
    len: usize,
    carry: FractionalCarry,
    cursor: usize,
}

impl RateGroup {
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Length of the underlying recording in frames
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the next frame to read
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn carry(&self) -> f64 {
        self.carry.carry()
    }

    fn advance(&mut self, group: usize, dt: f64) -> ReadPlan {
        let count = self.carry.step(dt, self.rate);
        let plan = ReadPlan {
            group,
            start: self.cursor,
            count,
            len: self.len,
        };
        self.cursor = (self.cursor + count % self.len) % self.len;
        plan
    }
}

/// Frames one group must emit on this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPlan {
    /// Index of the group in the scheduler
    pub group: usize,
    /// Cursor before the read
    pub start: usize,
    /// Number of frames to read, possibly zero
    pub count: usize,
    /// Recording length the indices wrap around
    pub len: usize,
}

impl ReadPlan {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Frame indices `(start + k) mod len` for `k` in `0..count`
    pub fn indices(&self) -> impl Iterator<Item = usize> {
        let ReadPlan {
            start, count, len, ..
        } = *self;
        (0..count).map(move |k| (start + k) % len)
    }
}

/// Paces circular reads of one or more recordings
#[derive(Debug, Clone, Default)]
pub struct PacingScheduler {
    groups: Vec<RateGroup>,
}

impl PacingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recording of `len` frames replayed at `rate` Hz.
    ///
    /// Returns the group index used in [`ReadPlan::group`].
    pub fn add_group(&mut self, rate: f64, len: usize) -> Result<usize> {
        if len == 0 {
            return Err(PlslError::Config("replay source is empty".to_string()));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PlslError::Config(format!(
                "replay rate must be positive, got {}",
                rate
            )));
        }

        self.groups.push(RateGroup {
            rate,
            len,
            carry: FractionalCarry::new(),
            cursor: 0,
        });
        Ok(self.groups.len() - 1)
    }

    pub fn groups(&self) -> &[RateGroup] {
        &self.groups
    }

    /// Advance every group by a measured `dt` seconds
    pub fn advance(&mut self, dt: f64) -> Result<Vec<ReadPlan>> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(PlslError::Config(format!(
                "elapsed time must be finite and non-negative, got {}",
                dt
            )));
        }

        Ok(self
            .groups
            .iter_mut()
            .enumerate()
            .map(|(i, group)| group.advance(i, dt))
            .collect())
    }
}
