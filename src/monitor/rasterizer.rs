//! Pseudo timeline for rate-less event channels
//!
//! Event streams have no sampling interval, yet the monitor keeps a fixed
//! size buffer for them like any other channel. Each tick the rasterizer
//! synthesizes `round(pseudo_rate * dt)` zero samples, so the channel advances
//! at a steady virtual cadence, and then stamps an impulse for every received
//! event at the slot matching its age:
//!
//! ```text
//! offset = round((now - timestamp) * pseudo_rate)
//! slot   = generated_len - 1 - offset
//! ```
//!
//! The resolution is `1 / pseudo_rate` seconds; two events in the same slot
//! collide and the later write wins.
//!
//! # Bounds
//!
//! Offsets are always clamped into the slice generated this tick. An event
//! older than the slice lands on its oldest slot and an event stamped in the
//! future lands on its newest slot; nothing outside the slice is written.

/// Default virtual sampling rate of event channels (Hz)
pub const DEFAULT_PSEUDO_RATE_HZ: f64 = 1000.0;

/// Default marker written for each event
pub const DEFAULT_IMPULSE_VALUE: f64 = 1.0;

/// Where an event landed in the generated slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The computed slot was inside the slice
    Exact(usize),
    /// The computed slot was outside the slice and was clamped
    Clamped(usize),
    /// The slice is empty; the event could not be placed
    Dropped,
}

/// Counters describing one rasterization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterizeReport {
    pub generated: usize,
    pub placed: usize,
    pub clamped: usize,
    pub dropped: usize,
}

impl RasterizeReport {
    /// Add the counters of another pass
    pub fn merge(&mut self, other: &RasterizeReport) {
        self.generated += other.generated;
        self.placed += other.placed;
        self.clamped += other.clamped;
        self.dropped += other.dropped;
    }

    fn record(&mut self, placement: Placement) {
        match placement {
            Placement::Exact(_) => self.placed += 1,
            Placement::Clamped(_) => {
                self.placed += 1;
                self.clamped += 1;
            }
            Placement::Dropped => self.dropped += 1,
        }
    }
}

/// Maps event timestamps onto a uniform virtual-rate timeline
#[derive(Debug, Clone, Copy)]
pub struct PseudoTimelineRasterizer {
    pseudo_rate: f64,
    impulse: f64,
}

impl PseudoTimelineRasterizer {
    pub fn new(pseudo_rate: f64, impulse: f64) -> Self {
        Self {
            pseudo_rate,
            impulse,
        }
    }

    pub fn pseudo_rate(&self) -> f64 {
        self.pseudo_rate
    }

    /// Number of virtual samples covering `dt` seconds
    pub fn fill_len(&self, dt: f64) -> usize {
        let n = (self.pseudo_rate * dt).round();
        if n.is_finite() && n > 0.0 {
            n as usize
        } else {
            0
        }
    }

    /// Zero-filled slice advancing the timeline by `dt` seconds
    pub fn generate(&self, dt: f64) -> Vec<f64> {
        vec![0.0; self.fill_len(dt)]
    }

    /// Slot of an event stamped `timestamp`, seen at `now`, in a slice of `len`
    pub fn slot_for(&self, len: usize, now: f64, timestamp: f64) -> Placement {
        if len == 0 {
            return Placement::Dropped;
        }
        let newest = len - 1;
        let offset = ((now - timestamp) * self.pseudo_rate).round();

        if offset.is_nan() {
            Placement::Dropped
        } else if offset < 0.0 {
            Placement::Clamped(newest)
        } else if offset > newest as f64 {
            Placement::Clamped(0)
        } else {
            Placement::Exact(newest - offset as usize)
        }
    }

    /// Stamp an impulse into `slice` for each event timestamp
    pub fn place(
        &self,
        slice: &mut [f64],
        now: f64,
        timestamps: impl IntoIterator<Item = f64>,
    ) -> RasterizeReport {
        let mut report = RasterizeReport {
            generated: slice.len(),
            ..Default::default()
        };

        for ts in timestamps {
            let placement = self.slot_for(slice.len(), now, ts);
            match placement {
                Placement::Exact(idx) | Placement::Clamped(idx) => slice[idx] = self.impulse,
                Placement::Dropped => {}
            }
            if placement != Placement::Dropped {
                tracing::trace!("event at {:.4}s -> {:?}", ts, placement);
            }
            report.record(placement);
        }

        report
    }

    /// Generate this tick's slice and place all events into it
    pub fn rasterize(
        &self,
        dt: f64,
        now: f64,
        timestamps: impl IntoIterator<Item = f64>,
    ) -> (Vec<f64>, RasterizeReport) {
        let mut slice = self.generate(dt);
        let report = self.place(&mut slice, now, timestamps);
        (slice, report)
    }
}

impl Default for PseudoTimelineRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_PSEUDO_RATE_HZ, DEFAULT_IMPULSE_VALUE)
    }
}
