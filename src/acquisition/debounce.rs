//! Event debouncing
//!
//! Mechanical buttons wired to a serial port bounce; only the first event in
//! a burst is kept.

/// Default minimum spacing between accepted events, in seconds
pub const DEFAULT_DEBOUNCE_SECS: f64 = 0.05;

/// Accepts an event only if the previous accepted one is older than `delay`
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    delay: f64,
    last_accepted: Option<f64>,
}

impl Debouncer {
    pub fn new(delay_secs: f64) -> Self {
        Self {
            delay: delay_secs,
            last_accepted: None,
        }
    }

    /// Whether an event at `now` (seconds) passes, recording it if so
    pub fn accept(&mut self, now: f64) -> bool {
        match self.last_accepted {
            Some(last) if now - last <= self.delay => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_collapses() {
        let mut debouncer = Debouncer::default();
        assert!(debouncer.accept(1.000));
        assert!(!debouncer.accept(1.010));
        assert!(!debouncer.accept(1.049));
        assert!(debouncer.accept(1.051));
    }

    #[test]
    fn test_rejected_events_do_not_extend_window() {
        let mut debouncer = Debouncer::new(0.1);
        assert!(debouncer.accept(0.0));
        assert!(!debouncer.accept(0.09));
        assert!(debouncer.accept(0.11));
    }
}
