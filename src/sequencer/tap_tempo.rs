// Tap tempo - estimate BPM from the spacing of user taps

use std::collections::VecDeque;

/// Sliding-window tap tempo estimator
/// Timestamps are milliseconds on any monotonic clock
#[derive(Debug, Clone)]
pub struct TapTempo {
    intervals: VecDeque<f64>,
    capacity: usize,
    last_tap_ms: Option<f64>,
}

impl TapTempo {
    /// A gap longer than this starts a new tapping session
    pub const SESSION_TIMEOUT_MS: f64 = 2000.0;
    pub const MIN_HISTORY: usize = 2;
    pub const MAX_HISTORY: usize = 4;

    /// Create an estimator averaging the last `history` intervals (clamped to 2..=4)
    pub fn new(history: usize) -> Self {
        let capacity = history.clamp(Self::MIN_HISTORY, Self::MAX_HISTORY);
        Self {
            intervals: VecDeque::with_capacity(capacity),
            capacity,
            last_tap_ms: None,
        }
    }

    /// Register a tap and return the estimated tempo, if one can be made yet
    /// The estimate is not clamped to the supported tempo range
    pub fn register_tap(&mut self, now_ms: f64) -> Option<f64> {
        let previous = self.last_tap_ms.replace(now_ms);

        let interval = match previous {
            Some(prev) if now_ms - prev <= Self::SESSION_TIMEOUT_MS && now_ms > prev => {
                now_ms - prev
            }
            _ => {
                self.intervals.clear();
                return None;
            }
        };

        if self.intervals.len() == self.capacity {
            self.intervals.pop_front();
        }
        self.intervals.push_back(interval);

        let average = self.intervals.iter().sum::<f64>() / self.intervals.len() as f64;
        Some((60_000.0 / average).round())
    }

    /// Forget all taps
    pub fn reset(&mut self) {
        self.intervals.clear();
        self.last_tap_ms = None;
    }

    /// Number of intervals currently averaged
    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new(Self::MAX_HISTORY)
    }
}
