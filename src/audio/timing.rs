// Audio timing - clocks the scheduler reads "now" from
// The device clock counts rendered samples, so trigger times line up with what is heard

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of absolute time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;

    fn now_ms(&self) -> f64 {
        self.now() * 1000.0
    }
}

/// Shared audio timing state (device clock)
#[derive(Clone)]
pub struct AudioTiming {
    /// Current sample position (incremented by audio callback)
    sample_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl AudioTiming {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Get current sample position
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Acquire)
    }

    /// Advance sample position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::AcqRel);
    }

    /// Convert an absolute device time to a sample index, rounding to the nearest sample
    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).round() as u64
    }

    pub fn samples_to_seconds(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}

impl Clock for AudioTiming {
    fn now(&self) -> f64 {
        self.samples_to_seconds(self.current_sample())
    }
}

/// Monotonic wall clock, zero at creation
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually driven clock for deterministic tests and offline rendering
/// Clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds_bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_seconds: f64) -> Self {
        Self {
            seconds_bits: Arc::new(AtomicU64::new(start_seconds.to_bits())),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.seconds_bits.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Acquire))
    }
}
