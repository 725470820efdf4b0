// Transport - Playback state and its thread-safe mirror
// The scheduler thread is the only writer; UI threads read the mirror

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Playback state (stopped/running)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Running,
}

impl PlaybackState {
    pub fn is_running(&self) -> bool {
        matches!(self, PlaybackState::Running)
    }
}

/// Shared playback state
/// Thread-safe via atomics for reading from UI threads
#[derive(Debug)]
pub struct SharedPlaybackState {
    running: AtomicBool,
    current_beat: AtomicU32,
    measure: AtomicU64,
    tempo_bits: AtomicU64,
}

impl SharedPlaybackState {
    pub fn new(tempo_bpm: f64) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(false),
            current_beat: AtomicU32::new(0),
            measure: AtomicU64::new(0),
            tempo_bits: AtomicU64::new(tempo_bpm.to_bits()),
        })
    }

    pub fn state(&self) -> PlaybackState {
        if self.running.load(Ordering::Acquire) {
            PlaybackState::Running
        } else {
            PlaybackState::Stopped
        }
    }

    pub(crate) fn set_state(&self, state: PlaybackState) {
        self.running.store(state.is_running(), Ordering::Release);
    }

    /// Beat index of the last tick delivered to listeners
    pub fn current_beat(&self) -> u32 {
        self.current_beat.load(Ordering::Relaxed)
    }

    /// Measures completed since playback started
    pub fn measure(&self) -> u64 {
        self.measure.load(Ordering::Relaxed)
    }

    pub(crate) fn set_position(&self, measure: u64, beat: u32) {
        self.measure.store(measure, Ordering::Relaxed);
        self.current_beat.store(beat, Ordering::Relaxed);
    }

    /// Tempo currently applied by the scheduler
    pub fn tempo_bpm(&self) -> f64 {
        f64::from_bits(self.tempo_bits.load(Ordering::Relaxed))
    }

    pub(crate) fn set_tempo_bpm(&self, bpm: f64) {
        self.tempo_bits.store(bpm.to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedPlaybackState {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            current_beat: AtomicU32::new(0),
            measure: AtomicU64::new(0),
            tempo_bits: AtomicU64::new(120.0f64.to_bits()),
        }
    }
}
