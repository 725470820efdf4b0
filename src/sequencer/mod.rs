// Sequencer module
// Musical time, subdivision/accent tables and the lookahead click scheduler

pub mod accent;
pub mod metronome;
pub mod ramp;
pub mod scheduler;
pub mod subdivision;
pub mod tap_tempo;
pub mod timeline;
pub mod transport;

pub use accent::AccentTrack;
pub use metronome::{Metronome, MetronomeHandle};
pub use ramp::{RampState, TempoRamp, WorkoutProfile};
pub use scheduler::{BeatSnapshot, Scheduler};
pub use subdivision::{SubdivisionNote, SubdivisionPattern};
pub use tap_tempo::TapTempo;
pub use timeline::{Tempo, TimeSignature};
pub use transport::{PlaybackState, SharedPlaybackState};

use thiserror::Error;

/// Scheduling and configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Index {index} out of range (size {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{0} channel is full")]
    ChannelFull(&'static str),

    #[error("Scheduler thread failed: {0}")]
    Thread(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
