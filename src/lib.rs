// Clicktrack - library exports for the CLI, tests and benchmarks

pub mod audio;
pub mod config;
pub mod messaging;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::engine::ClickEngine;
pub use audio::export::{ClickExporter, ExportSettings};
pub use audio::sink::{ChannelSink, ClickRequest, ClickSink, RecordingSink, SinkError};
pub use audio::timing::{AudioTiming, Clock, ManualClock, SystemClock};
pub use config::{MetronomeConfig, SchedulerSettings, Settings};
pub use messaging::channels::{
    create_audio_channel, create_event_channel, create_notification_channel,
};
pub use messaging::event::{MetronomeEvent, TickNotification};
pub use sequencer::{
    AccentTrack, Metronome, MetronomeHandle, PlaybackState, RampState, SchedulerError, Tempo,
    TimeSignature, WorkoutProfile,
};
