// Command types - host → scheduler thread and scheduler → audio thread

use crate::audio::sink::ClickRequest;
use crate::config::MetronomeConfig;
use crate::sequencer::ramp::WorkoutProfile;

/// Commands consumed by the audio callback
#[derive(Debug, Clone, Copy)]
pub enum AudioCommand {
    Click(ClickRequest),
    /// Drop clicks not yet rendered at or after this device time
    CancelFrom(f64),
}

/// Commands consumed by the scheduler thread, already validated by the sender
#[derive(Debug, Clone)]
pub enum ControlCommand {
    Configure(Box<MetronomeConfig>),
    SetTempo(f64),
    IncrementAccent(usize),
    Start,
    Stop,
    Toggle,
    ArmWorkout(WorkoutProfile),
    DisarmWorkout,
    Quit,
}
