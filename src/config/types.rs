// Types for persisted metronome settings

use serde::{Deserialize, Serialize};

use crate::audio::click::SoundType;
use crate::sequencer::accent::AccentTrack;
use crate::sequencer::ramp::WorkoutProfile;
use crate::sequencer::subdivision;
use crate::sequencer::timeline::{Tempo, TimeSignature};
use crate::sequencer::{SchedulerError, SchedulerResult};

/// Everything the host configures on a metronome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    /// Quarter-note BPM
    pub tempo: f64,
    pub time_signature: TimeSignature,
    /// Index into the subdivision table of the beat value
    pub subdivision_index: usize,
    pub accent_levels: AccentTrack,
    pub sound_type: SoundType,
    /// Master volume 0.0..=1.0
    pub volume: f32,
    /// Workout ramp armed at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workout: Option<WorkoutProfile>,
}

impl MetronomeConfig {
    /// Reject anything the scheduler cannot play
    pub fn validate(&self) -> SchedulerResult<()> {
        Tempo::new(self.tempo)?;
        self.time_signature.validate()?;

        subdivision::pattern(self.time_signature.beat_value, self.subdivision_index).map_err(
            |_| {
                SchedulerError::InvalidConfiguration(format!(
                    "subdivision {} does not exist for beat value {}",
                    self.subdivision_index, self.time_signature.beat_value
                ))
            },
        )?;

        AccentTrack::from_levels(self.accent_levels.levels().to_vec())?;

        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "volume must be within 0.0..=1.0, got {}",
                self.volume
            )));
        }

        if let Some(workout) = &self.workout {
            workout.validate()?;
        }
        Ok(())
    }

    /// Change the meter
    /// Accents follow the resize rule; a new beat value resets the subdivision
    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        if time_signature.beat_value != self.time_signature.beat_value {
            self.subdivision_index = 0;
        }
        self.time_signature = time_signature;
        self.accent_levels
            .resize(time_signature.beats_per_measure as usize);
    }

    /// Accent track sized to the meter
    pub fn normalized_accents(&self) -> AccentTrack {
        let mut accents = self.accent_levels.clone();
        let beats = self.time_signature.beats_per_measure as usize;
        if accents.len() != beats {
            accents.resize(beats);
        }
        accents
    }
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            time_signature: TimeSignature::four_four(),
            subdivision_index: 0,
            accent_levels: AccentTrack::new(4),
            sound_type: SoundType::default(),
            volume: 0.8,
            workout: None,
        }
    }
}

/// Timing constants of the lookahead loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Wake-up period of the scheduling loop
    pub lookahead_interval_ms: u64,
    /// How far ahead of "now" beats are scheduled
    pub horizon_ms: f64,
    /// Delay between start() and the first beat
    pub startup_lead_ms: f64,
    /// Ticks are published once their beat is closer than this
    pub tick_margin_ms: f64,
    /// Period of workout ramp evaluation
    pub ramp_interval_ms: f64,
    /// Intervals averaged by tap tempo (2..=4)
    pub tap_history: usize,
}

impl SchedulerSettings {
    pub fn validate(&self) -> SchedulerResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if self.lookahead_interval_ms == 0
            || !positive(self.horizon_ms)
            || !positive(self.startup_lead_ms)
            || !positive(self.tick_margin_ms)
            || !positive(self.ramp_interval_ms)
        {
            return Err(SchedulerError::InvalidConfiguration(
                "scheduler timings must be positive".to_string(),
            ));
        }
        if self.horizon_ms <= self.lookahead_interval_ms as f64 {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "horizon ({} ms) must exceed the wake-up interval ({} ms)",
                self.horizon_ms, self.lookahead_interval_ms
            )));
        }
        Ok(())
    }

    pub fn horizon_secs(&self) -> f64 {
        self.horizon_ms / 1000.0
    }

    pub fn startup_lead_secs(&self) -> f64 {
        self.startup_lead_ms / 1000.0
    }

    pub fn tick_margin_secs(&self) -> f64 {
        self.tick_margin_ms / 1000.0
    }

    pub fn lookahead_interval_secs(&self) -> f64 {
        self.lookahead_interval_ms as f64 / 1000.0
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            lookahead_interval_ms: 25,
            horizon_ms: 120.0,
            startup_lead_ms: 50.0,
            tick_margin_ms: 50.0,
            ramp_interval_ms: 100.0,
            tap_history: 4,
        }
    }
}

/// Settings file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub metronome: MetronomeConfig,
    pub scheduler: SchedulerSettings,
}

impl Settings {
    pub fn validate(&self) -> SchedulerResult<()> {
        self.metronome.validate()?;
        self.scheduler.validate()
    }
}
