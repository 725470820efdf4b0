// Tempo ramp - workout mode moving the tempo from a start to an end value over time
// Targets are proposed to the scheduler, which applies them on measure boundaries

use super::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};

/// Workout ramp profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkoutProfile {
    pub start_tempo: f64,
    pub end_tempo: f64,
    pub duration_minutes: f64,
}

impl WorkoutProfile {
    pub fn new(start_tempo: f64, end_tempo: f64, duration_minutes: f64) -> SchedulerResult<Self> {
        let profile = Self {
            start_tempo,
            end_tempo,
            duration_minutes,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.start_tempo) || !positive(self.end_tempo) {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "workout tempos must be positive, got {} -> {}",
                self.start_tempo, self.end_tempo
            )));
        }
        if !positive(self.duration_minutes) {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "workout duration must be positive, got {} min",
                self.duration_minutes
            )));
        }
        Ok(())
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_minutes * 60_000.0
    }
}

impl std::str::FromStr for WorkoutProfile {
    type Err = SchedulerError;

    /// Parses "START:END:MINUTES", e.g. "100:160:5"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            SchedulerError::InvalidConfiguration(format!(
                "invalid workout '{}', expected START:END:MINUTES",
                s
            ))
        };
        let mut parts = s.trim().split(':').map(|part| part.trim().parse::<f64>());
        let (Some(Ok(start)), Some(Ok(end)), Some(Ok(minutes)), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        Self::new(start, end, minutes)
    }
}

/// Ramp lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampState {
    /// No workout configured
    Idle,
    /// Workout configured, playback stopped
    Armed,
    /// Playback running, ramp in progress
    Active,
}

#[derive(Debug, Clone, Default)]
pub struct TempoRamp {
    profile: Option<WorkoutProfile>,
    active: bool,
    activated_at_ms: Option<f64>,
    last_target: Option<f64>,
}

impl TempoRamp {
    /// Targets move in steps of this many BPM
    pub const STEP_BPM: f64 = 3.0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RampState {
        match (self.profile, self.active) {
            (None, _) => RampState::Idle,
            (Some(_), false) => RampState::Armed,
            (Some(_), true) => RampState::Active,
        }
    }

    pub fn profile(&self) -> Option<&WorkoutProfile> {
        self.profile.as_ref()
    }

    /// Configure a workout; an already running ramp restarts from its start tempo
    pub fn arm(&mut self, profile: WorkoutProfile) -> SchedulerResult<()> {
        profile.validate()?;
        self.profile = Some(profile);
        self.activated_at_ms = None;
        self.last_target = self.active.then_some(profile.start_tempo);
        Ok(())
    }

    pub fn disarm(&mut self) {
        self.profile = None;
        self.active = false;
        self.activated_at_ms = None;
        self.last_target = None;
    }

    /// Last target handed to the scheduler
    pub fn last_target(&self) -> Option<f64> {
        self.last_target
    }

    /// Playback started: returns the tempo the workout begins at
    pub fn activate(&mut self) -> Option<f64> {
        let profile = self.profile?;
        self.active = true;
        self.activated_at_ms = None;
        self.last_target = Some(profile.start_tempo);
        Some(profile.start_tempo)
    }

    /// Playback stopped: progress is discarded, the profile stays armed
    pub fn deactivate(&mut self) {
        self.active = false;
        self.activated_at_ms = None;
        self.last_target = None;
    }

    /// Periodic evaluation
    /// Returns a new target tempo when it moved by at least one step, or the
    /// exact end tempo once the duration has elapsed
    pub fn evaluate(&mut self, now_ms: f64) -> Option<f64> {
        if !self.active {
            return None;
        }
        let profile = self.profile?;
        let activated_at = *self.activated_at_ms.get_or_insert(now_ms);
        let elapsed = (now_ms - activated_at).max(0.0);
        let duration = profile.duration_ms();

        if elapsed >= duration {
            if self.last_target == Some(profile.end_tempo) {
                return None;
            }
            self.last_target = Some(profile.end_tempo);
            return Some(profile.end_tempo);
        }

        let progress = (elapsed / duration).clamp(0.0, 1.0);
        let raw = profile.start_tempo + (profile.end_tempo - profile.start_tempo) * progress;
        let target = Self::quantize(raw);

        match self.last_target {
            Some(last) if (target - last).abs() < Self::STEP_BPM => None,
            _ => {
                self.last_target = Some(target);
                Some(target)
            }
        }
    }

    /// Round to the nearest multiple of the step
    pub fn quantize(bpm: f64) -> f64 {
        (bpm / Self::STEP_BPM).round() * Self::STEP_BPM
    }
}
