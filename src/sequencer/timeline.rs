// Timeline - Musical time representation
// Converts tempo and meter into beat durations on the device clock

use super::{SchedulerError, SchedulerResult};
use std::fmt;

/// Beat values accepted as a time signature denominator
pub const SUPPORTED_BEAT_VALUES: [u8; 6] = [1, 2, 4, 8, 16, 32];

/// Time signature (beats per measure / beat value)
/// Example: 7/8 = TimeSignature { beats_per_measure: 7, beat_value: 8 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeSignature {
    pub beats_per_measure: u8,
    pub beat_value: u8, // Note value of one beat (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Creates a new time signature, rejecting empty measures and unsupported beat values
    pub fn new(beats_per_measure: u8, beat_value: u8) -> SchedulerResult<Self> {
        let ts = Self {
            beats_per_measure,
            beat_value,
        };
        ts.validate()?;
        Ok(ts)
    }

    /// Common 4/4 time signature
    pub const fn four_four() -> Self {
        Self {
            beats_per_measure: 4,
            beat_value: 4,
        }
    }

    /// Common 3/4 time signature (waltz)
    pub const fn three_four() -> Self {
        Self {
            beats_per_measure: 3,
            beat_value: 4,
        }
    }

    /// Common 6/8 time signature
    pub const fn six_eight() -> Self {
        Self {
            beats_per_measure: 6,
            beat_value: 8,
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.beats_per_measure == 0 {
            return Err(SchedulerError::InvalidConfiguration(
                "beats per measure must be at least 1".to_string(),
            ));
        }
        if !SUPPORTED_BEAT_VALUES.contains(&self.beat_value) {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "unsupported beat value {} (expected one of {:?})",
                self.beat_value, SUPPORTED_BEAT_VALUES
            )));
        }
        Ok(())
    }

    /// Beat duration relative to a quarter note
    /// Example: x/4 = 1.0, x/8 = 0.5
    pub fn beat_duration_multiplier(&self) -> f64 {
        4.0 / self.beat_value as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_measure, self.beat_value)
    }
}

impl std::str::FromStr for TimeSignature {
    type Err = SchedulerError;

    /// Parses "7/8" style meters
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchedulerError::InvalidConfiguration(format!("invalid meter '{}'", s));
        let (beats, value) = s.trim().split_once('/').ok_or_else(invalid)?;
        let beats = beats.trim().parse::<u8>().map_err(|_| invalid())?;
        let value = value.trim().parse::<u8>().map_err(|_| invalid())?;
        Self::new(beats, value)
    }
}

/// Tempo in BPM, always counted in quarter notes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const MIN_BPM: f64 = 10.0;
    pub const MAX_BPM: f64 = 500.0;

    /// Creates a new tempo
    /// Non-positive or non-finite values are rejected, everything else is
    /// clamped into [MIN_BPM, MAX_BPM]
    pub fn new(bpm: f64) -> SchedulerResult<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "tempo must be a positive number of BPM, got {}",
                bpm
            )));
        }
        Ok(Self::clamped(bpm))
    }

    /// Tempo clamped into the supported range
    pub fn clamped(bpm: f64) -> Self {
        Self {
            bpm: bpm.clamp(Self::MIN_BPM, Self::MAX_BPM),
        }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one quarter note in seconds
    pub fn quarter_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one beat of the given meter in seconds
    pub fn beat_duration_seconds(&self, time_signature: &TimeSignature) -> f64 {
        self.quarter_duration_seconds() * time_signature.beat_duration_multiplier()
    }

    /// Duration of one measure in seconds
    pub fn bar_duration_seconds(&self, time_signature: &TimeSignature) -> f64 {
        self.beat_duration_seconds(time_signature) * time_signature.beats_per_measure as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::clamped(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}
