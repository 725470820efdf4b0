// Accent track - per-beat click intensity, one slot per beat of the measure

use super::{SchedulerError, SchedulerResult};

/// Cyclic per-beat intensity levels (0 = silent, 4 = strongest)
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AccentTrack {
    levels: Vec<u8>,
}

impl AccentTrack {
    pub const MAX_INTENSITY: u8 = 4;
    pub const DEFAULT_INTENSITY: u8 = 2;
    const LEVEL_COUNT: u8 = Self::MAX_INTENSITY + 1;

    /// Default track for a measure: strong downbeat, mid intensity elsewhere
    pub fn new(beats_per_measure: usize) -> Self {
        let mut levels = vec![Self::DEFAULT_INTENSITY; beats_per_measure];
        if let Some(first) = levels.first_mut() {
            *first = Self::MAX_INTENSITY;
        }
        Self { levels }
    }

    /// Build a track from explicit levels
    pub fn from_levels(levels: Vec<u8>) -> SchedulerResult<Self> {
        if let Some(bad) = levels.iter().find(|&&l| l > Self::MAX_INTENSITY) {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "accent level {} exceeds {}",
                bad,
                Self::MAX_INTENSITY
            )));
        }
        Ok(Self { levels })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    /// Intensity of one beat, mid intensity when the index is outside the track
    pub fn level(&self, index: usize) -> u8 {
        self.levels
            .get(index)
            .copied()
            .unwrap_or(Self::DEFAULT_INTENSITY)
    }

    /// Resize for a new meter
    /// Overlapping slots are kept, new slots get mid intensity, the downbeat is forced to max
    pub fn resize(&mut self, new_size: usize) {
        self.levels.resize(new_size, Self::DEFAULT_INTENSITY);
        if let Some(first) = self.levels.first_mut() {
            *first = Self::MAX_INTENSITY;
        }
    }

    /// Cycle one slot through 0..=MAX_INTENSITY
    pub fn increment(&mut self, index: usize) -> SchedulerResult<u8> {
        let len = self.levels.len();
        let slot = self
            .levels
            .get_mut(index)
            .ok_or(SchedulerError::IndexOutOfRange { index, len })?;
        *slot = (*slot + 1) % Self::LEVEL_COUNT;
        Ok(*slot)
    }

    /// Set one slot directly
    pub fn set(&mut self, index: usize, level: u8) -> SchedulerResult<()> {
        if level > Self::MAX_INTENSITY {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "accent level {} exceeds {}",
                level,
                Self::MAX_INTENSITY
            )));
        }
        let len = self.levels.len();
        let slot = self
            .levels
            .get_mut(index)
            .ok_or(SchedulerError::IndexOutOfRange { index, len })?;
        *slot = level;
        Ok(())
    }
}

impl Default for AccentTrack {
    fn default() -> Self {
        Self::new(4)
    }
}
