// Click synthesis - turns click requests into short enveloped tones
// Renders sample-accurately at the requested device time

use crate::audio::sink::{ClickRequest, SinkError};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Click timbre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundType {
    #[default]
    Sine,
    Triangle,
    Square,
    Wood,
}

impl SoundType {
    pub const ALL: [SoundType; 4] = [
        SoundType::Sine,
        SoundType::Triangle,
        SoundType::Square,
        SoundType::Wood,
    ];

    /// Decay length after the attack, in milliseconds
    fn decay_ms(&self) -> f32 {
        match self {
            SoundType::Sine => 60.0,
            SoundType::Triangle => 50.0,
            SoundType::Square => 30.0,
            SoundType::Wood => 25.0,
        }
    }

    fn waveform(&self, phase: f32) -> f32 {
        match self {
            SoundType::Sine => phase.sin(),
            SoundType::Triangle => (2.0 / PI) * phase.sin().asin(),
            SoundType::Square => 0.5 * phase.sin().signum(),
            // Inharmonic partial gives a woodblock-like knock
            SoundType::Wood => 0.6 * phase.sin() + 0.4 * (phase * 2.76).sin(),
        }
    }
}

impl fmt::Display for SoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoundType::Sine => "sine",
            SoundType::Triangle => "triangle",
            SoundType::Square => "square",
            SoundType::Wood => "wood",
        };
        f.write_str(name)
    }
}

impl FromStr for SoundType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundType::ALL
            .into_iter()
            .find(|sound| sound.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown sound type '{}'", s))
    }
}

/// One synthesized click
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickVoice {
    frequency: f32,
    gain: f32,
    attack_samples: usize,
    decay_samples: usize,
    sound: SoundType,
    sample_rate: f32,
}

impl ClickVoice {
    const PRIMARY_FREQUENCY: f32 = 1000.0;
    const SECONDARY_FREQUENCY: f32 = 800.0;
    const PITCH_STEP: f32 = 0.05;
    const ATTACK_MS: f32 = 2.0;
    const GAIN_BY_INTENSITY: [f32; 5] = [0.0, 0.3, 0.55, 0.8, 1.0];

    /// Derive pitch, gain and envelope from a click request
    /// Primary notes sound higher; pitch and gain rise with intensity
    pub fn from_request(request: &ClickRequest, sample_rate: f32) -> Self {
        let intensity = request.intensity.min(4) as usize;
        let base = if request.is_primary {
            Self::PRIMARY_FREQUENCY
        } else {
            Self::SECONDARY_FREQUENCY
        };

        Self {
            frequency: base * (1.0 + Self::PITCH_STEP * intensity as f32),
            gain: Self::GAIN_BY_INTENSITY[intensity] * request.volume.clamp(0.0, 1.0),
            attack_samples: ((Self::ATTACK_MS / 1000.0) * sample_rate).max(1.0) as usize,
            decay_samples: ((request.sound.decay_ms() / 1000.0) * sample_rate).max(1.0) as usize,
            sound: request.sound,
            sample_rate,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Total length in samples
    pub fn len(&self) -> usize {
        self.attack_samples + self.decay_samples
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attack/decay envelope, zero at both ends
    fn envelope(&self, index: usize) -> f32 {
        if index < self.attack_samples {
            index as f32 / self.attack_samples as f32
        } else if index < self.len() {
            let x = (index - self.attack_samples) as f32 / self.decay_samples as f32;
            (-6.0 * x).exp() * (1.0 - x)
        } else {
            0.0
        }
    }

    /// Sample `index` samples after the click onset
    pub fn sample_at(&self, index: usize) -> f32 {
        if self.gain == 0.0 {
            return 0.0;
        }
        let phase = 2.0 * PI * self.frequency * index as f32 / self.sample_rate;
        self.sound.waveform(phase) * self.envelope(index) * self.gain
    }
}

#[derive(Debug, Clone, Copy)]
struct ScheduledClick {
    start_sample: u64,
    voice: ClickVoice,
}

impl ScheduledClick {
    fn end_sample(&self) -> u64 {
        self.start_sample + self.voice.len() as u64
    }
}

/// Mixes scheduled clicks into an output stream
/// Storage is preallocated so scheduling never allocates on the audio thread
#[derive(Debug, Clone)]
pub struct ClickRenderer {
    sample_rate: f32,
    clicks: Vec<ScheduledClick>,
    capacity: usize,
    position: u64,
}

impl ClickRenderer {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(sample_rate: f32) -> Self {
        Self::with_capacity(sample_rate, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(sample_rate: f32, capacity: usize) -> Self {
        Self {
            sample_rate,
            clicks: Vec::with_capacity(capacity),
            capacity,
            position: 0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Sample index of the next rendered sample
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of clicks waiting or sounding
    pub fn pending(&self) -> usize {
        self.clicks.len()
    }

    fn time_to_sample(&self, time: f64) -> u64 {
        (time.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Queue a click at its request time
    /// Clicks whose time already passed start on the next rendered sample
    pub fn schedule(&mut self, request: &ClickRequest) -> Result<(), SinkError> {
        if self.clicks.len() >= self.capacity {
            return Err(SinkError::QueueFull);
        }
        let voice = ClickVoice::from_request(request, self.sample_rate);
        let start_sample = self.time_to_sample(request.time).max(self.position);
        self.clicks.push(ScheduledClick {
            start_sample,
            voice,
        });
        Ok(())
    }

    /// Drop clicks that have not started sounding at or after `time`
    /// Clicks already sounding finish their envelope
    pub fn cancel_from(&mut self, time: f64) {
        let cutoff = self.time_to_sample(time).max(self.position);
        self.clicks.retain(|click| click.start_sample < cutoff);
    }

    /// Render one sample and advance
    pub fn next_sample(&mut self) -> f32 {
        let position = self.position;
        let mut mixed = 0.0;
        let mut finished = false;

        for click in &self.clicks {
            if position >= click.start_sample {
                let offset = (position - click.start_sample) as usize;
                mixed += click.voice.sample_at(offset);
                finished |= position + 1 >= click.end_sample();
            }
        }

        if finished {
            self.clicks.retain(|click| click.end_sample() > position + 1);
        }

        self.position += 1;
        mixed.clamp(-1.0, 1.0)
    }

    /// Render a mono buffer
    pub fn render(&mut self, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Drop everything and rewind to sample 0
    pub fn reset(&mut self) {
        self.clicks.clear();
        self.position = 0;
    }
}
