// Audio export - offline rendering of a click track to a WAV file
//
// The same scheduler that drives the device runs against a simulated clock:
// every lookahead interval the metronome wakes up, then the renderer plays
// that interval into the file. The exported file therefore contains exactly
// what the live engine would have played.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};

use crate::audio::AudioError;
use crate::audio::click::ClickRenderer;
use crate::audio::format_conversion::f32_to_i16;
use crate::audio::sink::RendererSink;
use crate::config::{MetronomeConfig, SchedulerSettings};
use crate::messaging::event::MetronomeEvent;
use crate::sequencer::Metronome;

/// Sample encoding of the exported file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportEncoding {
    Int16,
    Float32,
}

impl ExportEncoding {
    fn bits_per_sample(&self) -> u16 {
        match self {
            ExportEncoding::Int16 => 16,
            ExportEncoding::Float32 => 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub output_path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: ExportEncoding,
    pub duration_seconds: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("clicktrack.wav"),
            sample_rate: 44100,
            channels: 1,
            encoding: ExportEncoding::Int16,
            duration_seconds: 30.0,
        }
    }
}

impl ExportSettings {
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(AudioError::InvalidExport(
                "sample rate and channel count must be positive".to_string(),
            ));
        }
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(AudioError::InvalidExport(format!(
                "duration must be > 0, got {}",
                self.duration_seconds
            )));
        }
        Ok(())
    }

    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.encoding.bits_per_sample(),
            sample_format: match self.encoding {
                ExportEncoding::Int16 => SampleFormat::Int,
                ExportEncoding::Float32 => SampleFormat::Float,
            },
        }
    }
}

/// Progress callback (0.0 to 1.0)
pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// What an export produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub frames: u64,
    pub beats: u64,
    /// Tempo in effect when rendering ended
    pub final_tempo: f64,
}

pub struct ClickExporter {
    settings: ExportSettings,
}

impl ClickExporter {
    pub fn new(settings: ExportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Render `config` from a cold start for the configured duration
    /// An armed workout ramps exactly as it would live
    pub fn export(
        &self,
        config: &MetronomeConfig,
        scheduler: &SchedulerSettings,
        mut progress_callback: Option<ProgressCallback>,
    ) -> Result<ExportSummary, AudioError> {
        self.settings.validate()?;

        let sample_rate = self.settings.sample_rate;
        let total_frames = (self.settings.duration_seconds * sample_rate as f64).round() as u64;
        let block_frames =
            ((scheduler.lookahead_interval_secs() * sample_rate as f64).round() as usize).max(1);

        log::info!(
            target: "clicktrack::audio",
            "Exporting {:.2}s ({} frames) at {} Hz to {}",
            self.settings.duration_seconds,
            total_frames,
            sample_rate,
            self.settings.output_path.display()
        );

        let mut metronome = Metronome::new(config.clone(), *scheduler)?;
        let mut sink = RendererSink::new(ClickRenderer::new(sample_rate as f32));
        let mut events = Vec::with_capacity(64);
        let mut writer = WavWriter::create(&self.settings.output_path, self.settings.spec())?;

        metronome.start(0.0, &mut events)?;

        let mut block = vec![0.0f32; block_frames];
        let mut position: u64 = 0;
        let mut beats: u64 = 0;
        let mut next_progress = sample_rate as u64;

        while position < total_frames {
            let now = position as f64 / sample_rate as f64;
            let report = metronome.wake(now, &mut sink, &mut events);
            if !report.sink_errors.is_empty() {
                log::warn!(
                    target: "clicktrack::audio",
                    "{} clicks dropped at {:.3}s",
                    report.sink_errors.len(),
                    now
                );
            }
            beats += events
                .drain(..)
                .filter(|event| matches!(event, MetronomeEvent::Tick(_)))
                .count() as u64;

            let frames = block_frames.min((total_frames - position) as usize);
            sink.renderer().render(&mut block[..frames]);
            self.write_block(&mut writer, &block[..frames])?;
            position += frames as u64;

            if position >= next_progress {
                next_progress += sample_rate as u64;
                if let Some(callback) = progress_callback.as_mut() {
                    callback(position as f32 / total_frames as f32);
                }
            }
        }

        writer.finalize()?;
        if let Some(callback) = progress_callback.as_mut() {
            callback(1.0);
        }

        log::info!(
            target: "clicktrack::audio",
            "Export finished: {} beats",
            beats
        );

        Ok(ExportSummary {
            path: self.settings.output_path.clone(),
            frames: total_frames,
            beats,
            final_tempo: metronome.tempo().bpm(),
        })
    }

    fn write_block<W>(&self, writer: &mut WavWriter<W>, block: &[f32]) -> Result<(), AudioError>
    where
        W: std::io::Write + std::io::Seek,
    {
        for &sample in block {
            for _ in 0..self.settings.channels {
                match self.settings.encoding {
                    ExportEncoding::Int16 => writer.write_sample(f32_to_i16(sample))?,
                    ExportEncoding::Float32 => writer.write_sample(sample)?,
                }
            }
        }
        Ok(())
    }
}

/// Export with default file settings
pub fn export_wav<P: AsRef<Path>>(
    path: P,
    config: &MetronomeConfig,
    scheduler: &SchedulerSettings,
    duration_seconds: f64,
) -> Result<ExportSummary, AudioError> {
    let settings = ExportSettings {
        output_path: path.as_ref().to_path_buf(),
        duration_seconds,
        ..ExportSettings::default()
    };
    ClickExporter::new(settings).export(config, scheduler, None)
}
