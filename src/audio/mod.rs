// Audio module - click synthesis, sinks, CPAL output and WAV export

pub mod click;
pub mod engine;
pub mod export;
pub mod format_conversion;
pub mod sink;
pub mod status;
pub mod timing;

use crate::sequencer::SchedulerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Audio configuration error: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0}. Supported formats: F32, I16, U16")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Invalid export settings: {0}")]
    InvalidExport(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
