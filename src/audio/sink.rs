// Audio sinks - where the scheduler sends its click requests
// A sink only renders; failures are reported and never stop the beat clock

use crate::audio::click::{ClickRenderer, SoundType};
use crate::messaging::channels::AudioCommandProducer;
use crate::messaging::command::AudioCommand;
use ringbuf::traits::Producer;
use thiserror::Error;

/// Time-stamped instruction to render one click
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickRequest {
    /// Absolute device-clock time in seconds
    pub time: f64,
    pub is_primary: bool,
    /// Accent intensity 0..=4
    pub intensity: u8,
    pub sound: SoundType,
    /// Master volume 0.0..=1.0
    pub volume: f32,
}

/// Click rendering failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("click queue is full")]
    QueueFull,

    #[error("sink rejected click: {0}")]
    Rejected(String),
}

/// Consumer of click requests
pub trait ClickSink: Send {
    /// Schedule one click; the call must not block on rendering
    fn create_click(&mut self, request: &ClickRequest) -> Result<(), SinkError>;

    /// Drop clicks not yet rendered whose time is at or after `time`
    fn cancel_from(&mut self, time: f64) -> Result<(), SinkError>;
}

/// Sends clicks to the audio thread through a lock-free ring buffer
pub struct ChannelSink {
    tx: AudioCommandProducer,
}

impl ChannelSink {
    pub fn new(tx: AudioCommandProducer) -> Self {
        Self { tx }
    }
}

impl ClickSink for ChannelSink {
    fn create_click(&mut self, request: &ClickRequest) -> Result<(), SinkError> {
        self.tx
            .try_push(AudioCommand::Click(*request))
            .map_err(|_| SinkError::QueueFull)
    }

    fn cancel_from(&mut self, time: f64) -> Result<(), SinkError> {
        self.tx
            .try_push(AudioCommand::CancelFrom(time))
            .map_err(|_| SinkError::QueueFull)
    }
}

/// Renders clicks straight into an owned renderer (offline use)
pub struct RendererSink {
    renderer: ClickRenderer,
}

impl RendererSink {
    pub fn new(renderer: ClickRenderer) -> Self {
        Self { renderer }
    }

    pub fn renderer(&mut self) -> &mut ClickRenderer {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> ClickRenderer {
        self.renderer
    }
}

impl ClickSink for RendererSink {
    fn create_click(&mut self, request: &ClickRequest) -> Result<(), SinkError> {
        self.renderer.schedule(request)
    }

    fn cancel_from(&mut self, time: f64) -> Result<(), SinkError> {
        self.renderer.cancel_from(time);
        Ok(())
    }
}

/// Keeps every request; cancellation removes requests at or after the cut
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub clicks: Vec<ClickRequest>,
    pub cancellations: Vec<f64>,
    /// Reject every n-th click (1-based) to exercise failure handling
    pub fail_every: Option<usize>,
    attempts: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_every(n: usize) -> Self {
        Self {
            fail_every: Some(n.max(1)),
            ..Self::default()
        }
    }

    pub fn primary_clicks(&self) -> impl Iterator<Item = &ClickRequest> {
        self.clicks.iter().filter(|c| c.is_primary)
    }
}

impl ClickSink for RecordingSink {
    fn create_click(&mut self, request: &ClickRequest) -> Result<(), SinkError> {
        self.attempts += 1;
        if let Some(n) = self.fail_every {
            if self.attempts % n == 0 {
                return Err(SinkError::Rejected(format!("attempt {}", self.attempts)));
            }
        }
        self.clicks.push(*request);
        Ok(())
    }

    fn cancel_from(&mut self, time: f64) -> Result<(), SinkError> {
        self.cancellations.push(time);
        self.clicks.retain(|c| c.time < time);
        Ok(())
    }
}
