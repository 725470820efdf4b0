// Click engine - CPAL output stream rendering scheduled clicks
//
// # Format Support
//
// The device's preferred sample format is detected with `sample_format()`
// and the stream is built for it (F32, I16 or U16). Clicks are always
// rendered as mono f32 and converted while writing each interleaved frame.
//
// # Clock
//
// The callback counts rendered frames into `AudioTiming`, which is the
// clock the scheduler reads. Trigger times are therefore expressed in the
// same sample timeline the renderer plays back.
//
// # Stream Limitations
//
// On macOS (CoreAudio) the Stream is neither Send nor Sync, so the engine
// stays on the thread that created it. The error callback flags the device
// status and notifies the host; reconnecting is up to the host.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::AudioError;
use crate::audio::click::ClickRenderer;
use crate::audio::format_conversion::write_mono_to_interleaved_frame;
use crate::audio::status::{AtomicDeviceStatus, DeviceStatus};
use crate::audio::timing::AudioTiming;
use crate::messaging::channels::{AudioCommandConsumer, NotificationProducer};
use crate::messaging::command::AudioCommand;
use crate::messaging::notification::{Notification, NotificationCategory};

pub struct ClickEngine {
    _device: Device,
    _stream: Stream,
    sample_rate: f32,
    channels: usize,
    timing: AudioTiming,
    status: AtomicDeviceStatus,
    dropped_clicks: Arc<AtomicU64>,
}

impl ClickEngine {
    pub fn new(
        command_rx: AudioCommandConsumer,
        notification_tx: Arc<Mutex<NotificationProducer>>,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        log::info!(
            target: "clicktrack::audio",
            "Output device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;

        let sample_format = supported_config.sample_format();
        log::debug!(target: "clicktrack::audio", "Config: {:?}", supported_config);

        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        let timing = AudioTiming::new(sample_rate);
        let status = AtomicDeviceStatus::new(DeviceStatus::Connecting);
        let dropped_clicks = Arc::new(AtomicU64::new(0));

        let output = StreamOutput {
            command_rx,
            renderer: ClickRenderer::new(sample_rate),
            timing: timing.clone(),
            dropped_clicks: Arc::clone(&dropped_clicks),
            channels,
        };

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &config,
                output,
                status.clone(),
                notification_tx.clone(),
            ),
            SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &config,
                output,
                status.clone(),
                notification_tx.clone(),
            ),
            SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &config,
                output,
                status.clone(),
                notification_tx.clone(),
            ),
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        status.set(DeviceStatus::Connected);

        log::info!(
            target: "clicktrack::audio",
            "Click engine started: {} Hz, {} channels",
            sample_rate,
            channels
        );

        if let Ok(mut tx) = notification_tx.try_lock() {
            let notif = Notification::info(
                NotificationCategory::Audio,
                format!("Audio connected: {} Hz", sample_rate),
            );
            let _ = tx.try_push(notif);
        }

        Ok(Self {
            _device: device,
            _stream: stream,
            sample_rate,
            channels,
            timing,
            status,
            dropped_clicks,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Device clock for the scheduler
    pub fn timing(&self) -> AudioTiming {
        self.timing.clone()
    }

    pub fn status(&self) -> DeviceStatus {
        self.status.get()
    }

    /// Fails once the stream error callback has fired
    pub fn check_stream(&self) -> Result<(), AudioError> {
        stream_health(self.status())
    }

    /// Clicks the callback could not queue because the renderer was full
    pub fn dropped_clicks(&self) -> u64 {
        self.dropped_clicks.load(Ordering::Relaxed)
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut output: StreamOutput,
        status: AtomicDeviceStatus,
        notification_tx: Arc<Mutex<NotificationProducer>>,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // No allocations, no I/O, no blocking locks
                    output.process(data);
                },
                move |err| {
                    // Runs outside the audio callback
                    log::error!(target: "clicktrack::audio", "Audio stream error: {}", err);
                    status.set(DeviceStatus::Error);

                    if let Ok(mut tx) = notification_tx.try_lock() {
                        let notif = Notification::error(
                            NotificationCategory::Audio,
                            format!("Audio stream error: {}", err),
                        );
                        let _ = tx.try_push(notif);
                    }
                },
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))
    }
}

fn stream_health(status: DeviceStatus) -> Result<(), AudioError> {
    match status {
        DeviceStatus::Error => Err(AudioError::Stream("output device failed".to_string())),
        DeviceStatus::Disconnected => Err(AudioError::NoDevice),
        DeviceStatus::Connecting | DeviceStatus::Connected => Ok(()),
    }
}

/// State owned by the data callback
struct StreamOutput {
    command_rx: AudioCommandConsumer,
    renderer: ClickRenderer,
    timing: AudioTiming,
    dropped_clicks: Arc<AtomicU64>,
    channels: usize,
}

impl StreamOutput {
    fn process<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        while let Some(command) = self.command_rx.try_pop() {
            match command {
                AudioCommand::Click(request) => {
                    if self.renderer.schedule(&request).is_err() {
                        self.dropped_clicks.fetch_add(1, Ordering::Relaxed);
                    }
                }
                AudioCommand::CancelFrom(time) => self.renderer.cancel_from(time),
            }
        }

        let channels = self.channels.max(1);
        for frame in data.chunks_mut(channels) {
            write_mono_to_interleaved_frame(self.renderer.next_sample(), frame);
        }
        self.timing.advance(data.len() / channels);
    }
}
