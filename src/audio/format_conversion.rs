// Format conversion for device and file output
//
// Clicks are rendered as mono f32. The device callback fans a sample out to
// every channel in the device's native format; the WAV writer stores 16-bit
// integers.

use cpal::{FromSample, Sample};

/// Maps [-1.0, 1.0] to [i16::MIN, i16::MAX], clamping outside the range
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped >= 0.0 {
        (clamped * i16::MAX as f32) as i16
    } else {
        (clamped * -(i16::MIN as f32)) as i16
    }
}

#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    if sample >= 0 {
        sample as f32 / i16::MAX as f32
    } else {
        sample as f32 / -(i16::MIN as f32)
    }
}

/// Write one mono sample to every channel of an interleaved frame
#[inline]
pub fn write_mono_to_interleaved_frame<T>(sample: f32, frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    for channel_sample in frame.iter_mut() {
        *channel_sample = Sample::from_sample::<f32>(sample);
    }
}
