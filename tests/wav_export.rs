// Offline export: the rendered file has clicks exactly where the scheduler put them

use clicktrack::audio::export::{ClickExporter, ExportEncoding, ExportSettings, export_wav};
use clicktrack::audio::format_conversion::i16_to_f32;
use clicktrack::config::{MetronomeConfig, SchedulerSettings};
use clicktrack::sequencer::WorkoutProfile;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const SAMPLE_RATE: u32 = 44100;

fn read_mono(path: &std::path::Path) -> Vec<f32> {
    let mut reader = hound::WavReader::open(path).unwrap();
    reader
        .samples::<i16>()
        .map(|s| i16_to_f32(s.unwrap()))
        .collect()
}

/// First sample of each click, found as a rise out of silence
fn onsets(samples: &[f32]) -> Vec<usize> {
    let mut onsets = Vec::new();
    let mut silent_run = usize::MAX;
    for (i, s) in samples.iter().enumerate() {
        if s.abs() > 1e-3 {
            if silent_run > 1000 {
                onsets.push(i);
            }
            silent_run = 0;
        } else {
            silent_run = silent_run.saturating_add(1);
        }
    }
    onsets
}

#[test]
fn test_export_places_beats_on_time() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("click.wav");

    let summary = export_wav(
        &path,
        &MetronomeConfig::default(),
        &SchedulerSettings::default(),
        2.2,
    )
    .unwrap();

    assert_eq!(summary.frames, (2.2 * SAMPLE_RATE as f64).round() as u64);
    assert_eq!(summary.beats, 5);

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);
    drop(reader);

    let samples = read_mono(&path);
    assert_eq!(samples.len() as u64, summary.frames);

    // 120 BPM: 50 ms lead, then every half second; the attack starts at zero
    let found = onsets(&samples);
    assert_eq!(found.len(), 5, "{:?}", found);
    for (i, onset) in found.iter().enumerate() {
        let expected = ((0.05 + 0.5 * i as f64) * SAMPLE_RATE as f64).round() as usize;
        assert!(onset.abs_diff(expected) <= 4, "beat {} at {} not {}", i, onset, expected);
    }
}

#[test]
fn test_downbeat_louder_than_other_beats() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("accents.wav");
    export_wav(
        &path,
        &MetronomeConfig::default(),
        &SchedulerSettings::default(),
        1.0,
    )
    .unwrap();

    let samples = read_mono(&path);
    let peak = |from: f64| {
        let start = (from * SAMPLE_RATE as f64) as usize;
        samples[start..start + 2000]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    };
    assert!(peak(0.05) > peak(0.55) * 1.2);
}

#[test]
fn test_export_stereo_float_with_progress() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    let settings = ExportSettings {
        output_path: path.clone(),
        sample_rate: 48000,
        channels: 2,
        encoding: ExportEncoding::Float32,
        duration_seconds: 2.5,
    };

    let progress = Arc::new(Mutex::new(Vec::new()));
    let progress_clone = Arc::clone(&progress);
    ClickExporter::new(settings)
        .export(
            &MetronomeConfig::default(),
            &SchedulerSettings::default(),
            Some(Box::new(move |p| progress_clone.lock().unwrap().push(p))),
        )
        .unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 2 * 120_000);
    for frame in samples.chunks(2) {
        assert_eq!(frame[0], frame[1]);
    }

    let progress = progress.lock().unwrap();
    assert_eq!(progress.last(), Some(&1.0));
    for pair in progress.windows(2) {
        assert!(pair[1] >= pair[0]);
    }
}

#[test]
fn test_export_follows_workout_ramp() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ramp.wav");
    let config = MetronomeConfig {
        workout: Some(WorkoutProfile::new(100.0, 112.0, 0.1).unwrap()),
        ..MetronomeConfig::default()
    };

    let summary = export_wav(&path, &config, &SchedulerSettings::default(), 9.0).unwrap();
    assert_eq!(summary.final_tempo, 112.0);
}

#[test]
fn test_export_rejects_bad_duration() {
    let dir = tempdir().unwrap();
    let result = export_wav(
        dir.path().join("none.wav"),
        &MetronomeConfig::default(),
        &SchedulerSettings::default(),
        -1.0,
    );
    assert!(result.is_err());
}
