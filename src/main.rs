use clap::Parser;
use clicktrack::audio::click::SoundType;
use clicktrack::audio::export::{ClickExporter, ExportSettings};
use clicktrack::config::{self, ConfigError, Settings};
use clicktrack::messaging::channels::{
    NotificationConsumer, create_audio_channel, create_event_channel, create_notification_channel,
};
use clicktrack::messaging::notification::NotificationLevel;
use clicktrack::{
    ChannelSink, ClickEngine, Metronome, MetronomeEvent, MetronomeHandle, TimeSignature,
    WorkoutProfile,
};
use ringbuf::traits::Consumer;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// Ringbuffer capacity constants
// One beat at 500 BPM with 32nd-note subdivision is 8 clicks; the audio
// queue holds several horizons worth of them.
const AUDIO_RINGBUFFER_CAPACITY: usize = 512;
const EVENT_RINGBUFFER_CAPACITY: usize = 256;
const NOTIFICATION_RINGBUFFER_CAPACITY: usize = 64;

const DEFAULT_EXPORT_SECONDS: f64 = 30.0;

/// Click track generator
#[derive(Parser, Debug)]
#[command(name = "clicktrack")]
#[command(about = "Sample-accurate metronome with tap tempo and workout ramps")]
#[command(version)]
struct Cli {
    /// Settings file (RON, or JSON with a .json extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tempo in quarter-note BPM
    #[arg(short, long)]
    tempo: Option<f64>,

    /// Time signature, e.g. 7/8
    #[arg(short, long)]
    meter: Option<TimeSignature>,

    /// Subdivision index for the beat value
    #[arg(short, long)]
    subdivision: Option<usize>,

    /// Click sound: sine, triangle, square or wood
    #[arg(long)]
    sound: Option<SoundType>,

    /// Volume 0.0..=1.0
    #[arg(long)]
    volume: Option<f32>,

    /// Workout ramp START:END:MINUTES, e.g. 100:160:5
    #[arg(short, long)]
    workout: Option<WorkoutProfile>,

    /// Stop after this many seconds (default: until Enter)
    #[arg(long)]
    seconds: Option<f64>,

    /// Render to a WAV file instead of playing
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Write the resulting settings back to the settings file
    #[arg(long)]
    save_config: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let settings_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => match config::default_settings_path() {
            Ok(path) => Some(path),
            Err(ConfigError::NoConfigDir) => None,
            Err(e) => return Err(e.into()),
        },
    };

    let mut settings = match &settings_path {
        Some(path) => config::load_settings(path)?,
        None => Settings::default(),
    };
    apply_overrides(&mut settings, &cli);
    settings.validate()?;

    if cli.save_config {
        let path = settings_path.as_ref().ok_or(ConfigError::NoConfigDir)?;
        config::save_settings(&settings, path)?;
        log::info!("Settings saved to {}", path.display());
    }

    match &cli.export {
        Some(path) => export(&settings, path, cli.seconds),
        None => play(settings, cli.seconds),
    }
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    let metronome = &mut settings.metronome;
    if let Some(tempo) = cli.tempo {
        metronome.tempo = tempo;
    }
    if let Some(meter) = cli.meter {
        metronome.set_time_signature(meter);
    }
    if let Some(subdivision) = cli.subdivision {
        metronome.subdivision_index = subdivision;
    }
    if let Some(sound) = cli.sound {
        metronome.sound_type = sound;
    }
    if let Some(volume) = cli.volume {
        metronome.volume = volume;
    }
    if let Some(workout) = cli.workout {
        metronome.workout = Some(workout);
    }
}

fn export(settings: &Settings, path: &Path, seconds: Option<f64>) -> Result<(), Box<dyn Error>> {
    let export_settings = ExportSettings {
        output_path: path.to_path_buf(),
        duration_seconds: seconds.unwrap_or(DEFAULT_EXPORT_SECONDS),
        ..ExportSettings::default()
    };
    let summary = ClickExporter::new(export_settings).export(
        &settings.metronome,
        &settings.scheduler,
        Some(Box::new(|progress| log::debug!("Export {:.0}%", progress * 100.0))),
    )?;

    println!(
        "Wrote {} ({} beats, {:.1} BPM at the end)",
        summary.path.display(),
        summary.beats,
        summary.final_tempo
    );
    Ok(())
}

fn play(settings: Settings, seconds: Option<f64>) -> Result<(), Box<dyn Error>> {
    let (audio_tx, audio_rx) = create_audio_channel(AUDIO_RINGBUFFER_CAPACITY);
    let (event_tx, mut event_rx) = create_event_channel(EVENT_RINGBUFFER_CAPACITY);
    let (engine_notification_tx, mut engine_notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);
    let (scheduler_notification_tx, mut scheduler_notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);

    let engine = ClickEngine::new(audio_rx, Arc::new(Mutex::new(engine_notification_tx)))?;
    let beats_per_measure = settings.metronome.time_signature.beats_per_measure;

    let metronome = Metronome::new(settings.metronome, settings.scheduler)?;
    let mut handle = MetronomeHandle::spawn(
        metronome,
        engine.timing(),
        ChannelSink::new(audio_tx),
        event_tx,
        Some(scheduler_notification_tx),
    )?;
    handle.start()?;

    let stop_requested = Arc::new(AtomicBool::new(false));
    if seconds.is_none() {
        println!("Playing, press Enter to stop");
        let stop_requested = Arc::clone(&stop_requested);
        thread::spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            stop_requested.store(true, Ordering::Release);
        });
    }

    let started = Instant::now();
    let deadline = seconds.map(|s| Duration::try_from_secs_f64(s).unwrap_or_default());
    while !stop_requested.load(Ordering::Acquire)
        && deadline.is_none_or(|deadline| started.elapsed() < deadline)
    {
        while let Some(event) = event_rx.try_pop() {
            match event {
                MetronomeEvent::Tick(tick) => println!(
                    "{:>5}  {}/{}",
                    tick.measure + 1,
                    tick.beat_index + 1,
                    beats_per_measure
                ),
                MetronomeEvent::TempoApplied { bpm } => println!("tempo {:.0} BPM", bpm),
                MetronomeEvent::Started | MetronomeEvent::Stopped => {}
            }
        }
        drain_notifications(&mut engine_notification_rx);
        drain_notifications(&mut scheduler_notification_rx);
        if let Err(e) = engine.check_stream() {
            handle.shutdown();
            return Err(e.into());
        }
        thread::sleep(Duration::from_millis(5));
    }

    handle.shutdown();
    if engine.dropped_clicks() > 0 {
        log::warn!("{} clicks dropped by the audio callback", engine.dropped_clicks());
    }
    Ok(())
}

fn drain_notifications(rx: &mut NotificationConsumer) {
    while let Some(notification) = rx.try_pop() {
        match notification.level {
            NotificationLevel::Info => log::info!("{}", notification),
            NotificationLevel::Warning => log::warn!("{}", notification),
            NotificationLevel::Error => log::error!("{}", notification),
        }
    }
}
