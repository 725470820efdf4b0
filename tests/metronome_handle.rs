// Threaded metronome: commands in, ticks out, driven by a manual device clock

use clicktrack::audio::sink::{ChannelSink, RecordingSink};
use clicktrack::audio::timing::ManualClock;
use clicktrack::config::{MetronomeConfig, SchedulerSettings};
use clicktrack::messaging::channels::{
    EventConsumer, create_audio_channel, create_event_channel, create_notification_channel,
};
use clicktrack::messaging::command::AudioCommand;
use clicktrack::messaging::event::MetronomeEvent;
use clicktrack::sequencer::{Metronome, MetronomeHandle, PlaybackState, SchedulerError};
use ringbuf::traits::Consumer;
use std::thread;
use std::time::{Duration, Instant};

fn fast_settings() -> SchedulerSettings {
    SchedulerSettings {
        lookahead_interval_ms: 2,
        ..SchedulerSettings::default()
    }
}

fn spawn_with_recording(
    config: MetronomeConfig,
) -> (MetronomeHandle, ManualClock, EventConsumer) {
    let metronome = Metronome::new(config, fast_settings()).unwrap();
    let clock = ManualClock::new(0.0);
    let (event_tx, event_rx) = create_event_channel(1024);
    let handle =
        MetronomeHandle::spawn(metronome, clock.clone(), RecordingSink::new(), event_tx, None)
            .unwrap();
    (handle, clock, event_rx)
}

/// Collect events until `done` holds or the timeout expires
fn collect_until<F>(rx: &mut EventConsumer, events: &mut Vec<MetronomeEvent>, done: F)
where
    F: Fn(&[MetronomeEvent]) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(events) && Instant::now() < deadline {
        while let Some(event) = rx.try_pop() {
            events.push(event);
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Advance the clock in small steps, giving the scheduler thread time to wake
fn advance(clock: &ManualClock, seconds: f64) {
    let steps = (seconds / 0.02).ceil() as usize;
    for _ in 0..steps {
        clock.advance(0.02);
        thread::sleep(Duration::from_millis(3));
    }
}

#[test]
fn test_handle_plays_ticks_in_order() {
    let (mut handle, clock, mut rx) = spawn_with_recording(MetronomeConfig::default());
    let mut events = Vec::new();

    handle.start().unwrap();
    collect_until(&mut rx, &mut events, |e| e.contains(&MetronomeEvent::Started));
    assert_eq!(handle.shared_state().state(), PlaybackState::Running);

    advance(&clock, 2.6);
    collect_until(&mut rx, &mut events, |e| {
        e.iter().filter(|e| e.as_tick().is_some()).count() >= 5
    });

    let ticks: Vec<_> = events.iter().filter_map(|e| e.as_tick().copied()).collect();
    assert!(ticks.len() >= 5, "got {:?}", events);
    let indices: Vec<u32> = ticks.iter().take(5).map(|t| t.beat_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 0]);
    for pair in ticks.windows(2) {
        assert!(pair[1].time > pair[0].time);
    }

    handle.stop().unwrap();
    collect_until(&mut rx, &mut events, |e| e.contains(&MetronomeEvent::Stopped));
    assert!(!handle.is_running());
}

#[test]
fn test_handle_rejects_invalid_input_synchronously() {
    let (mut handle, _clock, _rx) = spawn_with_recording(MetronomeConfig::default());

    assert!(matches!(
        handle.set_tempo(-10.0),
        Err(SchedulerError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        handle.increment_accent(4),
        Err(SchedulerError::IndexOutOfRange { index: 4, len: 4 })
    ));

    let mut config = MetronomeConfig::default();
    config.subdivision_index = 42;
    assert!(handle.configure(config).is_err());
    assert_eq!(handle.config(), &MetronomeConfig::default());

    assert_eq!(handle.increment_accent(1).unwrap(), 3);
    assert_eq!(handle.config().accent_levels.levels(), &[4, 3, 2, 2]);
}

#[test]
fn test_handle_tap_tempo_reaches_scheduler() {
    let (mut handle, _clock, mut rx) = spawn_with_recording(MetronomeConfig::default());
    let mut events = Vec::new();

    assert_eq!(handle.register_tap(0.0).unwrap(), None);
    assert_eq!(handle.register_tap(400.0).unwrap(), Some(150.0));

    collect_until(&mut rx, &mut events, |e| {
        e.contains(&MetronomeEvent::TempoApplied { bpm: 150.0 })
    });
    assert_eq!(handle.shared_state().tempo_bpm(), 150.0);
    assert_eq!(handle.config().tempo, 150.0);
}

#[test]
fn test_handle_stop_cancels_queued_audio() {
    let metronome = Metronome::new(MetronomeConfig::default(), fast_settings()).unwrap();
    let clock = ManualClock::new(0.0);
    let (audio_tx, mut audio_rx) = create_audio_channel(256);
    let (event_tx, mut event_rx) = create_event_channel(256);
    let (notification_tx, _notification_rx) = create_notification_channel(16);
    let mut handle = MetronomeHandle::spawn(
        metronome,
        clock.clone(),
        ChannelSink::new(audio_tx),
        event_tx,
        Some(notification_tx),
    )
    .unwrap();
    let mut events = Vec::new();

    handle.start().unwrap();
    advance(&clock, 0.2);
    handle.stop().unwrap();
    collect_until(&mut event_rx, &mut events, |e| {
        e.contains(&MetronomeEvent::Stopped)
    });

    let mut clicks = 0;
    let mut cancelled = false;
    while let Some(command) = audio_rx.try_pop() {
        match command {
            AudioCommand::Click(_) => clicks += 1,
            AudioCommand::CancelFrom(_) => cancelled = true,
        }
    }
    assert!(clicks >= 1);
    assert!(cancelled);
}

#[test]
fn test_drop_joins_thread() {
    let (mut handle, clock, _rx) = spawn_with_recording(MetronomeConfig::default());
    handle.start().unwrap();
    advance(&clock, 0.1);
    drop(handle);
}

#[test]
fn test_full_notification_queue_does_not_stall_playback() {
    let metronome = Metronome::new(MetronomeConfig::default(), fast_settings()).unwrap();
    let clock = ManualClock::new(0.0);
    let (event_tx, mut event_rx) = create_event_channel(1024);
    let (notification_tx, mut notification_rx) = create_notification_channel(1);
    let mut handle = MetronomeHandle::spawn(
        metronome,
        clock.clone(),
        RecordingSink::failing_every(1),
        event_tx,
        Some(notification_tx),
    )
    .unwrap();
    let mut events = Vec::new();

    handle.start().unwrap();
    advance(&clock, 2.6);
    collect_until(&mut event_rx, &mut events, |e| {
        e.iter().filter(|e| e.as_tick().is_some()).count() >= 5
    });
    assert!(events.iter().filter(|e| e.as_tick().is_some()).count() >= 5);
    handle.shutdown();

    // Every click failed, only the first warning fit
    let first = notification_rx.try_pop().unwrap();
    assert!(first.message.starts_with("Click dropped"));
    assert!(notification_rx.try_pop().is_none());
}
