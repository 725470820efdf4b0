// Metronome - host-facing facade over the scheduler
//
// `Metronome` is the single-threaded core: it owns the configuration, the
// scheduler, the workout ramp and the tap estimator. `MetronomeHandle` runs
// a `Metronome` on its own scheduling thread and talks to it through
// lock-free command and event queues.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ringbuf::traits::{Consumer, Producer};

use crate::audio::click::SoundType;
use crate::audio::sink::{ClickSink, SinkError};
use crate::audio::timing::Clock;
use crate::config::{MetronomeConfig, SchedulerSettings};
use crate::messaging::channels::{
    ControlConsumer, ControlProducer, EventProducer, NotificationProducer,
    create_control_channel,
};
use crate::messaging::command::ControlCommand;
use crate::messaging::event::MetronomeEvent;
use crate::messaging::notification::{Notification, NotificationCategory};

use super::ramp::{RampState, TempoRamp, WorkoutProfile};
use super::scheduler::{BeatSnapshot, Scheduler, WakeReport};
use super::subdivision;
use super::tap_tempo::TapTempo;
use super::timeline::{Tempo, TimeSignature};
use super::transport::{PlaybackState, SharedPlaybackState};
use super::{SchedulerError, SchedulerResult};

pub struct Metronome {
    config: MetronomeConfig,
    snapshot: BeatSnapshot,
    scheduler: Scheduler,
    ramp: TempoRamp,
    tap: TapTempo,
    last_ramp_eval: Option<f64>,
}

impl Metronome {
    pub fn new(config: MetronomeConfig, settings: SchedulerSettings) -> SchedulerResult<Self> {
        config.validate()?;
        settings.validate()?;

        let mut config = config;
        config.accent_levels = config.normalized_accents();
        let snapshot = BeatSnapshot::from_config(&config)?;
        let scheduler = Scheduler::new(Tempo::new(config.tempo)?, settings);

        let mut ramp = TempoRamp::new();
        if let Some(profile) = config.workout {
            ramp.arm(profile)?;
        }

        Ok(Self {
            config,
            snapshot,
            scheduler,
            ramp,
            tap: TapTempo::new(settings.tap_history),
            last_ramp_eval: None,
        })
    }

    pub fn config(&self) -> &MetronomeConfig {
        &self.config
    }

    pub fn settings(&self) -> &SchedulerSettings {
        self.scheduler.settings()
    }

    pub fn state(&self) -> PlaybackState {
        self.scheduler.state()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Tempo applied to the beats being scheduled
    pub fn tempo(&self) -> Tempo {
        self.scheduler.tempo()
    }

    pub fn current_beat(&self) -> u32 {
        self.scheduler.current_beat()
    }

    /// Tempo waiting for the next downbeat
    pub fn pending_tempo(&self) -> Option<Tempo> {
        self.scheduler.pending_tempo()
    }

    pub fn ramp_state(&self) -> RampState {
        self.ramp.state()
    }

    /// Replace the whole configuration
    /// Re-applying the current configuration changes nothing
    pub fn configure(
        &mut self,
        config: MetronomeConfig,
        events: &mut Vec<MetronomeEvent>,
    ) -> SchedulerResult<()> {
        config.validate()?;
        let mut config = config;
        config.accent_levels = config.normalized_accents();
        let snapshot = BeatSnapshot::from_config(&config)?;
        let tempo = Tempo::new(config.tempo)?;

        if config.workout != self.config.workout {
            match config.workout {
                Some(profile) => self.arm_ramp(profile, events)?,
                None => self.disarm_ramp(),
            }
        }

        // Only an edited tempo is proposed, so a running ramp keeps its target
        let tempo_changed = config.tempo != self.config.tempo;
        self.config = config;
        self.snapshot = snapshot;
        if tempo_changed {
            self.scheduler.propose_tempo(tempo, events);
        }
        Ok(())
    }

    pub fn set_tempo(
        &mut self,
        bpm: f64,
        events: &mut Vec<MetronomeEvent>,
    ) -> SchedulerResult<Tempo> {
        let tempo = Tempo::new(bpm)?;
        self.config.tempo = tempo.bpm();
        self.scheduler.propose_tempo(tempo, events);
        Ok(tempo)
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) -> SchedulerResult<()> {
        time_signature.validate()?;
        self.config.set_time_signature(time_signature);
        self.refresh_snapshot()
    }

    pub fn set_subdivision(&mut self, index: usize) -> SchedulerResult<()> {
        subdivision::pattern(self.config.time_signature.beat_value, index)?;
        self.config.subdivision_index = index;
        self.refresh_snapshot()
    }

    /// Cycle the accent of one beat, returns the new level
    pub fn increment_accent(&mut self, index: usize) -> SchedulerResult<u8> {
        let level = self.config.accent_levels.increment(index)?;
        self.refresh_snapshot()?;
        Ok(level)
    }

    pub fn set_sound(&mut self, sound: SoundType) -> SchedulerResult<()> {
        self.config.sound_type = sound;
        self.refresh_snapshot()
    }

    pub fn set_volume(&mut self, volume: f32) -> SchedulerResult<()> {
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "volume must be within 0.0..=1.0, got {}",
                volume
            )));
        }
        self.config.volume = volume;
        self.refresh_snapshot()
    }

    fn refresh_snapshot(&mut self) -> SchedulerResult<()> {
        self.snapshot = BeatSnapshot::from_config(&self.config)?;
        Ok(())
    }

    pub fn start(&mut self, now: f64, events: &mut Vec<MetronomeEvent>) -> SchedulerResult<()> {
        if self.is_running() {
            return Ok(());
        }
        self.config.validate()?;

        // Stopped, so the start tempo applies at once
        if let Some(start_tempo) = self.ramp.activate() {
            self.scheduler.propose_tempo(Tempo::clamped(start_tempo), events);
        }
        if let Err(e) = self.scheduler.start(now, &self.snapshot) {
            self.ramp.deactivate();
            return Err(e);
        }
        self.last_ramp_eval = None;
        events.push(MetronomeEvent::Started);
        Ok(())
    }

    /// Stop playback; a failed cancellation is returned but the metronome still stops
    pub fn stop(
        &mut self,
        now: f64,
        sink: &mut dyn ClickSink,
        events: &mut Vec<MetronomeEvent>,
    ) -> Result<(), SinkError> {
        if !self.is_running() {
            return Ok(());
        }
        let result = self.scheduler.stop(now, sink, events);
        self.ramp.deactivate();
        self.last_ramp_eval = None;
        events.push(MetronomeEvent::Stopped);
        result
    }

    pub fn toggle(
        &mut self,
        now: f64,
        sink: &mut dyn ClickSink,
        events: &mut Vec<MetronomeEvent>,
    ) -> SchedulerResult<()> {
        if self.is_running() {
            if let Err(e) = self.stop(now, sink, events) {
                log::warn!(target: "clicktrack::scheduler", "Cancelling clicks failed: {}", e);
            }
            Ok(())
        } else {
            self.start(now, events)
        }
    }

    /// Register a tap; returns the new tempo once enough taps were seen
    pub fn register_tap(&mut self, now_ms: f64, events: &mut Vec<MetronomeEvent>) -> Option<f64> {
        let estimate = self.tap.register_tap(now_ms)?;
        let tempo = Tempo::clamped(estimate);
        self.config.tempo = tempo.bpm();
        self.scheduler.propose_tempo(tempo, events);
        Some(tempo.bpm())
    }

    pub fn arm_workout(
        &mut self,
        profile: WorkoutProfile,
        events: &mut Vec<MetronomeEvent>,
    ) -> SchedulerResult<()> {
        self.arm_ramp(profile, events)?;
        self.config.workout = Some(profile);
        Ok(())
    }

    pub fn disarm_workout(&mut self) {
        self.disarm_ramp();
        self.config.workout = None;
    }

    /// A ramp target still waiting for its downbeat goes with the ramp
    fn disarm_ramp(&mut self) {
        if let Some(target) = self.ramp.last_target() {
            if self.scheduler.pending_tempo() == Some(Tempo::clamped(target)) {
                self.scheduler.clear_pending_tempo();
            }
        }
        self.ramp.disarm();
        self.last_ramp_eval = None;
    }

    fn arm_ramp(
        &mut self,
        profile: WorkoutProfile,
        events: &mut Vec<MetronomeEvent>,
    ) -> SchedulerResult<()> {
        self.ramp.arm(profile)?;
        if self.is_running() {
            // Restart the ramp from its start tempo at the next downbeat
            if let Some(start_tempo) = self.ramp.activate() {
                self.scheduler.propose_tempo(Tempo::clamped(start_tempo), events);
            }
            self.last_ramp_eval = None;
        }
        Ok(())
    }

    /// One lookahead wake-up at device time `now`
    pub fn wake(
        &mut self,
        now: f64,
        sink: &mut dyn ClickSink,
        events: &mut Vec<MetronomeEvent>,
    ) -> WakeReport {
        if self.is_running() && self.ramp.state() == RampState::Active {
            self.evaluate_ramp(now, events);
        }
        self.scheduler.wake(now, &self.snapshot, sink, events)
    }

    fn evaluate_ramp(&mut self, now: f64, events: &mut Vec<MetronomeEvent>) {
        let interval = self.scheduler.settings().ramp_interval_ms / 1000.0;
        if let Some(last) = self.last_ramp_eval {
            if now - last < interval {
                return;
            }
        }
        self.last_ramp_eval = Some(now);

        if let Some(target) = self.ramp.evaluate(now * 1000.0) {
            log::debug!(target: "clicktrack::scheduler", "Workout target {:.0} BPM", target);
            self.scheduler.propose_tempo(Tempo::clamped(target), events);
        }
    }
}

/// Metronome running on its own scheduling thread
///
/// Edits are validated on the calling thread against a mirror of the
/// configuration, then forwarded as commands; the scheduling thread is the
/// only writer of the live state.
pub struct MetronomeHandle {
    control_tx: ControlProducer,
    config: MetronomeConfig,
    tap: TapTempo,
    shared: Arc<SharedPlaybackState>,
    thread: Option<JoinHandle<()>>,
}

impl MetronomeHandle {
    const CONTROL_CAPACITY: usize = 64;

    pub fn spawn<C, S>(
        metronome: Metronome,
        clock: C,
        sink: S,
        event_tx: EventProducer,
        notification_tx: Option<NotificationProducer>,
    ) -> SchedulerResult<Self>
    where
        C: Clock + 'static,
        S: ClickSink + 'static,
    {
        let (control_tx, control_rx) = create_control_channel(Self::CONTROL_CAPACITY);
        let shared = SharedPlaybackState::new(metronome.tempo().bpm());
        let config = metronome.config().clone();
        let tap = TapTempo::new(metronome.settings().tap_history);

        let worker = SchedulerThread {
            metronome,
            clock,
            sink,
            control_rx,
            event_tx,
            notification_tx,
            shared: Arc::clone(&shared),
        };
        let thread = thread::Builder::new()
            .name("clicktrack-scheduler".to_string())
            .spawn(move || worker.run())
            .map_err(|e| SchedulerError::Thread(e.to_string()))?;

        log::info!(target: "clicktrack::scheduler", "Scheduler thread started");

        Ok(Self {
            control_tx,
            config,
            tap,
            shared,
            thread: Some(thread),
        })
    }

    fn send(&mut self, command: ControlCommand) -> SchedulerResult<()> {
        self.control_tx
            .try_push(command)
            .map_err(|_| SchedulerError::ChannelFull("control"))
    }

    /// Configuration as last accepted by this handle
    pub fn config(&self) -> &MetronomeConfig {
        &self.config
    }

    pub fn shared_state(&self) -> Arc<SharedPlaybackState> {
        Arc::clone(&self.shared)
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().is_running()
    }

    pub fn configure(&mut self, config: MetronomeConfig) -> SchedulerResult<()> {
        config.validate()?;
        let mut config = config;
        config.accent_levels = config.normalized_accents();
        self.send(ControlCommand::Configure(Box::new(config.clone())))?;
        self.config = config;
        Ok(())
    }

    pub fn set_tempo(&mut self, bpm: f64) -> SchedulerResult<f64> {
        let tempo = Tempo::new(bpm)?;
        self.send(ControlCommand::SetTempo(tempo.bpm()))?;
        self.config.tempo = tempo.bpm();
        Ok(tempo.bpm())
    }

    pub fn increment_accent(&mut self, index: usize) -> SchedulerResult<u8> {
        let mut accents = self.config.accent_levels.clone();
        let level = accents.increment(index)?;
        self.send(ControlCommand::IncrementAccent(index))?;
        self.config.accent_levels = accents;
        Ok(level)
    }

    pub fn start(&mut self) -> SchedulerResult<()> {
        self.config.validate()?;
        self.send(ControlCommand::Start)
    }

    pub fn stop(&mut self) -> SchedulerResult<()> {
        self.send(ControlCommand::Stop)
    }

    pub fn toggle(&mut self) -> SchedulerResult<()> {
        self.send(ControlCommand::Toggle)
    }

    /// Tap tempo; `now_ms` is the host's monotonic time of the tap
    pub fn register_tap(&mut self, now_ms: f64) -> SchedulerResult<Option<f64>> {
        let Some(estimate) = self.tap.register_tap(now_ms) else {
            return Ok(None);
        };
        let bpm = Tempo::clamped(estimate).bpm();
        self.send(ControlCommand::SetTempo(bpm))?;
        self.config.tempo = bpm;
        Ok(Some(bpm))
    }

    pub fn arm_workout(&mut self, profile: WorkoutProfile) -> SchedulerResult<()> {
        profile.validate()?;
        self.send(ControlCommand::ArmWorkout(profile))?;
        self.config.workout = Some(profile);
        Ok(())
    }

    pub fn disarm_workout(&mut self) -> SchedulerResult<()> {
        self.send(ControlCommand::DisarmWorkout)?;
        self.config.workout = None;
        Ok(())
    }

    /// Stop playback and join the scheduling thread
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Quit is retried until the thread drains the queue
        while self.control_tx.try_push(ControlCommand::Quit).is_err() {
            if thread.is_finished() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        if thread.join().is_err() {
            log::error!(target: "clicktrack::scheduler", "Scheduler thread panicked");
        }
    }
}

impl Drop for MetronomeHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct SchedulerThread<C, S> {
    metronome: Metronome,
    clock: C,
    sink: S,
    control_rx: ControlConsumer,
    event_tx: EventProducer,
    notification_tx: Option<NotificationProducer>,
    shared: Arc<SharedPlaybackState>,
}

impl<C: Clock, S: ClickSink> SchedulerThread<C, S> {
    fn run(mut self) {
        let interval = Duration::from_millis(self.metronome.settings().lookahead_interval_ms);
        let mut events = Vec::with_capacity(64);

        loop {
            while let Some(command) = self.control_rx.try_pop() {
                if !self.apply(command, &mut events) {
                    self.publish(&mut events);
                    log::info!(target: "clicktrack::scheduler", "Scheduler thread stopped");
                    return;
                }
            }

            let now = self.clock.now();
            let report = self.metronome.wake(now, &mut self.sink, &mut events);
            for error in report.sink_errors {
                self.notify(Notification::warning(
                    NotificationCategory::Audio,
                    format!("Click dropped: {}", error),
                ));
            }
            self.publish(&mut events);

            thread::sleep(interval);
        }
    }

    /// Returns false on Quit
    fn apply(&mut self, command: ControlCommand, events: &mut Vec<MetronomeEvent>) -> bool {
        let now = self.clock.now();
        let result = match command {
            ControlCommand::Configure(config) => self.metronome.configure(*config, events),
            ControlCommand::SetTempo(bpm) => self.metronome.set_tempo(bpm, events).map(|_| ()),
            ControlCommand::IncrementAccent(index) => {
                self.metronome.increment_accent(index).map(|_| ())
            }
            ControlCommand::Start => self.metronome.start(now, events),
            ControlCommand::Stop => {
                self.stop(now, events);
                Ok(())
            }
            ControlCommand::Toggle => {
                if self.metronome.is_running() {
                    self.stop(now, events);
                    Ok(())
                } else {
                    self.metronome.start(now, events)
                }
            }
            ControlCommand::ArmWorkout(profile) => self.metronome.arm_workout(profile, events),
            ControlCommand::DisarmWorkout => {
                self.metronome.disarm_workout();
                Ok(())
            }
            ControlCommand::Quit => {
                self.stop(now, events);
                return false;
            }
        };

        if let Err(e) = result {
            log::warn!(target: "clicktrack::scheduler", "Command rejected: {}", e);
            self.notify(Notification::warning(
                NotificationCategory::Scheduler,
                format!("Command rejected: {}", e),
            ));
        }
        true
    }

    fn stop(&mut self, now: f64, events: &mut Vec<MetronomeEvent>) {
        if let Err(e) = self.metronome.stop(now, &mut self.sink, events) {
            log::warn!(target: "clicktrack::scheduler", "Cancelling clicks failed: {}", e);
            self.notify(Notification::warning(
                NotificationCategory::Audio,
                format!("Cancelling clicks failed: {}", e),
            ));
        }
    }

    /// Mirror events into the shared state, then forward them to listeners
    fn publish(&mut self, events: &mut Vec<MetronomeEvent>) {
        for event in events.drain(..) {
            match event {
                MetronomeEvent::Started => {
                    self.shared.set_position(0, 0);
                    self.shared.set_state(PlaybackState::Running);
                }
                MetronomeEvent::Stopped => self.shared.set_state(PlaybackState::Stopped),
                MetronomeEvent::Tick(tick) => self.shared.set_position(tick.measure, tick.beat_index),
                MetronomeEvent::TempoApplied { bpm } => self.shared.set_tempo_bpm(bpm),
            }
            if self.event_tx.try_push(event).is_err() {
                log::warn!(target: "clicktrack::scheduler", "Event queue full, dropped {:?}", event);
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        if let Some(tx) = self.notification_tx.as_mut() {
            if let Err(dropped) = tx.try_push(notification) {
                log::warn!(
                    target: "clicktrack::scheduler",
                    "Notification queue full, dropped: {}",
                    dropped
                );
            }
        }
    }
}
