// Scheduler - lookahead click scheduling
//
// Each wake-up schedules every beat whose trigger time falls inside the
// horizon, so beats are handed to the sink well before they must sound and
// a late wake-up only delays scheduling, never the beat itself. Trigger
// times are absolute device-clock seconds and advance by exact beat
// durations, so jitter in the wake-up timer never accumulates.
//
// Tempo changes wait in a single pending slot and are applied when the beat
// index wraps to 0, so every measure is played at one tempo.

use std::collections::VecDeque;

use crate::audio::click::SoundType;
use crate::audio::sink::{ClickRequest, ClickSink, SinkError};
use crate::config::{MetronomeConfig, SchedulerSettings};
use crate::messaging::event::{MetronomeEvent, TickNotification};

use super::SchedulerResult;
use super::accent::AccentTrack;
use super::subdivision::{self, SubdivisionPattern};
use super::timeline::{Tempo, TimeSignature};
use super::transport::PlaybackState;

/// Configuration as seen by one scheduling batch
#[derive(Debug, Clone, PartialEq)]
pub struct BeatSnapshot {
    pub time_signature: TimeSignature,
    pub pattern: &'static SubdivisionPattern,
    pub accents: AccentTrack,
    pub sound_type: SoundType,
    pub volume: f32,
}

impl BeatSnapshot {
    pub fn from_config(config: &MetronomeConfig) -> SchedulerResult<Self> {
        config.time_signature.validate()?;
        Ok(Self {
            time_signature: config.time_signature,
            pattern: subdivision::pattern(
                config.time_signature.beat_value,
                config.subdivision_index,
            )?,
            accents: config.normalized_accents(),
            sound_type: config.sound_type,
            volume: config.volume,
        })
    }
}

/// Outcome of one wake-up
#[derive(Debug, Default)]
pub struct WakeReport {
    pub scheduled_beats: usize,
    pub sink_errors: Vec<SinkError>,
}

/// Events held back until their beat is about to sound
#[derive(Debug, Clone, Copy)]
struct QueuedEvent {
    time: f64,
    event: MetronomeEvent,
}

#[derive(Debug)]
pub struct Scheduler {
    settings: SchedulerSettings,
    state: PlaybackState,
    tempo: Tempo,
    pending_tempo: Option<Tempo>,
    current_beat: u32,
    measure: u64,
    next_trigger_time: f64,
    queued: VecDeque<QueuedEvent>,
}

impl Scheduler {
    pub fn new(tempo: Tempo, settings: SchedulerSettings) -> Self {
        Self {
            settings,
            state: PlaybackState::Stopped,
            tempo,
            pending_tempo: None,
            current_beat: 0,
            measure: 0,
            next_trigger_time: 0.0,
            queued: VecDeque::with_capacity(64),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Tempo currently applied to scheduled beats
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn pending_tempo(&self) -> Option<Tempo> {
        self.pending_tempo
    }

    /// Beat index of the next beat to be scheduled
    pub fn current_beat(&self) -> u32 {
        self.current_beat
    }

    pub fn measure(&self) -> u64 {
        self.measure
    }

    /// Device time of the next beat to be scheduled
    pub fn next_trigger_time(&self) -> f64 {
        self.next_trigger_time
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Stopped → Running; the first beat is the downbeat, slightly after `now`
    pub fn start(&mut self, now: f64, snapshot: &BeatSnapshot) -> SchedulerResult<()> {
        snapshot.time_signature.validate()?;
        if self.state.is_running() {
            return Ok(());
        }

        self.state = PlaybackState::Running;
        self.current_beat = 0;
        self.measure = 0;
        self.next_trigger_time = now + self.settings.startup_lead_secs();
        self.queued.clear();

        log::debug!(
            target: "clicktrack::scheduler",
            "Started at {:.3}s, first beat at {:.3}s ({})",
            now,
            self.next_trigger_time,
            self.tempo
        );
        Ok(())
    }

    /// Running → Stopped
    /// Future clicks are cancelled, queued ticks dropped and the pending tempo cleared.
    /// Tempo changes already applied are still announced.
    pub fn stop(
        &mut self,
        now: f64,
        sink: &mut dyn ClickSink,
        events: &mut Vec<MetronomeEvent>,
    ) -> Result<(), SinkError> {
        if !self.state.is_running() {
            return Ok(());
        }

        self.state = PlaybackState::Stopped;
        self.current_beat = 0;
        self.measure = 0;
        self.pending_tempo = None;
        events.extend(
            self.queued
                .drain(..)
                .map(|queued| queued.event)
                .filter(|event| matches!(event, MetronomeEvent::TempoApplied { .. })),
        );

        log::debug!(target: "clicktrack::scheduler", "Stopped at {:.3}s", now);
        sink.cancel_from(now)
    }

    /// Propose a new tempo
    /// Applied immediately while stopped, at the next downbeat while running
    pub fn propose_tempo(&mut self, tempo: Tempo, events: &mut Vec<MetronomeEvent>) {
        if self.state.is_running() {
            if tempo == self.tempo {
                self.pending_tempo = None;
            } else {
                self.pending_tempo = Some(tempo);
            }
        } else if tempo != self.tempo {
            self.tempo = tempo;
            events.push(MetronomeEvent::TempoApplied { bpm: tempo.bpm() });
        }
    }

    pub fn clear_pending_tempo(&mut self) {
        self.pending_tempo = None;
    }

    /// One lookahead wake-up
    pub fn wake(
        &mut self,
        now: f64,
        snapshot: &BeatSnapshot,
        sink: &mut dyn ClickSink,
        events: &mut Vec<MetronomeEvent>,
    ) -> WakeReport {
        let mut report = WakeReport::default();
        if !self.state.is_running() {
            return report;
        }

        let beats_per_measure = snapshot.time_signature.beats_per_measure.max(1) as u32;
        if self.current_beat >= beats_per_measure {
            // Meter shrank under the running measure
            self.begin_measure();
        }

        if self.next_trigger_time < now {
            log::debug!(
                target: "clicktrack::scheduler",
                "Wake-up {:.1}ms late, catching up",
                (now - self.next_trigger_time) * 1000.0
            );
        }

        let horizon = now + self.settings.horizon_secs();
        while self.next_trigger_time < horizon {
            self.schedule_beat(snapshot, sink, &mut report);

            self.next_trigger_time += self.tempo.beat_duration_seconds(&snapshot.time_signature);
            self.current_beat += 1;
            if self.current_beat >= beats_per_measure {
                self.begin_measure();
            }
            report.scheduled_beats += 1;
        }

        self.release_due_events(now, events);
        report
    }

    fn schedule_beat(
        &mut self,
        snapshot: &BeatSnapshot,
        sink: &mut dyn ClickSink,
        report: &mut WakeReport,
    ) {
        let beat_start = self.next_trigger_time;
        let beat_duration = self.tempo.beat_duration_seconds(&snapshot.time_signature);
        let intensity = snapshot.accents.level(self.current_beat as usize);

        for (time, note) in snapshot.pattern.note_times(beat_start, beat_duration) {
            let request = ClickRequest {
                time,
                is_primary: note.is_primary,
                intensity,
                sound: snapshot.sound_type,
                volume: snapshot.volume,
            };
            if let Err(e) = sink.create_click(&request) {
                log::warn!(
                    target: "clicktrack::scheduler",
                    "Click at {:.3}s not rendered: {}",
                    time,
                    e
                );
                report.sink_errors.push(e);
            }
        }

        self.queued.push_back(QueuedEvent {
            time: beat_start,
            event: MetronomeEvent::Tick(TickNotification {
                beat_index: self.current_beat,
                measure: self.measure,
                time: beat_start,
            }),
        });
    }

    /// Beat-0 boundary: the next scheduled beat opens a new measure
    fn begin_measure(&mut self) {
        self.current_beat = 0;
        self.measure += 1;
        self.apply_pending_tempo();
    }

    /// Tempo gate, only called on a downbeat
    fn apply_pending_tempo(&mut self) {
        let Some(tempo) = self.pending_tempo.take() else {
            return;
        };
        if tempo == self.tempo {
            return;
        }

        self.tempo = tempo;
        self.queued.push_back(QueuedEvent {
            time: self.next_trigger_time,
            event: MetronomeEvent::TempoApplied { bpm: tempo.bpm() },
        });
        log::debug!(
            target: "clicktrack::scheduler",
            "Tempo {} from measure {} at {:.3}s",
            tempo,
            self.measure,
            self.next_trigger_time
        );
    }

    fn release_due_events(&mut self, now: f64, events: &mut Vec<MetronomeEvent>) {
        let margin = self.settings.tick_margin_secs();
        while let Some(queued) = self.queued.front() {
            if queued.time - now >= margin {
                break;
            }
            events.push(queued.event);
            self.queued.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sink::RecordingSink;

    const EPS: f64 = 1e-9;

    fn snapshot(config: &MetronomeConfig) -> BeatSnapshot {
        BeatSnapshot::from_config(config).unwrap()
    }

    fn scheduler(bpm: f64) -> Scheduler {
        Scheduler::new(Tempo::new(bpm).unwrap(), SchedulerSettings::default())
    }

    /// Drive the scheduler with wake-ups every `step` seconds until `until`
    fn run(
        scheduler: &mut Scheduler,
        snapshot: &BeatSnapshot,
        sink: &mut RecordingSink,
        events: &mut Vec<MetronomeEvent>,
        from: f64,
        until: f64,
        step: f64,
    ) {
        let mut now = from;
        while now <= until + EPS {
            scheduler.wake(now, snapshot, sink, events);
            now += step;
        }
    }

    fn ticks(events: &[MetronomeEvent]) -> Vec<TickNotification> {
        events.iter().filter_map(|e| e.as_tick().copied()).collect()
    }

    #[test]
    fn test_start_state() {
        let config = MetronomeConfig::default();
        let mut s = scheduler(120.0);
        s.start(10.0, &snapshot(&config)).unwrap();

        assert_eq!(s.state(), PlaybackState::Running);
        assert_eq!(s.current_beat(), 0);
        assert!((s.next_trigger_time() - 10.05).abs() < EPS);
    }

    #[test]
    fn test_first_wake_schedules_within_horizon() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        let report = s.wake(0.0, &snap, &mut sink, &mut events);

        assert_eq!(report.scheduled_beats, 1);
        assert_eq!(sink.clicks.len(), 1);
        assert!((sink.clicks[0].time - 0.05).abs() < EPS);
        assert!(sink.clicks[0].is_primary);
        assert_eq!(sink.clicks[0].intensity, AccentTrack::MAX_INTENSITY);
        assert!((s.next_trigger_time() - 0.55).abs() < EPS);
        // The beat is 50 ms away, not yet imminent
        assert!(events.is_empty());
    }

    #[test]
    fn test_start_then_stop_emits_no_ticks() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        s.wake(0.0, &snap, &mut sink, &mut events);
        s.stop(0.001, &mut sink, &mut events).unwrap();
        s.wake(0.04, &snap, &mut sink, &mut events);

        assert!(ticks(&events).is_empty());
        assert_eq!(sink.cancellations, vec![0.001]);
        assert!(sink.clicks.is_empty());
        assert_eq!(s.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_ticks_released_when_imminent() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        s.wake(0.0, &snap, &mut sink, &mut events);
        assert!(events.is_empty());

        s.wake(0.025, &snap, &mut sink, &mut events);
        let t = ticks(&events);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].beat_index, 0);
        assert_eq!(t[0].measure, 0);
        assert!((t[0].time - 0.05).abs() < EPS);
    }

    #[test]
    fn test_beat_times_and_indices() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        run(&mut s, &snap, &mut sink, &mut events, 0.0, 3.9, 0.025);

        let t = ticks(&events);
        assert_eq!(t.len(), 8);
        for (i, tick) in t.iter().enumerate() {
            assert_eq!(tick.beat_index, (i % 4) as u32);
            assert_eq!(tick.measure, (i / 4) as u64);
            assert!((tick.time - (0.05 + 0.5 * i as f64)).abs() < EPS);
        }
        // Downbeats are accented, the rest mid intensity
        let intensities: Vec<u8> = sink.clicks.iter().take(4).map(|c| c.intensity).collect();
        assert_eq!(intensities, vec![4, 2, 2, 2]);
    }

    #[test]
    fn test_restart_begins_on_downbeat() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        run(&mut s, &snap, &mut sink, &mut events, 0.0, 1.3, 0.025);
        assert_ne!(s.current_beat(), 0);

        s.stop(1.3, &mut sink, &mut events).unwrap();
        assert_eq!(s.current_beat(), 0);

        events.clear();
        s.start(5.0, &snap).unwrap();
        run(&mut s, &snap, &mut sink, &mut events, 5.0, 5.1, 0.025);
        let t = ticks(&events);
        assert_eq!(t[0].beat_index, 0);
        assert_eq!(t[0].measure, 0);
        assert!((t[0].time - 5.05).abs() < EPS);
    }

    #[test]
    fn test_tempo_change_waits_for_downbeat() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        run(&mut s, &snap, &mut sink, &mut events, 0.0, 0.6, 0.025);

        // Mid-measure request
        s.propose_tempo(Tempo::new(60.0).unwrap(), &mut events);
        assert_eq!(s.tempo().bpm(), 120.0);
        assert!(s.pending_tempo().is_some());

        run(&mut s, &snap, &mut sink, &mut events, 0.625, 8.0, 0.025);

        let times: Vec<f64> = sink.primary_clicks().map(|c| c.time).collect();
        let durations: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();

        // First measure entirely at 120 BPM, every later beat at 60 BPM
        for d in &durations[..4] {
            assert!((d - 0.5).abs() < EPS, "{:?}", durations);
        }
        for d in &durations[4..] {
            assert!((d - 1.0).abs() < EPS, "{:?}", durations);
        }

        let applied: Vec<&MetronomeEvent> = events
            .iter()
            .filter(|e| matches!(e, MetronomeEvent::TempoApplied { .. }))
            .collect();
        assert_eq!(applied, vec![&MetronomeEvent::TempoApplied { bpm: 60.0 }]);
        assert_eq!(s.pending_tempo(), None);

        // Announced right before the downbeat it applies to
        let position = events.iter().position(|e| e == applied[0]).unwrap();
        let next_tick = events[position + 1].as_tick().unwrap();
        assert_eq!(next_tick.beat_index, 0);
        assert_eq!(next_tick.measure, 1);
    }

    #[test]
    fn test_tempo_applies_immediately_when_stopped() {
        let mut s = scheduler(120.0);
        let mut events = Vec::new();
        s.propose_tempo(Tempo::new(90.0).unwrap(), &mut events);
        assert_eq!(s.tempo().bpm(), 90.0);
        assert_eq!(events, vec![MetronomeEvent::TempoApplied { bpm: 90.0 }]);

        // Same value again is a no-op
        s.propose_tempo(Tempo::new(90.0).unwrap(), &mut events);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_pending_tempo_cleared_on_stop() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        s.wake(0.0, &snap, &mut sink, &mut events);
        s.propose_tempo(Tempo::new(80.0).unwrap(), &mut events);
        s.stop(0.1, &mut sink, &mut events).unwrap();

        assert_eq!(s.pending_tempo(), None);
        assert_eq!(s.tempo().bpm(), 120.0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_catch_up_after_late_wake() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        s.wake(0.0, &snap, &mut sink, &mut events);
        // Host stalls for two seconds
        let report = s.wake(2.01, &snap, &mut sink, &mut events);

        // Beats at 0.55, 1.05, 1.55, 2.05 all scheduled in one go
        assert_eq!(report.scheduled_beats, 4);
        let times: Vec<f64> = sink.clicks.iter().map(|c| c.time).collect();
        let expected = [0.05, 0.55, 1.05, 1.55, 2.05];
        assert_eq!(times.len(), expected.len());
        for (t, e) in times.iter().zip(expected) {
            assert!((t - e).abs() < EPS);
        }

        let t = ticks(&events);
        let indices: Vec<u32> = t.iter().map(|t| t.beat_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_sink_failure_does_not_stop_clock() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::failing_every(2);
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        let mut failures = 0;
        let mut now = 0.0;
        while now <= 1.9 {
            failures += s.wake(now, &snap, &mut sink, &mut events).sink_errors.len();
            now += 0.025;
        }

        assert_eq!(failures, 2);
        assert_eq!(sink.clicks.len(), 2);
        assert_eq!(s.state(), PlaybackState::Running);
        assert_eq!(ticks(&events).len(), 4);
    }

    #[test]
    fn test_subdivision_expands_notes() {
        let mut config = MetronomeConfig::default();
        config.subdivision_index = 2; // triplets
        let snap = snapshot(&config);
        let mut s = scheduler(60.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        s.wake(0.0, &snap, &mut sink, &mut events);

        assert_eq!(sink.clicks.len(), 3);
        assert!(sink.clicks[0].is_primary);
        assert!(!sink.clicks[1].is_primary && !sink.clicks[2].is_primary);
        assert!((sink.clicks[1].time - (0.05 + 1.0 / 3.0)).abs() < EPS);
        assert!((sink.clicks[2].time - (0.05 + 2.0 / 3.0)).abs() < EPS);
        for pair in sink.clicks.windows(2) {
            assert!(pair[0].time <= pair[1].time);
        }
        // Every note of a beat carries the beat's accent
        assert!(sink.clicks.iter().all(|c| c.intensity == 4));
    }

    #[test]
    fn test_compound_meter_beat_length() {
        let mut config = MetronomeConfig::default();
        config.set_time_signature(TimeSignature::six_eight());
        let snap = snapshot(&config);
        let mut s = scheduler(90.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        run(&mut s, &snap, &mut sink, &mut events, 0.0, 2.2, 0.025);

        let times: Vec<f64> = sink.primary_clicks().map(|c| c.time).collect();
        for pair in times.windows(2) {
            assert!((pair[1] - pair[0] - 1.0 / 3.0).abs() < EPS);
        }
        let indices: Vec<u32> = ticks(&events).iter().map(|t| t.beat_index).collect();
        assert_eq!(&indices[..7], &[0, 1, 2, 3, 4, 5, 0]);
    }

    #[test]
    fn test_accent_edit_applies_to_next_batch() {
        let mut config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        s.wake(0.0, &snap, &mut sink, &mut events);

        config.accent_levels.increment(1).unwrap();
        let edited = snapshot(&config);
        s.wake(0.5, &edited, &mut sink, &mut events);

        assert_eq!(sink.clicks[1].intensity, 3);
    }

    #[test]
    fn test_meter_shrink_opens_new_measure() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        s.start(0.0, &snap).unwrap();
        run(&mut s, &snap, &mut sink, &mut events, 0.0, 1.3, 0.025);
        assert_eq!(s.current_beat(), 3);
        assert_eq!(s.measure(), 0);

        s.propose_tempo(Tempo::new(60.0).unwrap(), &mut events);
        let mut smaller = MetronomeConfig::default();
        smaller.set_time_signature(TimeSignature::new(2, 4).unwrap());
        let smaller = snapshot(&smaller);

        s.wake(1.325, &smaller, &mut sink, &mut events);
        assert_eq!(s.current_beat(), 0);
        assert_eq!(s.measure(), 1);
        assert_eq!(s.tempo().bpm(), 60.0);
        assert_eq!(s.pending_tempo(), None);

        run(&mut s, &smaller, &mut sink, &mut events, 1.35, 5.0, 0.025);

        let pairs: Vec<(u64, u32)> = ticks(&events)
            .iter()
            .map(|t| (t.measure, t.beat_index))
            .collect();
        assert_eq!(
            pairs,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (2, 0), (2, 1)]
        );

        // TempoApplied lands right before the forced downbeat
        let position = events
            .iter()
            .position(|e| *e == MetronomeEvent::TempoApplied { bpm: 60.0 })
            .unwrap();
        let downbeat = events[position + 1].as_tick().copied().unwrap();
        assert_eq!((downbeat.measure, downbeat.beat_index), (1, 0));
        assert!((downbeat.time - 1.55).abs() < EPS);

        let times: Vec<f64> = sink.primary_clicks().map(|c| c.time).collect();
        let expected = [0.05, 0.55, 1.05, 1.55, 2.55, 3.55, 4.55];
        assert_eq!(times.len(), expected.len());
        for (time, expected) in times.iter().zip(expected) {
            assert!((time - expected).abs() < EPS, "{} != {}", time, expected);
        }
    }

    #[test]
    fn test_start_rejects_empty_measure() {
        let config = MetronomeConfig::default();
        let mut snap = snapshot(&config);
        snap.time_signature.beats_per_measure = 0;
        let mut s = scheduler(120.0);

        assert!(s.start(0.0, &snap).is_err());
        assert_eq!(s.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_stopped_wake_is_noop() {
        let config = MetronomeConfig::default();
        let snap = snapshot(&config);
        let mut s = scheduler(120.0);
        let mut sink = RecordingSink::new();
        let mut events = Vec::new();

        let report = s.wake(1.0, &snap, &mut sink, &mut events);
        assert_eq!(report.scheduled_beats, 0);
        assert!(sink.clicks.is_empty());
        assert!(events.is_empty());
    }
}
