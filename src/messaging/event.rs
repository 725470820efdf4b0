// Events published by the scheduler to UI listeners and bridges

/// A beat became audible
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickNotification {
    /// Beat within the measure, 0 = downbeat
    pub beat_index: u32,
    /// Measures completed since playback started
    pub measure: u64,
    /// Device-clock time the beat sounds at
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetronomeEvent {
    Started,
    Stopped,
    Tick(TickNotification),
    TempoApplied { bpm: f64 },
}

impl MetronomeEvent {
    pub fn as_tick(&self) -> Option<&TickNotification> {
        match self {
            MetronomeEvent::Tick(tick) => Some(tick),
            _ => None,
        }
    }
}
