// Subdivision patterns - rhythmic subpatterns played inside one beat
// Tables are keyed by beat value; indices are not portable across tables

use super::{SchedulerError, SchedulerResult};

/// One note of a subdivision pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubdivisionNote {
    /// Position inside the beat, in [0, 1)
    pub time_offset: f64,
    pub is_primary: bool,
}

const fn primary(time_offset: f64) -> SubdivisionNote {
    SubdivisionNote {
        time_offset,
        is_primary: true,
    }
}

const fn secondary(time_offset: f64) -> SubdivisionNote {
    SubdivisionNote {
        time_offset,
        is_primary: false,
    }
}

/// Named subdivision of a single beat
/// The first note always sits at offset 0 and is primary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubdivisionPattern {
    pub name: &'static str,
    pub notes: &'static [SubdivisionNote],
}

impl SubdivisionPattern {
    /// Absolute trigger times of this pattern for a beat starting at `beat_start`
    pub fn note_times(
        &self,
        beat_start: f64,
        beat_duration: f64,
    ) -> impl Iterator<Item = (f64, &'static SubdivisionNote)> + '_ {
        self.notes
            .iter()
            .map(move |note| (beat_start + note.time_offset * beat_duration, note))
    }
}

const ONE_THIRD: f64 = 1.0 / 3.0;
const TWO_THIRDS: f64 = 2.0 / 3.0;

const SINGLE: SubdivisionPattern = SubdivisionPattern {
    name: "None",
    notes: &[primary(0.0)],
};

const HALVES: &[SubdivisionNote] = &[primary(0.0), secondary(0.5)];
const TRIPLETS: &[SubdivisionNote] = &[primary(0.0), secondary(ONE_THIRD), secondary(TWO_THIRDS)];
const QUARTERS: &[SubdivisionNote] = &[
    primary(0.0),
    secondary(0.25),
    secondary(0.5),
    secondary(0.75),
];

const WHOLE_PATTERNS: &[SubdivisionPattern] = &[
    SINGLE,
    SubdivisionPattern {
        name: "Halves",
        notes: HALVES,
    },
    SubdivisionPattern {
        name: "Quarters",
        notes: QUARTERS,
    },
];

const HALF_PATTERNS: &[SubdivisionPattern] = &[
    SINGLE,
    SubdivisionPattern {
        name: "Quarters",
        notes: HALVES,
    },
    SubdivisionPattern {
        name: "Quarter triplets",
        notes: TRIPLETS,
    },
    SubdivisionPattern {
        name: "Eighths",
        notes: QUARTERS,
    },
];

const QUARTER_PATTERNS: &[SubdivisionPattern] = &[
    SINGLE,
    SubdivisionPattern {
        name: "Eighths",
        notes: HALVES,
    },
    SubdivisionPattern {
        name: "Triplets",
        notes: TRIPLETS,
    },
    SubdivisionPattern {
        name: "Sixteenths",
        notes: QUARTERS,
    },
    SubdivisionPattern {
        name: "Eighth and two sixteenths",
        notes: &[primary(0.0), secondary(0.5), secondary(0.75)],
    },
    SubdivisionPattern {
        name: "Two sixteenths and eighth",
        notes: &[primary(0.0), secondary(0.25), secondary(0.5)],
    },
    SubdivisionPattern {
        name: "Dotted eighth and sixteenth",
        notes: &[primary(0.0), secondary(0.75)],
    },
    SubdivisionPattern {
        name: "Sixteenth and dotted eighth",
        notes: &[primary(0.0), secondary(0.25)],
    },
    SubdivisionPattern {
        name: "Swing",
        notes: &[primary(0.0), secondary(TWO_THIRDS)],
    },
    SubdivisionPattern {
        name: "Quintuplets",
        notes: &[
            primary(0.0),
            secondary(0.2),
            secondary(0.4),
            secondary(0.6),
            secondary(0.8),
        ],
    },
    SubdivisionPattern {
        name: "Sextuplets",
        notes: &[
            primary(0.0),
            secondary(1.0 / 6.0),
            secondary(ONE_THIRD),
            secondary(0.5),
            secondary(TWO_THIRDS),
            secondary(5.0 / 6.0),
        ],
    },
];

const EIGHTH_PATTERNS: &[SubdivisionPattern] = &[
    SINGLE,
    SubdivisionPattern {
        name: "Sixteenths",
        notes: HALVES,
    },
    SubdivisionPattern {
        name: "Sixteenth triplets",
        notes: TRIPLETS,
    },
    SubdivisionPattern {
        name: "Thirty-seconds",
        notes: QUARTERS,
    },
];

const SIXTEENTH_PATTERNS: &[SubdivisionPattern] = &[
    SINGLE,
    SubdivisionPattern {
        name: "Thirty-seconds",
        notes: HALVES,
    },
];

const THIRTY_SECOND_PATTERNS: &[SubdivisionPattern] = &[SINGLE];

/// All subdivision patterns available for a beat value
/// Unknown beat values fall back to the single-note table
pub fn patterns(beat_value: u8) -> &'static [SubdivisionPattern] {
    match beat_value {
        1 => WHOLE_PATTERNS,
        2 => HALF_PATTERNS,
        4 => QUARTER_PATTERNS,
        8 => EIGHTH_PATTERNS,
        16 => SIXTEENTH_PATTERNS,
        _ => THIRTY_SECOND_PATTERNS,
    }
}

/// Look up one pattern, failing when the index does not exist for this beat value
pub fn pattern(beat_value: u8, index: usize) -> SchedulerResult<&'static SubdivisionPattern> {
    let table = patterns(beat_value);
    table.get(index).ok_or(SchedulerError::IndexOutOfRange {
        index,
        len: table.len(),
    })
}
