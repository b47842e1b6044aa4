// Metric grid types - Meter and subdivision
// Value types shared by the subdivision classifier and the meter interpreter

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::words::InvalidInputError;

/// Musical time signature
/// Only the meters a dance-class count can express are representable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MeterRepr", into = "MeterRepr")]
pub struct Meter {
    beats_per_measure: u8,
    beat_unit: u8,
}

#[derive(Serialize, Deserialize)]
struct MeterRepr {
    beats_per_measure: u8,
    beat_unit: u8,
}

impl Meter {
    /// 4/4 - most barre work
    pub const FOUR_FOUR: Meter = Meter {
        beats_per_measure: 4,
        beat_unit: 4,
    };

    /// 3/4 - waltz, balancé
    pub const THREE_FOUR: Meter = Meter {
        beats_per_measure: 3,
        beat_unit: 4,
    };

    /// 2/4 - marches, petit allegro
    pub const TWO_FOUR: Meter = Meter {
        beats_per_measure: 2,
        beat_unit: 4,
    };

    /// 6/8 - compound duple
    pub const SIX_EIGHT: Meter = Meter {
        beats_per_measure: 6,
        beat_unit: 8,
    };

    /// Build a meter, rejecting anything outside {2,3,4,6} / {4,8}
    pub fn new(beats_per_measure: u8, beat_unit: u8) -> Result<Self, InvalidInputError> {
        let beats_ok = matches!(beats_per_measure, 2 | 3 | 4 | 6);
        let unit_ok = matches!(beat_unit, 4 | 8);

        if beats_ok && unit_ok {
            Ok(Meter {
                beats_per_measure,
                beat_unit,
            })
        } else {
            Err(InvalidInputError::InvalidMeter {
                beats_per_measure,
                beat_unit,
            })
        }
    }

    /// Get number of beats per measure
    pub fn beats_per_measure(&self) -> u8 {
        self.beats_per_measure
    }

    /// Get the note value that gets one beat (4 = quarter note)
    pub fn beat_unit(&self) -> u8 {
        self.beat_unit
    }

    pub fn is_triple(&self) -> bool {
        self.beats_per_measure == 3
    }
}

impl Default for Meter {
    fn default() -> Self {
        Meter::FOUR_FOUR
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_measure, self.beat_unit)
    }
}

impl TryFrom<MeterRepr> for Meter {
    type Error = InvalidInputError;

    fn try_from(repr: MeterRepr) -> Result<Self, Self::Error> {
        Meter::new(repr.beats_per_measure, repr.beat_unit)
    }
}

impl From<Meter> for MeterRepr {
    fn from(meter: Meter) -> Self {
        MeterRepr {
            beats_per_measure: meter.beats_per_measure,
            beat_unit: meter.beat_unit,
        }
    }
}

/// Subordinate rhythmic events between beats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subdivision {
    /// Beats only (1, 2, 3, 4)
    None,

    /// Two per beat (1-and-2-and)
    Duple,

    /// Three per beat (1-and-ah-2-and-ah)
    Triplet,
}

impl Subdivision {
    /// Get number of events per beat, counting the beat itself
    pub fn subdivisions_per_beat(&self) -> u32 {
        match self {
            Subdivision::None => 1,
            Subdivision::Duple => 2,
            Subdivision::Triplet => 3,
        }
    }

    /// Number of subdivision markers expected between two beats
    pub fn markers_between_beats(&self) -> usize {
        self.subdivisions_per_beat() as usize - 1
    }

    /// Where the subdivision markers fall within a beat interval, as fractions
    pub fn expected_ratios(&self) -> &'static [f64] {
        match self {
            Subdivision::None => &[],
            Subdivision::Duple => &[0.5],
            Subdivision::Triplet => &[1.0 / 3.0, 2.0 / 3.0],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subdivision::None => "none",
            Subdivision::Duple => "duple",
            Subdivision::Triplet => "triplet",
        }
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
