// Word and marker types
// The two partial views of a spoken count (timing-only, role-only) and the fused marker

use serde::{Deserialize, Serialize};

/// Rhythmic role of a spoken word
/// Assigned by the external classifier, never inferred from timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerRole {
    /// Counted numbers: "one", "2", "five"
    Beat,

    /// "and" / "&" - half-beat in duple, second of three in triplet
    And,

    /// "ah" / "a" / "uh" - third subdivision in triplet
    Ah,

    /// Non-rhythmic speech (instructions, step names, filler)
    None,
}

impl MarkerRole {
    /// Parse a classifier label. Unknown labels are non-rhythmic.
    pub fn from_label(label: &str) -> Self {
        match normalize_word(label).as_str() {
            "beat" => MarkerRole::Beat,
            "and" => MarkerRole::And,
            "ah" => MarkerRole::Ah,
            _ => MarkerRole::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerRole::Beat => "beat",
            MarkerRole::And => "and",
            MarkerRole::Ah => "ah",
            MarkerRole::None => "none",
        }
    }

    /// True for the roles that sit between beats
    pub fn is_subdivision(&self) -> bool {
        matches!(self, MarkerRole::And | MarkerRole::Ah)
    }
}

/// A transcribed word with timing and no rhythmic label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedWord {
    /// Word as transcribed
    pub text: String,

    /// Onset in seconds from start of utterance
    pub start: f64,

    /// Offset in seconds from start of utterance
    pub end: f64,
}

impl TimedWord {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        TimedWord {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A classified word with a rhythmic role and no timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedWord {
    /// Word as heard by the classifier
    pub text: String,

    /// Rhythmic role
    pub role: MarkerRole,

    /// Beat number the classifier attached to this word, if any
    /// For subdivisions this is the preceding beat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beat_number: Option<u32>,
}

impl ClassifiedWord {
    pub fn new(text: impl Into<String>, role: MarkerRole) -> Self {
        ClassifiedWord {
            text: text.into(),
            role,
            beat_number: None,
        }
    }

    pub fn with_beat(text: impl Into<String>, role: MarkerRole, beat_number: u32) -> Self {
        ClassifiedWord {
            text: text.into(),
            role,
            beat_number: Some(beat_number),
        }
    }
}

/// How a marker's two halves were paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairedBy {
    /// Normalized text agreed at this position
    Text,

    /// Text disagreed; paired by position alone
    Position,
}

/// One fused rhythmic event: a real timestamp plus a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Onset in seconds, taken from the timed word
    pub timestamp: f64,

    /// Role, taken from the classified word
    pub role: MarkerRole,

    /// Beat this marker belongs to (1-based), None for non-rhythmic words
    pub beat_index: Option<u32>,

    /// Raw transcribed text (timing side wins)
    pub text: String,

    /// Whether text agreed when pairing
    pub paired_by: PairedBy,
}

impl Marker {
    pub fn is_beat(&self) -> bool {
        self.role == MarkerRole::Beat
    }
}

/// Normalize a word for comparison: trimmed, lowercase, edge punctuation stripped
pub fn normalize_word(word: &str) -> String {
    word.trim()
        .to_lowercase()
        .trim_matches(|c: char| c.is_ascii_punctuation() && c != '&')
        .to_string()
}
