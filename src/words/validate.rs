// Input validation
// Contract checks on collaborator input; weak data is not an error, broken data is

use thiserror::Error;

use super::types::TimedWord;

/// Contract violations from upstream collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInputError {
    #[error("Empty input sequence: {what}")]
    EmptySequence { what: &'static str },

    #[error("Non-finite timestamp at index {index}")]
    NonFiniteTimestamp { index: usize },

    #[error("Word {index} ends before it starts ({start} > {end})")]
    InvertedSpan { index: usize, start: f64, end: f64 },

    #[error("Timestamps not monotonic at index {index} ({current} after {previous})")]
    NonMonotonic {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Invalid semantic hint: {0}")]
    InvalidHint(String),

    #[error("Unsupported meter {beats_per_measure}/{beat_unit}")]
    InvalidMeter { beats_per_measure: u8, beat_unit: u8 },
}

/// Check a timing sequence: finite, `start <= end`, starts non-decreasing
pub fn validate_timed_words(words: &[TimedWord]) -> Result<(), InvalidInputError> {
    let mut previous: Option<f64> = None;

    for (index, word) in words.iter().enumerate() {
        if !word.start.is_finite() || !word.end.is_finite() {
            return Err(InvalidInputError::NonFiniteTimestamp { index });
        }

        if word.start > word.end {
            return Err(InvalidInputError::InvertedSpan {
                index,
                start: word.start,
                end: word.end,
            });
        }

        if let Some(prev) = previous {
            if word.start < prev {
                return Err(InvalidInputError::NonMonotonic {
                    index,
                    previous: prev,
                    current: word.start,
                });
            }
        }
        previous = Some(word.start);
    }

    Ok(())
}

/// Check a bare onset sequence: finite and non-decreasing
pub fn validate_onsets(onsets: &[f64]) -> Result<(), InvalidInputError> {
    for (index, &t) in onsets.iter().enumerate() {
        if !t.is_finite() {
            return Err(InvalidInputError::NonFiniteTimestamp { index });
        }
        if index > 0 && t < onsets[index - 1] {
            return Err(InvalidInputError::NonMonotonic {
                index,
                previous: onsets[index - 1],
                current: t,
            });
        }
    }

    Ok(())
}
