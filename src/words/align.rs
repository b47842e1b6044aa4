// Sequential word alignment
// Pairs untimed classifications with unlabeled timestamps, position by position

use serde::Serialize;

use super::types::{normalize_word, ClassifiedWord, Marker, MarkerRole, PairedBy, TimedWord};
use super::validate::{validate_timed_words, InvalidInputError};

/// Result of pairing the two word sequences
#[derive(Debug, Clone, Serialize)]
pub struct Alignment {
    /// Fused markers, length min(classified, timed), in temporal order
    pub markers: Vec<Marker>,

    /// Pairs whose normalized text agreed
    pub text_matched: usize,

    /// Pairs that fell back to position because text disagreed
    pub position_fallback: usize,

    /// Trailing classified words with no timed partner
    pub dropped_classified: usize,

    /// Trailing timed words with no classified partner
    pub dropped_timed: usize,
}

impl Alignment {
    fn empty(dropped_classified: usize, dropped_timed: usize) -> Self {
        Alignment {
            markers: Vec::new(),
            text_matched: 0,
            position_fallback: 0,
            dropped_classified,
            dropped_timed,
        }
    }

    /// Fraction of pairs that agreed on text [0.0, 1.0]
    pub fn text_match_ratio(&self) -> f32 {
        if self.markers.is_empty() {
            0.0
        } else {
            self.text_matched as f32 / self.markers.len() as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.markers.iter().map(|m| m.timestamp).collect()
    }
}

/// Align a classification sequence with a timing sequence
///
/// Walks both sequences forward together. Where normalized text agrees the pair
/// is recorded as a text match; where it disagrees `classified[i]` is still
/// paired with `timed[i]`. No re-synchronization is attempted, so the output has
/// exactly `min(m, n)` markers and trailing words of the longer side are dropped.
///
/// Only the timing side can violate a contract (non-monotonic or non-finite
/// timestamps); length mismatch is never an error.
pub fn align(
    classified: &[ClassifiedWord],
    timed: &[TimedWord],
) -> Result<Alignment, InvalidInputError> {
    validate_timed_words(timed)?;

    let paired = classified.len().min(timed.len());
    let dropped_classified = classified.len() - paired;
    let dropped_timed = timed.len() - paired;

    if paired == 0 {
        return Ok(Alignment::empty(dropped_classified, dropped_timed));
    }

    if dropped_classified > 0 || dropped_timed > 0 {
        log::debug!(
            "Alignment length mismatch: {} classified vs {} timed, dropping tail",
            classified.len(),
            timed.len()
        );
    }

    let mut markers = Vec::with_capacity(paired);
    let mut text_matched = 0;
    let mut position_fallback = 0;
    let mut beats = BeatCounter::default();

    for (c, t) in classified.iter().zip(timed.iter()) {
        let paired_by = if normalize_word(&c.text) == normalize_word(&t.text) {
            text_matched += 1;
            PairedBy::Text
        } else {
            position_fallback += 1;
            PairedBy::Position
        };

        markers.push(Marker {
            timestamp: t.start,
            role: c.role,
            beat_index: beats.assign(c),
            text: t.text.clone(),
            paired_by,
        });
    }

    Ok(Alignment {
        markers,
        text_matched,
        position_fallback,
        dropped_classified,
        dropped_timed,
    })
}

/// Tracks the current beat so subdivisions can inherit it
#[derive(Debug, Default)]
struct BeatCounter {
    current: Option<u32>,
}

impl BeatCounter {
    fn assign(&mut self, word: &ClassifiedWord) -> Option<u32> {
        match word.role {
            MarkerRole::Beat => {
                let next = word
                    .beat_number
                    .unwrap_or_else(|| self.current.map_or(1, |b| b + 1));
                self.current = Some(next);
                Some(next)
            }
            MarkerRole::And | MarkerRole::Ah => word.beat_number.or(self.current),
            MarkerRole::None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beat(text: &str) -> ClassifiedWord {
        ClassifiedWord::new(text, MarkerRole::Beat)
    }

    fn and() -> ClassifiedWord {
        ClassifiedWord::new("and", MarkerRole::And)
    }

    #[test]
    fn test_basic_alignment() {
        let classified = vec![beat("one"), and(), beat("two")];
        let timed = vec![
            TimedWord::new("one", 0.0, 0.4),
            TimedWord::new("and", 0.4, 0.8),
            TimedWord::new("two", 0.8, 1.2),
        ];

        let alignment = align(&classified, &timed).unwrap();
        assert_eq!(alignment.markers.len(), 3);
        assert_eq!(alignment.text_matched, 3);
        assert_eq!(alignment.markers[0].role, MarkerRole::Beat);
        assert_eq!(alignment.markers[1].role, MarkerRole::And);
        assert!((alignment.markers[1].timestamp - 0.4).abs() < 1e-9);
        assert!((alignment.text_match_ratio() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_length_is_min_of_inputs() {
        let classified = vec![beat("one"), beat("two"), beat("three"), beat("four")];
        let timed = vec![
            TimedWord::new("one", 0.0, 0.2),
            TimedWord::new("two", 0.5, 0.7),
        ];

        let alignment = align(&classified, &timed).unwrap();
        assert_eq!(alignment.markers.len(), 2);
        assert_eq!(alignment.dropped_classified, 2);
        assert_eq!(alignment.dropped_timed, 0);

        let alignment = align(&classified[..1], &timed).unwrap();
        assert_eq!(alignment.markers.len(), 1);
        assert_eq!(alignment.dropped_timed, 1);
    }

    #[test]
    fn test_order_preserved() {
        let classified: Vec<_> = (0..6).map(|i| beat(&i.to_string())).collect();
        let timed: Vec<_> = (0..8)
            .map(|i| TimedWord::new(i.to_string(), i as f64 * 0.5, i as f64 * 0.5 + 0.2))
            .collect();

        let alignment = align(&classified, &timed).unwrap();
        assert_eq!(alignment.markers.len(), 6);
        for (i, marker) in alignment.markers.iter().enumerate() {
            assert_eq!(marker.text, timed[i].text);
            assert!((marker.timestamp - timed[i].start).abs() < 1e-9);
        }
    }

    #[test]
    fn test_positional_fallback_on_mismatch() {
        // Tokenization differs: "a-one" vs "one"
        let classified = vec![beat("a-one"), and(), beat("two")];
        let timed = vec![
            TimedWord::new("one", 0.0, 0.3),
            TimedWord::new("and", 0.4, 0.6),
            TimedWord::new("Two.", 0.8, 1.0),
        ];

        let alignment = align(&classified, &timed).unwrap();
        assert_eq!(alignment.markers.len(), 3);
        assert_eq!(alignment.markers[0].paired_by, PairedBy::Position);
        assert_eq!(alignment.markers[0].role, MarkerRole::Beat);
        assert_eq!(alignment.markers[2].paired_by, PairedBy::Text);
        assert_eq!(alignment.position_fallback, 1);
        assert_eq!(alignment.text_matched, 2);
    }

    #[test]
    fn test_empty_inputs() {
        let timed = vec![TimedWord::new("one", 0.0, 0.3)];
        assert!(align(&[], &timed).unwrap().is_empty());
        assert!(align(&[beat("one")], &[]).unwrap().is_empty());
        assert!(align(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_non_monotonic_timing_rejected() {
        let classified = vec![beat("one"), beat("two")];
        let timed = vec![
            TimedWord::new("one", 1.0, 1.2),
            TimedWord::new("two", 0.5, 0.7),
        ];
        assert!(matches!(
            align(&classified, &timed),
            Err(InvalidInputError::NonMonotonic { .. })
        ));
    }

    #[test]
    fn test_beat_index_running_count() {
        let classified = vec![
            ClassifiedWord::new("okay", MarkerRole::None),
            beat("one"),
            and(),
            beat("two"),
            ClassifiedWord::new("ah", MarkerRole::Ah),
        ];
        let timed: Vec<_> = ["okay", "one", "and", "two", "ah"]
            .iter()
            .enumerate()
            .map(|(i, w)| TimedWord::new(*w, i as f64 * 0.3, i as f64 * 0.3 + 0.1))
            .collect();

        let markers = align(&classified, &timed).unwrap().markers;
        assert_eq!(markers[0].beat_index, None);
        assert_eq!(markers[1].beat_index, Some(1));
        assert_eq!(markers[2].beat_index, Some(1));
        assert_eq!(markers[3].beat_index, Some(2));
        assert_eq!(markers[4].beat_index, Some(2));
    }

    #[test]
    fn test_classifier_beat_numbers_win() {
        let classified = vec![
            ClassifiedWord::with_beat("five", MarkerRole::Beat, 5),
            beat("six"),
            ClassifiedWord::with_beat("one", MarkerRole::Beat, 1),
            and(),
        ];
        let timed: Vec<_> = ["five", "six", "one", "and"]
            .iter()
            .enumerate()
            .map(|(i, w)| TimedWord::new(*w, i as f64 * 0.5, i as f64 * 0.5 + 0.2))
            .collect();

        let markers = align(&classified, &timed).unwrap().markers;
        assert_eq!(markers[0].beat_index, Some(5));
        assert_eq!(markers[1].beat_index, Some(6));
        assert_eq!(markers[2].beat_index, Some(1));
        assert_eq!(markers[3].beat_index, Some(1));
    }
}
