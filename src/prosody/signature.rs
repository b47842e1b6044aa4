// Counting signature - where the emphasis falls in a spoken count
// Aggregates per-word pitch and intensity by rhythmic role

use serde::{Deserialize, Serialize};

use crate::groove::stats;
use crate::words::{Marker, MarkerRole, TimedWord};

/// Beat-vs-"and" intensity difference below which weight is considered even (dB)
const EVEN_WEIGHT_DB: f64 = 1.0;

/// Pitch and intensity for one word, from an external prosody extractor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WordProsody {
    /// Mean fundamental frequency in Hz; None when unvoiced
    pub pitch_hz: Option<f64>,

    /// Mean intensity in dB
    pub intensity_db: Option<f64>,
}

/// Prosodic features of one classified, timed word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordFeatures {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub role: MarkerRole,
    pub pitch_hz: Option<f64>,
    pub intensity_db: Option<f64>,
}

impl WordFeatures {
    pub fn new(text: impl Into<String>, start: f64, end: f64, role: MarkerRole) -> Self {
        WordFeatures {
            text: text.into(),
            start,
            end,
            role,
            pitch_hz: None,
            intensity_db: None,
        }
    }

    /// Attach pitch; non-finite or non-positive values count as unvoiced
    pub fn with_pitch(mut self, pitch_hz: f64) -> Self {
        self.pitch_hz = Some(pitch_hz).filter(|p| p.is_finite() && *p > 0.0);
        self
    }

    pub fn with_intensity(mut self, intensity_db: f64) -> Self {
        self.intensity_db = Some(intensity_db).filter(|i| i.is_finite());
        self
    }

    /// Join a marker with its timed word and extracted prosody
    pub fn from_parts(marker: &Marker, timed: &TimedWord, prosody: &WordProsody) -> Self {
        let mut features =
            WordFeatures::new(marker.text.clone(), timed.start, timed.end, marker.role);
        if let Some(pitch) = prosody.pitch_hz {
            features = features.with_pitch(pitch);
        }
        if let Some(intensity) = prosody.intensity_db {
            features = features.with_intensity(intensity);
        }
        features
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Aggregate statistics for one role
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub role: MarkerRole,
    pub count: usize,
    /// Mean over voiced words only
    pub avg_pitch_hz: Option<f64>,
    pub avg_intensity_db: Option<f64>,
    pub avg_duration: f64,
}

/// Where a count puts its weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPlacement {
    /// Numbers are stressed
    OnBeat,

    /// "and" or "ah" is stressed (anacrusis feel)
    AfterBeat,

    /// No category stands out
    Even,
}

/// The complete prosodic signature of a counting sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountingSignature {
    pub beat_stats: Option<CategoryStats>,
    pub and_stats: Option<CategoryStats>,
    pub ah_stats: Option<CategoryStats>,

    /// Positive when beats are louder than "and"s
    pub beat_vs_and_intensity_db: Option<f64>,

    /// Below 1.0 when beats are lower-pitched than "and"s
    pub beat_vs_and_pitch_ratio: Option<f64>,

    pub beat_vs_ah_intensity_db: Option<f64>,
    pub beat_vs_ah_pitch_ratio: Option<f64>,

    /// Role with the highest mean intensity
    pub loudest: Option<MarkerRole>,

    pub weight_placement: Option<WeightPlacement>,
}

/// Compute statistics for one role, None when no word has it
pub fn category_stats(features: &[WordFeatures], role: MarkerRole) -> Option<CategoryStats> {
    let matching: Vec<&WordFeatures> = features.iter().filter(|f| f.role == role).collect();
    if matching.is_empty() {
        return None;
    }

    let pitches: Vec<f64> = matching.iter().filter_map(|f| f.pitch_hz).collect();
    let intensities: Vec<f64> = matching.iter().filter_map(|f| f.intensity_db).collect();
    let durations: Vec<f64> = matching.iter().map(|f| f.duration()).collect();

    Some(CategoryStats {
        role,
        count: matching.len(),
        avg_pitch_hz: stats::mean(&pitches),
        avg_intensity_db: stats::mean(&intensities),
        avg_duration: stats::mean(&durations).unwrap_or(0.0),
    })
}

/// Compute the counting signature from per-word features
pub fn compute_signature(features: &[WordFeatures]) -> CountingSignature {
    let beat_stats = category_stats(features, MarkerRole::Beat);
    let and_stats = category_stats(features, MarkerRole::And);
    let ah_stats = category_stats(features, MarkerRole::Ah);

    let beat_vs_and_intensity_db = intensity_difference(&beat_stats, &and_stats);
    let beat_vs_ah_intensity_db = intensity_difference(&beat_stats, &ah_stats);

    // Ties go to the earlier role
    let loudest = [&beat_stats, &and_stats, &ah_stats]
        .into_iter()
        .flatten()
        .filter_map(|s| s.avg_intensity_db.map(|db| (s.role, db)))
        .fold(None, |best: Option<(MarkerRole, f64)>, (role, db)| match best {
            Some((_, best_db)) if best_db >= db => best,
            _ => Some((role, db)),
        })
        .map(|(role, _)| role);

    let weight_placement = match (beat_vs_and_intensity_db, loudest) {
        (Some(diff), _) if diff.abs() < EVEN_WEIGHT_DB => Some(WeightPlacement::Even),
        (_, Some(MarkerRole::Beat)) => Some(WeightPlacement::OnBeat),
        (_, Some(MarkerRole::And | MarkerRole::Ah)) => Some(WeightPlacement::AfterBeat),
        _ => None,
    };

    CountingSignature {
        beat_vs_and_pitch_ratio: pitch_ratio(&beat_stats, &and_stats),
        beat_vs_ah_pitch_ratio: pitch_ratio(&beat_stats, &ah_stats),
        beat_vs_and_intensity_db,
        beat_vs_ah_intensity_db,
        loudest,
        weight_placement,
        beat_stats,
        and_stats,
        ah_stats,
    }
}

fn intensity_difference(a: &Option<CategoryStats>, b: &Option<CategoryStats>) -> Option<f64> {
    let a = a.as_ref()?.avg_intensity_db?;
    let b = b.as_ref()?.avg_intensity_db?;
    Some(a - b)
}

fn pitch_ratio(a: &Option<CategoryStats>, b: &Option<CategoryStats>) -> Option<f64> {
    let a = a.as_ref()?.avg_pitch_hz?;
    let b = b.as_ref()?.avg_pitch_hz?;
    if b > 0.0 {
        Some(a / b)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(role: MarkerRole, start: f64, pitch: f64, intensity: f64) -> WordFeatures {
        WordFeatures::new(role.as_str(), start, start + 0.2, role)
            .with_pitch(pitch)
            .with_intensity(intensity)
    }

    #[test]
    fn test_category_stats() {
        let features = vec![
            word(MarkerRole::Beat, 0.0, 200.0, 70.0),
            word(MarkerRole::And, 0.25, 220.0, 62.0),
            word(MarkerRole::Beat, 0.5, 180.0, 72.0),
        ];

        let beats = category_stats(&features, MarkerRole::Beat).unwrap();
        assert_eq!(beats.count, 2);
        assert!((beats.avg_pitch_hz.unwrap() - 190.0).abs() < 1e-9);
        assert!((beats.avg_intensity_db.unwrap() - 71.0).abs() < 1e-9);
        assert!((beats.avg_duration - 0.2).abs() < 1e-9);

        assert!(category_stats(&features, MarkerRole::Ah).is_none());
    }

    #[test]
    fn test_unvoiced_words_excluded_from_pitch() {
        let features = vec![
            word(MarkerRole::Beat, 0.0, 200.0, 70.0),
            WordFeatures::new("two", 0.5, 0.7, MarkerRole::Beat)
                .with_pitch(f64::NAN)
                .with_intensity(68.0),
        ];

        let beats = category_stats(&features, MarkerRole::Beat).unwrap();
        assert_eq!(beats.count, 2);
        assert_eq!(beats.avg_pitch_hz, Some(200.0));
        assert!((beats.avg_intensity_db.unwrap() - 69.0).abs() < 1e-9);
    }

    #[test]
    fn test_on_beat_signature() {
        let features = vec![
            word(MarkerRole::Beat, 0.0, 180.0, 72.0),
            word(MarkerRole::And, 0.25, 200.0, 65.0),
            word(MarkerRole::Beat, 0.5, 180.0, 72.0),
            word(MarkerRole::And, 0.75, 200.0, 65.0),
        ];

        let signature = compute_signature(&features);
        assert!((signature.beat_vs_and_intensity_db.unwrap() - 7.0).abs() < 1e-9);
        assert!((signature.beat_vs_and_pitch_ratio.unwrap() - 0.9).abs() < 1e-9);
        assert_eq!(signature.loudest, Some(MarkerRole::Beat));
        assert_eq!(signature.weight_placement, Some(WeightPlacement::OnBeat));
        assert!(signature.beat_vs_ah_intensity_db.is_none());
    }

    #[test]
    fn test_after_beat_signature() {
        let features = vec![
            word(MarkerRole::Beat, 0.0, 180.0, 64.0),
            word(MarkerRole::And, 0.17, 190.0, 66.0),
            word(MarkerRole::Ah, 0.33, 210.0, 71.0),
        ];

        let signature = compute_signature(&features);
        assert_eq!(signature.loudest, Some(MarkerRole::Ah));
        assert_eq!(signature.weight_placement, Some(WeightPlacement::AfterBeat));
        assert!((signature.beat_vs_ah_intensity_db.unwrap() + 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_even_signature() {
        let features = vec![
            word(MarkerRole::Beat, 0.0, 200.0, 70.0),
            word(MarkerRole::And, 0.25, 200.0, 70.5),
        ];

        let signature = compute_signature(&features);
        assert_eq!(signature.weight_placement, Some(WeightPlacement::Even));
    }

    #[test]
    fn test_empty_signature() {
        let signature = compute_signature(&[]);
        assert!(signature.beat_stats.is_none());
        assert!(signature.loudest.is_none());
        assert!(signature.weight_placement.is_none());
    }

    #[test]
    fn test_from_parts() {
        let marker = Marker {
            timestamp: 1.0,
            role: MarkerRole::Beat,
            beat_index: Some(1),
            text: "One".to_string(),
            paired_by: crate::words::PairedBy::Text,
        };
        let timed = TimedWord::new("One", 1.0, 1.3);
        let prosody = WordProsody {
            pitch_hz: Some(0.0),
            intensity_db: Some(66.0),
        };

        let features = WordFeatures::from_parts(&marker, &timed, &prosody);
        assert_eq!(features.pitch_hz, None);
        assert_eq!(features.intensity_db, Some(66.0));
        assert!((features.duration() - 0.3).abs() < 1e-9);
    }
}
