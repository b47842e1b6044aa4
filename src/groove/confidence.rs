// Onset tempo confidence
// Four independent [0, 1] factors combined by an injectable weighted average

use serde::{Deserialize, Serialize};
use super::onset::RhythmicSection;
use super::stats;

/// Relative weight of each confidence factor
/// Only ratios matter; the combination divides by the weight sum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    /// Fraction of the utterance covered by rhythmic sections
    pub coverage: f32,

    /// Inverse of the mean window CV
    pub consistency: f32,

    /// Dominance of the longest section (few long sections beat many fragments)
    pub regularity: f32,

    /// Duration share of sections agreeing with the aggregate BPM
    pub histogram_agreement: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        ConfidenceWeights {
            coverage: 0.30,
            consistency: 0.30,
            regularity: 0.15,
            histogram_agreement: 0.25,
        }
    }
}

impl ConfidenceWeights {
    pub fn total(&self) -> f32 {
        self.coverage + self.consistency + self.regularity + self.histogram_agreement
    }

    /// Weighted average of the factors, clamped to [0, 1]
    pub fn combine(&self, factors: &ConfidenceFactors) -> f32 {
        let total = self.total();
        if total <= 0.0 || !total.is_finite() {
            return 0.0;
        }

        let sum = self.coverage * factors.coverage
            + self.consistency * factors.consistency
            + self.regularity * factors.regularity
            + self.histogram_agreement * factors.histogram_agreement;

        (sum / total).clamp(0.0, 1.0)
    }
}

/// Per-factor breakdown, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ConfidenceFactors {
    pub coverage: f32,
    pub consistency: f32,
    pub regularity: f32,
    pub histogram_agreement: f32,
}

impl ConfidenceFactors {
    pub fn compute(
        sections: &[RhythmicSection],
        total_duration: f64,
        cv_threshold: f64,
        bin_width_bpm: f64,
    ) -> Self {
        ConfidenceFactors {
            coverage: coverage(sections, total_duration),
            consistency: consistency(sections, cv_threshold),
            regularity: regularity(sections),
            histogram_agreement: histogram_agreement(sections, bin_width_bpm),
        }
    }
}

/// Rhythmic duration over total utterance duration
pub fn coverage(sections: &[RhythmicSection], total_duration: f64) -> f32 {
    if sections.is_empty() || total_duration <= 0.0 {
        return 0.0;
    }

    let rhythmic: f64 = sections.iter().map(|s| s.duration()).sum();
    (rhythmic / total_duration).clamp(0.0, 1.0) as f32
}

/// `1 - mean_cv / cv_threshold`, where mean_cv averages the sections' window CVs
/// A perfectly even count scores 1; a count just under the threshold scores ~0
pub fn consistency(sections: &[RhythmicSection], cv_threshold: f64) -> f32 {
    if sections.is_empty() || cv_threshold <= 0.0 {
        return 0.0;
    }

    let mean_cv = sections.iter().map(|s| s.mean_cv).sum::<f64>() / sections.len() as f64;
    (1.0 - mean_cv / cv_threshold).clamp(0.0, 1.0) as f32
}

/// Longest section duration over total rhythmic duration
pub fn regularity(sections: &[RhythmicSection]) -> f32 {
    let total: f64 = sections.iter().map(|s| s.duration()).sum();
    if total <= 0.0 {
        return 0.0;
    }

    let longest = sections.iter().map(|s| s.duration()).fold(0.0, f64::max);
    (longest / total).clamp(0.0, 1.0) as f32
}

/// Duration share of sections within half a bin of the duration-weighted median BPM
pub fn histogram_agreement(sections: &[RhythmicSection], bin_width_bpm: f64) -> f32 {
    if sections.is_empty() || !(bin_width_bpm > 0.0) {
        return 0.0;
    }

    let weighted: Vec<(f64, f64)> = sections.iter().map(|s| (s.bpm, s.duration())).collect();
    let Some(reference) = stats::weighted_median(&weighted) else {
        return 0.0;
    };

    let total: f64 = sections.iter().map(|s| s.duration()).sum();
    let agreeing: f64 = sections
        .iter()
        .filter(|s| (s.bpm - reference).abs() <= bin_width_bpm / 2.0)
        .map(|s| s.duration())
        .sum();

    (agreeing / total).clamp(0.0, 1.0) as f32
}
