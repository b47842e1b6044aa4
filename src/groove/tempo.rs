// Tempo estimates - BPM claims with provenance
// Also derives the classification-side tempo from beat-marker inter-onset intervals

use serde::{Deserialize, Serialize};

use super::stats;
use crate::words::Marker;

/// Where a tempo estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoSource {
    /// Regular runs of word onsets, classification ignored
    OnsetRegularity,

    /// Global median onset interval, used when no run is regular
    OnsetMedian,

    /// Intervals between classified beat markers
    BeatMarkers,

    /// Coarse BPM reported directly by the classifier
    SemanticHint,

    /// Nothing measurable; configured default
    Fallback,
}

impl TempoSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TempoSource::OnsetRegularity => "onset_regularity",
            TempoSource::OnsetMedian => "onset_median",
            TempoSource::BeatMarkers => "beat_markers",
            TempoSource::SemanticHint => "semantic_hint",
            TempoSource::Fallback => "fallback",
        }
    }
}

/// One BPM claim with confidence and provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Estimated beats per minute (> 0)
    pub bpm: f64,

    /// Confidence in the estimate [0.0, 1.0]
    pub confidence: f32,

    /// Which signal produced it
    pub source: TempoSource,
}

impl TempoEstimate {
    pub fn new(bpm: f64, confidence: f32, source: TempoSource) -> Self {
        TempoEstimate {
            bpm,
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }
}

/// Compute inter-onset intervals (time between consecutive onsets)
/// Zero-length intervals from duplicate timestamps are skipped
pub fn compute_iois(onsets: &[f64]) -> Vec<f64> {
    let mut iois = Vec::with_capacity(onsets.len().saturating_sub(1));

    for i in 1..onsets.len() {
        let interval = onsets[i] - onsets[i - 1];
        if interval > 0.0 {
            iois.push(interval);
        }
    }

    iois
}

/// BPM for a beat interval in seconds
pub fn interval_to_bpm(interval_secs: f64) -> Option<f64> {
    if interval_secs > 0.0 && interval_secs.is_finite() {
        Some(60.0 / interval_secs)
    } else {
        None
    }
}

/// Tempo from the timestamps of classified beat markers
///
/// Uses the median interval so one late count does not drag the result.
/// Confidence is `1 - std/median` of the intervals, floored at zero.
/// Returns None with fewer than two beats.
pub fn estimate_beat_tempo(markers: &[Marker]) -> Option<TempoEstimate> {
    let beat_times: Vec<f64> = markers
        .iter()
        .filter(|m| m.is_beat())
        .map(|m| m.timestamp)
        .collect();

    if beat_times.len() < 2 {
        return None;
    }

    let iois = compute_iois(&beat_times);
    let median_interval = stats::median(&iois)?;
    let bpm = interval_to_bpm(median_interval)?;

    let spread = stats::std_dev(&iois).unwrap_or(0.0);
    let confidence = (1.0 - spread / median_interval).max(0.0) as f32;

    Some(TempoEstimate::new(bpm, confidence, TempoSource::BeatMarkers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::words::{MarkerRole, PairedBy};

    fn marker(role: MarkerRole, timestamp: f64) -> Marker {
        Marker {
            timestamp,
            role,
            beat_index: None,
            text: String::new(),
            paired_by: PairedBy::Text,
        }
    }

    #[test]
    fn test_compute_iois() {
        let iois = compute_iois(&[0.0, 0.5, 1.0, 1.0, 1.5]);
        assert_eq!(iois.len(), 3);
        assert!(iois.iter().all(|i| (i - 0.5).abs() < 1e-9));
    }

    #[test]
    fn test_beat_tempo_steady_120() {
        let markers: Vec<_> = (0..8)
            .map(|i| marker(MarkerRole::Beat, i as f64 * 0.5))
            .collect();

        let estimate = estimate_beat_tempo(&markers).unwrap();
        assert!((estimate.bpm - 120.0).abs() < 1e-9);
        assert!(estimate.confidence > 0.95);
        assert_eq!(estimate.source, TempoSource::BeatMarkers);
    }

    #[test]
    fn test_beat_tempo_ignores_subdivisions() {
        let markers = vec![
            marker(MarkerRole::Beat, 0.0),
            marker(MarkerRole::And, 0.4),
            marker(MarkerRole::Beat, 0.8),
            marker(MarkerRole::And, 1.2),
            marker(MarkerRole::Beat, 1.6),
        ];

        let estimate = estimate_beat_tempo(&markers).unwrap();
        assert!((estimate.bpm - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_beat_tempo_outlier_robust() {
        // 120 BPM with one doubled interval
        let times = [0.0, 0.5, 1.0, 2.0, 2.5, 3.0, 3.5];
        let markers: Vec<_> = times.iter().map(|&t| marker(MarkerRole::Beat, t)).collect();

        let estimate = estimate_beat_tempo(&markers).unwrap();
        assert!((estimate.bpm - 120.0).abs() < 1e-9);
        assert!(estimate.confidence < 0.95);
    }

    #[test]
    fn test_beat_tempo_insufficient() {
        assert!(estimate_beat_tempo(&[]).is_none());
        assert!(estimate_beat_tempo(&[marker(MarkerRole::Beat, 0.0)]).is_none());
        let markers = vec![marker(MarkerRole::Beat, 0.0), marker(MarkerRole::And, 0.3)];
        assert!(estimate_beat_tempo(&markers).is_none());
    }

    #[test]
    fn test_confidence_clamped() {
        let estimate = TempoEstimate::new(100.0, 1.7, TempoSource::SemanticHint);
        assert_eq!(estimate.confidence, 1.0);
    }
}
