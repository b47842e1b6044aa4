// Subdivision Classification - none / duple / triplet from marker spacing
// Measures where "and"/"ah" markers fall inside each beat-to-beat interval

use serde::{Deserialize, Serialize};

use super::grid::Subdivision;
use super::stats;
use super::tempo::compute_iois;
use crate::words::Marker;

/// Configuration for subdivision classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubdivisionConfig {
    /// Allowed distance between a measured offset ratio and its expected ratio
    pub ratio_tolerance: f64,

    /// Beat gaps longer than this multiple of the median beat interval are
    /// phrase breaks and are not analyzed
    pub max_interval_ratio: f64,

    /// Measure subdivisions after the last beat against the median beat interval
    pub include_trailing: bool,
}

impl Default for SubdivisionConfig {
    fn default() -> Self {
        SubdivisionConfig {
            ratio_tolerance: 0.15,
            max_interval_ratio: 2.5,
            include_trailing: true,
        }
    }
}

/// Subdivision classification with confidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubdivisionResult {
    /// Majority pattern
    pub subdivision: Subdivision,

    /// Confidence [0.0, 1.0]: majority share times offset tightness
    pub confidence: f32,

    /// 2 for duple, 3 for triplet, None when beats are not subdivided
    pub subdivisions_per_beat: Option<u32>,

    /// Mean offset ratio per subdivision slot across majority intervals
    pub avg_ratios: Vec<f64>,

    /// Beat intervals that were measured
    pub intervals_analyzed: usize,

    /// Share of measured intervals showing the majority pattern
    pub majority_fraction: f32,
}

impl SubdivisionResult {
    fn unmeasured() -> Self {
        SubdivisionResult {
            subdivision: Subdivision::None,
            confidence: 0.0,
            subdivisions_per_beat: None,
            avg_ratios: Vec::new(),
            intervals_analyzed: 0,
            majority_fraction: 0.0,
        }
    }
}

/// One beat-to-beat interval and the subdivision offsets inside it
#[derive(Debug, Clone)]
struct BeatInterval {
    ratios: Vec<f64>,
}

/// Classify subdivision with default configuration
pub fn classify_subdivision(markers: &[Marker]) -> SubdivisionResult {
    classify_subdivision_with_config(markers, &SubdivisionConfig::default())
}

/// Classify subdivision from a marker sequence
///
/// Algorithm:
/// 1. Use beat markers as interval boundaries
/// 2. For each interval, take the offset ratio of every "and"/"ah" inside it
/// 3. Label the interval none (0 markers), duple (1 near 0.5) or triplet
///    (2 near 1/3 and 2/3); anything else is noise
/// 4. The majority label wins; noise intervals only lower the confidence
pub fn classify_subdivision_with_config(
    markers: &[Marker],
    config: &SubdivisionConfig,
) -> SubdivisionResult {
    let intervals = collect_intervals(markers, config);
    if intervals.is_empty() {
        return SubdivisionResult::unmeasured();
    }

    let labels: Vec<Option<Subdivision>> = intervals
        .iter()
        .map(|interval| label_interval(&interval.ratios, config.ratio_tolerance))
        .collect();

    let total_markers: usize = intervals.iter().map(|i| i.ratios.len()).sum();
    let avg_count = total_markers as f64 / intervals.len() as f64;

    let Some((majority, count)) = majority_label(&labels, avg_count) else {
        // Every interval was noise; report the nearest pattern by marker count
        log::debug!(
            "All {} beat intervals irregular, avg {:.2} markers per beat",
            intervals.len(),
            avg_count
        );
        let subdivision = nearest_by_count(avg_count);
        return SubdivisionResult {
            subdivision,
            confidence: 0.0,
            subdivisions_per_beat: per_beat(subdivision),
            avg_ratios: Vec::new(),
            intervals_analyzed: intervals.len(),
            majority_fraction: 0.0,
        };
    };

    let majority_ratios: Vec<&Vec<f64>> = intervals
        .iter()
        .zip(labels.iter())
        .filter(|(_, label)| **label == Some(majority))
        .map(|(interval, _)| &interval.ratios)
        .collect();

    let avg_ratios = slot_means(&majority_ratios, majority.markers_between_beats());
    let tightness = tightness(&majority_ratios, majority, config.ratio_tolerance);
    let majority_fraction = count as f32 / intervals.len() as f32;

    SubdivisionResult {
        subdivision: majority,
        confidence: (majority_fraction * tightness).clamp(0.0, 1.0),
        subdivisions_per_beat: per_beat(majority),
        avg_ratios,
        intervals_analyzed: intervals.len(),
        majority_fraction,
    }
}

/// Split markers into beat-to-beat intervals with subdivision offset ratios
fn collect_intervals(markers: &[Marker], config: &SubdivisionConfig) -> Vec<BeatInterval> {
    let beat_times: Vec<f64> = markers
        .iter()
        .filter(|m| m.is_beat())
        .map(|m| m.timestamp)
        .collect();

    let sub_times: Vec<f64> = markers
        .iter()
        .filter(|m| m.role.is_subdivision())
        .map(|m| m.timestamp)
        .collect();

    let median_beat = stats::median(&compute_iois(&beat_times));

    let mut bounds: Vec<(f64, f64)> = beat_times
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .filter(|(start, end)| {
            let length = end - start;
            length > 0.0
                && median_beat.map_or(true, |m| length <= m * config.max_interval_ratio)
        })
        .collect();

    // Subdivisions after the last beat, measured against the typical beat length
    if config.include_trailing {
        if let (Some(&last), Some(m)) = (beat_times.last(), median_beat) {
            let trailing_end = last + m;
            if sub_times.iter().any(|&t| t > last && t < trailing_end) {
                bounds.push((last, trailing_end));
            }
        }
    }

    bounds
        .into_iter()
        .map(|(start, end)| {
            let length = end - start;
            let ratios = sub_times
                .iter()
                .filter(|&&t| t > start && t < end)
                .map(|&t| (t - start) / length)
                .collect();
            BeatInterval { ratios }
        })
        .collect()
}

/// Label one interval, or None when it matches no pattern
fn label_interval(ratios: &[f64], tolerance: f64) -> Option<Subdivision> {
    [Subdivision::None, Subdivision::Duple, Subdivision::Triplet]
        .into_iter()
        .find(|candidate| {
            let expected = candidate.expected_ratios();
            expected.len() == ratios.len()
                && ratios
                    .iter()
                    .zip(expected.iter())
                    .all(|(r, e)| (r - e).abs() <= tolerance)
        })
}

/// Most frequent label; ties go to the label closest to the average marker count,
/// then to the simpler pattern
fn majority_label(labels: &[Option<Subdivision>], avg_count: f64) -> Option<(Subdivision, usize)> {
    let mut best: Option<(Subdivision, usize)> = None;

    for candidate in [Subdivision::None, Subdivision::Duple, Subdivision::Triplet] {
        let count = labels.iter().filter(|l| **l == Some(candidate)).count();
        if count == 0 {
            continue;
        }

        best = match best {
            None => Some((candidate, count)),
            Some((current, current_count)) => {
                let closer = (candidate.markers_between_beats() as f64 - avg_count).abs()
                    < (current.markers_between_beats() as f64 - avg_count).abs();
                if count > current_count || (count == current_count && closer) {
                    Some((candidate, count))
                } else {
                    Some((current, current_count))
                }
            }
        };
    }

    best
}

fn nearest_by_count(avg_count: f64) -> Subdivision {
    if avg_count < 0.5 {
        Subdivision::None
    } else if avg_count < 1.5 {
        Subdivision::Duple
    } else {
        Subdivision::Triplet
    }
}

fn per_beat(subdivision: Subdivision) -> Option<u32> {
    match subdivision {
        Subdivision::None => None,
        other => Some(other.subdivisions_per_beat()),
    }
}

/// Mean ratio for each subdivision slot
fn slot_means(ratios: &[&Vec<f64>], slots: usize) -> Vec<f64> {
    (0..slots)
        .filter_map(|slot| {
            let values: Vec<f64> = ratios.iter().filter_map(|r| r.get(slot).copied()).collect();
            stats::mean(&values)
        })
        .collect()
}

/// 1 when every offset sits exactly on its expected ratio, 0 at the tolerance edge
fn tightness(ratios: &[&Vec<f64>], pattern: Subdivision, tolerance: f64) -> f32 {
    let expected = pattern.expected_ratios();
    if expected.is_empty() {
        return 1.0;
    }
    if tolerance <= 0.0 {
        return 0.0;
    }

    let deviations: Vec<f64> = ratios
        .iter()
        .flat_map(|r| r.iter().zip(expected.iter()).map(|(a, e)| (a - e).abs()))
        .collect();

    match stats::mean(&deviations) {
        Some(mean_dev) => (1.0 - mean_dev / tolerance).clamp(0.0, 1.0) as f32,
        None => 0.0,
    }
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
            text: role.as_str().to_string(),
            paired_by: PairedBy::Text,
        }
    }

    fn beat(t: f64) -> Marker {
        marker(MarkerRole::Beat, t)
    }

    fn and(t: f64) -> Marker {
        marker(MarkerRole::And, t)
    }

    fn ah(t: f64) -> Marker {
        marker(MarkerRole::Ah, t)
    }

    #[test]
    fn test_duple_subdivision() {
        let markers = vec![
            beat(0.0),
            and(0.25),
            beat(0.5),
            and(0.75),
            beat(1.0),
            and(1.25),
            beat(1.5),
            and(1.75),
        ];

        let result = classify_subdivision(&markers);
        assert_eq!(result.subdivision, Subdivision::Duple);
        assert_eq!(result.subdivisions_per_beat, Some(2));
        assert!(result.confidence > 0.9);
        // Three full intervals plus the trailing one
        assert_eq!(result.intervals_analyzed, 4);
        assert!((result.avg_ratios[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_triplet_subdivision() {
        let markers = vec![
            beat(0.0),
            and(0.17),
            ah(0.33),
            beat(0.5),
            and(0.67),
            ah(0.83),
            beat(1.0),
            and(1.17),
            ah(1.33),
            beat(1.5),
            and(1.67),
            ah(1.83),
        ];

        let result = classify_subdivision(&markers);
        assert_eq!(result.subdivision, Subdivision::Triplet);
        assert_eq!(result.subdivisions_per_beat, Some(3));
        assert!(result.confidence > 0.9);
        assert_eq!(result.avg_ratios.len(), 2);
    }

    #[test]
    fn test_no_subdivisions() {
        let markers = vec![beat(0.0), beat(0.5), beat(1.0), beat(1.5)];

        let result = classify_subdivision(&markers);
        assert_eq!(result.subdivision, Subdivision::None);
        assert_eq!(result.subdivisions_per_beat, None);
        assert_eq!(result.intervals_analyzed, 3);
        assert!((result.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_and_single_beat() {
        let result = classify_subdivision(&[]);
        assert_eq!(result.subdivision, Subdivision::None);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.intervals_analyzed, 0);

        let result = classify_subdivision(&[beat(0.0), and(0.3)]);
        assert_eq!(result.subdivision, Subdivision::None);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_disagreeing_interval_is_noise() {
        let markers = vec![
            beat(0.0),
            and(0.25),
            beat(0.5),
            and(0.75),
            beat(1.0),
            and(1.17),
            ah(1.33),
            beat(1.5),
            and(1.75),
            beat(2.0),
            and(2.25),
            beat(2.5),
        ];

        let result = classify_subdivision(&markers);
        assert_eq!(result.subdivision, Subdivision::Duple);
        assert!((result.majority_fraction - 0.8).abs() < 1e-6);
        assert!(result.confidence < 0.9);
        assert!(result.confidence > 0.7);
    }

    #[test]
    fn test_off_center_and_is_noise_with_zero_confidence() {
        // Heavy swing: "and" at 80% of the beat
        let markers = vec![
            beat(0.0),
            and(0.4),
            beat(0.5),
            and(0.9),
            beat(1.0),
            and(1.4),
            beat(1.5),
        ];

        let result = classify_subdivision(&markers);
        assert_eq!(result.subdivision, Subdivision::Duple);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.majority_fraction, 0.0);
    }

    #[test]
    fn test_phrase_break_skipped() {
        let markers = vec![
            beat(0.0),
            and(0.25),
            beat(0.5),
            and(0.75),
            beat(1.0),
            and(1.25),
            // Long pause before the next phrase
            beat(6.0),
            and(6.25),
            beat(6.5),
            and(6.75),
            beat(7.0),
        ];

        let result = classify_subdivision(&markers);
        assert_eq!(result.subdivision, Subdivision::Duple);
        // 1.0 -> 6.0 is dropped
        assert_eq!(result.intervals_analyzed, 4);
        assert!((result.majority_fraction - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_rhythmic_words_ignored() {
        let markers = vec![
            beat(0.0),
            marker(MarkerRole::None, 0.2),
            beat(0.5),
            marker(MarkerRole::None, 0.6),
            beat(1.0),
        ];

        let result = classify_subdivision(&markers);
        assert_eq!(result.subdivision, Subdivision::None);
        assert!((result.confidence - 1.0).abs() < 1e-6);
    }
}
