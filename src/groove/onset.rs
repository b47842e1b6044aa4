// Onset Tempo Estimation - BPM from word onset regularity
// Sliding-window coefficient of variation finds regular runs; classification is ignored

use serde::{Deserialize, Serialize};

use super::confidence::{ConfidenceFactors, ConfidenceWeights};
use super::stats;
use super::tempo::{compute_iois, interval_to_bpm, TempoEstimate, TempoSource};
use crate::words::{validate_onsets, InvalidInputError};

/// Configuration for onset tempo estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetTempoConfig {
    /// Sliding window length in seconds
    pub window_secs: f64,

    /// Advance between windows in seconds
    pub step_secs: f64,

    /// A window is rhythmic iff the CV of its intervals is below this
    pub cv_threshold: f64,

    /// Windows with fewer onsets are never rhythmic
    pub min_onsets_per_window: usize,

    /// Shorter intervals are sub-word artifacts and are ignored
    pub min_ioi_secs: f64,

    /// Longer intervals are pauses, not pulse, when measuring a section
    pub max_ioi_secs: f64,

    /// BPM reported when no interval can be measured at all
    pub fallback_bpm: f64,

    /// Width of the coarse BPM bins used for histogram agreement
    pub histogram_bin_bpm: f64,

    /// Weighting of the confidence factors
    pub weights: ConfidenceWeights,
}

impl Default for OnsetTempoConfig {
    fn default() -> Self {
        OnsetTempoConfig {
            window_secs: 3.0,
            step_secs: 0.5,
            cv_threshold: 0.4,
            min_onsets_per_window: 3,
            min_ioi_secs: 0.15,
            max_ioi_secs: 2.0,
            fallback_bpm: 120.0,
            histogram_bin_bpm: 8.0,
            weights: ConfidenceWeights::default(),
        }
    }
}

/// A contiguous span of regular onsets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RhythmicSection {
    /// First onset in the section (seconds)
    pub start: f64,

    /// Last onset in the section (seconds), always > start
    pub end: f64,

    /// Median inter-onset interval within the section (seconds)
    pub median_interval: f64,

    /// 60 / median_interval
    pub bpm: f64,

    /// Mean CV of the rhythmic windows merged into this section
    pub mean_cv: f64,

    /// Onsets inside the section
    pub onset_count: usize,
}

impl RhythmicSection {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Onset-derived tempo with the evidence behind it
#[derive(Debug, Clone, Serialize)]
pub struct OnsetTempo {
    /// The tempo claim
    pub estimate: TempoEstimate,

    /// Merged regular runs, in time order
    pub sections: Vec<RhythmicSection>,

    /// Confidence breakdown (all zero when no section was found)
    pub factors: ConfidenceFactors,

    /// Last onset minus first onset (seconds)
    pub total_duration: f64,

    /// Windows evaluated
    pub windows_analyzed: usize,

    /// Windows judged rhythmic
    pub rhythmic_windows: usize,
}

impl OnsetTempo {
    pub fn bpm(&self) -> f64 {
        self.estimate.bpm
    }

    pub fn confidence(&self) -> f32 {
        self.estimate.confidence
    }

    pub fn rhythmic_coverage(&self) -> f32 {
        self.factors.coverage
    }
}

/// A rhythmic window before merging
#[derive(Debug, Clone, Copy)]
struct RhythmicWindow {
    start: f64,
    end: f64,
    cv: f64,
}

/// Estimate tempo from onset timestamps
pub fn estimate_onset_tempo(onsets: &[f64]) -> Result<OnsetTempo, InvalidInputError> {
    estimate_onset_tempo_with_config(onsets, &OnsetTempoConfig::default())
}

/// Estimate tempo from onset timestamps with custom configuration
///
/// Algorithm:
/// 1. Slide a fixed window over the onsets in fixed steps
/// 2. Mark a window rhythmic when it has enough onsets and interval CV < threshold
/// 3. Merge overlapping or touching rhythmic windows into sections
/// 4. Per section, BPM = 60 / median interval
/// 5. Aggregate sections by duration-weighted median BPM
/// 6. Confidence = weighted average of the factors in `confidence`
///
/// With no rhythmic window the global median interval is used and confidence is 0.
/// Only an empty, non-finite or non-monotonic sequence is an error.
pub fn estimate_onset_tempo_with_config(
    onsets: &[f64],
    config: &OnsetTempoConfig,
) -> Result<OnsetTempo, InvalidInputError> {
    if onsets.is_empty() {
        return Err(InvalidInputError::EmptySequence { what: "onsets" });
    }
    validate_onsets(onsets)?;

    let total_duration = onsets[onsets.len() - 1] - onsets[0];

    let (windows, windows_analyzed) = scan_windows(onsets, config);
    let rhythmic_windows = windows.len();
    let sections = merge_windows(&windows, onsets, config);

    log::debug!(
        "Onset scan: {} onsets, {} windows, {} rhythmic, {} sections",
        onsets.len(),
        windows_analyzed,
        rhythmic_windows,
        sections.len()
    );

    let weighted: Vec<(f64, f64)> = sections.iter().map(|s| (s.bpm, s.duration())).collect();

    match stats::weighted_median(&weighted) {
        Some(bpm) => {
            let factors = ConfidenceFactors::compute(
                &sections,
                total_duration,
                config.cv_threshold,
                config.histogram_bin_bpm,
            );
            let confidence = config.weights.combine(&factors);

            Ok(OnsetTempo {
                estimate: TempoEstimate::new(bpm, confidence, TempoSource::OnsetRegularity),
                sections,
                factors,
                total_duration,
                windows_analyzed,
                rhythmic_windows,
            })
        }
        None => {
            log::warn!(
                "No rhythmic window among {} onsets; falling back to global median interval",
                onsets.len()
            );

            Ok(OnsetTempo {
                estimate: global_median_estimate(onsets, config),
                sections: Vec::new(),
                factors: ConfidenceFactors::default(),
                total_duration,
                windows_analyzed,
                rhythmic_windows,
            })
        }
    }
}

/// Slide windows over the onsets and keep the rhythmic ones
/// Returns the rhythmic windows and the number of windows evaluated
fn scan_windows(onsets: &[f64], config: &OnsetTempoConfig) -> (Vec<RhythmicWindow>, usize) {
    let mut rhythmic = Vec::new();

    // Also rejects NaN, which would never satisfy the loop exit
    if !(config.window_secs > 0.0) || !(config.step_secs > 0.0) {
        return (rhythmic, 0);
    }

    let first = onsets[0];
    let last = onsets[onsets.len() - 1];
    let mut analyzed = 0;
    let mut k: usize = 0;

    loop {
        // Index-based start avoids drift from repeated addition
        let start = first + k as f64 * config.step_secs;
        let end = start + config.window_secs;

        // The first window is always evaluated, even for short utterances
        if k > 0 && end > last + config.step_secs {
            break;
        }

        analyzed += 1;
        if let Some(cv) = window_cv(onsets_in(onsets, start, end), config) {
            if cv < config.cv_threshold {
                rhythmic.push(RhythmicWindow { start, end, cv });
            }
        }

        k += 1;
    }

    (rhythmic, analyzed)
}

/// Onsets in the half-open range [start, end); input is sorted
fn onsets_in(onsets: &[f64], start: f64, end: f64) -> &[f64] {
    let lo = onsets.partition_point(|&t| t < start);
    let hi = onsets.partition_point(|&t| t < end);
    &onsets[lo..hi.max(lo)]
}

/// CV of a window's intervals, or None when the window cannot be judged
fn window_cv(window: &[f64], config: &OnsetTempoConfig) -> Option<f64> {
    if window.len() < config.min_onsets_per_window.max(3) {
        return None;
    }

    let iois: Vec<f64> = compute_iois(window)
        .into_iter()
        .filter(|&ioi| ioi >= config.min_ioi_secs)
        .collect();

    if iois.len() < 2 {
        return None;
    }

    stats::coefficient_of_variation(&iois)
}

/// Merge overlapping or touching windows into sections, then measure each section
fn merge_windows(
    windows: &[RhythmicWindow],
    onsets: &[f64],
    config: &OnsetTempoConfig,
) -> Vec<RhythmicSection> {
    let mut spans: Vec<(f64, f64, Vec<f64>)> = Vec::new();

    for window in windows {
        match spans.last_mut() {
            Some((_, end, cvs)) if window.start <= *end => {
                *end = end.max(window.end);
                cvs.push(window.cv);
            }
            _ => spans.push((window.start, window.end, vec![window.cv])),
        }
    }

    spans
        .into_iter()
        .filter_map(|(start, end, cvs)| {
            measure_section(onsets_in(onsets, start, end), &cvs, config)
        })
        .collect()
}

/// Build a section from the onsets inside a merged span
fn measure_section(
    section_onsets: &[f64],
    cvs: &[f64],
    config: &OnsetTempoConfig,
) -> Option<RhythmicSection> {
    let start = *section_onsets.first()?;
    let end = *section_onsets.last()?;
    if end <= start {
        return None;
    }

    let iois: Vec<f64> = compute_iois(section_onsets)
        .into_iter()
        .filter(|&ioi| ioi >= config.min_ioi_secs && ioi <= config.max_ioi_secs)
        .collect();

    let median_interval = stats::median(&iois)?;
    let bpm = interval_to_bpm(median_interval)?;

    Some(RhythmicSection {
        start,
        end,
        median_interval,
        bpm,
        mean_cv: stats::mean(cvs).unwrap_or(0.0),
        onset_count: section_onsets.len(),
    })
}

/// Last-resort estimate from the median of all intervals, confidence 0
fn global_median_estimate(onsets: &[f64], config: &OnsetTempoConfig) -> TempoEstimate {
    let all = compute_iois(onsets);
    let musical: Vec<f64> = all
        .iter()
        .copied()
        .filter(|&ioi| ioi >= config.min_ioi_secs && ioi <= config.max_ioi_secs)
        .collect();

    let pool = if musical.is_empty() { &all } else { &musical };

    match stats::median(pool).and_then(interval_to_bpm) {
        Some(bpm) => TempoEstimate::new(bpm, 0.0, TempoSource::OnsetMedian),
        None => TempoEstimate::new(config.fallback_bpm, 0.0, TempoSource::Fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady(count: usize, interval: f64, offset: f64) -> Vec<f64> {
        (0..count).map(|i| offset + i as f64 * interval).collect()
    }

    #[test]
    fn test_regular_counting_120bpm() {
        let onsets = steady(12, 60.0 / 120.0, 0.0);
        let result = estimate_onset_tempo(&onsets).unwrap();

        assert!((result.bpm() - 120.0).abs() / 120.0 < 0.02);
        assert!(result.confidence() > 0.8);
        assert_eq!(result.estimate.source, TempoSource::OnsetRegularity);
        assert_eq!(result.sections.len(), 1);
        assert!((result.rhythmic_coverage() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_step_names_80bpm() {
        let onsets = steady(8, 60.0 / 80.0, 0.0);
        let result = estimate_onset_tempo(&onsets).unwrap();

        assert!((result.bpm() - 80.0).abs() < 1.0);
        assert!(result.confidence() > 0.8);
    }

    #[test]
    fn test_explanation_then_counting() {
        let mut onsets = vec![0.0, 0.25, 0.55, 0.9, 1.8, 2.0, 3.0];
        onsets.extend(steady(8, 0.5, 5.0));

        let result = estimate_onset_tempo(&onsets).unwrap();
        assert!((result.bpm() - 120.0).abs() < 1.0);
        assert_eq!(result.sections.len(), 1);
        assert!((result.sections[0].start - 5.0).abs() < 1e-9);
        assert!(result.rhythmic_coverage() < 1.0);
        assert!(result.confidence() > 0.0);
    }

    #[test]
    fn test_two_rhythmic_sections() {
        let mut onsets = steady(8, 0.5, 0.0);
        onsets.extend(steady(8, 0.5, 10.0));

        let result = estimate_onset_tempo(&onsets).unwrap();
        assert!((result.bpm() - 120.0).abs() < 1.0);
        assert_eq!(result.sections.len(), 2);
        assert!((result.factors.regularity - 0.5).abs() < 1e-6);
        assert!((result.factors.histogram_agreement - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_duration_weighted_aggregate() {
        // Long phrase at 120 BPM, short phrase at 80 BPM; the long one wins
        let mut onsets = steady(12, 0.5, 0.0);
        onsets.extend(steady(5, 0.75, 12.0));

        let result = estimate_onset_tempo(&onsets).unwrap();
        assert_eq!(result.sections.len(), 2);
        assert!((result.bpm() - 120.0).abs() < 1.0);
        assert!(result.factors.histogram_agreement < 1.0);
    }

    #[test]
    fn test_irregular_speech_has_zero_confidence() {
        let onsets = vec![0.0, 0.3, 1.5, 1.7, 3.0, 3.5, 5.0, 5.4, 7.0];
        let result = estimate_onset_tempo(&onsets).unwrap();

        assert_eq!(result.confidence(), 0.0);
        assert!(result.sections.is_empty());
        assert_eq!(result.rhythmic_windows, 0);
        assert!(result.windows_analyzed > 0);
        assert_eq!(result.estimate.source, TempoSource::OnsetMedian);
        assert!(result.bpm() > 0.0);
    }

    #[test]
    fn test_high_cv_everywhere_degrades_not_fails() {
        // Alternating short/long gaps: CV = 0.6 in every window
        let mut onsets = vec![0.0];
        for i in 0..20 {
            let gap = if i % 2 == 0 { 0.2 } else { 0.8 };
            let next = onsets[onsets.len() - 1] + gap;
            onsets.push(next);
        }

        let result = estimate_onset_tempo(&onsets).unwrap();
        assert_eq!(result.confidence(), 0.0);
        assert!(result.bpm().is_finite() && result.bpm() > 0.0);
    }

    #[test]
    fn test_outlier_word_in_rhythmic_section() {
        let onsets = vec![0.0, 0.5, 1.0, 1.7, 2.0, 2.5, 3.0, 3.5];
        let result = estimate_onset_tempo(&onsets).unwrap();
        assert!((result.bpm() - 120.0).abs() < 15.0);
        assert!(result.confidence() > 0.0);
    }

    #[test]
    fn test_short_utterance_gets_one_window() {
        let onsets = vec![0.0, 0.5, 1.0];
        let result = estimate_onset_tempo(&onsets).unwrap();
        assert_eq!(result.windows_analyzed, 1);
        assert!((result.bpm() - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_onset_falls_back() {
        let result = estimate_onset_tempo(&[1.0]).unwrap();
        assert_eq!(result.confidence(), 0.0);
        assert_eq!(result.estimate.source, TempoSource::Fallback);
        assert!((result.bpm() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_onsets_rejected() {
        assert_eq!(
            estimate_onset_tempo(&[]).unwrap_err(),
            InvalidInputError::EmptySequence { what: "onsets" }
        );
        assert!(matches!(
            estimate_onset_tempo(&[0.0, 1.0, 0.5]),
            Err(InvalidInputError::NonMonotonic { .. })
        ));
    }

    #[test]
    fn test_injected_weights() {
        let mut onsets = vec![0.0, 0.25, 0.55, 0.9, 1.8, 2.0, 3.0];
        onsets.extend(steady(8, 0.5, 5.0));

        let config = OnsetTempoConfig {
            weights: ConfidenceWeights {
                coverage: 1.0,
                consistency: 0.0,
                regularity: 0.0,
                histogram_agreement: 0.0,
            },
            ..Default::default()
        };
        let result = estimate_onset_tempo_with_config(&onsets, &config).unwrap();
        assert!((result.confidence() - result.factors.coverage).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_window_config_returns() {
        let onsets = steady(10, 0.5, 0.0);
        for step in [f64::NAN, 0.0, -0.5] {
            let config = OnsetTempoConfig {
                step_secs: step,
                ..Default::default()
            };
            let result = estimate_onset_tempo_with_config(&onsets, &config).unwrap();
            assert_eq!(result.windows_analyzed, 0);
            assert_eq!(result.confidence(), 0.0);
        }

        let config = OnsetTempoConfig {
            window_secs: f64::NAN,
            ..Default::default()
        };
        let result = estimate_onset_tempo_with_config(&onsets, &config).unwrap();
        assert_eq!(result.windows_analyzed, 0);
    }

    #[test]
    fn test_deterministic() {
        let onsets = vec![0.0, 0.52, 0.98, 1.51, 2.03, 2.49, 3.0, 3.55, 4.01];
        let a = estimate_onset_tempo(&onsets).unwrap();
        let b = estimate_onset_tempo(&onsets).unwrap();
        assert_eq!(a.bpm().to_bits(), b.bpm().to_bits());
        assert_eq!(a.confidence().to_bits(), b.confidence().to_bits());
    }
}
