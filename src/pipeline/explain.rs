// Explainability
// Summarizes how the final tempo, meter and subdivision were reached

use serde::Serialize;

use crate::groove::{
    Meter, NormalizedTempo, OnsetTempo, Subdivision, SubdivisionResult, TempoEstimate, TempoSource,
};
use crate::words::Alignment;

/// Decision record for one analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempoDecision {
    // --- Inputs ---
    pub markers: usize,
    pub text_match_ratio: f32,
    pub onset_bpm: f64,
    pub onset_confidence: f32,
    pub semantic_bpm: Option<f64>,

    // --- Outcome ---
    pub source: TempoSource,
    pub raw_bpm: f64,
    pub bpm: f64,
    pub multiplier: i32,
    pub cross_signal_override: bool,
    pub in_band: bool,
    pub meter: Meter,
    pub subdivision: Subdivision,
    pub confidence: f32,

    // --- Explainability ---
    pub reasoning: String,
}

impl TempoDecision {
    pub fn from_analysis(
        alignment: &Alignment,
        onset: &OnsetTempo,
        semantic_tempo: Option<&TempoEstimate>,
        subdivision: &SubdivisionResult,
        tempo: &NormalizedTempo,
    ) -> Self {
        let mut reason_parts = Vec::new();

        // 1. Alignment
        if alignment.dropped_classified + alignment.dropped_timed > 0
            || alignment.position_fallback > 0
        {
            reason_parts.push(format!(
                "Aligned {} words ({}% by text, {} dropped).",
                alignment.markers.len(),
                (alignment.text_match_ratio() * 100.0) as u32,
                alignment.dropped_classified + alignment.dropped_timed
            ));
        } else {
            reason_parts.push(format!("Aligned {} words.", alignment.markers.len()));
        }

        // 2. Onset regularity
        if onset.sections.is_empty() {
            reason_parts.push(format!(
                "No regular onset run; onset tempo {:.1} BPM is unreliable.",
                onset.bpm()
            ));
        } else {
            reason_parts.push(format!(
                "Onsets regular over {}% of the utterance at {:.1} BPM ({}% confidence).",
                (onset.rhythmic_coverage() * 100.0) as u32,
                onset.bpm(),
                (onset.confidence() * 100.0) as u32
            ));
        }

        // 3. Source selection
        let source_desc = match tempo.source() {
            TempoSource::OnsetRegularity | TempoSource::OnsetMedian | TempoSource::Fallback => {
                "onset tempo"
            }
            TempoSource::BeatMarkers => "beat-marker tempo",
            TempoSource::SemanticHint => "hinted tempo",
        };
        match semantic_tempo {
            Some(sem) => reason_parts.push(format!(
                "Used {} over classification tempo {:.1} BPM.",
                source_desc, sem.bpm
            )),
            None => reason_parts.push(format!("Used {}; no classification tempo.", source_desc)),
        }

        // 4. Normalization
        if !tempo.in_band() {
            reason_parts.push(format!(
                "{:.1} BPM could not be brought into the beat band.",
                tempo.raw_bpm()
            ));
        } else if tempo.cross_signal_override() {
            reason_parts.push(
                "Onset tempo is about three times the classification tempo, so read as 3/4."
                    .to_string(),
            );
        } else if tempo.multiplier().as_i32() != 1 {
            reason_parts.push(format!(
                "Scaled {:.1} to {:.1} BPM (multiplier {}).",
                tempo.raw_bpm(),
                tempo.bpm(),
                tempo.multiplier().as_i32()
            ));
        }

        // 5. Subdivision
        if subdivision.intervals_analyzed > 0 {
            reason_parts.push(format!(
                "Marker spacing suggests {} ({}% confidence over {} beats).",
                subdivision.subdivision,
                (subdivision.confidence * 100.0) as u32,
                subdivision.intervals_analyzed
            ));
        }

        reason_parts.push(format!(
            "Result: {:.1} BPM, {}, {}.",
            tempo.bpm(),
            tempo.meter(),
            tempo.subdivision()
        ));

        TempoDecision {
            markers: alignment.markers.len(),
            text_match_ratio: alignment.text_match_ratio(),
            onset_bpm: onset.bpm(),
            onset_confidence: onset.confidence(),
            semantic_bpm: semantic_tempo.map(|t| t.bpm),
            source: tempo.source(),
            raw_bpm: tempo.raw_bpm(),
            bpm: tempo.bpm(),
            multiplier: tempo.multiplier().as_i32(),
            cross_signal_override: tempo.cross_signal_override(),
            in_band: tempo.in_band(),
            meter: tempo.meter(),
            subdivision: tempo.subdivision(),
            confidence: tempo.confidence(),
            reasoning: reason_parts.join(" "),
        }
    }
}
