// Analysis pipeline
// Align -> onset tempo + subdivision -> semantic tempo -> meter interpretation

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::explain::TempoDecision;
use super::trace::{Stage, StageSummary, TraceError, TraceWriter};
use crate::config::{ConfigError, FusionConfig};
use crate::groove::{
    classify_subdivision_with_config, estimate_beat_tempo, estimate_onset_tempo_with_config,
    interpret_meter, Meter, NormalizedTempo, OnsetTempo, SemanticEstimate, Subdivision,
    SubdivisionResult, TempoEstimate, TempoSource,
};
use crate::prosody::{compute_signature, CountingSignature, WordFeatures, WordProsody};
use crate::words::{align, Alignment, ClassifiedWord, InvalidInputError, TimedWord};

/// Coarse tempo/meter/subdivision reported by the classifier alongside its labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticHint {
    pub bpm: Option<f64>,

    /// Confidence in `bpm`; a configured default applies when absent
    pub confidence: Option<f32>,

    pub meter: Option<Meter>,
    pub subdivision: Option<Subdivision>,
}

impl SemanticHint {
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        if let Some(bpm) = self.bpm {
            if !bpm.is_finite() || bpm <= 0.0 {
                return Err(InvalidInputError::InvalidHint(format!(
                    "bpm must be finite and positive, got {}",
                    bpm
                )));
            }
        }
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(InvalidInputError::InvalidHint(format!(
                    "confidence must be in [0, 1], got {}",
                    confidence
                )));
            }
        }
        Ok(())
    }
}

/// Everything one analysis produced
#[derive(Debug, Clone, Serialize)]
pub struct RhythmAnalysis {
    /// SHA-256 of the inputs; identical inputs give identical fingerprints
    pub fingerprint: String,

    pub alignment: Alignment,
    pub onset: OnsetTempo,

    /// Classification-side tempo (beat markers, else the hint)
    pub semantic_tempo: Option<TempoEstimate>,

    pub subdivision: SubdivisionResult,

    /// The reconciled answer
    pub tempo: NormalizedTempo,

    /// Present only when per-word prosody was supplied
    pub signature: Option<CountingSignature>,

    pub decision: TempoDecision,

    /// One summary per stage run, in order
    pub stages: Vec<StageSummary>,
}

impl RhythmAnalysis {
    /// Stamp the stage summaries and append them to a trace file
    pub fn write_trace(&self, writer: &TraceWriter) -> Result<(), TraceError> {
        writer.write_stages(&self.fingerprint, &self.stages)
    }
}

/// Runs the fusion pipeline with a fixed, validated configuration
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: FusionConfig,
}

impl Analyzer {
    pub fn new(config: FusionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Analyzer { config })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Analyze one spoken count
    pub fn analyze(
        &self,
        classified: &[ClassifiedWord],
        timed: &[TimedWord],
        hint: &SemanticHint,
    ) -> Result<RhythmAnalysis, InvalidInputError> {
        self.run(classified, timed, hint, None)
    }

    /// Analyze one spoken count and compute its counting signature
    /// `prosody[i]` belongs to `timed[i]`
    pub fn analyze_with_prosody(
        &self,
        classified: &[ClassifiedWord],
        timed: &[TimedWord],
        hint: &SemanticHint,
        prosody: &[WordProsody],
    ) -> Result<RhythmAnalysis, InvalidInputError> {
        self.run(classified, timed, hint, Some(prosody))
    }

    fn run(
        &self,
        classified: &[ClassifiedWord],
        timed: &[TimedWord],
        hint: &SemanticHint,
        prosody: Option<&[WordProsody]>,
    ) -> Result<RhythmAnalysis, InvalidInputError> {
        if classified.is_empty() {
            return Err(InvalidInputError::EmptySequence {
                what: "classified words",
            });
        }
        if timed.is_empty() {
            return Err(InvalidInputError::EmptySequence {
                what: "timed words",
            });
        }
        hint.validate()?;

        let fingerprint = fingerprint_inputs(classified, timed, hint, prosody);
        let mut stages = Vec::new();

        // 1. Align
        let alignment = align(classified, timed)?;
        if alignment.dropped_classified + alignment.dropped_timed > 0 {
            log::warn!(
                "Word sequences differ in length ({} classified, {} timed); \
                 trailing words dropped",
                classified.len(),
                timed.len()
            );
        }
        stages.push(
            StageSummary::new(Stage::Align, format!("{} markers", alignment.markers.len()))
                .with_data(serde_json::json!({
                    "text_matched": alignment.text_matched,
                    "position_fallback": alignment.position_fallback,
                    "dropped_classified": alignment.dropped_classified,
                    "dropped_timed": alignment.dropped_timed,
                })),
        );

        // 2. Onset tempo, classification ignored
        let onset = estimate_onset_tempo_with_config(&alignment.timestamps(), &self.config.onset)?;
        stages.push(
            StageSummary::new(
                Stage::OnsetTempo,
                format!("{:.1} BPM ({})", onset.bpm(), onset.estimate.source.as_str()),
            )
            .with_data(serde_json::json!({
                "confidence": onset.confidence(),
                "sections": onset.sections.len(),
                "windows_analyzed": onset.windows_analyzed,
                "rhythmic_windows": onset.rhythmic_windows,
            })),
        );

        // 3. Subdivision from marker spacing
        let subdivision =
            classify_subdivision_with_config(&alignment.markers, &self.config.subdivision);
        stages.push(
            StageSummary::new(
                Stage::Subdivision,
                format!("{} ({:.2})", subdivision.subdivision, subdivision.confidence),
            )
            .with_data(serde_json::json!({
                "intervals_analyzed": subdivision.intervals_analyzed,
                "majority_fraction": subdivision.majority_fraction,
            })),
        );

        // 4. Classification-side estimate
        let semantic = self.semantic_estimate(&alignment, hint, &subdivision);
        stages.push(StageSummary::new(
            Stage::SemanticTempo,
            match semantic.tempo {
                Some(t) => format!("{:.1} BPM ({})", t.bpm, t.source.as_str()),
                None => "no classification tempo".to_string(),
            },
        ));

        // 5. Reconcile
        let tempo = interpret_meter(&onset.estimate, &semantic, &self.config.normalize);
        stages.push(
            StageSummary::new(
                Stage::Normalize,
                format!("{:.1} BPM {} {}", tempo.bpm(), tempo.meter(), tempo.subdivision()),
            )
            .with_data(serde_json::json!({
                "raw_bpm": tempo.raw_bpm(),
                "multiplier": tempo.multiplier().as_i32(),
                "cross_signal_override": tempo.cross_signal_override(),
                "confidence": tempo.confidence(),
            })),
        );

        // 6. Optional counting signature
        let signature = prosody.map(|prosody| {
            let features: Vec<WordFeatures> = alignment
                .markers
                .iter()
                .zip(timed.iter())
                .zip(prosody.iter())
                .map(|((marker, word), p)| WordFeatures::from_parts(marker, word, p))
                .collect();
            compute_signature(&features)
        });
        if let Some(sig) = &signature {
            stages.push(StageSummary::new(
                Stage::Signature,
                format!("weight {:?}", sig.weight_placement),
            ));
        }

        let decision = TempoDecision::from_analysis(
            &alignment,
            &onset,
            semantic.tempo.as_ref(),
            &subdivision,
            &tempo,
        );

        log::info!(
            "Analysis {}: {:.1} BPM, {}, {} (confidence {:.2})",
            &fingerprint[..12],
            tempo.bpm(),
            tempo.meter(),
            tempo.subdivision(),
            tempo.confidence()
        );

        Ok(RhythmAnalysis {
            fingerprint,
            alignment,
            onset,
            semantic_tempo: semantic.tempo,
            subdivision,
            tempo,
            signature,
            decision,
            stages,
        })
    }

    /// Beat-marker tempo when at least two beats exist, else the hinted BPM.
    /// Measured subdivision wins over the hint once it is trusted.
    fn semantic_estimate(
        &self,
        alignment: &Alignment,
        hint: &SemanticHint,
        measured: &SubdivisionResult,
    ) -> SemanticEstimate {
        let normalize = &self.config.normalize;

        let tempo = estimate_beat_tempo(&alignment.markers).or_else(|| {
            hint.bpm.map(|bpm| {
                TempoEstimate::new(
                    bpm,
                    hint.confidence.unwrap_or(normalize.default_hint_confidence),
                    TempoSource::SemanticHint,
                )
            })
        });

        let subdivision = if measured.confidence >= normalize.subdivision_trust_threshold {
            Some(measured.subdivision)
        } else {
            hint.subdivision.or(Some(measured.subdivision))
        };

        SemanticEstimate {
            tempo,
            meter: hint.meter,
            subdivision,
        }
    }
}

/// SHA-256 over a canonical encoding of the inputs
pub fn fingerprint_inputs(
    classified: &[ClassifiedWord],
    timed: &[TimedWord],
    hint: &SemanticHint,
    prosody: Option<&[WordProsody]>,
) -> String {
    let mut hasher = Sha256::new();

    for word in classified {
        hasher.update(word.text.as_bytes());
        hasher.update([0x1f]);
        hasher.update(word.role.as_str().as_bytes());
        hasher.update(word.beat_number.unwrap_or(0).to_le_bytes());
        hasher.update([0x1e]);
    }
    hasher.update([0x1d]);

    for word in timed {
        hasher.update(word.text.as_bytes());
        hasher.update([0x1f]);
        hasher.update(word.start.to_bits().to_le_bytes());
        hasher.update(word.end.to_bits().to_le_bytes());
        hasher.update([0x1e]);
    }
    hasher.update([0x1d]);

    hasher.update(hint.bpm.map_or(u64::MAX, f64::to_bits).to_le_bytes());
    hasher.update(hint.confidence.map_or(u32::MAX, f32::to_bits).to_le_bytes());
    if let Some(meter) = hint.meter {
        hasher.update([meter.beats_per_measure(), meter.beat_unit()]);
    }
    if let Some(subdivision) = hint.subdivision {
        hasher.update(subdivision.as_str().as_bytes());
    }

    if let Some(prosody) = prosody {
        hasher.update([0x1d]);
        for p in prosody {
            hasher.update(p.pitch_hz.map_or(u64::MAX, f64::to_bits).to_le_bytes());
            hasher.update(p.intensity_db.map_or(u64::MAX, f64::to_bits).to_le_bytes());
        }
    }

    hex::encode(hasher.finalize())
}
