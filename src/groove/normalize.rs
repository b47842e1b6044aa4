// Tempo Normalization - snap BPM into the beat-level band and interpret meter
// Reconciles the onset tempo with the classification-side estimate into one record

use serde::{Deserialize, Serialize};

use super::grid::{Meter, Subdivision};
use super::tempo::{TempoEstimate, TempoSource};

/// Configuration for normalization and meter interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Lower edge of the beat-level band (inclusive)
    pub band_low: f64,

    /// Upper edge of the beat-level band (inclusive)
    pub band_high: f64,

    /// Onset confidence must exceed this to be preferred over the semantic tempo
    pub onset_confidence_threshold: f32,

    /// Onset/semantic BPM ratio window that signals triple meter
    pub override_ratio_low: f64,
    pub override_ratio_high: f64,

    /// Confidence multiplier applied when the cross-signal override fires
    pub override_penalty: f32,

    /// Confidence multiplier applied when no candidate lands in the band
    pub out_of_band_penalty: f32,

    /// Measured subdivision replaces the hinted one at or above this confidence
    pub subdivision_trust_threshold: f32,

    /// Confidence given to a hinted BPM that carries none of its own
    pub default_hint_confidence: f32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            band_low: 70.0,
            band_high: 140.0,
            onset_confidence_threshold: 0.3,
            override_ratio_low: 2.7,
            override_ratio_high: 3.3,
            override_penalty: 0.75,
            out_of_band_penalty: 0.5,
            subdivision_trust_threshold: 0.6,
            default_hint_confidence: 0.5,
        }
    }
}

impl NormalizeConfig {
    pub fn in_band(&self, bpm: f64) -> bool {
        bpm >= self.band_low && bpm <= self.band_high
    }
}

/// How the raw pulse relates to the normalized beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplier {
    /// Raw pulse already at beat level
    One,
    /// Raw pulse at measure level, doubled
    Double,
    /// Raw pulse at measure level of a triple meter, tripled
    Triple,
    /// Raw pulse at duple subdivision level, halved
    Half,
    /// Raw pulse at triplet subdivision level, divided by three
    Third,
}

impl Multiplier {
    /// Search order; earlier entries win when several land in band
    const CANDIDATES: [Multiplier; 4] = [
        Multiplier::Double,
        Multiplier::Triple,
        Multiplier::Half,
        Multiplier::Third,
    ];

    /// Signed form: 1, 2, 3, -2, -3
    pub fn as_i32(&self) -> i32 {
        match self {
            Multiplier::One => 1,
            Multiplier::Double => 2,
            Multiplier::Triple => 3,
            Multiplier::Half => -2,
            Multiplier::Third => -3,
        }
    }

    pub fn apply(&self, bpm: f64) -> f64 {
        match self {
            Multiplier::One => bpm,
            Multiplier::Double => bpm * 2.0,
            Multiplier::Triple => bpm * 3.0,
            Multiplier::Half => bpm / 2.0,
            Multiplier::Third => bpm / 3.0,
        }
    }
}

/// Result of snapping one BPM into the band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normalization {
    pub bpm: f64,
    pub multiplier: Multiplier,
    /// False when no factor reached the band; bpm is then the raw value
    pub in_band: bool,
}

/// Snap a raw BPM into the configured band by one factor of 2 or 3
///
/// In-band input is returned unchanged. Otherwise doubling and tripling are
/// tried before halving and thirding, so 2 wins over 3 in each direction.
/// For inputs where both /2 and /3 land in band (roughly 210-280 BPM) this
/// picks /2 even when the source was counted in triplets.
pub fn normalize_tempo(bpm: f64, config: &NormalizeConfig) -> Normalization {
    if config.in_band(bpm) {
        return Normalization {
            bpm,
            multiplier: Multiplier::One,
            in_band: true,
        };
    }

    if bpm.is_finite() && bpm > 0.0 {
        for multiplier in Multiplier::CANDIDATES {
            let candidate = multiplier.apply(bpm);
            if config.in_band(candidate) {
                return Normalization {
                    bpm: candidate,
                    multiplier,
                    in_band: true,
                };
            }
        }
    }

    Normalization {
        bpm,
        multiplier: Multiplier::One,
        in_band: false,
    }
}

/// Coarse tempo/meter/subdivision from the classification side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticEstimate {
    pub tempo: Option<TempoEstimate>,
    pub meter: Option<Meter>,
    pub subdivision: Option<Subdivision>,
}

/// The single reconciled tempo answer
///
/// Only [`interpret_meter`] builds one, so bpm, meter and subdivision always
/// come from the same multiplier decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTempo {
    bpm: f64,
    meter: Meter,
    subdivision: Subdivision,
    confidence: f32,
    raw_bpm: f64,
    multiplier: Multiplier,
    cross_signal_override: bool,
    in_band: bool,
    source: TempoSource,
}

impl NormalizedTempo {
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn meter(&self) -> Meter {
        self.meter
    }

    pub fn subdivision(&self) -> Subdivision {
        self.subdivision
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// BPM before normalization
    pub fn raw_bpm(&self) -> f64 {
        self.raw_bpm
    }

    pub fn multiplier(&self) -> Multiplier {
        self.multiplier
    }

    /// True when the onset/semantic ratio forced the triple interpretation
    /// The raw BPM was not actually tripled in that case
    pub fn cross_signal_override(&self) -> bool {
        self.cross_signal_override
    }

    pub fn in_band(&self) -> bool {
        self.in_band
    }

    /// Which estimate supplied the raw BPM
    pub fn source(&self) -> TempoSource {
        self.source
    }
}

/// Reconcile the onset tempo with the semantic estimate
///
/// Algorithm:
/// 1. Pick the raw BPM: onset when its confidence exceeds the threshold,
///    else the semantic tempo, else the onset anyway
/// 2. Normalize it into the band
/// 3. If it was already in band and the onset runs ~3x the semantic tempo,
///    the semantic side counted measures of a triple meter: force 3/4
/// 4. Derive meter and subdivision from the multiplier
pub fn interpret_meter(
    onset: &TempoEstimate,
    semantic: &SemanticEstimate,
    config: &NormalizeConfig,
) -> NormalizedTempo {
    let (selected, onset_selected) = match semantic.tempo {
        Some(sem) if onset.confidence <= config.onset_confidence_threshold => (sem, false),
        _ => (*onset, true),
    };

    let mut confidence = match semantic.tempo {
        Some(sem) => onset.confidence.min(sem.confidence),
        None => onset.confidence,
    };

    let normalization = normalize_tempo(selected.bpm, config);
    let mut multiplier = normalization.multiplier;
    let mut cross_signal_override = false;

    if !normalization.in_band {
        log::warn!(
            "No x2/x3 factor brings {:.1} BPM into [{}, {}]",
            selected.bpm,
            config.band_low,
            config.band_high
        );
        confidence *= config.out_of_band_penalty;
    } else if multiplier == Multiplier::One && onset_selected {
        if let Some(ratio) = semantic.tempo.and_then(|sem| bpm_ratio(onset.bpm, sem.bpm)) {
            if ratio >= config.override_ratio_low && ratio <= config.override_ratio_high {
                log::warn!(
                    "Onset tempo {:.1} is {:.2}x the semantic tempo; reading as triple meter",
                    onset.bpm,
                    ratio
                );
                multiplier = Multiplier::Triple;
                cross_signal_override = true;
                confidence *= config.override_penalty;
            }
        }
    }

    let semantic_meter = semantic.meter.unwrap_or_default();
    let (meter, subdivision) = match multiplier {
        Multiplier::One => (
            semantic_meter,
            semantic.subdivision.unwrap_or(Subdivision::None),
        ),
        Multiplier::Double => (Meter::FOUR_FOUR, Subdivision::None),
        Multiplier::Triple => (Meter::THREE_FOUR, Subdivision::None),
        Multiplier::Half => (semantic_meter, Subdivision::Duple),
        Multiplier::Third => (semantic_meter, Subdivision::Triplet),
    };

    log::debug!(
        "Normalized {:.1} -> {:.1} BPM (x{}), {} {}",
        selected.bpm,
        normalization.bpm,
        multiplier.as_i32(),
        meter,
        subdivision
    );

    NormalizedTempo {
        bpm: normalization.bpm,
        meter,
        subdivision,
        confidence: confidence.clamp(0.0, 1.0),
        raw_bpm: selected.bpm,
        multiplier,
        cross_signal_override,
        in_band: normalization.in_band,
        source: selected.source,
    }
}

fn bpm_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 && denominator.is_finite() && numerator.is_finite() {
        Some(numerator / denominator)
    } else {
        None
    }
}
