// Groove Engine - Tempo, meter, and subdivision
// Onset regularity, beat-marker spacing, and band normalization

pub mod confidence;
pub mod grid;
pub mod normalize;
pub mod onset;
pub mod stats;
pub mod subdivision;
pub mod tempo;

pub use confidence::{ConfidenceFactors, ConfidenceWeights};
pub use grid::{Meter, Subdivision};
pub use normalize::{
    interpret_meter, normalize_tempo, Multiplier, NormalizeConfig, NormalizedTempo,
    Normalization, SemanticEstimate,
};
pub use onset::{
    estimate_onset_tempo, estimate_onset_tempo_with_config, OnsetTempo, OnsetTempoConfig,
    RhythmicSection,
};
pub use subdivision::{
    classify_subdivision, classify_subdivision_with_config, SubdivisionConfig, SubdivisionResult,
};
pub use tempo::{compute_iois, estimate_beat_tempo, TempoEstimate, TempoSource};
