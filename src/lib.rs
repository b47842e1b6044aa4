// Rhythm Fusion - Tempo, meter and subdivision from spoken counts
// Module declarations

pub mod config;
pub mod groove;
pub mod pipeline;
pub mod prosody;
pub mod words;

pub use config::{ConfigError, FusionConfig};
pub use groove::{
    interpret_meter, normalize_tempo, Meter, Multiplier, NormalizedTempo, Subdivision,
    SubdivisionResult, TempoEstimate, TempoSource,
};
pub use pipeline::{Analyzer, RhythmAnalysis, SemanticHint, TempoDecision};
pub use words::{align, ClassifiedWord, InvalidInputError, Marker, MarkerRole, TimedWord};
