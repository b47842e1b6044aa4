// Prosody - emphasis analysis over classified, timed words
// Pitch and intensity come from an external extractor; this module only aggregates

pub mod signature;

pub use signature::{
    category_stats, compute_signature, CategoryStats, CountingSignature, WeightPlacement,
    WordFeatures, WordProsody,
};
