// Word input module
// Timing-only and role-only word sequences, validation, and their alignment into markers

pub mod align;
pub mod types;
pub mod validate;

pub use align::{align, Alignment};
pub use types::{normalize_word, ClassifiedWord, Marker, MarkerRole, PairedBy, TimedWord};
pub use validate::{validate_onsets, validate_timed_words, InvalidInputError};
