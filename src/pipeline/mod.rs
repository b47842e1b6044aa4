// Analysis pipeline module
// Runs alignment, tempo, subdivision and meter interpretation end to end

pub mod analyze;
pub mod explain;
pub mod trace;

pub use analyze::{fingerprint_inputs, Analyzer, RhythmAnalysis, SemanticHint};
pub use explain::TempoDecision;
pub use trace::{read_trace_file, Stage, StageSummary, TraceEntry, TraceError, TraceWriter};
