// Analysis stage tracing
// Stage summaries come back on the analysis; callers stamp and persist them as JSONL

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Analysis stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Align,
    OnsetTempo,
    Subdivision,
    SemanticTempo,
    Normalize,
    Signature,
}

impl Stage {
    const ORDER: [Stage; 6] = [
        Stage::Align,
        Stage::OnsetTempo,
        Stage::Subdivision,
        Stage::SemanticTempo,
        Stage::Normalize,
        Stage::Signature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Align => "align",
            Stage::OnsetTempo => "onset_tempo",
            Stage::Subdivision => "subdivision",
            Stage::SemanticTempo => "semantic_tempo",
            Stage::Normalize => "normalize",
            Stage::Signature => "signature",
        }
    }

    /// Fraction of the analysis complete once this stage has run
    pub fn progress(&self) -> f32 {
        let position = Stage::ORDER.iter().position(|s| s == self).unwrap_or(0) + 1;
        position as f32 / Stage::ORDER.len() as f32
    }
}

/// Outcome of one analysis stage, free of wall-clock data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: Stage,

    /// Human-readable summary of the stage outcome
    pub message: String,

    /// Optional structured stage output (counts, BPMs, confidences)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl StageSummary {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        StageSummary {
            stage,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// One trace line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// ISO 8601 wall-clock time the entry was created
    pub timestamp: String,

    /// Input fingerprint of the analysis run
    pub run_id: String,

    pub stage: Stage,

    /// Progress [0.0, 1.0]
    pub progress: f32,

    /// Human-readable summary of the stage outcome
    pub message: String,

    /// Optional structured stage output (counts, BPMs, confidences)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Create an entry stamped with the current time
    pub fn new(run_id: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: run_id.into(),
            stage,
            progress: stage.progress(),
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Stamp a stage summary with the current time
    pub fn from_summary(run_id: impl Into<String>, summary: &StageSummary) -> Self {
        TraceEntry {
            data: summary.data.clone(),
            ..TraceEntry::new(run_id, summary.stage, summary.message.clone())
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Append-only JSONL trace file
#[derive(Debug, Clone)]
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        TraceWriter {
            file_path: file_path.into(),
        }
    }

    /// Append one entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        self.write_batch(std::slice::from_ref(entry))
    }

    /// Append entries in order with a single open and flush
    pub fn write_batch(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for entry in entries {
            let json_line = entry.to_json_line()?;
            file.write_all(json_line.as_bytes())?;
        }

        file.flush()?;
        Ok(())
    }

    /// Stamp and append the stage summaries of one run
    pub fn write_stages(&self, run_id: &str, stages: &[StageSummary]) -> Result<(), TraceError> {
        let entries: Vec<TraceEntry> = stages
            .iter()
            .map(|summary| TraceEntry::from_summary(run_id, summary))
            .collect();
        self.write_batch(&entries)
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file, skipping blank lines
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}
