// Fusion configuration
// Every tunable threshold in one serde-loadable record

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::groove::{NormalizeConfig, OnsetTempoConfig, SubdivisionConfig};

/// Errors that can occur loading or checking a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a full analysis run
/// Missing sections and fields take their defaults when loaded from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub onset: OnsetTempoConfig,
    pub subdivision: SubdivisionConfig,
    pub normalize: NormalizeConfig,
}

impl FusionConfig {
    /// Serialize to pretty JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Deserialize from JSON bytes and validate
    pub fn from_json_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        let config: FusionConfig = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make an estimator loop forever or divide by zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let onset = &self.onset;
        if !(onset.window_secs > 0.0) {
            return Err(invalid("onset.window_secs must be positive"));
        }
        if !(onset.step_secs > 0.0) {
            return Err(invalid("onset.step_secs must be positive"));
        }
        if !(onset.cv_threshold > 0.0) {
            return Err(invalid("onset.cv_threshold must be positive"));
        }
        if onset.min_onsets_per_window < 2 {
            return Err(invalid("onset.min_onsets_per_window must be at least 2"));
        }
        if !(onset.min_ioi_secs >= 0.0 && onset.min_ioi_secs < onset.max_ioi_secs) {
            return Err(invalid("onset IOI range is empty"));
        }
        if !(onset.fallback_bpm > 0.0) {
            return Err(invalid("onset.fallback_bpm must be positive"));
        }
        if !(onset.histogram_bin_bpm > 0.0) {
            return Err(invalid("onset.histogram_bin_bpm must be positive"));
        }

        let weights = &onset.weights;
        let all = [
            weights.coverage,
            weights.consistency,
            weights.regularity,
            weights.histogram_agreement,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(invalid("confidence weights must be finite and non-negative"));
        }
        if weights.total() <= 0.0 {
            return Err(invalid("confidence weights must not all be zero"));
        }

        if !(self.subdivision.ratio_tolerance > 0.0 && self.subdivision.ratio_tolerance < 0.5) {
            return Err(invalid("subdivision.ratio_tolerance must be in (0, 0.5)"));
        }
        if !(self.subdivision.max_interval_ratio >= 1.0) {
            return Err(invalid("subdivision.max_interval_ratio must be at least 1"));
        }

        let normalize = &self.normalize;
        if !(normalize.band_low > 0.0 && normalize.band_low < normalize.band_high) {
            return Err(invalid("normalize band is empty"));
        }
        if !(normalize.override_ratio_low <= normalize.override_ratio_high) {
            return Err(invalid("normalize override ratio window is inverted"));
        }
        let fractions = [
            normalize.onset_confidence_threshold,
            normalize.override_penalty,
            normalize.out_of_band_penalty,
            normalize.subdivision_trust_threshold,
            normalize.default_hint_confidence,
        ];
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(invalid("normalize thresholds and penalties must be in [0, 1]"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}
