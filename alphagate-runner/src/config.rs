//! Gate configuration.
//!
//! Every tunable the layers consult lives here, with defaults matching the
//! production gate. Loadable from TOML; unknown keys are rejected so a typo
//! in a config file fails loudly instead of silently using a default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the validation gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GateConfig {
    /// Wall-clock limit for sandboxed evaluation, in seconds.
    pub timeout_secs: u64,
    /// Evaluator step budget per sandboxed run.
    pub step_budget: u64,
    /// Similarity ratio at or above which a candidate is a duplicate.
    pub novelty_threshold: f64,
    /// Number of non-overlapping walk-forward windows.
    pub n_windows: usize,
    /// In-sample fraction of each walk-forward window.
    pub is_fraction: f64,
    /// OOS Sharpe must reach this fraction of IS Sharpe.
    pub generalization_floor: f64,
    /// A regime Sharpe below this is a catastrophic failure.
    pub catastrophic_sharpe: f64,
    /// Maximum tolerated drawdown: full-sample, per-window, and per-regime.
    pub drawdown_limit: f64,
    /// Rationales shorter than this are rejected.
    pub min_rationale_chars: usize,
    /// Rationales longer than this draw an advisory warning.
    pub advisory_rationale_chars: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            step_budget: 5_000_000,
            novelty_threshold: 0.8,
            n_windows: 4,
            is_fraction: 0.7,
            generalization_floor: 0.7,
            catastrophic_sharpe: -1.0,
            drawdown_limit: 0.25,
            min_rationale_chars: 20,
            advisory_rationale_chars: 200,
        }
    }
}

impl GateConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: GateConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the layers cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        if self.step_budget == 0 {
            return Err(ConfigError::Invalid("step_budget must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.novelty_threshold) {
            return Err(ConfigError::Invalid(
                "novelty_threshold must be in [0, 1]".into(),
            ));
        }
        if self.n_windows == 0 {
            return Err(ConfigError::Invalid("n_windows must be positive".into()));
        }
        if !(0.0 < self.is_fraction && self.is_fraction < 1.0) {
            return Err(ConfigError::Invalid(
                "is_fraction must be strictly between 0 and 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.generalization_floor) {
            return Err(ConfigError::Invalid(
                "generalization_floor must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.drawdown_limit) {
            return Err(ConfigError::Invalid(
                "drawdown_limit must be in [0, 1]".into(),
            ));
        }
        if self.min_rationale_chars > self.advisory_rationale_chars {
            return Err(ConfigError::Invalid(
                "min_rationale_chars exceeds advisory_rationale_chars".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_valid() {
        GateConfig::default().validate().unwrap();
    }

    #[test]
    fn default_values() {
        let config = GateConfig::default();
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.n_windows, 4);
        assert!((config.novelty_threshold - 0.8).abs() < 1e-12);
        assert!((config.is_fraction - 0.7).abs() < 1e-12);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: GateConfig = toml::from_str("novelty_threshold = 0.9\n").unwrap();
        assert!((config.novelty_threshold - 0.9).abs() < 1e-12);
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result: Result<GateConfig, _> = toml::from_str("novelty_treshold = 0.9\n");
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut config = GateConfig::default();
        config.novelty_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.is_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.n_windows = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs = 30\nstep_budget = 100000").unwrap();
        let config = GateConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.step_budget, 100_000);
    }
}
