//! Violation taxonomy — one variant per terminal rejection outcome.
//!
//! These are domain outcomes, not exceptions: every expected failure mode of
//! a candidate resolves into one of these and travels inside the
//! `ValidationResult`. Nothing here is ever thrown to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a candidate was rejected. The `Display` text is the single actionable
/// message surfaced to the generator for feedback.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("syntax error: {message}")]
    Syntax { message: String },

    #[error("import violation: {message}")]
    Import { message: String },

    #[error("builtin violation: {message}")]
    Builtin { message: String },

    #[error("attribute violation: {message}")]
    Attribute { message: String },

    #[error("Look-ahead bias: {message}")]
    LookAheadBias { message: String },

    #[error("infinite loop: {message}")]
    InfiniteLoop { message: String },

    #[error("execution timeout: {detail}")]
    ExecutionTimeout { detail: String },

    #[error("execution error: {message}")]
    ExecutionError { message: String },

    #[error("performance below threshold: {metric} {observed:.3} < required {required:.3}")]
    PerformanceBelowThreshold {
        metric: String,
        observed: f64,
        required: f64,
    },

    #[error("excessive drawdown: {scope} max drawdown {observed:.3} exceeds limit {limit:.3}")]
    ExcessiveDrawdown {
        scope: String,
        observed: f64,
        limit: f64,
    },

    #[error(
        "poor generalization: OOS Sharpe {oos_sharpe:.3} below {required_ratio:.2} x IS Sharpe {is_sharpe:.3}"
    )]
    PoorGeneralization {
        is_sharpe: f64,
        oos_sharpe: f64,
        required_ratio: f64,
    },

    #[error("duplicate or near-duplicate of '{entry_id}' (similarity {similarity:.3})")]
    Duplicate { entry_id: String, similarity: f64 },

    #[error("semantically equivalent to '{entry_id}' after structural normalization")]
    SemanticEquivalence { entry_id: String },

    #[error("missing rationale: candidate has no explanation")]
    MissingRationale,

    #[error("insufficient rationale: {length} characters (minimum {minimum})")]
    InsufficientRationale { length: usize, minimum: usize },

    #[error("tautological rationale: contains '{phrase}'")]
    TautologicalRationale { phrase: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_offending_module() {
        let v = Violation::Import {
            message: "line 1: dangerous module 'os' is explicitly forbidden".to_string(),
        };
        assert!(v.to_string().contains("os"));
    }

    #[test]
    fn lookahead_display_contains_marker_phrase() {
        let v = Violation::LookAheadBias {
            message: "shift(-1) at line 2 references future data".to_string(),
        };
        assert!(v.to_string().starts_with("Look-ahead bias"));
    }

    #[test]
    fn threshold_display_names_both_values() {
        let v = Violation::PerformanceBelowThreshold {
            metric: "walk-forward mean IS Sharpe".to_string(),
            observed: 0.42,
            required: 0.6,
        };
        let text = v.to_string();
        assert!(text.contains("0.420"));
        assert!(text.contains("0.600"));
    }

    #[test]
    fn serde_tags_are_snake_case() {
        let v = Violation::MissingRationale;
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("missing_rationale"));
        let back: Violation = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
