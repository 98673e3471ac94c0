//! Candidate model — the immutable inputs to a single gate invocation.
//!
//! A `Candidate` is what the upstream generator proposes: factor source code
//! plus a natural-language rationale. `BaselineMetrics` and `CorpusSnapshot`
//! are read-only snapshots supplied fresh per `validate()` call; the gate
//! owns no cross-call state.

use serde::{Deserialize, Serialize};

/// Broad factor family, as declared by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorCategory {
    Momentum,
    MeanReversion,
    Volatility,
    Volume,
    Composite,
}

impl std::fmt::Display for FactorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactorCategory::Momentum => write!(f, "momentum"),
            FactorCategory::MeanReversion => write!(f, "mean_reversion"),
            FactorCategory::Volatility => write!(f, "volatility"),
            FactorCategory::Volume => write!(f, "volume"),
            FactorCategory::Composite => write!(f, "composite"),
        }
    }
}

/// A proposed factor: source code + rationale, awaiting acceptance.
///
/// Created by the caller, never mutated by the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub code: String,
    pub rationale: String,
    pub category: Option<FactorCategory>,
}

impl Candidate {
    pub fn new(code: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            rationale: rationale.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: FactorCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// Rolling baseline statistics over previously accepted factors.
///
/// Adaptive thresholds are derived from these (`target = baseline * 1.2`);
/// the drawdown ceiling stays fixed regardless of baseline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BaselineMetrics {
    pub mean_sharpe: f64,
    pub mean_calmar: f64,
    pub mean_max_drawdown: f64,
}

impl Default for BaselineMetrics {
    fn default() -> Self {
        // Neutral baseline for an empty corpus: modest positive bar.
        Self {
            mean_sharpe: 0.5,
            mean_calmar: 0.5,
            mean_max_drawdown: 0.15,
        }
    }
}

/// One previously accepted factor, as stored by the external repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub id: String,
    pub code: String,
}

impl CorpusEntry {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
        }
    }
}

/// Ordered, versioned snapshot of the accepted corpus, taken once per call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    pub entries: Vec<CorpusEntry>,
}

impl CorpusSnapshot {
    pub fn new(entries: Vec<CorpusEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_builder() {
        let c = Candidate::new("signal = data[\"close\"]", "momentum over 5 days")
            .with_category(FactorCategory::Momentum);
        assert_eq!(c.category, Some(FactorCategory::Momentum));
        assert!(c.code.contains("close"));
    }

    #[test]
    fn category_display_is_snake_case() {
        assert_eq!(FactorCategory::MeanReversion.to_string(), "mean_reversion");
    }

    #[test]
    fn baseline_default_is_positive() {
        let b = BaselineMetrics::default();
        assert!(b.mean_sharpe > 0.0);
        assert!(b.mean_max_drawdown > 0.0 && b.mean_max_drawdown < 1.0);
    }

    #[test]
    fn snapshot_roundtrip() {
        let snap = CorpusSnapshot::new(vec![CorpusEntry::new("f_001", "x = 1")]);
        let json = serde_json::to_string(&snap).unwrap();
        let back: CorpusSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.entries[0].id, "f_001");
    }
}
