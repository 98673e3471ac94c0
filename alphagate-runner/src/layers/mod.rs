//! The seven validation layers and the contract they share.
//!
//! Each layer is a struct implementing `ValidationLayer`. Layers communicate
//! only through `LayerContext`: Layer 1 parses once and stores the program,
//! later layers read it. A layer never sees the candidate after a prior
//! layer rejected it.

use alphagate_core::{
    CorpusSnapshot, MarketFrame, Program, SecurityPolicy,
};

use crate::config::GateConfig;
use crate::engine::BacktestEngine;
use crate::thresholds::AdaptiveThresholds;
use crate::violation::Violation;

pub mod equivalence;
pub mod execution;
pub mod explainability;
pub mod lookahead;
pub mod novelty;
pub mod robustness;
pub mod safety;

pub use equivalence::SemanticEquivalenceLayer;
pub use execution::SandboxExecutionLayer;
pub use explainability::ExplainabilityLayer;
pub use lookahead::LookAheadBiasLayer;
pub use novelty::NoveltyLayer;
pub use robustness::PerformanceRobustnessLayer;
pub use safety::CodeSafetyLayer;

/// What a single layer reports back to the orchestrator.
#[derive(Debug, Clone)]
pub struct LayerOutcome {
    pub passed: bool,
    pub violation: Option<Violation>,
    pub warnings: Vec<String>,
}

impl LayerOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            violation: None,
            warnings: Vec::new(),
        }
    }

    pub fn pass_with_warnings(warnings: Vec<String>) -> Self {
        Self {
            passed: true,
            violation: None,
            warnings,
        }
    }

    pub fn fail(violation: Violation) -> Self {
        Self {
            passed: false,
            violation: Some(violation),
            warnings: Vec::new(),
        }
    }

    pub fn fail_with_warnings(violation: Violation, warnings: Vec<String>) -> Self {
        Self {
            passed: false,
            violation: Some(violation),
            warnings,
        }
    }
}

/// Shared state threaded through the pipeline for one candidate.
pub struct LayerContext<'a> {
    pub policy: &'a SecurityPolicy,
    pub config: &'a GateConfig,
    pub thresholds: AdaptiveThresholds,
    pub corpus: &'a CorpusSnapshot,
    pub frame: &'a MarketFrame,
    pub engine: &'a dyn BacktestEngine,
    /// Parsed once by the safety layer; later layers reuse it.
    pub program: Option<Program>,
}

/// One stage of the gate. Layers are stateless; per-candidate state lives in
/// the context.
pub trait ValidationLayer: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(
        &self,
        candidate: &alphagate_core::Candidate,
        ctx: &mut LayerContext<'_>,
    ) -> LayerOutcome;
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use crate::engine::SignalBacktester;
    use alphagate_core::BaselineMetrics;

    /// Everything a layer test needs to assemble a `LayerContext`.
    pub(crate) fn context_parts() -> (
        SecurityPolicy,
        GateConfig,
        AdaptiveThresholds,
        CorpusSnapshot,
        MarketFrame,
        SignalBacktester,
    ) {
        let config = GateConfig::default();
        let thresholds =
            AdaptiveThresholds::from_baseline(&BaselineMetrics::default(), config.drawdown_limit);
        let engine = SignalBacktester::new(config.step_budget);
        (
            SecurityPolicy::default(),
            config,
            thresholds,
            CorpusSnapshot::default(),
            MarketFrame::synthetic(11, 252),
            engine,
        )
    }
}
