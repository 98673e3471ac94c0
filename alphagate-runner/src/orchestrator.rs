//! Validation orchestrator — runs the seven layers in order, fail-fast.
//!
//! Exactly one of `passed` / `error` is set on the way out. Warnings from
//! layers that ran are retained even when a later layer rejects, so the
//! generator sees everything the gate noticed.

use alphagate_core::{BaselineMetrics, Candidate, CorpusSnapshot, MarketFrame, SecurityPolicy};
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::engine::{BacktestEngine, SignalBacktester};
use crate::layers::{
    CodeSafetyLayer, ExplainabilityLayer, LayerContext, LookAheadBiasLayer, NoveltyLayer,
    PerformanceRobustnessLayer, SandboxExecutionLayer, SemanticEquivalenceLayer, ValidationLayer,
};
use crate::thresholds::AdaptiveThresholds;
use crate::violation::Violation;

/// Terminal verdict for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    /// 1-based index of the rejecting layer, when rejected.
    pub failed_layer: Option<u8>,
    pub layer_name: Option<String>,
    pub error: Option<Violation>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn accepted(warnings: Vec<String>) -> Self {
        Self {
            passed: true,
            failed_layer: None,
            layer_name: None,
            error: None,
            warnings,
        }
    }

    fn rejected(
        layer_index: u8,
        layer_name: &'static str,
        violation: Violation,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            passed: false,
            failed_layer: Some(layer_index),
            layer_name: Some(layer_name.to_string()),
            error: Some(violation),
            warnings,
        }
    }
}

/// The gate. Owns the policy, the tunables, and the engine; everything else
/// arrives fresh per call.
pub struct ValidationOrchestrator {
    policy: SecurityPolicy,
    config: GateConfig,
    engine: Box<dyn BacktestEngine>,
}

impl ValidationOrchestrator {
    /// Gate with the default in-crate backtester.
    pub fn new(policy: SecurityPolicy, config: GateConfig) -> Self {
        let engine = Box::new(SignalBacktester::new(config.step_budget));
        Self {
            policy,
            config,
            engine,
        }
    }

    /// Gate backed by an external engine implementation.
    pub fn with_engine(
        policy: SecurityPolicy,
        config: GateConfig,
        engine: Box<dyn BacktestEngine>,
    ) -> Self {
        Self {
            policy,
            config,
            engine,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run a candidate through all seven layers, stopping at the first
    /// rejection.
    pub fn validate(
        &self,
        candidate: &Candidate,
        baseline: &BaselineMetrics,
        corpus: &CorpusSnapshot,
        frame: &MarketFrame,
    ) -> ValidationResult {
        let layers: [&dyn ValidationLayer; 7] = [
            &CodeSafetyLayer,
            &LookAheadBiasLayer,
            &SandboxExecutionLayer,
            &PerformanceRobustnessLayer,
            &NoveltyLayer,
            &SemanticEquivalenceLayer,
            &ExplainabilityLayer,
        ];

        let mut ctx = LayerContext {
            policy: &self.policy,
            config: &self.config,
            thresholds: AdaptiveThresholds::from_baseline(baseline, self.config.drawdown_limit),
            corpus,
            frame,
            engine: self.engine.as_ref(),
            program: None,
        };

        let mut warnings = Vec::new();
        for (idx, layer) in layers.iter().enumerate() {
            let outcome = layer.validate(candidate, &mut ctx);
            warnings.extend(outcome.warnings);
            if !outcome.passed {
                let violation = outcome
                    .violation
                    .unwrap_or_else(|| Violation::ExecutionError {
                        message: format!("layer {} rejected without detail", layer.name()),
                    });
                return ValidationResult::rejected(idx as u8 + 1, layer.name(), violation, warnings);
            }
        }
        ValidationResult::accepted(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_with_violation_detail() {
        let result = ValidationResult::rejected(
            1,
            "CodeSafety",
            Violation::Syntax {
                message: "unexpected token".to_string(),
            },
            vec![],
        );
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"failed_layer\":1"));
        assert!(json.contains("CodeSafety"));
        assert!(json.contains("syntax"));
    }
}
