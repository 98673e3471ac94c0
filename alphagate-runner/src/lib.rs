//! AlphaGate Runner — the seven-layer acceptance gate for generated factors.
//!
//! This crate builds on `alphagate-core` to provide:
//! - The violation taxonomy and per-candidate `ValidationResult`
//! - Adaptive thresholds derived from the accepted-corpus baseline
//! - The backtest engine seam and the default sign-trading backtester
//! - The sandbox harness (step budget + wall-clock timeout)
//! - The seven validation layers
//! - The fail-fast orchestrator and parallel batch validation

pub mod batch;
pub mod config;
pub mod engine;
pub mod layers;
pub mod metrics;
pub mod orchestrator;
pub mod sandbox;
pub mod thresholds;
pub mod violation;

pub use batch::validate_batch;
pub use config::{ConfigError, GateConfig};
pub use engine::{BacktestEngine, BacktestReport, EngineError, SignalBacktester};
pub use layers::{
    CodeSafetyLayer, ExplainabilityLayer, LayerContext, LayerOutcome, LookAheadBiasLayer,
    NoveltyLayer, PerformanceRobustnessLayer, SandboxExecutionLayer, SemanticEquivalenceLayer,
    ValidationLayer,
};
pub use metrics::PerformanceStats;
pub use orchestrator::{ValidationOrchestrator, ValidationResult};
pub use sandbox::{run_sandboxed, SandboxVerdict};
pub use thresholds::AdaptiveThresholds;
pub use violation::Violation;
