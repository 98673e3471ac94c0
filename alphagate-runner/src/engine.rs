//! Backtest engine seam — the gate's only computational collaborator.
//!
//! Layer 4 talks to a `BacktestEngine` trait object, never to a concrete
//! engine, so an external simulator can substitute without touching the
//! layers. `SignalBacktester` is the deterministic in-crate implementation:
//! evaluate the factor to a signal, trade its sign on the next bar, compound
//! an equity curve, and report the metrics the thresholds need.

use alphagate_core::eval::{evaluate, shift_series, EvalError};
use alphagate_core::{MarketFrame, Program};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::PerformanceStats;

/// Minimum bars a frame needs before a backtest is meaningful.
pub const MIN_BACKTEST_BARS: usize = 20;

/// What the engine reports back per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BacktestReport {
    pub sharpe_ratio: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub annual_return: f64,
    pub calmar: f64,
}

impl From<PerformanceStats> for BacktestReport {
    fn from(stats: PerformanceStats) -> Self {
        Self {
            sharpe_ratio: stats.sharpe_ratio,
            total_return: stats.total_return,
            max_drawdown: stats.max_drawdown,
            annual_return: stats.annual_return,
            calmar: stats.calmar,
        }
    }
}

/// Engine failures. Layer 4 catches these and downgrades them to layer
/// outcomes; they never escape `validate()`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("signal evaluation failed: {0}")]
    Eval(#[from] EvalError),
    #[error("insufficient data: {bars} bars < minimum {min}")]
    InsufficientData { bars: usize, min: usize },
    #[error("signal length {signal} does not match {bars} bars")]
    SignalLengthMismatch { signal: usize, bars: usize },
    #[error("engine failure: {0}")]
    Other(String),
}

/// The seam Layer 3/4 call through.
pub trait BacktestEngine: Send + Sync {
    fn run(&self, program: &Program, frame: &MarketFrame) -> Result<BacktestReport, EngineError>;
}

/// Deterministic sign-trading backtester over the evaluator's signal.
#[derive(Debug, Clone)]
pub struct SignalBacktester {
    pub step_budget: u64,
}

impl SignalBacktester {
    pub fn new(step_budget: u64) -> Self {
        Self { step_budget }
    }
}

impl BacktestEngine for SignalBacktester {
    fn run(&self, program: &Program, frame: &MarketFrame) -> Result<BacktestReport, EngineError> {
        if frame.len() < MIN_BACKTEST_BARS {
            return Err(EngineError::InsufficientData {
                bars: frame.len(),
                min: MIN_BACKTEST_BARS,
            });
        }
        let output = evaluate(program, frame, self.step_budget)?;
        if output.signal.len() != frame.len() {
            return Err(EngineError::SignalLengthMismatch {
                signal: output.signal.len(),
                bars: frame.len(),
            });
        }

        // Positions are the sign of yesterday's signal: a signal observed at
        // bar i-1 earns bar i's close-to-close return. NaN signal = flat.
        let lagged = shift_series(&output.signal, 1);
        let returns = frame.returns();
        let mut equity = Vec::with_capacity(frame.len());
        let mut value = 1.0f64;
        for (sig, ret) in lagged.iter().zip(returns.iter()) {
            let position = if sig.is_nan() { 0.0 } else { sig.signum() };
            value *= 1.0 + position * ret;
            equity.push(value);
        }

        Ok(PerformanceStats::compute(&equity).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphagate_core::parse;

    fn frame() -> MarketFrame {
        MarketFrame::synthetic(7, 252)
    }

    #[test]
    fn momentum_factor_backtests() {
        let program = parse("signal = data[\"close\"].pct_change(5)").unwrap();
        let report = SignalBacktester::new(1_000_000)
            .run(&program, &frame())
            .unwrap();
        assert!(report.sharpe_ratio.is_finite());
        assert!(report.max_drawdown >= 0.0 && report.max_drawdown <= 1.0);
    }

    #[test]
    fn deterministic_across_runs() {
        let program = parse("signal = data[\"close\"].pct_change(10)").unwrap();
        let engine = SignalBacktester::new(1_000_000);
        let a = engine.run(&program, &frame()).unwrap();
        let b = engine.run(&program, &frame()).unwrap();
        assert_eq!(a.sharpe_ratio, b.sharpe_ratio);
        assert_eq!(a.total_return, b.total_return);
    }

    #[test]
    fn tiny_frame_is_rejected() {
        let program = parse("signal = data[\"close\"]").unwrap();
        let tiny = MarketFrame::synthetic(1, 5);
        let err = SignalBacktester::new(1_000_000)
            .run(&program, &tiny)
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { bars: 5, .. }));
    }

    #[test]
    fn eval_failure_surfaces_as_engine_error() {
        let program = parse("signal = data[\"nope\"]").unwrap();
        let err = SignalBacktester::new(1_000_000)
            .run(&program, &frame())
            .unwrap_err();
        assert!(matches!(err, EngineError::Eval(_)));
    }

    #[test]
    fn dropna_signal_length_mismatch_is_caught() {
        let program = parse("signal = data[\"close\"].shift(5).dropna()").unwrap();
        let err = SignalBacktester::new(1_000_000)
            .run(&program, &frame())
            .unwrap_err();
        assert!(matches!(err, EngineError::SignalLengthMismatch { .. }));
    }
}
