//! Adaptive thresholds — pass/fail bars derived from the rolling baseline.
//!
//! A candidate must beat the accepted corpus, not a fixed constant: targets
//! are `baseline * 1.2`. The drawdown ceiling is the exception — it comes
//! from configuration, not from how bad the baseline's drawdowns are.

use alphagate_core::BaselineMetrics;
use serde::{Deserialize, Serialize};

/// Uplift applied to baseline means to obtain targets.
pub const BASELINE_UPLIFT: f64 = 1.2;

/// Default drawdown ceiling (fraction of equity).
pub const DEFAULT_DRAWDOWN_LIMIT: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveThresholds {
    pub target_sharpe: f64,
    pub target_calmar: f64,
    pub max_drawdown_limit: f64,
}

impl AdaptiveThresholds {
    pub fn from_baseline(baseline: &BaselineMetrics, drawdown_limit: f64) -> Self {
        Self {
            target_sharpe: baseline.mean_sharpe * BASELINE_UPLIFT,
            target_calmar: baseline.mean_calmar * BASELINE_UPLIFT,
            max_drawdown_limit: drawdown_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_twenty_percent_above_baseline() {
        let baseline = BaselineMetrics {
            mean_sharpe: 1.0,
            mean_calmar: 0.5,
            mean_max_drawdown: 0.4,
        };
        let t = AdaptiveThresholds::from_baseline(&baseline, DEFAULT_DRAWDOWN_LIMIT);
        assert!((t.target_sharpe - 1.2).abs() < 1e-12);
        assert!((t.target_calmar - 0.6).abs() < 1e-12);
    }

    #[test]
    fn drawdown_limit_comes_from_caller_not_baseline() {
        let baseline = BaselineMetrics {
            mean_sharpe: 1.0,
            mean_calmar: 1.0,
            mean_max_drawdown: 0.9,
        };
        let t = AdaptiveThresholds::from_baseline(&baseline, 0.05);
        assert!((t.max_drawdown_limit - 0.05).abs() < 1e-12);
    }

    #[test]
    fn negative_baseline_yields_negative_target() {
        // An underwater corpus lowers the bar; the drawdown ceiling does not move.
        let baseline = BaselineMetrics {
            mean_sharpe: -0.5,
            mean_calmar: -0.2,
            mean_max_drawdown: 0.1,
        };
        let t = AdaptiveThresholds::from_baseline(&baseline, DEFAULT_DRAWDOWN_LIMIT);
        assert!(t.target_sharpe < 0.0);
        assert!((t.max_drawdown_limit - 0.25).abs() < 1e-12);
    }
}
