//! Performance metrics — pure functions from equity curves to scalars.
//!
//! Every metric is a pure function: equity curve in, scalar out. No
//! dependencies on the engine or the layers.

use serde::{Deserialize, Serialize};

/// Trading days per year, for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Metrics attached to a single backtest report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub sharpe_ratio: f64,
    pub total_return: f64,
    pub annual_return: f64,
    pub max_drawdown: f64,
    pub calmar: f64,
}

impl PerformanceStats {
    /// Compute all stats from an equity curve (starting at 1.0).
    pub fn compute(equity_curve: &[f64]) -> Self {
        let sharpe_ratio = sharpe_ratio(equity_curve);
        let total_return = total_return(equity_curve);
        let annual_return = annual_return(equity_curve);
        let max_drawdown = max_drawdown(equity_curve);
        let calmar = if max_drawdown > 0.0 {
            annual_return / max_drawdown
        } else if annual_return > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        Self {
            sharpe_ratio,
            total_return,
            annual_return,
            max_drawdown,
            calmar,
        }
    }
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let initial = equity_curve[0];
    if initial <= 0.0 {
        return 0.0;
    }
    equity_curve[equity_curve.len() - 1] / initial - 1.0
}

/// Annualized return from the curve length in trading days.
pub fn annual_return(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let years = (equity_curve.len() - 1) as f64 / TRADING_DAYS;
    let growth = 1.0 + total_return(equity_curve);
    if growth <= 0.0 || years <= 0.0 {
        return -1.0;
    }
    growth.powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio of daily equity-curve returns (zero risk-free).
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() - 1) as f64;
    let std = var.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    mean / std * TRADING_DAYS.sqrt()
}

/// Maximum peak-to-trough drawdown as a positive fraction.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &v in equity_curve {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.max(1.0 - v / peak);
        }
    }
    worst
}

fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_curve_has_zero_everything() {
        let curve = vec![1.0; 100];
        let stats = PerformanceStats::compute(&curve);
        assert_eq!(stats.sharpe_ratio, 0.0);
        assert_eq!(stats.total_return, 0.0);
        assert_eq!(stats.max_drawdown, 0.0);
    }

    #[test]
    fn total_return_doubling() {
        assert!((total_return(&[1.0, 1.5, 2.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_simple_dip() {
        // Peak 2.0, trough 1.0: drawdown 50%.
        let curve = vec![1.0, 2.0, 1.0, 1.8];
        assert!((max_drawdown(&curve) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn monotone_curve_has_no_drawdown() {
        let curve: Vec<f64> = (0..50).map(|i| 1.0 + i as f64 * 0.01).collect();
        assert_eq!(max_drawdown(&curve), 0.0);
    }

    #[test]
    fn sharpe_positive_for_steady_gains() {
        let curve: Vec<f64> = (0..252)
            .map(|i| (1.0 + 0.001f64).powi(i) * (1.0 + if i % 2 == 0 { 0.0005 } else { -0.0004 }))
            .collect();
        assert!(sharpe_ratio(&curve) > 0.0);
    }

    #[test]
    fn annual_return_one_year_exact() {
        let mut curve = vec![1.0];
        for _ in 0..252 {
            curve.push(curve.last().unwrap() * (1.0 + 0.10f64).powf(1.0 / 252.0));
        }
        assert!((annual_return(&curve) - 0.10).abs() < 1e-6);
    }

    #[test]
    fn calmar_is_return_over_drawdown() {
        let curve = vec![1.0, 1.1, 0.99, 1.21];
        let stats = PerformanceStats::compute(&curve);
        assert!((stats.calmar - stats.annual_return / stats.max_drawdown).abs() < 1e-9);
    }

    #[test]
    fn short_curves_do_not_panic() {
        for curve in [vec![], vec![1.0]] {
            let stats = PerformanceStats::compute(&curve);
            assert_eq!(stats.total_return, 0.0);
        }
    }
}
