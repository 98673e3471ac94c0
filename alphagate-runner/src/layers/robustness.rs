//! Layer 4: performance robustness.
//!
//! The candidate must beat the adaptive thresholds on the full sample, hold
//! up across non-overlapping walk-forward windows, generalize from in-sample
//! to out-of-sample, and avoid catastrophic behavior in any single market
//! regime. Every number here comes through the engine seam: full sample,
//! window segments, and contiguous regime spans are all engine runs. Stitched
//! discontiguous bars are never compounded or annualized as if contiguous.

use alphagate_core::{Candidate, MarketFrame};

use crate::engine::MIN_BACKTEST_BARS;
use crate::layers::{LayerContext, LayerOutcome, ValidationLayer};
use crate::violation::Violation;

/// Trailing window, in bars, used to label regimes.
const REGIME_LOOKBACK: usize = 21;

/// Trailing return beyond which a bar counts as bull (or bear, negated).
const REGIME_BAND: f64 = 0.03;

#[derive(Debug, Default)]
pub struct PerformanceRobustnessLayer;

impl ValidationLayer for PerformanceRobustnessLayer {
    fn name(&self) -> &'static str {
        "PerformanceRobustness"
    }

    fn validate(&self, _candidate: &Candidate, ctx: &mut LayerContext<'_>) -> LayerOutcome {
        let program = ctx
            .program
            .as_ref()
            .expect("safety layer runs first and stores the program");
        let mut warnings = Vec::new();

        // Full-sample checks first: drawdown ceiling, then Calmar target.
        let full = match ctx.engine.run(program, ctx.frame) {
            Ok(report) => report,
            Err(err) => {
                return LayerOutcome::fail(Violation::ExecutionError {
                    message: format!("full-sample backtest failed: {err}"),
                })
            }
        };
        if full.max_drawdown > ctx.thresholds.max_drawdown_limit {
            return LayerOutcome::fail(Violation::ExcessiveDrawdown {
                scope: "full-sample".to_string(),
                observed: full.max_drawdown,
                limit: ctx.thresholds.max_drawdown_limit,
            });
        }
        if full.calmar < ctx.thresholds.target_calmar {
            return LayerOutcome::fail(Violation::PerformanceBelowThreshold {
                metric: "full-sample Calmar".to_string(),
                observed: full.calmar,
                required: ctx.thresholds.target_calmar,
            });
        }

        // Walk-forward: non-overlapping windows, each split IS/OOS.
        let windows = plan_windows(
            ctx.frame.len(),
            ctx.config.n_windows,
            ctx.config.is_fraction,
        );
        warnings.push(format!(
            "walk-forward: {} of {} configured windows over {} bars",
            windows.len(),
            ctx.config.n_windows,
            ctx.frame.len()
        ));

        let mut is_sharpes = Vec::with_capacity(windows.len());
        let mut oos_sharpes = Vec::with_capacity(windows.len());
        for (idx, window) in windows.iter().enumerate() {
            let is_frame = ctx.frame.slice(window.start, window.split);
            let oos_frame = ctx.frame.slice(window.split, window.end);
            for (label, segment) in [("IS", &is_frame), ("OOS", &oos_frame)] {
                let report = match ctx.engine.run(program, segment) {
                    Ok(report) => report,
                    Err(err) => {
                        return LayerOutcome::fail_with_warnings(
                            Violation::ExecutionError {
                                message: format!(
                                    "window {} {} backtest failed: {err}",
                                    idx + 1,
                                    label
                                ),
                            },
                            warnings,
                        )
                    }
                };
                if report.max_drawdown > ctx.thresholds.max_drawdown_limit {
                    return LayerOutcome::fail_with_warnings(
                        Violation::ExcessiveDrawdown {
                            scope: format!("window {} {}", idx + 1, label),
                            observed: report.max_drawdown,
                            limit: ctx.thresholds.max_drawdown_limit,
                        },
                        warnings,
                    );
                }
                if label == "IS" {
                    is_sharpes.push(report.sharpe_ratio);
                } else {
                    oos_sharpes.push(report.sharpe_ratio);
                }
            }
        }

        if !is_sharpes.is_empty() {
            let mean_is = mean(&is_sharpes);
            let mean_oos = mean(&oos_sharpes);
            if mean_is < ctx.thresholds.target_sharpe {
                return LayerOutcome::fail_with_warnings(
                    Violation::PerformanceBelowThreshold {
                        metric: "walk-forward mean IS Sharpe".to_string(),
                        observed: mean_is,
                        required: ctx.thresholds.target_sharpe,
                    },
                    warnings,
                );
            }
            // Generalization only binds when there is in-sample edge to keep.
            if mean_is > 0.0 && mean_oos < ctx.config.generalization_floor * mean_is {
                return LayerOutcome::fail_with_warnings(
                    Violation::PoorGeneralization {
                        is_sharpe: mean_is,
                        oos_sharpe: mean_oos,
                        required_ratio: ctx.config.generalization_floor,
                    },
                    warnings,
                );
            }
        } else {
            warnings.push("walk-forward analysis skipped: frame too short".to_string());
        }

        // Regime analysis: one engine run per contiguous span of a single
        // regime. Spans shorter than the backtest minimum are skipped.
        let labels = label_regimes(ctx.frame);
        let spans = regime_spans(&labels, MIN_BACKTEST_BARS);
        let coverage: Vec<String> = ["bull", "bear", "sideways"]
            .iter()
            .map(|regime| {
                let bars = labels.iter().filter(|l| *l == regime).count();
                format!("{regime} {bars} bars")
            })
            .collect();
        warnings.push(format!("regime coverage: {}", coverage.join(", ")));
        if spans.is_empty() {
            warnings.push("regime analysis skipped: no regime span long enough".to_string());
        }
        for span in &spans {
            let segment = ctx.frame.slice(span.start, span.end);
            let report = match ctx.engine.run(program, &segment) {
                Ok(report) => report,
                Err(err) => {
                    return LayerOutcome::fail_with_warnings(
                        Violation::ExecutionError {
                            message: format!("{}-regime backtest failed: {err}", span.regime),
                        },
                        warnings,
                    )
                }
            };
            if report.sharpe_ratio < ctx.config.catastrophic_sharpe {
                return LayerOutcome::fail_with_warnings(
                    Violation::PerformanceBelowThreshold {
                        metric: format!("{}-regime Sharpe", span.regime),
                        observed: report.sharpe_ratio,
                        required: ctx.config.catastrophic_sharpe,
                    },
                    warnings,
                );
            }
            if report.max_drawdown > ctx.thresholds.max_drawdown_limit {
                return LayerOutcome::fail_with_warnings(
                    Violation::ExcessiveDrawdown {
                        scope: format!("{} regime", span.regime),
                        observed: report.max_drawdown,
                        limit: ctx.thresholds.max_drawdown_limit,
                    },
                    warnings,
                );
            }
        }

        LayerOutcome::pass_with_warnings(warnings)
    }
}

struct Window {
    start: usize,
    split: usize,
    end: usize,
}

/// Plan non-overlapping windows whose IS and OOS segments are both large
/// enough to backtest. Drops trailing windows when the frame is short.
fn plan_windows(bars: usize, n_windows: usize, is_fraction: f64) -> Vec<Window> {
    let oos_fraction = 1.0 - is_fraction;
    let min_len = (MIN_BACKTEST_BARS as f64 / is_fraction.min(oos_fraction)).ceil() as usize;
    let mut n = n_windows.min(if min_len == 0 { 0 } else { bars / min_len });
    let mut windows = Vec::new();
    while n > 0 {
        let window_len = bars / n;
        if window_len >= min_len {
            for k in 0..n {
                let start = k * window_len;
                // Last window absorbs the remainder bars.
                let end = if k + 1 == n { bars } else { start + window_len };
                let split = start + ((end - start) as f64 * is_fraction) as usize;
                windows.push(Window { start, split, end });
            }
            break;
        }
        n -= 1;
    }
    windows
}

/// Trailing-return regime label per bar; early bars default to sideways.
fn label_regimes(frame: &MarketFrame) -> Vec<&'static str> {
    (0..frame.len())
        .map(|i| {
            if i < REGIME_LOOKBACK || frame.close[i - REGIME_LOOKBACK] <= 0.0 {
                return "sideways";
            }
            let trailing = frame.close[i] / frame.close[i - REGIME_LOOKBACK] - 1.0;
            if trailing > REGIME_BAND {
                "bull"
            } else if trailing < -REGIME_BAND {
                "bear"
            } else {
                "sideways"
            }
        })
        .collect()
}

struct RegimeSpan {
    regime: &'static str,
    start: usize,
    end: usize,
}

/// Maximal runs of a single regime label, keeping only runs long enough to
/// backtest on their own.
fn regime_spans(labels: &[&'static str], min_len: usize) -> Vec<RegimeSpan> {
    let mut spans = Vec::new();
    let mut start = 0;
    for i in 1..=labels.len() {
        if i == labels.len() || labels[i] != labels[start] {
            if i - start >= min_len {
                spans.push(RegimeSpan {
                    regime: labels[start],
                    start,
                    end: i,
                });
            }
            start = i;
        }
    }
    spans
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
