//! Layer 2: look-ahead bias.
//!
//! A factor must only read the past. The one construct in the language that
//! can reach forward is `shift` with a non-positive period: `shift(-1)` pulls
//! tomorrow's value onto today's row, and `shift(0)` lets today's close into
//! a signal that trades on today's close. Both are rejected statically.

use alphagate_core::syntax::{ExprKind, UnaryOpKind};
use alphagate_core::Candidate;

use crate::layers::{LayerContext, LayerOutcome, ValidationLayer};
use crate::violation::Violation;

#[derive(Debug, Default)]
pub struct LookAheadBiasLayer;

impl ValidationLayer for LookAheadBiasLayer {
    fn name(&self) -> &'static str {
        "LookAheadBias"
    }

    fn validate(&self, _candidate: &Candidate, ctx: &mut LayerContext<'_>) -> LayerOutcome {
        let program = ctx
            .program
            .as_ref()
            .expect("safety layer runs first and stores the program");

        let mut finding: Option<Violation> = None;
        program.walk_exprs(&mut |expr| {
            if finding.is_some() {
                return;
            }
            if let ExprKind::Call { func, args } = &expr.kind {
                if let ExprKind::Attribute { attr, .. } = &func.kind {
                    if attr == "shift" {
                        if let Some(period) = args.first().and_then(literal_int) {
                            if period <= 0 {
                                finding = Some(Violation::LookAheadBias {
                                    message: format!(
                                        "shift({}) at line {} references current or future data",
                                        period, expr.line
                                    ),
                                });
                            }
                        }
                    }
                }
            }
        });

        match finding {
            Some(v) => LayerOutcome::fail(v),
            None => LayerOutcome::pass(),
        }
    }
}

/// Literal integer argument, including a unary minus over a literal.
fn literal_int(expr: &alphagate_core::syntax::Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::Num(n) if n.fract() == 0.0 => Some(*n as i64),
        ExprKind::UnaryOp {
            op: UnaryOpKind::Neg,
            operand,
        } => match &operand.kind {
            ExprKind::Num(n) if n.fract() == 0.0 => Some(-(*n as i64)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests_support::context_parts;
    use alphagate_core::parse;

    fn run(code: &str) -> LayerOutcome {
        let (policy, config, thresholds, corpus, frame, engine) = context_parts();
        let mut ctx = LayerContext {
            policy: &policy,
            config: &config,
            thresholds,
            corpus: &corpus,
            frame: &frame,
            engine: &engine,
            program: Some(parse(code).unwrap()),
        };
        let candidate = Candidate::new(code, "lagged momentum signal over a month");
        LookAheadBiasLayer.validate(&candidate, &mut ctx)
    }

    #[test]
    fn positive_shift_is_fine() {
        assert!(run("signal = data[\"close\"].shift(1)").passed);
    }

    #[test]
    fn negative_shift_is_rejected() {
        let outcome = run("signal = data[\"close\"].shift(-1)");
        assert!(!outcome.passed);
        let v = outcome.violation.unwrap();
        assert!(matches!(v, Violation::LookAheadBias { .. }));
        assert!(v.to_string().contains("shift(-1)"));
    }

    #[test]
    fn zero_shift_is_rejected() {
        assert!(!run("signal = data[\"close\"].shift(0)").passed);
    }

    #[test]
    fn negative_shift_deep_in_expression_is_found() {
        let code = "signal = data[\"close\"] / data[\"close\"].shift(-5) - 1";
        assert!(!run(code).passed);
    }

    #[test]
    fn non_literal_shift_is_left_to_runtime() {
        // A computed period cannot be judged statically.
        assert!(run("n = 5\nsignal = data[\"close\"].shift(n)").passed);
    }

    #[test]
    fn unrelated_negative_literal_is_not_flagged() {
        assert!(run("signal = data[\"close\"].pct_change(5) * -1").passed);
    }
}
