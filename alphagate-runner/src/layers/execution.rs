//! Layer 3: sandbox execution.
//!
//! Two-stage defense. First a static scan rejects `while True:` loops with no
//! reachable exit before spending any compute on them. Then the candidate is
//! evaluated in the sandbox under both resource bounds, purely to prove the
//! code runs; performance is judged later through the engine seam.

use std::time::Duration;

use alphagate_core::syntax::{body_has_loop_exit, StmtKind};
use alphagate_core::Candidate;
use alphagate_core::EvalError;

use crate::layers::{LayerContext, LayerOutcome, ValidationLayer};
use crate::sandbox::{run_sandboxed, SandboxVerdict};
use crate::violation::Violation;

#[derive(Debug, Default)]
pub struct SandboxExecutionLayer;

impl ValidationLayer for SandboxExecutionLayer {
    fn name(&self) -> &'static str {
        "SandboxExecution"
    }

    fn validate(&self, candidate: &Candidate, ctx: &mut LayerContext<'_>) -> LayerOutcome {
        let program = ctx
            .program
            .as_ref()
            .expect("safety layer runs first and stores the program");

        // Static screen: a constant-true loop with no break or return will
        // never finish, so don't start it.
        let mut endless_line: Option<u32> = None;
        program.walk_stmts(&mut |stmt| {
            if endless_line.is_some() {
                return;
            }
            if let StmtKind::While { condition, body } = &stmt.kind {
                if condition.const_truthiness() == Some(true) && !body_has_loop_exit(body) {
                    endless_line = Some(stmt.line);
                }
            }
        });
        if let Some(line) = endless_line {
            return LayerOutcome::fail(Violation::InfiniteLoop {
                message: format!("constant-true loop at line {} has no exit", line),
            });
        }

        let timeout = Duration::from_secs(ctx.config.timeout_secs);
        match run_sandboxed(program, ctx.frame, ctx.config.step_budget, timeout) {
            SandboxVerdict::Completed(output) => {
                let mut warnings = Vec::new();
                if output.nan_count > 0 && !handles_nan(&candidate.code) {
                    warnings.push(format!(
                        "signal '{}' contains {} NaN values and the code never calls fillna or dropna",
                        output.signal_name, output.nan_count
                    ));
                }
                if warnings.is_empty() {
                    LayerOutcome::pass()
                } else {
                    LayerOutcome::pass_with_warnings(warnings)
                }
            }
            SandboxVerdict::Failed(EvalError::StepBudgetExceeded { budget }) => {
                LayerOutcome::fail(Violation::ExecutionTimeout {
                    detail: format!("step budget of {} exhausted", budget),
                })
            }
            SandboxVerdict::Failed(err) => LayerOutcome::fail(Violation::ExecutionError {
                message: err.to_string(),
            }),
            SandboxVerdict::TimedOut { seconds } => {
                LayerOutcome::fail(Violation::ExecutionTimeout {
                    detail: format!("wall-clock limit of {}s exceeded", seconds),
                })
            }
        }
    }
}

fn handles_nan(code: &str) -> bool {
    code.contains("fillna") || code.contains("dropna")
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
        let candidate = Candidate::new(code, "volatility-scaled momentum over a quarter");
        SandboxExecutionLayer.validate(&candidate, &mut ctx)
    }

    #[test]
    fn valid_factor_runs_clean() {
        let outcome = run("signal = data[\"close\"].pct_change(20).fillna(0)");
        assert!(outcome.passed);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn while_true_without_exit_is_rejected_statically() {
        let outcome = run("x = 0\nwhile True:\n    x = x + 1\n");
        let v = outcome.violation.unwrap();
        assert!(matches!(v, Violation::InfiniteLoop { .. }));
    }

    #[test]
    fn while_true_with_break_is_allowed_to_run() {
        let code = "x = 0\nwhile True:\n    x = x + 1\n    if x > 10:\n        break\nsignal = data[\"close\"].pct_change(5)";
        assert!(run(code).passed);
    }

    #[test]
    fn runtime_failure_is_an_execution_error() {
        let outcome = run("signal = data[\"close\"] / unknown_thing");
        assert!(matches!(
            outcome.violation.unwrap(),
            Violation::ExecutionError { .. }
        ));
    }

    #[test]
    fn nan_without_handling_draws_a_warning() {
        let outcome = run("signal = data[\"close\"].pct_change(20)");
        assert!(outcome.passed);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("NaN"));
    }

    #[test]
    fn dynamic_unbounded_loop_hits_the_step_budget() {
        // Condition is not a literal, so the static screen lets it through;
        // the step budget catches it at runtime.
        let code = "x = 1\nwhile x > 0:\n    x = x + 1\n";
        let outcome = run(code);
        assert!(matches!(
            outcome.violation.unwrap(),
            Violation::ExecutionTimeout { .. }
        ));
    }
}
