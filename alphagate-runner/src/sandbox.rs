//! Sandbox harness — wall-clock-bounded evaluation on a worker thread.
//!
//! The evaluator's step budget bounds work, but a pathological program could
//! still chew real time inside a single expensive operation. The harness runs
//! evaluation on a detached worker and waits with `recv_timeout`: if the
//! deadline passes, the verdict is `TimedOut` and the worker's eventual
//! result is dropped with the channel.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use alphagate_core::eval::{evaluate, EvalError, EvalOutput};
use alphagate_core::{MarketFrame, Program};

/// Outcome of a sandboxed evaluation.
#[derive(Debug)]
pub enum SandboxVerdict {
    Completed(EvalOutput),
    Failed(EvalError),
    TimedOut { seconds: u64 },
}

/// Evaluate `program` against `frame` with both resource bounds active.
pub fn run_sandboxed(
    program: &Program,
    frame: &MarketFrame,
    step_budget: u64,
    timeout: Duration,
) -> SandboxVerdict {
    let (tx, rx) = mpsc::channel();
    let program = program.clone();
    let frame = frame.clone();

    thread::spawn(move || {
        let result = evaluate(&program, &frame, step_budget);
        // Receiver may be gone if we timed out; that's fine.
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(output)) => SandboxVerdict::Completed(output),
        Ok(Err(err)) => SandboxVerdict::Failed(err),
        Err(_) => SandboxVerdict::TimedOut {
            seconds: timeout.as_secs(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphagate_core::parse;

    #[test]
    fn valid_factor_completes() {
        let program = parse("signal = data[\"close\"].pct_change(5)").unwrap();
        let frame = MarketFrame::synthetic(3, 100);
        let verdict = run_sandboxed(&program, &frame, 1_000_000, Duration::from_secs(10));
        assert!(matches!(verdict, SandboxVerdict::Completed(_)));
    }

    #[test]
    fn runtime_error_is_failed() {
        let program = parse("signal = missing_name").unwrap();
        let frame = MarketFrame::synthetic(3, 100);
        let verdict = run_sandboxed(&program, &frame, 1_000_000, Duration::from_secs(10));
        assert!(matches!(
            verdict,
            SandboxVerdict::Failed(EvalError::UnknownName { .. })
        ));
    }

    #[test]
    fn unbounded_loop_hits_step_budget_before_wall_clock() {
        let program = parse("x = 0\nwhile True:\n    x = x + 1\n").unwrap();
        let frame = MarketFrame::synthetic(3, 100);
        let verdict = run_sandboxed(&program, &frame, 100_000, Duration::from_secs(30));
        assert!(matches!(
            verdict,
            SandboxVerdict::Failed(EvalError::StepBudgetExceeded { .. })
        ));
    }

    #[test]
    fn wall_clock_timeout_fires_on_slow_work() {
        // Enormous step budget, tiny timeout: the wall clock wins.
        let program = parse("x = 0\nwhile True:\n    x = x + 1\n").unwrap();
        let frame = MarketFrame::synthetic(3, 100);
        let verdict = run_sandboxed(&program, &frame, u64::MAX, Duration::from_millis(50));
        assert!(matches!(verdict, SandboxVerdict::TimedOut { .. }));
    }
}
