//! Layer 7: explainability.
//!
//! The last gate is about the human on the other end: a factor nobody can
//! explain is a factor nobody should trade. Rejects missing, too-short, and
//! tautological rationales; very long rationales pass with an advisory
//! warning.

use alphagate_core::Candidate;

use crate::layers::{LayerContext, LayerOutcome, ValidationLayer};
use crate::violation::Violation;

/// Phrases that restate the request instead of explaining the signal.
const TAUTOLOGIES: &[&str] = &[
    "buy low sell high",
    "maximize profit",
    "minimize loss",
    "buy when it goes up",
    "guaranteed returns",
    "this factor is good",
    "this is a good factor",
    "generates alpha",
    "makes money",
    "it works because it works",
];

#[derive(Debug, Default)]
pub struct ExplainabilityLayer;

impl ValidationLayer for ExplainabilityLayer {
    fn name(&self) -> &'static str {
        "Explainability"
    }

    fn validate(&self, candidate: &Candidate, ctx: &mut LayerContext<'_>) -> LayerOutcome {
        let rationale = candidate.rationale.trim();
        if rationale.is_empty() {
            return LayerOutcome::fail(Violation::MissingRationale);
        }

        let length = rationale.chars().count();
        if length < ctx.config.min_rationale_chars {
            return LayerOutcome::fail(Violation::InsufficientRationale {
                length,
                minimum: ctx.config.min_rationale_chars,
            });
        }

        let lowered = rationale.to_lowercase();
        for phrase in TAUTOLOGIES {
            if lowered.contains(phrase) {
                return LayerOutcome::fail(Violation::TautologicalRationale {
                    phrase: (*phrase).to_string(),
                });
            }
        }

        if length > ctx.config.advisory_rationale_chars {
            return LayerOutcome::pass_with_warnings(vec![format!(
                "rationale is {} characters; consider condensing below {}",
                length, ctx.config.advisory_rationale_chars
            )]);
        }
        LayerOutcome::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests_support::context_parts;

    fn run(rationale: &str) -> LayerOutcome {
        let (policy, config, thresholds, corpus, frame, engine) = context_parts();
        let mut ctx = LayerContext {
            policy: &policy,
            config: &config,
            thresholds,
            corpus: &corpus,
            frame: &frame,
            engine: &engine,
            program: None,
        };
        let candidate = Candidate::new("signal = data[\"close\"].pct_change(5)", rationale);
        ExplainabilityLayer.validate(&candidate, &mut ctx)
    }

    #[test]
    fn substantive_rationale_passes() {
        let outcome = run(
            "Captures short-term momentum: stocks that rose over the past week \
             tend to continue rising for a few more days.",
        );
        assert!(outcome.passed);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn empty_rationale_is_missing() {
        assert!(matches!(
            run("   ").violation.unwrap(),
            Violation::MissingRationale
        ));
    }

    #[test]
    fn short_rationale_is_insufficient() {
        assert!(matches!(
            run("momentum").violation.unwrap(),
            Violation::InsufficientRationale { length: 8, minimum: 20 }
        ));
    }

    #[test]
    fn trading_platitudes_are_rejected() {
        for text in [
            "We simply buy low sell high on every dip in the index.",
            "The goal of this factor is to maximize profit each day.",
        ] {
            assert!(matches!(
                run(text).violation,
                Some(Violation::TautologicalRationale { .. })
            ));
        }
    }

    #[test]
    fn tautology_is_rejected_case_insensitively() {
        let outcome = run("This factor is GOOD because it Generates Alpha consistently.");
        match outcome.violation.unwrap() {
            Violation::TautologicalRationale { phrase } => {
                assert_eq!(phrase, "this factor is good");
            }
            other => panic!("expected tautology, got {other:?}"),
        }
    }

    #[test]
    fn very_long_rationale_passes_with_advisory() {
        let long = "Mean reversion in the close-to-close spread. ".repeat(10);
        let outcome = run(&long);
        assert!(outcome.passed);
        assert_eq!(outcome.warnings.len(), 1);
    }
}
