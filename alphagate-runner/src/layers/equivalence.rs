//! Layer 6: semantic equivalence.
//!
//! Catches the disguised duplicates the text comparison misses: the candidate
//! and each corpus entry are structurally normalized (bindings renamed to
//! positional placeholders, aliases folded, commutative chains sorted) and
//! compared by normal-form hash. Corpus entries that no longer parse are
//! skipped rather than failing the candidate.

use alphagate_core::{normalize, normalize_source, Candidate};

use crate::layers::{LayerContext, LayerOutcome, ValidationLayer};
use crate::violation::Violation;

#[derive(Debug, Default)]
pub struct SemanticEquivalenceLayer;

impl ValidationLayer for SemanticEquivalenceLayer {
    fn name(&self) -> &'static str {
        "SemanticEquivalence"
    }

    fn validate(&self, _candidate: &Candidate, ctx: &mut LayerContext<'_>) -> LayerOutcome {
        let program = ctx
            .program
            .as_ref()
            .expect("safety layer runs first and stores the program");
        let candidate_hash = normalize(program).hash();

        for entry in &ctx.corpus.entries {
            let Ok(form) = normalize_source(&entry.code) else {
                continue;
            };
            if form.hash() == candidate_hash {
                return LayerOutcome::fail(Violation::SemanticEquivalence {
                    entry_id: entry.id.clone(),
                });
            }
        }
        LayerOutcome::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests_support::context_parts;
    use alphagate_core::{parse, CorpusEntry, CorpusSnapshot};

    fn run(code: &str, corpus: &CorpusSnapshot) -> LayerOutcome {
        let (policy, config, thresholds, _, frame, engine) = context_parts();
        let mut ctx = LayerContext {
            policy: &policy,
            config: &config,
            thresholds,
            corpus,
            frame: &frame,
            engine: &engine,
            program: Some(parse(code).unwrap()),
        };
        let candidate = Candidate::new(code, "spread between short and long momentum");
        SemanticEquivalenceLayer.validate(&candidate, &mut ctx)
    }

    #[test]
    fn renamed_variables_are_equivalent() {
        let corpus = CorpusSnapshot::new(vec![CorpusEntry::new(
            "f_007",
            "mom = data[\"close\"].pct_change(20)\nsignal = mom.fillna(0)",
        )]);
        let outcome = run(
            "trend_strength = data[\"close\"].pct_change(20)\nsignal = trend_strength.fillna(0)",
            &corpus,
        );
        match outcome.violation.unwrap() {
            Violation::SemanticEquivalence { entry_id } => assert_eq!(entry_id, "f_007"),
            other => panic!("expected equivalence, got {other:?}"),
        }
    }

    #[test]
    fn commutative_reordering_is_equivalent() {
        let corpus = CorpusSnapshot::new(vec![CorpusEntry::new(
            "f_008",
            "signal = data[\"close\"].pct_change(5) + data[\"volume\"].pct_change(5)",
        )]);
        let outcome = run(
            "signal = data[\"volume\"].pct_change(5) + data[\"close\"].pct_change(5)",
            &corpus,
        );
        assert!(!outcome.passed);
    }

    #[test]
    fn different_lookback_is_not_equivalent() {
        let corpus = CorpusSnapshot::new(vec![CorpusEntry::new(
            "f_009",
            "signal = data[\"close\"].pct_change(20)",
        )]);
        assert!(run("signal = data[\"close\"].pct_change(60)", &corpus).passed);
    }

    #[test]
    fn unparsable_corpus_entry_is_skipped() {
        let corpus = CorpusSnapshot::new(vec![
            CorpusEntry::new("f_bad", "def broken(:"),
            CorpusEntry::new("f_ok", "signal = data[\"close\"].diff(3)"),
        ]);
        assert!(run("signal = data[\"close\"].pct_change(3)", &corpus).passed);
    }
}
