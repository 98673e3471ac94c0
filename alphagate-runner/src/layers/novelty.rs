//! Layer 5: novelty.
//!
//! Textual near-duplicate detection against the accepted corpus. The
//! similarity measure is a pure sequence-matching ratio over the raw source;
//! structural equivalence (renamed variables, reordered operands) is the next
//! layer's job.

use alphagate_core::{similarity_ratio, Candidate};

use crate::layers::{LayerContext, LayerOutcome, ValidationLayer};
use crate::violation::Violation;

#[derive(Debug, Default)]
pub struct NoveltyLayer;

impl ValidationLayer for NoveltyLayer {
    fn name(&self) -> &'static str {
        "Novelty"
    }

    fn validate(&self, candidate: &Candidate, ctx: &mut LayerContext<'_>) -> LayerOutcome {
        let mut worst: Option<(&str, f64)> = None;
        for entry in &ctx.corpus.entries {
            let ratio = similarity_ratio(&candidate.code, &entry.code);
            if worst.map_or(true, |(_, best)| ratio > best) {
                worst = Some((&entry.id, ratio));
            }
        }

        match worst {
            Some((entry_id, similarity)) if similarity >= ctx.config.novelty_threshold => {
                LayerOutcome::fail(Violation::Duplicate {
                    entry_id: entry_id.to_string(),
                    similarity,
                })
            }
            _ => LayerOutcome::pass(),
        }
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
        let candidate = Candidate::new(code, "relative strength versus trailing average");
        NoveltyLayer.validate(&candidate, &mut ctx)
    }

    #[test]
    fn empty_corpus_always_passes() {
        let outcome = run("signal = data[\"close\"].pct_change(5)", &CorpusSnapshot::default());
        assert!(outcome.passed);
    }

    #[test]
    fn exact_duplicate_is_rejected_with_the_entry_id() {
        let code = "signal = data[\"close\"].pct_change(5)";
        let corpus = CorpusSnapshot::new(vec![
            CorpusEntry::new("f_001", "signal = data[\"volume\"].rolling(10).mean()"),
            CorpusEntry::new("f_002", code),
        ]);
        let outcome = run(code, &corpus);
        match outcome.violation.unwrap() {
            Violation::Duplicate {
                entry_id,
                similarity,
            } => {
                assert_eq!(entry_id, "f_002");
                assert!((similarity - 1.0).abs() < 1e-12);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn near_duplicate_above_threshold_is_rejected() {
        let corpus = CorpusSnapshot::new(vec![CorpusEntry::new(
            "f_010",
            "signal = data[\"close\"].pct_change(20).fillna(0)",
        )]);
        let outcome = run("signal = data[\"close\"].pct_change(21).fillna(0)", &corpus);
        assert!(!outcome.passed);
    }

    #[test]
    fn genuinely_different_factor_passes() {
        let corpus = CorpusSnapshot::new(vec![CorpusEntry::new(
            "f_010",
            "signal = data[\"close\"].pct_change(20)",
        )]);
        let code = "vol = data[\"high\"] - data[\"low\"]\nsignal = vol.rolling(15).std() / vol.rolling(60).std()";
        assert!(run(code, &corpus).passed);
    }
}
