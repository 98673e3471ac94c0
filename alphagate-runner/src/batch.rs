//! Batch validation — independent candidates fan out across a rayon pool.
//!
//! Results come back in input order regardless of which worker finished
//! first. Candidates are independent by construction: the corpus snapshot is
//! taken before the batch starts, so two near-identical candidates in one
//! batch can both pass novelty against it.

use alphagate_core::{BaselineMetrics, Candidate, CorpusSnapshot, MarketFrame};
use rayon::prelude::*;

use crate::orchestrator::{ValidationOrchestrator, ValidationResult};

/// Validate a batch of candidates in parallel, preserving input order.
pub fn validate_batch(
    orchestrator: &ValidationOrchestrator,
    candidates: &[Candidate],
    baseline: &BaselineMetrics,
    corpus: &CorpusSnapshot,
    frame: &MarketFrame,
) -> Vec<ValidationResult> {
    candidates
        .par_iter()
        .map(|candidate| orchestrator.validate(candidate, baseline, corpus, frame))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use alphagate_core::SecurityPolicy;

    #[test]
    fn results_preserve_input_order() {
        let orchestrator =
            ValidationOrchestrator::new(SecurityPolicy::default(), GateConfig::default());
        let frame = MarketFrame::synthetic(5, 252);
        let candidates = vec![
            Candidate::new("import os\nsignal = data[\"close\"]", "momentum with a lag"),
            Candidate::new("signal = = close", "broken on purpose for ordering"),
            Candidate::new(
                "signal = data[\"close\"].shift(-1)",
                "uses tomorrow, should fail layer two",
            ),
        ];
        let results = validate_batch(
            &orchestrator,
            &candidates,
            &BaselineMetrics::default(),
            &CorpusSnapshot::default(),
            &frame,
        );
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].failed_layer, Some(1));
        assert_eq!(results[1].failed_layer, Some(1));
        assert_eq!(results[2].failed_layer, Some(2));
    }

    #[test]
    fn batch_matches_sequential_validation() {
        let orchestrator =
            ValidationOrchestrator::new(SecurityPolicy::default(), GateConfig::default());
        let frame = MarketFrame::synthetic(5, 252);
        let baseline = BaselineMetrics::default();
        let corpus = CorpusSnapshot::default();
        let candidate = Candidate::new(
            "signal = data[\"close\"].shift(-2)",
            "deliberately biased momentum",
        );
        let batch = validate_batch(&orchestrator, &[candidate.clone()], &baseline, &corpus, &frame);
        let single = orchestrator.validate(&candidate, &baseline, &corpus, &frame);
        assert_eq!(batch[0].failed_layer, single.failed_layer);
        assert_eq!(batch[0].error, single.error);
    }
}
