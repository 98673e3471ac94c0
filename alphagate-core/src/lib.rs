//! AlphaGate Core — candidate model, factor-language syntax, security policy,
//! bounded evaluation, and similarity primitives.
//!
//! This crate contains everything the gate layers build on:
//! - Candidate/baseline/corpus value types
//! - Lexer, tagged AST, and parser for the factor language
//! - Immutable `SecurityPolicy` (import/builtin/attribute rules)
//! - Step-bounded evaluator producing signal series from market data
//! - Textual similarity and structural normalization for duplicate detection
//! - Synthetic `MarketFrame` generation for tests and the CLI

pub mod candidate;
pub mod eval;
pub mod market;
pub mod normalize;
pub mod policy;
pub mod similarity;
pub mod syntax;

pub use candidate::{BaselineMetrics, Candidate, CorpusEntry, CorpusSnapshot, FactorCategory};
pub use eval::{evaluate, EvalError, EvalOutput};
pub use market::MarketFrame;
pub use normalize::{normalize, normalize_source, FormHash, NormalForm};
pub use policy::{PolicyError, SecurityPolicy};
pub use similarity::similarity_ratio;
pub use syntax::{parse, ParseError, Program};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn candidate_types_are_send_sync() {
        assert_send::<Candidate>();
        assert_sync::<Candidate>();
        assert_send::<BaselineMetrics>();
        assert_sync::<BaselineMetrics>();
        assert_send::<CorpusSnapshot>();
        assert_sync::<CorpusSnapshot>();
    }

    #[test]
    fn syntax_types_are_send_sync() {
        assert_send::<Program>();
        assert_sync::<Program>();
        assert_send::<ParseError>();
        assert_sync::<ParseError>();
    }

    #[test]
    fn policy_is_send_sync() {
        assert_send::<SecurityPolicy>();
        assert_sync::<SecurityPolicy>();
    }

    #[test]
    fn market_frame_is_send_sync() {
        assert_send::<MarketFrame>();
        assert_sync::<MarketFrame>();
    }

    #[test]
    fn eval_output_is_send_sync() {
        assert_send::<EvalOutput>();
        assert_sync::<EvalOutput>();
        assert_send::<EvalError>();
        assert_sync::<EvalError>();
    }
}
