//! Property tests for the syntax and similarity primitives.
//!
//! Uses proptest to verify:
//! 1. The lexer and parser never panic, whatever bytes arrive
//! 2. Similarity is bounded, reflexive, and symmetric
//! 3. Normalization is deterministic and invariant under binding renames

use proptest::prelude::*;

use alphagate_core::normalize::normalize_source;
use alphagate_core::similarity::similarity_ratio;
use alphagate_core::syntax::{parse, tokenize};

// ── Strategies (proptest) ────────────────────────────────────────────

const KEYWORDS: &[&str] = &[
    "import", "from", "as", "while", "for", "in", "if", "elif", "else", "break", "continue",
    "return", "lambda", "and", "or", "not", "def",
];

fn arb_identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("not a keyword", |s| !KEYWORDS.contains(&s.as_str()))
}

fn arb_factor_source() -> impl Strategy<Value = String> {
    (arb_identifier(), 1u32..60, 1u32..60).prop_map(|(name, a, b)| {
        format!(
            "{name} = data[\"close\"] / data[\"close\"].shift({a}) - 1\nsignal = {name}.rolling({b}).mean()\n"
        )
    })
}

// ── 1. No panics ─────────────────────────────────────────────────────

proptest! {
    /// The lexer must return Ok or a structured error for any input.
    #[test]
    fn lexer_never_panics(input in ".{0,200}") {
        let _ = tokenize(&input);
    }

    /// The parser must return Ok or a structured error for any input.
    #[test]
    fn parser_never_panics(input in ".{0,200}") {
        let _ = parse(&input);
    }

    /// Well-formed factor pipelines always parse.
    #[test]
    fn generated_factors_parse(src in arb_factor_source()) {
        prop_assert!(parse(&src).is_ok());
    }
}

// ── 2. Similarity bounds ─────────────────────────────────────────────

proptest! {
    #[test]
    fn similarity_is_bounded(a in ".{0,80}", b in ".{0,80}") {
        let r = similarity_ratio(&a, &b);
        prop_assert!((0.0..=1.0).contains(&r), "ratio {r} out of bounds");
    }

    #[test]
    fn similarity_is_reflexive(a in ".{1,80}") {
        let r = similarity_ratio(&a, &a);
        prop_assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn similarity_is_symmetric(a in ".{0,60}", b in ".{0,60}") {
        let ab = similarity_ratio(&a, &b);
        let ba = similarity_ratio(&b, &a);
        prop_assert!((ab - ba).abs() < 1e-12);
    }
}

// ── 3. Normalization invariants ──────────────────────────────────────

proptest! {
    /// Normalizing the same source twice yields the same hash.
    #[test]
    fn normalization_is_deterministic(src in arb_factor_source()) {
        let h1 = normalize_source(&src).unwrap().hash();
        let h2 = normalize_source(&src).unwrap().hash();
        prop_assert_eq!(h1, h2);
    }

    /// Renaming every local binding does not change the canonical form.
    #[test]
    fn normalization_ignores_binding_names(
        (a, b) in (arb_identifier(), arb_identifier()),
        lag in 1u32..30,
    ) {
        prop_assume!(a != "data" && b != "data" && a != "signal" && b != "signal");
        let src_a = format!("{a} = data[\"close\"].pct_change({lag})\nsignal = -{a}\n");
        let src_b = format!("{b} = data[\"close\"].pct_change({lag})\nsignal = -{b}\n");
        let h_a = normalize_source(&src_a).unwrap().hash();
        let h_b = normalize_source(&src_b).unwrap().hash();
        prop_assert_eq!(h_a, h_b);
    }
}
