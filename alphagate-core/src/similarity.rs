//! Textual similarity — Ratcliff-Obershelp sequence matching.
//!
//! Pure function, no hidden state: `similarity_ratio` returns
//! `2 * M / (len(a) + len(b))` where M is the total length of matching
//! blocks found by recursively locating the longest common substring and
//! matching the pieces to its left and right. Identical inputs score 1.0,
//! disjoint inputs 0.0.

/// Normalized similarity between two texts, in `[0, 1]`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched = matching_total(&a, &b) as f64;
    2.0 * matched / (a.len() + b.len()) as f64
}

/// Total length of matching blocks (Ratcliff-Obershelp recursion).
fn matching_total(a: &[char], b: &[char]) -> usize {
    let (a_start, b_start, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_total(&a[..a_start], &b[..b_start])
        + matching_total(&a[a_start + len..], &b[b_start + len..])
}

/// Longest common substring via single-row dynamic programming.
/// Returns (start in a, start in b, length).
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    let mut row = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        let mut prev_diag = 0usize;
        for (j, &cb) in b.iter().enumerate() {
            let up = row[j + 1];
            if ca == cb {
                let run = prev_diag + 1;
                row[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            } else {
                row[j + 1] = 0;
            }
            prev_diag = up;
        }
    }
    best
}
