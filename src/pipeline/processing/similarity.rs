//! Multi-metric fuzzy string similarity.
//!
//! Four complementary scores are computed over canonicalized text and the best
//! one wins. Name variants differ by word order, abbreviation and extra words,
//! and a single metric misses some of each.

use std::collections::BTreeSet;

use super::text;

/// Similarity of two raw strings in `[0, 1]`. Both sides are canonicalized
/// first; if either is empty afterwards the result is `0.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    similarity_canonical(&text::normalize(a), &text::normalize(b))
}

/// Same as [`similarity`] for strings that are already canonical.
pub fn similarity_canonical(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let best = [
        ratio(a, b),
        partial_ratio(a, b),
        token_sort_ratio(a, b),
        token_set_ratio(a, b),
    ]
    .into_iter()
    .fold(0.0_f64, f64::max);

    best.clamp(0.0, 1.0)
}

/// Indel edit-distance ratio: `2 * LCS / (|a| + |b|)`
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    2.0 * lcs_len(a, b) as f64 / total as f64
}

/// Longest common subsequence length, two-row dynamic programming
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Best [`ratio`] of the shorter string against every same-length window of the longer one
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0.0;
    }

    let mut best = 0.0_f64;
    for start in 0..=(long.len() - short.len()) {
        let score = ratio_chars(&short, &long[start..start + short.len()]);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    best
}

/// [`ratio`] after sorting whitespace-separated tokens
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Token-set ratio: compares the shared tokens against each side's full token
/// set, so repeated or extra words on one side are tolerated.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection = join(set_a.intersection(&set_b));
    let diff_ab = join(set_a.difference(&set_b));
    let diff_ba = join(set_b.difference(&set_a));

    let combined_ab = concat(&intersection, &diff_ab);
    let combined_ba = concat(&intersection, &diff_ba);

    [
        ratio(&intersection, &combined_ab),
        ratio(&intersection, &combined_ba),
        ratio(&combined_ab, &combined_ba),
    ]
    .into_iter()
    .fold(0.0_f64, f64::max)
}

fn join<'s, 't: 's>(tokens: impl Iterator<Item = &'s &'t str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

fn concat(head: &str, tail: &str) -> String {
    format!("{} {}", head, tail).trim().to_string()
}
