//! Fuzzy string comparison used to re-identify a target after re-tokenization.

/// Length-weighted edit similarity in `[0, 1]`.
///
/// Only insertions and deletions count as edits, so the ratio equals
/// `2 * lcs(a, b) / (|a| + |b|)` measured in chars. Two empty strings are
/// identical; an empty string is unlike any non-empty one.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    2.0 * longest_common_subsequence(&a, &b) as f64 / total as f64
}

/// True when `ratio(a, b)` reaches `threshold`.
pub fn similar(a: &str, b: &str, threshold: f64) -> bool {
    ratio(a, b) >= threshold
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    // Two rolling rows over `b`.
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
