//! Sørensen–Dice similarity over character bigrams.
//!
//! Whitespace is ignored entirely, so `"what is dowry"` and `"whatisdowry"` compare equal.
//! Bigrams are counted as a multiset: a repeated bigram in one string only matches as
//! many times as it occurs in the other.

use std::collections::HashMap;

/// Similarity in `[0, 1]`. Symmetric; identical inputs (after whitespace removal) score 1.0.
pub fn compare(first: &str, second: &str) -> f64 {
    let first: Vec<char> = first.chars().filter(|c| !c.is_whitespace()).collect();
    let second: Vec<char> = second.chars().filter(|c| !c.is_whitespace()).collect();

    if first == second {
        return 1.0;
    }
    if first.len() < 2 || second.len() < 2 {
        return 0.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::with_capacity(first.len());
    for pair in first.windows(2) {
        *bigrams.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    let mut common = 0usize;
    for pair in second.windows(2) {
        if let Some(count) = bigrams.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }

    (2 * common) as f64 / (first.len() + second.len() - 2) as f64
}

/// Index and score of the best candidate. Ties keep the earliest candidate.
/// Returns `None` only when `candidates` is empty.
pub fn best_match<'a, I>(target: &str, candidates: I) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.into_iter().enumerate() {
        let score = compare(target, candidate);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    best
}
