//! Layered similarity checks, cheapest first.
//!
//! Every layer either decides or passes the pair down; the character-level
//! edit distance at the bottom only runs when the word-overlap score was
//! close enough to the threshold that the verdict could still flip.

use std::collections::HashSet;

/// Decide whether two normalized messages describe the same event.
///
/// The caller supplies the pre-split word list of `msg1` so a representative
/// scanned against many candidates is only split once.
pub fn is_similar_message(msg1: &str, msg2: &str, msg1_words: &[&str], threshold: f64) -> bool {
    if msg1 == msg2 {
        return true;
    }

    let shorter = msg1.len().min(msg2.len());
    let longer = msg1.len().max(msg2.len());
    if longer == 0 {
        return true;
    }
    // Too great a length disparity to be the same templated event.
    if shorter as f64 / longer as f64 <= 0.5 {
        return false;
    }
    if msg1.contains(msg2) || msg2.contains(msg1) {
        return true;
    }

    let msg2_words: Vec<&str> = msg2.split_whitespace().collect();
    let small = msg1_words.len().min(msg2_words.len());
    let large = msg1_words.len().max(msg2_words.len());
    if large == 0 {
        return false;
    }
    // Obviously different structure; skip the expensive comparisons.
    if (small as f64) / (large as f64) < 0.5 {
        return false;
    }

    let set1: HashSet<&str> = msg1_words.iter().copied().collect();
    let set2: HashSet<&str> = msg2_words.iter().copied().collect();
    let shared = set1.intersection(&set2).count();
    let union = set1.len() + set2.len() - shared;
    if union == 0 {
        return false;
    }

    let jaccard = shared as f64 / union as f64;
    if jaccard >= threshold {
        return true;
    }

    // Close but not quite: let the edit distance arbitrate.
    if jaccard >= threshold * 0.8 {
        return string_similarity(msg1, msg2) >= threshold;
    }

    false
}

/// Character-level similarity in [0, 1]: 1 − normalized edit distance,
/// case-insensitive.
pub fn string_similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }

    let s1 = s1.to_lowercase();
    let s2 = s2.to_lowercase();

    let distance = levenshtein(&s1, &s2) as f64;
    let max_len = s1.chars().count().max(s2.chars().count()) as f64;
    if max_len == 0.0 {
        return 1.0;
    }

    1.0 - distance / max_len
}

/// Edit distance with unit-cost insertion/deletion/substitution.
///
/// Two-row dynamic programming; the shorter string sits on the row axis so
/// the working vectors stay O(min(|s1|, |s2|)).
pub fn levenshtein(s1: &str, s2: &str) -> usize {
    if s1 == s2 {
        return 0;
    }

    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let (long, short) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr: Vec<usize> = vec![0; short.len() + 1];

    for (i, &long_ch) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &short_ch) in short.iter().enumerate() {
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            let substitution = prev[j] + usize::from(long_ch != short_ch);
            curr[j + 1] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}
