//! Candidate key phrases for a caption.

use std::collections::BTreeSet;

use super::stopwords::is_stop_word;

/// Split lowercase text into word tokens of at least two characters.
///
/// A token is a run of alphanumeric characters or `_`.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Build the candidate phrases for `text`.
///
/// Stop words are removed first, then n-grams for `n` in `1..=max_ngram`
/// are formed over the remaining tokens. The result is de-duplicated and
/// sorted lexicographically.
pub fn candidate_phrases(text: &str, max_ngram: usize) -> Vec<String> {
    let tokens: Vec<String> = tokenize(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .collect();

    let mut phrases = BTreeSet::new();
    for n in 1..=max_ngram.max(1) {
        for window in tokens.windows(n) {
            phrases.insert(window.join(" "));
        }
    }
    phrases.into_iter().collect()
}
