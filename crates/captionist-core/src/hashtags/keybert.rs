//! Embedding-based key phrase ranking.
//!
//! Candidates are scored by cosine similarity between their embedding and the
//! embedding of the whole text, the same way KeyBERT ranks keywords.

use super::candidates::candidate_phrases;
use crate::error::PipelineError;
use crate::math::cosine_similarity;
use crate::types::KeyPhrase;

/// Turns a batch of strings into sentence embeddings.
pub trait TextEmbedder: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// Extracts the `k` phrases most relevant to a text.
pub trait KeyPhraseExtractor: Send + Sync {
    /// Returns at most `k` phrases, best first. Never padded.
    fn extract_key_phrases(&self, text: &str, k: usize) -> Result<Vec<KeyPhrase>, PipelineError>;
}

/// Round a score to 4 decimal places.
fn round_score(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

/// [`KeyPhraseExtractor`] backed by any [`TextEmbedder`].
pub struct EmbeddingKeyPhraseExtractor<E> {
    embedder: E,
    max_ngram: usize,
}

impl<E: TextEmbedder> EmbeddingKeyPhraseExtractor<E> {
    pub fn new(embedder: E, max_ngram: usize) -> Self {
        Self {
            embedder,
            max_ngram,
        }
    }
}

impl<E: TextEmbedder> KeyPhraseExtractor for EmbeddingKeyPhraseExtractor<E> {
    fn extract_key_phrases(&self, text: &str, k: usize) -> Result<Vec<KeyPhrase>, PipelineError> {
        let candidates = candidate_phrases(text, self.max_ngram);
        if candidates.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        // Document first, then every candidate, in one batch.
        let mut batch = Vec::with_capacity(candidates.len() + 1);
        batch.push(text.to_string());
        batch.extend(candidates.iter().cloned());

        let embeddings = self.embedder.embed_batch(&batch)?;
        if embeddings.len() != batch.len() {
            return Err(PipelineError::Hashtag {
                message: format!(
                    "Encoder returned {} embeddings for {} inputs",
                    embeddings.len(),
                    batch.len()
                ),
            });
        }

        let doc = &embeddings[0];
        let mut scored: Vec<KeyPhrase> = candidates
            .into_iter()
            .zip(&embeddings[1..])
            .map(|(phrase, emb)| KeyPhrase::new(phrase, round_score(cosine_similarity(doc, emb))))
            .collect();

        // Stable sort keeps lexicographic order among equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds known strings to fixed vectors; anything else maps to `[1, 0]`.
    struct FakeEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new(pairs: &[(&str, [f32; 2])]) -> Self {
            Self {
                vectors: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextEmbedder for FakeEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![1.0, 0.0]))
                .collect())
        }
    }

    struct BrokenEmbedder;

    impl TextEmbedder for BrokenEmbedder {
        fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
            Ok(vec![vec![1.0]])
        }
    }

    const CAPTION: &str = "a cat sitting on a windowsill";

    fn extractor() -> EmbeddingKeyPhraseExtractor<FakeEmbedder> {
        EmbeddingKeyPhraseExtractor::new(
            FakeEmbedder::new(&[
                (CAPTION, [1.0, 0.0]),
                ("windowsill", [0.9, 0.1]),
                ("cat", [0.8, 0.6]),
                ("cat sitting", [0.6, 0.8]),
                ("sitting", [0.0, 1.0]),
                ("sitting windowsill", [0.6, 0.8]),
            ]),
            2,
        )
    }

    #[test]
    fn test_ranked_by_similarity() {
        let phrases = extractor().extract_key_phrases(CAPTION, 3).unwrap();
        let names: Vec<&str> = phrases.iter().map(|p| p.phrase.as_str()).collect();
        assert_eq!(names, vec!["windowsill", "cat", "cat sitting"]);
        assert_eq!(phrases[1].score, 0.8);
    }

    #[test]
    fn test_ties_keep_lexicographic_order() {
        let phrases = extractor().extract_key_phrases(CAPTION, 5).unwrap();
        let pos = |name: &str| phrases.iter().position(|p| p.phrase == name).unwrap();
        assert!(pos("cat sitting") < pos("sitting windowsill"));
        assert_eq!(phrases.last().unwrap().phrase, "sitting");
    }

    #[test]
    fn test_never_padded() {
        let phrases = extractor().extract_key_phrases(CAPTION, 50).unwrap();
        assert_eq!(phrases.len(), 5);
    }

    #[test]
    fn test_scores_rounded_to_four_decimals() {
        let phrases = extractor().extract_key_phrases(CAPTION, 1).unwrap();
        let score = phrases[0].score;
        assert_eq!(score, round_score(score));
        assert!((score - 0.9939).abs() < 1e-6);
    }

    #[test]
    fn test_no_candidates_skips_encoder() {
        let ex = extractor();
        assert!(ex.extract_key_phrases("the of and", 3).unwrap().is_empty());
        assert_eq!(ex.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_deterministic_across_calls() {
        let ex = extractor();
        let first = ex.extract_key_phrases(CAPTION, 4).unwrap();
        let second = ex.extract_key_phrases(CAPTION, 4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_embedding_count_mismatch_is_error() {
        let ex = EmbeddingKeyPhraseExtractor::new(BrokenEmbedder, 2);
        let err = ex.extract_key_phrases(CAPTION, 3).unwrap_err();
        assert!(matches!(err, PipelineError::Hashtag { .. }));
    }
}
