//! Hashtag extraction from captions.
//!
//! A [`KeyPhraseExtractor`] ranks phrases from the caption text; the
//! [`HashtagGenerator`] turns the top phrases into `#tags`. The shipped
//! extractor embeds the caption and its candidate n-grams with an ONNX
//! sentence encoder and ranks candidates by cosine similarity.

mod candidates;
mod encoder;
mod keybert;
mod stopwords;

use std::path::Path;
use std::sync::Arc;

use crate::config::HashtagConfig;
use crate::error::PipelineError;
use crate::types::Hashtag;

pub use candidates::candidate_phrases;
pub use encoder::OnnxSentenceEncoder;
pub use keybert::{EmbeddingKeyPhraseExtractor, KeyPhraseExtractor, TextEmbedder};
pub use stopwords::is_stop_word;

/// Turns a caption into at most `top_k` hashtags.
#[derive(Clone)]
pub struct HashtagGenerator {
    extractor: Arc<dyn KeyPhraseExtractor>,
    top_k: usize,
}

impl HashtagGenerator {
    pub fn new(extractor: Arc<dyn KeyPhraseExtractor>, top_k: usize) -> Self {
        Self { extractor, top_k }
    }

    /// Rank phrases from `caption` and format them as hashtags.
    ///
    /// Phrases that collapse to the same tag keep only the higher-ranked
    /// entry. The full ranking is requested so a collapsed pair does not cost
    /// a slot while lower-ranked candidates remain.
    pub fn generate_blocking(&self, caption: &str) -> Result<Vec<Hashtag>, PipelineError> {
        let phrases = self.extractor.extract_key_phrases(caption, usize::MAX)?;
        let mut tags: Vec<Hashtag> = Vec::with_capacity(self.top_k);
        for phrase in &phrases {
            if tags.len() == self.top_k {
                break;
            }
            let tag = Hashtag::from_phrase(phrase);
            if !tags.iter().any(|t| t.tag == tag.tag) {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    /// [`generate_blocking`](Self::generate_blocking) on tokio's blocking pool.
    pub async fn generate(&self, caption: &str) -> Result<Vec<Hashtag>, PipelineError> {
        let generator = self.clone();
        let caption = caption.to_string();
        tokio::task::spawn_blocking(move || generator.generate_blocking(&caption))
            .await
            .map_err(|e| PipelineError::Hashtag {
                message: format!("Hashtag task failed: {e}"),
            })?
    }
}

/// Load the sentence-encoder extractor from `{model_dir}/{config.model}`.
pub fn load_key_phrase_extractor(
    config: &HashtagConfig,
    model_dir: &Path,
) -> Result<Arc<dyn KeyPhraseExtractor>, PipelineError> {
    let dir = model_dir.join(&config.model);
    tracing::info!("Loading sentence encoder from {:?}", dir);
    let encoder = OnnxSentenceEncoder::load(&dir, config.max_sequence_length)?;
    Ok(Arc::new(EmbeddingKeyPhraseExtractor::new(
        encoder,
        config.max_ngram,
    )))
}

/// Check whether the sentence encoder files exist.
pub fn hashtag_model_exists(config: &HashtagConfig, model_dir: &Path) -> bool {
    OnnxSentenceEncoder::model_exists(&model_dir.join(&config.model))
}
