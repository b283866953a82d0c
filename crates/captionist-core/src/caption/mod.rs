//! Image captioning.
//!
//! A [`CaptionModel`] turns a decoded image into one caption string. Two
//! backends exist: a local ONNX encoder-decoder (the default) and a
//! vision-capable LLM reached over HTTP.

mod onnx;
pub mod preprocess;
mod vision_llm;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{CaptionBackend, Config};
use crate::error::{PipelineError, PipelineResult, Result};
use crate::llm::LlmProviderFactory;
use crate::pipeline::DecodedImage;

pub use onnx::{EncoderDecoderSession, OnnxCaptioner};
pub use vision_llm::LlmCaptioner;

/// A model that describes an image in one sentence.
///
/// Implementations load their weights once and are shared read-only
/// across requests.
#[async_trait]
pub trait CaptionModel: Send + Sync {
    /// Model identifier for logs and output.
    fn name(&self) -> &str;

    /// Generate a caption of at most `max_tokens` tokens.
    async fn caption(&self, image: &DecodedImage, max_tokens: u32) -> PipelineResult<String>;
}

/// Build the caption model selected by `caption.backend`.
///
/// Called once at startup; a missing model or provider is fatal.
pub async fn load_caption_model(config: &Config, model_dir: &Path) -> Result<Arc<dyn CaptionModel>> {
    match config.caption.backend {
        CaptionBackend::Onnx => {
            let caption_config = config.caption.clone();
            let dir = model_dir.to_path_buf();
            let captioner =
                tokio::task::spawn_blocking(move || OnnxCaptioner::load(&caption_config, &dir))
                    .await
                    .map_err(|e| PipelineError::Model {
                        message: format!("Model load task failed: {e}"),
                    })??;
            Ok(Arc::new(captioner))
        }
        CaptionBackend::Llm => {
            // Same provider settings as the rephraser, but caption.model names the vision model.
            let mut llm = config.llm.clone();
            llm.model = config.caption.model.clone();
            let provider = LlmProviderFactory::create_checked(&llm, &config.limits).await?;
            Ok(Arc::new(LlmCaptioner::new(provider, llm.model)))
        }
    }
}
