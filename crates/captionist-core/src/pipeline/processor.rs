//! Pipeline orchestration: validate, hash, decode, caption, hashtags.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::caption::{load_caption_model, CaptionModel};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::hashtags::{load_key_phrase_extractor, HashtagGenerator, KeyPhraseExtractor};
use crate::llm::{LlmProviderFactory, RephraseOptions, ToneRephraser};
use crate::types::{ProcessedImage, RephrasedCaption, StageTimings};

use super::decode::{format_to_string, ImageDecoder};
use super::hash::Hasher;
use super::validate::Validator;

/// Caption, hashtag and rephrase services wired together.
///
/// Built once at startup and shared across requests. Hashtags are always
/// derived from the caption generated in the same call.
pub struct CaptionPipeline {
    captioner: Arc<dyn CaptionModel>,
    hashtags: HashtagGenerator,
    rephraser: ToneRephraser,
    decoder: ImageDecoder,
    validator: Validator,
    max_tokens: u32,
    sample_image: PathBuf,
}

impl CaptionPipeline {
    /// Assemble a pipeline from already-loaded services.
    pub fn new(
        config: &Config,
        captioner: Arc<dyn CaptionModel>,
        extractor: Arc<dyn KeyPhraseExtractor>,
        rephraser: ToneRephraser,
    ) -> Self {
        Self {
            captioner,
            hashtags: HashtagGenerator::new(extractor, config.hashtags.top_k),
            rephraser,
            decoder: ImageDecoder::new(config.limits.clone()),
            validator: Validator::new(config.limits.clone()),
            max_tokens: config.caption.max_tokens,
            sample_image: config.sample_image(),
        }
    }

    /// Load every model and provider named in `config`.
    ///
    /// Any failure here (missing model files, missing credentials,
    /// unreachable provider) is fatal.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let model_dir = config.model_dir();

        let captioner = load_caption_model(config, &model_dir).await?;

        let hashtag_config = config.hashtags.clone();
        let dir = model_dir.clone();
        let extractor =
            tokio::task::spawn_blocking(move || load_key_phrase_extractor(&hashtag_config, &dir))
                .await
                .map_err(|e| PipelineError::Model {
                    message: format!("Model load task failed: {e}"),
                })??;

        let provider = LlmProviderFactory::create_checked(&config.llm, &config.limits).await?;
        let rephraser = ToneRephraser::new(
            provider,
            config.llm.tones.clone(),
            RephraseOptions::from_config(config),
        );

        tracing::info!(
            "Pipeline ready (caption: {}, rephrase: {})",
            captioner.name(),
            rephraser.provider_name()
        );

        Ok(Self::new(config, captioner, extractor, rephraser))
    }

    /// Caption an image file.
    pub async fn process(&self, path: &Path) -> Result<ProcessedImage> {
        tracing::debug!("Processing: {:?}", path);
        self.validator.validate_path(path)?;
        let bytes = tokio::fs::read(path).await?;
        self.process_validated(bytes, path).await
    }

    /// Caption an in-memory image (an upload); `name` is used for messages and output.
    pub async fn process_bytes(&self, bytes: Vec<u8>, name: &str) -> Result<ProcessedImage> {
        self.process_validated(bytes, Path::new(name)).await
    }

    async fn process_validated(&self, bytes: Vec<u8>, path: &Path) -> Result<ProcessedImage> {
        let start = Instant::now();
        self.validator.validate_bytes(&bytes, path)?;
        let content_hash = Hasher::content_hash_from_bytes(&bytes);

        let decode_start = Instant::now();
        let decoded = self.decoder.decode_from_bytes(bytes, path).await?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;
        tracing::trace!("  Decode: {}ms", decode_ms);

        let caption_start = Instant::now();
        let caption = self
            .captioner
            .caption(&decoded, self.max_tokens)
            .await?
            .trim()
            .to_string();
        if caption.is_empty() {
            return Err(PipelineError::Caption {
                message: format!("{} produced an empty caption", self.captioner.name()),
            }
            .into());
        }
        let caption_ms = caption_start.elapsed().as_millis() as u64;
        tracing::trace!("  Caption: {}ms", caption_ms);

        let hashtags_start = Instant::now();
        let hashtags = self.hashtags.generate(&caption).await?;
        let hashtags_ms = hashtags_start.elapsed().as_millis() as u64;
        tracing::trace!("  Hashtags: {}ms", hashtags_ms);

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!(
            "Processed {:?} in {:?} ({}x{}, {} hashtags)",
            file_name,
            start.elapsed(),
            decoded.width,
            decoded.height,
            hashtags.len()
        );

        Ok(ProcessedImage {
            file_name,
            content_hash,
            width: decoded.width,
            height: decoded.height,
            format: format_to_string(decoded.format),
            file_size: decoded.file_size(),
            caption,
            hashtags,
            timings: StageTimings {
                decode_ms,
                caption_ms,
                hashtags_ms,
            },
        })
    }

    /// Rewrite `caption` in `tone`. Independent of any processed image.
    pub async fn rephrase(&self, caption: &str, tone: &str) -> Result<RephrasedCaption> {
        Ok(self.rephraser.rephrase(caption, tone).await?)
    }

    /// Configured tone labels.
    pub fn tones(&self) -> &[String] {
        self.rephraser.tones()
    }

    /// Image used when no input is given.
    pub fn sample_image(&self) -> &Path {
        &self.sample_image
    }

    /// Name of the caption model in use.
    pub fn caption_model(&self) -> &str {
        self.captioner.name()
    }
}
