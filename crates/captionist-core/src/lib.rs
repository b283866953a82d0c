//! Captionist Core - caption images, extract hashtags, rephrase captions.
//!
//! Captionist runs a short, request-at-a-time pipeline:
//!
//! ```text
//! Image → Validate → Hash → Decode → Caption → Hashtags → ProcessedImage
//!                                                  ↘ (on demand) Rephrase(tone)
//! ```
//!
//! Models are loaded once into a [`CaptionPipeline`] and shared; the
//! [`CaptionSession`] adds per-user caching for interactive use.
//!
//! # Usage
//!
//! ```rust,ignore
//! use captionist_core::{CaptionPipeline, Config};
//!
//! #[tokio::main]
//! async fn main() -> captionist_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = CaptionPipeline::from_config(&config).await?;
//!
//!     let result = pipeline.process("./cat.jpg".as_ref()).await?;
//!     println!("{} {:?}", result.caption, result.hashtag_strings());
//!
//!     let funny = pipeline.rephrase(&result.caption, "funny").await?;
//!     println!("{}", funny.text);
//!     Ok(())
//! }
//! ```

pub mod caption;
pub mod config;
pub mod error;
pub mod hashtags;
pub mod llm;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod types;

pub use caption::CaptionModel;
pub use config::Config;
pub use error::{CaptionistError, ConfigError, PipelineError, PipelineResult, Result};
pub use hashtags::{HashtagGenerator, KeyPhraseExtractor};
pub use llm::{LlmProvider, ToneRephraser};
pub use output::{CaptionRecord, OutputFormat, OutputWriter};
pub use pipeline::{CaptionPipeline, CaptionSession};
pub use types::{Hashtag, KeyPhrase, ProcessedImage, RephrasedCaption, StageTimings};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
