//! Per-user session state for interactive use.
//!
//! Holds the most recent [`ProcessedImage`]. Loading the same bytes again
//! returns the cached result; rephrasing always works on the cached caption.

use std::path::Path;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::types::{ProcessedImage, RephrasedCaption};

use super::hash::Hasher;
use super::processor::CaptionPipeline;

/// Session over a shared [`CaptionPipeline`].
pub struct CaptionSession {
    pipeline: Arc<CaptionPipeline>,
    current: Option<ProcessedImage>,
}

impl CaptionSession {
    pub fn new(pipeline: Arc<CaptionPipeline>) -> Self {
        Self {
            pipeline,
            current: None,
        }
    }

    /// The pipeline backing this session.
    pub fn pipeline(&self) -> &CaptionPipeline {
        &self.pipeline
    }

    /// Result for the currently loaded image, if any.
    pub fn current(&self) -> Option<&ProcessedImage> {
        self.current.as_ref()
    }

    /// Load an image file into the session.
    pub async fn load_path(&mut self, path: &Path) -> Result<&ProcessedImage> {
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::FileNotFound(path.to_path_buf()).into(),
            _ => crate::error::CaptionistError::Io(e),
        })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        self.load_bytes(bytes, &name).await
    }

    /// Load in-memory image bytes into the session.
    ///
    /// Identical bytes reuse the current result. On failure the previous
    /// result is kept.
    pub async fn load_bytes(&mut self, bytes: Vec<u8>, name: &str) -> Result<&ProcessedImage> {
        let hash = Hasher::content_hash_from_bytes(&bytes);
        let cached = matches!(&self.current, Some(current) if current.content_hash == hash);

        if cached {
            tracing::debug!("Image unchanged ({}), reusing caption", &hash[..12]);
        } else {
            let processed = self.pipeline.process_bytes(bytes, name).await?;
            self.current = Some(processed);
        }

        self.current.as_ref().ok_or_else(|| PipelineError::NoImageLoaded.into())
    }

    /// Rephrase the current caption in `tone`.
    ///
    /// Never modifies the cached caption or hashtags.
    pub async fn rephrase(&self, tone: &str) -> Result<RephrasedCaption> {
        let current = self.current.as_ref().ok_or(PipelineError::NoImageLoaded)?;
        self.pipeline.rephrase(&current.caption, tone).await
    }

    /// Forget the current image.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptionistError;
    use crate::pipeline::processor::tests::{echo_provider, pipeline_with, png_bytes, MockCaptioner};
    use std::sync::atomic::Ordering;

    fn session(captioner: Arc<MockCaptioner>, fail_status: Option<u16>) -> CaptionSession {
        CaptionSession::new(Arc::new(pipeline_with(captioner, echo_provider(fail_status))))
    }

    #[tokio::test]
    async fn test_same_bytes_hit_cache() {
        let captioner = Arc::new(MockCaptioner::new());
        let mut session = session(captioner.clone(), None);

        let first = session.load_bytes(png_bytes(6, 6), "a.png").await.unwrap().clone();
        let second = session.load_bytes(png_bytes(6, 6), "again.png").await.unwrap().clone();

        assert_eq!(captioner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.caption, second.caption);
        assert_eq!(second.file_name, "a.png");
    }

    #[tokio::test]
    async fn test_different_bytes_recompute() {
        let captioner = Arc::new(MockCaptioner::new());
        let mut session = session(captioner.clone(), None);

        session.load_bytes(png_bytes(6, 6), "a.png").await.unwrap();
        let second = session.load_bytes(png_bytes(7, 6), "b.png").await.unwrap();

        assert_eq!(second.caption, "a red square 7 pixels wide");
        assert_eq!(captioner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rephrase_without_image() {
        let session = session(Arc::new(MockCaptioner::new()), None);
        let err = session.rephrase("funny").await.unwrap_err();
        assert!(matches!(
            err,
            CaptionistError::Pipeline(PipelineError::NoImageLoaded)
        ));
    }

    #[tokio::test]
    async fn test_rephrase_uses_current_caption() {
        let mut session = session(Arc::new(MockCaptioner::new()), None);
        session.load_bytes(png_bytes(6, 6), "a.png").await.unwrap();

        let rephrased = session.rephrase("formal").await.unwrap();
        assert!(rephrased.text.contains("a red square 6 pixels wide"));
        assert_eq!(rephrased.tone, "formal");
    }

    #[tokio::test]
    async fn test_failed_rephrase_keeps_result() {
        let mut session = session(Arc::new(MockCaptioner::new()), Some(503));
        let before = session.load_bytes(png_bytes(6, 6), "a.png").await.unwrap().clone();

        let err = session.rephrase("funny").await.unwrap_err();
        assert!(matches!(err, CaptionistError::Pipeline(ref e) if e.is_rephrase_error()));

        let after = session.current().unwrap();
        assert_eq!(after.caption, before.caption);
        assert_eq!(after.hashtags, before.hashtags);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous() {
        let mut session = session(Arc::new(MockCaptioner::new()), None);
        session.load_bytes(png_bytes(6, 6), "a.png").await.unwrap();

        assert!(session.load_bytes(b"garbage!".to_vec(), "bad.jpg").await.is_err());
        assert_eq!(session.current().unwrap().file_name, "a.png");

        session.clear();
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_load_missing_path() {
        let mut session = session(Arc::new(MockCaptioner::new()), None);
        let err = session.load_path(Path::new("/nonexistent/cat.jpg")).await.unwrap_err();
        assert!(matches!(err, CaptionistError::Pipeline(ref e) if e.is_input_error()));
    }
}
