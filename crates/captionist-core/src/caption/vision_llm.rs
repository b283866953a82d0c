//! Captioning through a vision-capable LLM.

use std::sync::Arc;

use async_trait::async_trait;

use super::CaptionModel;
use crate::error::PipelineError;
use crate::llm::{ImageInput, LlmProvider, LlmRequest};
use crate::pipeline::decode::format_to_string;
use crate::pipeline::DecodedImage;

/// Caption model that sends the image to an [`LlmProvider`].
pub struct LlmCaptioner {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmCaptioner {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String) -> Self {
        Self { provider, model }
    }
}

#[async_trait]
impl CaptionModel for LlmCaptioner {
    fn name(&self) -> &str {
        &self.model
    }

    async fn caption(&self, image: &DecodedImage, max_tokens: u32) -> Result<String, PipelineError> {
        let input = ImageInput::from_bytes(&image.bytes, &format_to_string(image.format));
        let request = LlmRequest::describe_image(input, max_tokens);

        let timeout = self.provider.timeout();
        let response = match tokio::time::timeout(timeout, self.provider.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                stage: "caption".to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        // Captioning has no retry; any provider failure fails the request.
        response
            .map(|r| r.text)
            .map_err(|e| PipelineError::Caption {
                message: format!("{} via {}: {e}", self.model, self.provider.name()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmResponse;
    use image::{DynamicImage, ImageFormat};
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingProvider {
        reply: Result<String, u16>,
        seen: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn is_available(&self) -> Result<(), String> {
            Ok(())
        }

        async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(LlmResponse {
                    text: text.clone(),
                    model: "vision".to_string(),
                    tokens_used: None,
                    latency_ms: 1,
                }),
                Err(code) => Err(PipelineError::Llm {
                    message: format!("HTTP {code}"),
                    status_code: Some(*code),
                }),
            }
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }
    }

    fn decoded() -> DecodedImage {
        DecodedImage {
            image: DynamicImage::new_rgb8(2, 2),
            format: ImageFormat::Png,
            width: 2,
            height: 2,
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[tokio::test]
    async fn test_caption_sends_image_and_cap() {
        let provider = Arc::new(RecordingProvider {
            reply: Ok("a cat on a windowsill".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let captioner = LlmCaptioner::new(provider.clone(), "vision".to_string());

        let caption = captioner.caption(&decoded(), 25).await.unwrap();
        assert_eq!(caption, "a cat on a windowsill");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].max_tokens, 25);
        let image = seen[0].image.as_ref().unwrap();
        assert_eq!(image.media_type, "image/png");
    }

    #[tokio::test]
    async fn test_provider_error_is_caption_error() {
        let provider = Arc::new(RecordingProvider {
            reply: Err(500),
            seen: Mutex::new(Vec::new()),
        });
        let captioner = LlmCaptioner::new(provider, "vision".to_string());

        let err = captioner.caption(&decoded(), 25).await.unwrap_err();
        assert!(matches!(err, PipelineError::Caption { .. }));
        assert!(!err.is_rephrase_error());
    }
}
