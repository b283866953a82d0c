//! LLM provider trait and request/response types.
//!
//! Defines the interface that all text-generation backends implement, plus
//! the factory that builds the configured backend at startup.

use crate::config::{LimitsConfig, LlmConfig};
use crate::error::{ConfigError, PipelineError};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

/// Base64-encoded image ready to send to an LLM API.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes and format string.
    ///
    /// The format is the image format identifier (e.g., "jpeg", "png", "webp").
    pub fn from_bytes(bytes: &[u8], format: &str) -> Self {
        let media_type = match format {
            "jpeg" | "jpg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "tiff" => "image/tiff",
            other => {
                tracing::warn!("Unknown image format '{other}', defaulting to image/jpeg");
                "image/jpeg"
            }
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// A single stateless generation request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Text prompt, sent as one user message
    pub prompt: String,
    /// Optional image for vision-capable models
    pub image: Option<ImageInput>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl LlmRequest {
    /// Text-only request.
    pub fn text(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            max_tokens,
            temperature,
        }
    }

    /// Request a one-sentence caption for an image.
    pub fn describe_image(image: ImageInput, max_tokens: u32) -> Self {
        Self {
            prompt: "Write a short, literal one-sentence caption for this image. \
                     Reply with the caption only."
                .to_string(),
            image: Some(image),
            max_tokens,
            temperature: 0.2,
        }
    }
}

/// The response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Arc<dyn LlmProvider>` for dynamic dispatch).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging (e.g., "groq", "ollama").
    fn name(&self) -> &str;

    /// Check that the provider is reachable and accepts our credentials.
    async fn is_available(&self) -> Result<(), String>;

    /// Run one generation request.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError>;

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// Map a transport failure (no HTTP response) to a pipeline error.
pub(crate) fn send_error(provider: &str, timeout: Duration, e: reqwest::Error) -> PipelineError {
    if e.is_timeout() {
        PipelineError::Timeout {
            stage: format!("{provider} request"),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        PipelineError::LlmConnection {
            provider: provider.to_string(),
            message: e.to_string(),
        }
    }
}

/// Error for a non-2xx reply. The body is kept because services explain
/// rejected keys and unknown models there.
pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> PipelineError {
    PipelineError::Llm {
        message: format!("{provider} HTTP {status}: {}", body.trim()),
        status_code: Some(status),
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Name of the variable in a `${VAR}` reference, or the raw value.
fn credential_hint(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        value[2..value.len() - 1].to_string()
    } else {
        "an api_key in the config".to_string()
    }
}

fn require_key(provider: &str, api_key: &str) -> Result<String, ConfigError> {
    resolve_env_var(api_key).ok_or_else(|| ConfigError::MissingCredential {
        provider: provider.to_string(),
        hint: credential_hint(api_key),
    })
}

/// Factory that creates the configured provider.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create the provider named by `config.provider`.
    ///
    /// Credentials are resolved here, so a missing key fails at startup
    /// rather than on the first rephrase.
    pub fn create(
        config: &LlmConfig,
        limits: &LimitsConfig,
    ) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        let timeout = Duration::from_millis(limits.llm_timeout_ms);

        match config.provider.as_str() {
            "groq" => {
                let cfg = config.groq.clone().unwrap_or_default();
                let api_key = require_key("groq", &cfg.api_key)?;
                Ok(Arc::new(super::openai::OpenAiProvider::new(
                    "groq",
                    &cfg.endpoint,
                    &api_key,
                    &config.model,
                    timeout,
                )))
            }
            "openai" => {
                let cfg = config.openai.clone().unwrap_or_default();
                let api_key = require_key("openai", &cfg.api_key)?;
                Ok(Arc::new(super::openai::OpenAiProvider::new(
                    "openai",
                    &cfg.endpoint,
                    &api_key,
                    &config.model,
                    timeout,
                )))
            }
            "ollama" => {
                let cfg = config.ollama.clone().unwrap_or_default();
                Ok(Arc::new(super::ollama::OllamaProvider::new(
                    &cfg.endpoint,
                    &config.model,
                    timeout,
                )))
            }
            other => Err(ConfigError::ValidationError(format!(
                "Unknown LLM provider: {other} (expected groq, openai or ollama)"
            ))),
        }
    }

    /// Create the provider and verify it is reachable.
    pub async fn create_checked(
        config: &LlmConfig,
        limits: &LimitsConfig,
    ) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        let provider = Self::create(config, limits)?;
        provider
            .is_available()
            .await
            .map_err(|message| ConfigError::ProviderUnavailable {
                provider: provider.name().to_string(),
                message,
            })?;
        tracing::info!("LLM provider {} ready (model: {})", provider.name(), config.model);
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroqConfig, OllamaConfig, OpenAiConfig};

    #[test]
    fn test_image_input_from_bytes_jpeg() {
        let input = ImageInput::from_bytes(&[0xFF, 0xD8, 0xFF], "jpeg");
        assert_eq!(input.media_type, "image/jpeg");
        assert!(!input.data.is_empty());
    }

    #[test]
    fn test_image_input_data_url() {
        let input = ImageInput::from_bytes(&[1, 2, 3], "png");
        assert!(input.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_text_request_has_no_image() {
        let request = LlmRequest::text("hello", 50, 0.7);
        assert!(request.image.is_none());
        assert_eq!(request.max_tokens, 50);
    }

    #[test]
    fn test_describe_image_carries_cap() {
        let image = ImageInput::from_bytes(&[1, 2, 3], "jpeg");
        let request = LlmRequest::describe_image(image, 30);
        assert!(request.image.is_some());
        assert_eq!(request.max_tokens, 30);
        assert!(request.prompt.contains("caption"));
    }

    #[test]
    fn test_resolve_env_var() {
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        assert_eq!(resolve_env_var(""), None);
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_factory_missing_groq_key() {
        let config = LlmConfig {
            groq: Some(GroqConfig {
                api_key: "${CAPTIONIST_TEST_UNSET_GROQ_KEY}".to_string(),
                ..GroqConfig::default()
            }),
            ..LlmConfig::default()
        };
        let err = LlmProviderFactory::create(&config, &LimitsConfig::default())
            .err()
            .unwrap();
        match err {
            ConfigError::MissingCredential { provider, hint } => {
                assert_eq!(provider, "groq");
                assert_eq!(hint, "CAPTIONIST_TEST_UNSET_GROQ_KEY");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_factory_literal_key() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            openai: Some(OpenAiConfig {
                api_key: "sk-literal".to_string(),
                ..OpenAiConfig::default()
            }),
            ..LlmConfig::default()
        };
        let provider = LlmProviderFactory::create(&config, &LimitsConfig::default()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.timeout(), Duration::from_millis(60_000));
    }

    #[test]
    fn test_factory_ollama_needs_no_key() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            ..LlmConfig::default()
        };
        let provider = LlmProviderFactory::create(&config, &LimitsConfig::default()).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_factory_unknown_provider() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        assert!(LlmProviderFactory::create(&config, &LimitsConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_create_checked_unreachable_provider_is_fatal() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            ollama: Some(OllamaConfig {
                endpoint: "http://127.0.0.1:9".to_string(),
            }),
            ..LlmConfig::default()
        };
        let err = LlmProviderFactory::create_checked(&config, &LimitsConfig::default())
            .await
            .err()
            .unwrap();
        match err {
            ConfigError::ProviderUnavailable { provider, message } => {
                assert_eq!(provider, "ollama");
                assert!(message.contains("127.0.0.1:9"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_create_checked_reports_missing_key_before_network() {
        let config = LlmConfig {
            openai: Some(OpenAiConfig {
                api_key: "${CAPTIONIST_TEST_UNSET_OPENAI_KEY}".to_string(),
                endpoint: "http://127.0.0.1:9/v1".to_string(),
            }),
            provider: "openai".to_string(),
            ..LlmConfig::default()
        };
        let err = LlmProviderFactory::create_checked(&config, &LimitsConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
    }

    #[test]
    fn test_status_error_is_llm_with_code() {
        let err = status_error("groq", 503, " overloaded \n");
        assert!(matches!(err, PipelineError::Llm { status_code: Some(503), .. }));
        assert_eq!(err.to_string(), "LLM error: groq HTTP 503: overloaded");
    }
}
