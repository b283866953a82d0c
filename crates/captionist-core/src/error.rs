//! Error types for the Captionist pipeline.
//!
//! Errors are split by when they can happen: configuration problems are fatal
//! at startup, pipeline errors are scoped to a single request. Pipeline errors
//! fall into three families (input, inference, rephrase) so callers can tell
//! an unreadable upload apart from a model failure or a flaky LLM service.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Captionist operations.
#[derive(Error, Debug)]
pub enum CaptionistError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors. All of these halt the process at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No config file at the expected location
    #[error("Config file not found at {0}. Run `captionist config init` to create one.")]
    NotFound(PathBuf),

    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration (includes missing required keys)
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A credential required by the selected LLM provider is not set
    #[error("Missing credential for {provider}: set {hint}")]
    MissingCredential { provider: String, hint: String },

    /// The selected LLM provider rejected the credential or is unreachable
    #[error("LLM provider {provider} is not available: {message}")]
    ProviderUnavailable { provider: String, message: String },
}

/// Per-request pipeline errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    // --- Input errors ---
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    // --- Inference errors ---
    /// Model files missing or failed to load
    #[error("Model error: {message}")]
    Model { message: String },

    /// Caption generation failed
    #[error("Caption generation failed: {message}")]
    Caption { message: String },

    /// Hashtag extraction failed
    #[error("Hashtag extraction failed: {message}")]
    Hashtag { message: String },

    // --- Rephrase errors ---
    /// LLM call failed
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        status_code: Option<u16>,
    },

    /// The request never got an HTTP response (refused, DNS, TLS, socket timeout)
    #[error("Could not reach {provider}: {message}")]
    LlmConnection { provider: String, message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// Tone is not in the configured list
    #[error("Unknown tone '{tone}'. Available tones: {available}")]
    UnknownTone { tone: String, available: String },

    /// Rephrasing was requested for an empty caption
    #[error("Cannot rephrase an empty caption")]
    EmptyCaption,

    /// Session rephrase requested before any image was captioned
    #[error("No image loaded in this session")]
    NoImageLoaded,
}

impl PipelineError {
    /// True for errors caused by the input image rather than a model or service.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PipelineError::FileNotFound(_)
                | PipelineError::Decode { .. }
                | PipelineError::FileTooLarge { .. }
                | PipelineError::ImageTooLarge { .. }
                | PipelineError::UnsupportedFormat { .. }
        )
    }

    /// True for errors raised by the rephrase path. These are recoverable:
    /// the user may retry without invalidating the caption or hashtags.
    pub fn is_rephrase_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Llm { .. }
                | PipelineError::LlmConnection { .. }
                | PipelineError::Timeout { .. }
                | PipelineError::UnknownTone { .. }
                | PipelineError::EmptyCaption
                | PipelineError::NoImageLoaded
        )
    }

    /// True when sending the same LLM request again may succeed.
    ///
    /// Rate limits (429) and server errors (5xx) are transient, as are lost
    /// connections and timeouts. Any other status means the request or the
    /// credential is wrong, and tone or caption errors never reach the service.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::LlmConnection { .. } | PipelineError::Timeout { .. } => true,
            PipelineError::Llm {
                status_code: Some(code),
                ..
            } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

/// Convenience type alias for Captionist results.
pub type Result<T> = std::result::Result<T, CaptionistError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_classified() {
        let err = PipelineError::Decode {
            path: PathBuf::from("cat.jpg"),
            message: "corrupt".to_string(),
        };
        assert!(err.is_input_error());
        assert!(!err.is_rephrase_error());
        assert!(PipelineError::FileNotFound(PathBuf::from("x.png")).is_input_error());
    }

    #[test]
    fn test_inference_errors_are_neither_input_nor_rephrase() {
        let err = PipelineError::Caption {
            message: "onnx failed".to_string(),
        };
        assert!(!err.is_input_error());
        assert!(!err.is_rephrase_error());
    }

    #[test]
    fn test_rephrase_errors_are_classified() {
        let err = PipelineError::Llm {
            message: "HTTP 401".to_string(),
            status_code: Some(401),
        };
        assert!(err.is_rephrase_error());
        assert!(PipelineError::EmptyCaption.is_rephrase_error());
    }

    #[test]
    fn test_transient_llm_errors() {
        let llm = |code| PipelineError::Llm {
            message: "groq HTTP error".to_string(),
            status_code: code,
        };
        assert!(llm(Some(429)).is_transient());
        assert!(llm(Some(503)).is_transient());
        assert!(!llm(Some(401)).is_transient());
        assert!(!llm(Some(400)).is_transient());
        // Body parse failures carry no status and are not retried.
        assert!(!llm(None).is_transient());

        let lost = PipelineError::LlmConnection {
            provider: "ollama".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(lost.is_transient());
        assert!(lost.is_rephrase_error());
        assert!(PipelineError::Timeout {
            stage: "rephrase".to_string(),
            timeout_ms: 10,
        }
        .is_transient());
    }

    #[test]
    fn test_tone_and_caption_errors_are_not_transient() {
        let err = PipelineError::UnknownTone {
            tone: "grumpy".to_string(),
            available: "funny".to_string(),
        };
        assert!(!err.is_transient());
        assert!(!PipelineError::EmptyCaption.is_transient());
        assert!(!PipelineError::NoImageLoaded.is_transient());
    }

    #[test]
    fn test_error_messages_carry_cause() {
        let err = PipelineError::UnknownTone {
            tone: "sarcastic".to_string(),
            available: "funny, formal".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sarcastic"));
        assert!(msg.contains("funny, formal"));

        let err = ConfigError::MissingCredential {
            provider: "groq".to_string(),
            hint: "GROQ_API_KEY".to_string(),
        };
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }
}
