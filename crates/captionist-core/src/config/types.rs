//! Sub-configuration structs.
//!
//! Sections that describe *what* the pipeline does (caption, hashtags, llm,
//! input) have required keys with no serde default: a config file that omits
//! them fails to parse. Operational sections (general, pipeline, limits,
//! logging) fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where ONNX models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.captionist/models"),
        }
    }
}

/// Which implementation generates captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptionBackend {
    /// Local ONNX vision encoder-decoder
    #[default]
    Onnx,
    /// Vision-capable model behind the configured LLM provider
    Llm,
}

/// Caption model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Model directory name under `general.model_dir` (or the LLM model for the llm backend)
    pub model: String,

    /// Hard cap on generated tokens
    pub max_tokens: u32,

    #[serde(default)]
    pub backend: CaptionBackend,

    /// Square input resolution expected by the vision encoder
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    /// Per-channel normalization mean (RGB)
    #[serde(default = "default_norm")]
    pub image_mean: [f32; 3],

    /// Per-channel normalization std (RGB)
    #[serde(default = "default_norm")]
    pub image_std: [f32; 3],

    /// First token fed to the decoder
    #[serde(default = "default_gpt2_special_token")]
    pub decoder_start_token_id: i64,

    /// Token that ends generation
    #[serde(default = "default_gpt2_special_token")]
    pub eos_token_id: i64,
}

fn default_image_size() -> u32 {
    224
}

fn default_norm() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

fn default_gpt2_special_token() -> i64 {
    50256
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            model: "vit-gpt2-image-captioning".to_string(),
            max_tokens: 30,
            backend: CaptionBackend::Onnx,
            image_size: default_image_size(),
            image_mean: default_norm(),
            image_std: default_norm(),
            decoder_start_token_id: default_gpt2_special_token(),
            eos_token_id: default_gpt2_special_token(),
        }
    }
}

/// Hashtag extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashtagConfig {
    /// Maximum number of hashtags per caption
    pub top_k: usize,

    /// Sentence encoder directory name under `general.model_dir`
    #[serde(default = "default_hashtag_model")]
    pub model: String,

    /// Longest candidate phrase in words (KeyBERT's ngram range upper bound)
    #[serde(default = "default_max_ngram")]
    pub max_ngram: usize,

    /// Token limit for the sentence encoder
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
}

fn default_hashtag_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_max_ngram() -> usize {
    2
}

fn default_max_sequence_length() -> usize {
    128
}

impl Default for HashtagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            model: default_hashtag_model(),
            max_ngram: default_max_ngram(),
            max_sequence_length: default_max_sequence_length(),
        }
    }
}

/// Input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Image used when no input is given
    pub sample_image: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sample_image: "~/.captionist/sample.jpg".to_string(),
        }
    }
}

/// Retry settings for transient LLM failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max retry attempts for transient failures
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// LLM call timeout in milliseconds
    pub llm_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            llm_timeout_ms: 60000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Text-generation settings used by the rephraser (and the llm caption backend).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier sent to the provider
    pub model: String,

    /// Tones the user may pick from
    pub tones: Vec<String>,

    /// Backend: "groq", "openai" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Maximum tokens for a rephrased caption
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Groq (hosted, OpenAI-compatible) configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groq: Option<GroqConfig>,

    /// OpenAI configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAiConfig>,

    /// Ollama (local) configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaConfig>,
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_llm_max_tokens() -> u32 {
    200
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.1-8b-instant".to_string(),
            tones: vec![
                "funny".to_string(),
                "formal".to_string(),
                "poetic".to_string(),
                "sarcastic".to_string(),
                "inspirational".to_string(),
            ],
            provider: default_provider(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_temperature(),
            groq: Some(GroqConfig::default()),
            openai: None,
            ollama: None,
        }
    }
}

/// Groq configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroqConfig {
    /// API base URL
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1".to_string(),
            api_key: "${GROQ_API_KEY}".to_string(),
        }
    }
}

/// OpenAI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API base URL
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: "${OPENAI_API_KEY}".to_string(),
        }
    }
}

/// Ollama configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama API endpoint
    pub endpoint: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
        }
    }
}
