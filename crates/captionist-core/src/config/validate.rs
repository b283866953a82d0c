//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Largest accepted `limits.max_file_size_mb` (1 TiB).
const MAX_FILE_SIZE_MB: u64 = 1024 * 1024;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.caption.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "caption.model must not be empty".into(),
            ));
        }
        if self.caption.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "caption.max_tokens must be > 0".into(),
            ));
        }
        if self.caption.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "caption.image_size must be > 0".into(),
            ));
        }
        if self.caption.image_std.iter().any(|s| *s == 0.0) {
            return Err(ConfigError::ValidationError(
                "caption.image_std values must be non-zero".into(),
            ));
        }
        if self.hashtags.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "hashtags.top_k must be > 0".into(),
            ));
        }
        if !(1..=3).contains(&self.hashtags.max_ngram) {
            return Err(ConfigError::ValidationError(
                "hashtags.max_ngram must be between 1 and 3".into(),
            ));
        }
        if self.hashtags.max_sequence_length == 0 {
            return Err(ConfigError::ValidationError(
                "hashtags.max_sequence_length must be > 0".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.model must not be empty".into(),
            ));
        }
        if self.llm.tones.is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.tones must list at least one tone".into(),
            ));
        }
        if self.llm.tones.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "llm.tones must not contain empty entries".into(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "llm.max_tokens must be > 0".into(),
            ));
        }
        if self.input.sample_image.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "input.sample_image must not be empty".into(),
            ));
        }
        if !(1..=MAX_FILE_SIZE_MB).contains(&self.limits.max_file_size_mb) {
            return Err(ConfigError::ValidationError(format!(
                "limits.max_file_size_mb must be between 1 and {MAX_FILE_SIZE_MB}"
            )));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.llm_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.llm_timeout_ms must be > 0".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }
}
