//! Configuration management for Captionist.
//!
//! Configuration is a TOML file, by default in the platform config directory.
//! The caption, hashtag, LLM and input sections are mandatory; a missing file
//! or a missing required key is a fatal startup error.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Captionist.
///
/// `Default` produces the template written by `captionist config init`;
/// it is not used as a silent fallback when loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Caption model settings
    pub caption: CaptionConfig,

    /// Hashtag extraction settings
    pub hashtags: HashtagConfig,

    /// Text-generation settings
    pub llm: LlmConfig,

    /// Input settings
    pub input: InputConfig,

    /// Retry settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path` if given, else from the default location.
    pub fn load_or_default_path(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.captionist.captionist/config.toml
    /// - Linux: ~/.config/captionist/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\captionist\config\config.toml
    ///
    /// Falls back to ~/.captionist/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "captionist", "captionist")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".captionist").join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        let path_str = self.general.model_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Get the resolved sample image path (with ~ expansion).
    pub fn sample_image(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.input.sample_image);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
