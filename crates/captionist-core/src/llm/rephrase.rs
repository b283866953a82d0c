//! Tone rephrasing of captions.
//!
//! Each call is one stateless user message to the configured provider.
//! Transient service failures are retried with exponential backoff;
//! nothing here can affect the caption or hashtags it was given.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::provider::{LlmProvider, LlmRequest};
use crate::config::Config;
use crate::error::PipelineError;
use crate::types::RephrasedCaption;

/// Options controlling rephrase requests.
#[derive(Debug, Clone)]
pub struct RephraseOptions {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Retries after the first attempt for transient failures
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
    /// Generation cap for the rewritten caption
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for RephraseOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            retry_attempts: 2,
            retry_delay_ms: 1000,
            max_tokens: 200,
            temperature: 0.7,
        }
    }
}

/// Upper bound on the wait between two rephrase attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

impl RephraseOptions {
    /// Wait before retry number `retry` (0-based): the base delay doubled per
    /// retry, never longer than [`MAX_BACKOFF`].
    pub fn backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
            .saturating_mul(2u32.saturating_pow(retry))
            .min(MAX_BACKOFF)
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout_ms: config.limits.llm_timeout_ms,
            retry_attempts: config.pipeline.retry_attempts,
            retry_delay_ms: config.pipeline.retry_delay_ms,
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        }
    }
}

/// Build the rewrite instruction sent to the model.
pub fn rephrase_prompt(caption: &str, tone: &str) -> String {
    format!("Rewrite the caption \"{caption}\" in a {tone} tone.")
}

/// Rewrites captions in one of a fixed set of tones.
pub struct ToneRephraser {
    provider: Arc<dyn LlmProvider>,
    tones: Vec<String>,
    options: RephraseOptions,
}

impl ToneRephraser {
    pub fn new(provider: Arc<dyn LlmProvider>, tones: Vec<String>, options: RephraseOptions) -> Self {
        Self {
            provider,
            tones,
            options,
        }
    }

    /// The configured tone labels, in config order.
    pub fn tones(&self) -> &[String] {
        &self.tones
    }

    /// Name of the backing provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Match `tone` against the configured list, ignoring case.
    ///
    /// Returns the configured spelling.
    pub fn resolve_tone(&self, tone: &str) -> Result<&str, PipelineError> {
        let wanted = tone.trim();
        self.tones
            .iter()
            .find(|t| t.eq_ignore_ascii_case(wanted))
            .map(String::as_str)
            .ok_or_else(|| PipelineError::UnknownTone {
                tone: tone.to_string(),
                available: self.tones.join(", "),
            })
    }

    /// Rewrite `caption` in `tone`.
    pub async fn rephrase(
        &self,
        caption: &str,
        tone: &str,
    ) -> Result<RephrasedCaption, PipelineError> {
        let tone = self.resolve_tone(tone)?;
        let caption = caption.trim();
        if caption.is_empty() {
            return Err(PipelineError::EmptyCaption);
        }

        let request = LlmRequest::text(
            rephrase_prompt(caption, tone),
            self.options.max_tokens,
            self.options.temperature,
        );
        let start = Instant::now();
        let mut last_error = None;

        for attempt in 0..=self.options.retry_attempts {
            if attempt > 0 {
                let delay = self.options.backoff(attempt - 1);
                tracing::debug!(
                    "Retrying {} rephrase (attempt {}/{}) after {:?}",
                    self.provider.name(),
                    attempt,
                    self.options.retry_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            let result = match tokio::time::timeout(
                Duration::from_millis(self.options.timeout_ms),
                self.provider.generate(&request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout {
                    stage: "rephrase".to_string(),
                    timeout_ms: self.options.timeout_ms,
                }),
            };

            match result {
                Ok(response) => {
                    tracing::debug!(
                        "Rephrased caption in {} tone via {} ({}ms)",
                        tone,
                        response.model,
                        response.latency_ms
                    );
                    return Ok(RephrasedCaption {
                        tone: tone.to_string(),
                        text: response.text.trim().to_string(),
                        model: response.model,
                        tokens_used: response.tokens_used,
                        latency_ms: start.elapsed().as_millis() as u64,
                    });
                }
                Err(e) => {
                    tracing::warn!("Rephrase attempt {} failed: {e}", attempt + 1);
                    let transient = e.is_transient();
                    last_error = Some(e);
                    if !transient {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PipelineError::Llm {
            message: "Rephrase was not attempted".to_string(),
            status_code: None,
        }))
    }
}
