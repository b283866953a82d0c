//! Ollama provider for local model inference.
//!
//! Talks to a local Ollama instance via its HTTP API.
//! No authentication; the server only has to be running.

use super::provider::{send_error, status_error, LlmProvider, LlmRequest, LlmResponse};
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Ollama provider.
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn build_body(&self, request: &LlmRequest) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            images: request.image.iter().map(|i| i.data.clone()).collect(),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

/// Ollama /api/generate request body.
#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama /api/generate response.
#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Turn an `/api/generate` reply into a response; latency is left at zero.
fn parse_generate_response(model: &str, status: u16, body: &str) -> Result<LlmResponse, PipelineError> {
    if !(200..300).contains(&status) {
        return Err(status_error("ollama", status, body));
    }

    let parsed: OllamaResponse = serde_json::from_str(body).map_err(|e| PipelineError::Llm {
        message: format!("Failed to parse Ollama response: {e}"),
        status_code: None,
    })?;

    let text = parsed.response.trim().to_string();
    if text.is_empty() {
        return Err(PipelineError::Llm {
            message: "Ollama returned an empty response".to_string(),
            status_code: None,
        });
    }

    let tokens_used = match (parsed.prompt_eval_count, parsed.eval_count) {
        (None, None) => None,
        (p, e) => Some(p.unwrap_or(0) + e.unwrap_or(0)),
    };

    Ok(LlmResponse {
        text,
        model: model.to_string(),
        tokens_used,
        latency_ms: 0,
    })
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> Result<(), String> {
        let url = format!("{}/api/tags", self.endpoint);
        match self.client.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(format!("{url} returned HTTP {}", resp.status())),
            Err(e) => Err(format!("cannot reach {url}: {e}. Is `ollama serve` running?")),
        }
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
        let url = format!("{}/api/generate", self.endpoint);
        let start = Instant::now();

        let resp = self
            .client
            .post(&url)
            .json(&self.build_body(request))
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| send_error("ollama", self.timeout, e))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| send_error("ollama", self.timeout, e))?;

        let mut response = parse_generate_response(&self.model, status, &body)?;
        response.latency_ms = start.elapsed().as_millis() as u64;
        Ok(response)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
