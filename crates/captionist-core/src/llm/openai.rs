//! OpenAI-compatible Chat Completions provider.
//!
//! Serves both OpenAI itself and hosted services exposing the same API
//! (Groq). Text-only prompts are sent as a plain string; prompts with an
//! image use the content-parts array with a data URL.

use super::provider::{send_error, status_error, LlmProvider, LlmRequest, LlmResponse};
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Chat Completions provider.
pub struct OpenAiProvider {
    name: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    /// API base URL, e.g. `https://api.groq.com/openai/v1`
    endpoint: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(name: &str, endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ChatContent>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

fn build_content(request: &LlmRequest) -> MessageContent {
    match &request.image {
        None => MessageContent::Text(request.prompt.clone()),
        Some(image) => MessageContent::Parts(vec![
            ChatContent::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url(),
                },
            },
            ChatContent::Text {
                text: request.prompt.clone(),
            },
        ]),
    }
}

/// Turn a Chat Completions reply into a response; latency is left at zero.
fn parse_chat_response(provider: &str, status: u16, body: &str) -> Result<LlmResponse, PipelineError> {
    if !(200..300).contains(&status) {
        return Err(status_error(provider, status, body));
    }

    let chat_resp: ChatResponse = serde_json::from_str(body).map_err(|e| PipelineError::Llm {
        message: format!("Failed to parse {provider} response: {e}"),
        status_code: None,
    })?;

    let text = chat_resp
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PipelineError::Llm {
            message: format!("{provider} returned no content"),
            status_code: None,
        })?
        .to_string();

    Ok(LlmResponse {
        text,
        model: chat_resp.model,
        tokens_used: chat_resp.usage.map(|u| u.total_tokens),
        latency_ms: 0,
    })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> Result<(), String> {
        let url = format!("{}/models", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| format!("cannot reach {url}: {e}"))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("{url} returned HTTP {status}"))
        }
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
        let start = Instant::now();

        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_content(request),
            }],
        };

        let resp = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| send_error(&self.name, self.timeout, e))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| send_error(&self.name, self.timeout, e))?;

        let mut response = parse_chat_response(&self.name, status, &text)?;
        response.latency_ms = start.elapsed().as_millis() as u64;
        Ok(response)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
