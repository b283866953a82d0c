//! LLM integration.
//!
//! Provides a provider abstraction over hosted OpenAI-compatible services
//! (Groq, OpenAI) and a local Ollama server, plus the tone rephraser built
//! on top of it.

pub(crate) mod ollama;
pub(crate) mod openai;
pub(crate) mod provider;
pub(crate) mod rephrase;

pub use provider::{
    resolve_env_var, ImageInput, LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse,
};
pub use rephrase::{rephrase_prompt, RephraseOptions, ToneRephraser};
