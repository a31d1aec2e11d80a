//! LLM backend implementations.
//!
//! Every backend streams its answer: `stream` sends the request and returns a
//! lazy sequence of text fragments in delivery order, ended by a single
//! `Completed` event carrying the full response text, or by an error.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod stream;

use crate::config::{BackendConfig, GenerationOptions};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// One item of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of response text, in arrival order.
    Fragment(String),
    /// The final, authoritative response text. Nothing follows it.
    Completed(String),
}

pub type ResponseStream = BoxStream<'static, Result<StreamEvent>>;

/// A model that can answer a query as a stream of fragments.
#[async_trait]
pub trait StreamingBackend: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Model identifier.
    fn model(&self) -> &str;

    /// Send `query` and return its response stream.
    async fn stream(&self, query: &str) -> Result<ResponseStream>;
}

/// Enum-based backend for LLM providers.
pub enum Backend {
    Gemini(gemini::GeminiBackend),
    Ollama(ollama::OllamaBackend),
    Anthropic(anthropic::AnthropicBackend),
    OpenAI(openai::OpenAIBackend),
}

#[async_trait]
impl StreamingBackend for Backend {
    fn name(&self) -> &str {
        match self {
            Backend::Gemini(_) => "gemini",
            Backend::Ollama(_) => "ollama",
            Backend::Anthropic(_) => "anthropic",
            Backend::OpenAI(_) => "openai",
        }
    }

    fn model(&self) -> &str {
        match self {
            Backend::Gemini(b) => &b.model,
            Backend::Ollama(b) => &b.model,
            Backend::Anthropic(b) => &b.model,
            Backend::OpenAI(b) => &b.model,
        }
    }

    async fn stream(&self, query: &str) -> Result<ResponseStream> {
        match self {
            Backend::Gemini(b) => b.stream(query).await,
            Backend::Ollama(b) => b.stream(query).await,
            Backend::Anthropic(b) => b.stream(query).await,
            Backend::OpenAI(b) => b.stream(query).await,
        }
    }
}

/// Create a backend from configuration.
///
/// `model_override` replaces the configured model name, e.g. from `--model`.
pub fn create_backend(
    config: &BackendConfig,
    options: &GenerationOptions,
    model_override: Option<&str>,
) -> Result<Backend> {
    let pick = |configured: &String| model_override.unwrap_or(configured.as_str()).to_string();
    let backend = match config {
        BackendConfig::Gemini { model, api_key } => Backend::Gemini(gemini::GeminiBackend::new(
            pick(model),
            api_key.clone(),
            options.clone(),
        )?),
        BackendConfig::Ollama { model, host } => Backend::Ollama(ollama::OllamaBackend::new(
            pick(model),
            host.clone(),
            options.clone(),
        )?),
        BackendConfig::Anthropic { model, api_key } => {
            Backend::Anthropic(anthropic::AnthropicBackend::new(
                pick(model),
                api_key.clone(),
                options.clone(),
            )?)
        }
        BackendConfig::OpenAI { model, api_key } => Backend::OpenAI(openai::OpenAIBackend::new(
            pick(model),
            api_key.clone(),
            options.clone(),
        )?),
    };
    Ok(backend)
}

/// Shared HTTP client setup. No overall timeout, since responses stream for as
/// long as the model keeps generating.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    use anyhow::Context;
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
        .context("Failed to create HTTP client")
}
