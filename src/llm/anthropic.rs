//! Anthropic Claude backend implementation.
//!
//! Streams the Messages API over SSE. Text arrives in `content_block_delta`
//! events and the response ends with `message_stop`.

use super::stream::{assemble, event_payloads, status_error, PayloadEvent};
use super::{http_client, ResponseStream};
use crate::config::GenerationOptions;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic backend for Claude API.
pub struct AnthropicBackend {
    pub model: String,
    api_key: Option<String>,
    options: GenerationOptions,
    client: Client,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend.
    pub fn new(model: String, api_key: Option<String>, options: GenerationOptions) -> Result<Self> {
        Ok(Self {
            model,
            api_key,
            options,
            client: http_client()?,
        })
    }

    /// Get the API key from config or environment.
    fn get_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                anyhow!(
                    "Anthropic API key not found. Set ANTHROPIC_API_KEY environment variable \
                     or add api_key to config file."
                )
            })
    }

    /// Stream a response to `query`.
    pub async fn stream(&self, query: &str) -> Result<ResponseStream> {
        let api_key = self.get_api_key()?;

        let request = AnthropicRequest {
            model: self.model.clone(),
            // The Messages API requires an explicit limit.
            max_tokens: self.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: query.to_string(),
            }],
            stream: true,
            temperature: self.options.temperature,
        };

        debug!("Sending streaming request to Anthropic ({})", self.model);
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to connect to Anthropic API")?;

        if !response.status().is_success() {
            return Err(status_error("Anthropic API", response, error_message).await);
        }

        Ok(assemble(event_payloads(response), parse_event))
    }
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Interpret the data of one SSE event of a Messages stream.
fn parse_event(data: &str) -> Result<PayloadEvent> {
    let event: AnthropicEvent =
        serde_json::from_str(data).context("Failed to parse Anthropic stream event")?;
    match event {
        AnthropicEvent::ContentBlockDelta { delta } => Ok(PayloadEvent::Delta(delta.text)),
        AnthropicEvent::MessageStop => Ok(PayloadEvent::Done),
        AnthropicEvent::Error { error } => Err(anyhow!("Anthropic API error: {}", error.message)),
        AnthropicEvent::Other => Ok(PayloadEvent::Skip),
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicEvent {
    ContentBlockDelta { delta: AnthropicDelta },
    MessageStop,
    Error { error: AnthropicErrorDetail },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    /// Empty for non-text deltas such as tool input.
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}
