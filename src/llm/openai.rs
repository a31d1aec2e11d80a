//! OpenAI backend implementation.
//!
//! Streams chat completions over SSE; the stream ends with `data: [DONE]`.

use super::stream::{assemble, event_payloads, status_error, PayloadEvent};
use super::{http_client, ResponseStream};
use crate::config::GenerationOptions;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI backend for GPT API.
pub struct OpenAIBackend {
    pub model: String,
    api_key: Option<String>,
    options: GenerationOptions,
    client: Client,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend.
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
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                anyhow!(
                    "OpenAI API key not found. Set OPENAI_API_KEY environment variable \
                     or add api_key to config file."
                )
            })
    }

    /// Stream a response to `query`.
    pub async fn stream(&self, query: &str) -> Result<ResponseStream> {
        let api_key = self.get_api_key()?;

        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: query.to_string(),
            }],
            stream: true,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };

        debug!("Sending streaming request to OpenAI ({})", self.model);
        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to connect to OpenAI API")?;

        if !response.status().is_success() {
            return Err(status_error("OpenAI API", response, error_message).await);
        }

        Ok(assemble(event_payloads(response), parse_event))
    }
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Interpret the data of one SSE event of a chat completion stream.
fn parse_event(data: &str) -> Result<PayloadEvent> {
    if data.trim() == "[DONE]" {
        return Ok(PayloadEvent::Done);
    }
    let chunk: OpenAIChunk =
        serde_json::from_str(data).context("Failed to parse OpenAI stream event")?;
    if let Some(error) = chunk.error {
        return Err(anyhow!("OpenAI API error: {}", error.message));
    }
    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();
    Ok(PayloadEvent::Delta(text))
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChunk {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    error: Option<OpenAIErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    #[serde(default)]
    delta: OpenAIDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}
