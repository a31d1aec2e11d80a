//! Google Gemini backend implementation.
//!
//! Uses `streamGenerateContent` with `alt=sse`, so each event carries a
//! partial candidate whose text parts are the next fragment.

use super::stream::{assemble, event_payloads, status_error, PayloadEvent};
use super::{http_client, ResponseStream};
use crate::config::GenerationOptions;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini backend for the Generative Language API.
pub struct GeminiBackend {
    pub model: String,
    api_key: Option<String>,
    options: GenerationOptions,
    client: Client,
}

impl GeminiBackend {
    /// Create a new Gemini backend.
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
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .ok_or_else(|| {
                anyhow!(
                    "Gemini API key not found. Set GEMINI_API_KEY environment variable \
                     or add api_key to config file."
                )
            })
    }

    /// Stream a response to `query`.
    pub async fn stream(&self, query: &str) -> Result<ResponseStream> {
        let api_key = self.get_api_key()?;
        let url = format!(
            "{}/{}:streamGenerateContent?alt=sse",
            GEMINI_API_BASE, self.model
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: query.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.options.temperature,
                max_output_tokens: self.options.max_tokens,
            },
        };

        debug!("Sending streaming request to Gemini ({})", self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to Gemini API")?;

        if !response.status().is_success() {
            return Err(status_error("Gemini API", response, error_message).await);
        }

        Ok(assemble(event_payloads(response), parse_event))
    }
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Interpret the data of one SSE event of a Gemini stream.
fn parse_event(data: &str) -> Result<PayloadEvent> {
    let chunk: GeminiChunk =
        serde_json::from_str(data).context("Failed to parse Gemini stream event")?;
    if let Some(error) = chunk.error {
        return Err(anyhow!("Gemini API error: {}", error.message));
    }
    let text: String = chunk
        .candidates
        .iter()
        .take(1)
        .flat_map(|c| c.content.iter())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect();
    Ok(PayloadEvent::Delta(text))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiChunkContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiChunkContent {
    #[serde(default)]
    parts: Vec<GeminiChunkPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiChunkPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}
