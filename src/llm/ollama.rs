//! Ollama backend implementation.
//!
//! Ollama is a local LLM server. With `stream: true` it answers with one JSON
//! object per line, the last of which has `done: true`.

use super::stream::{assemble, body_lines, status_error, PayloadEvent};
use super::{http_client, ResponseStream};
use crate::config::GenerationOptions;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ollama backend for local LLM inference.
pub struct OllamaBackend {
    pub model: String,
    host: String,
    options: GenerationOptions,
    client: Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend.
    pub fn new(model: String, host: String, options: GenerationOptions) -> Result<Self> {
        Ok(Self {
            model,
            host,
            options,
            client: http_client()?,
        })
    }

    /// Stream a response to `query`.
    pub async fn stream(&self, query: &str) -> Result<ResponseStream> {
        let url = format!("{}/api/generate", self.host.trim_end_matches('/'));

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: query.to_string(),
            stream: true,
            options: OllamaOptions {
                temperature: self.options.temperature,
                num_predict: self.options.max_tokens,
            },
        };

        debug!("Sending streaming request to Ollama at {} ({})", url, self.model);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to Ollama - is it running?")?;

        if !response.status().is_success() {
            return Err(status_error("Ollama", response, error_message).await);
        }

        Ok(assemble(body_lines(response), parse_line))
    }
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    body.get("error").and_then(|e| e.as_str()).map(str::to_string)
}

/// Interpret one NDJSON line of an Ollama stream.
fn parse_line(line: &str) -> Result<PayloadEvent> {
    let chunk: OllamaChunk =
        serde_json::from_str(line).context("Failed to parse Ollama stream line")?;
    if let Some(error) = chunk.error {
        return Err(anyhow!("Ollama error: {}", error));
    }
    if chunk.done {
        // The final object may still carry trailing text.
        return Ok(if chunk.response.is_empty() {
            PayloadEvent::Done
        } else {
            PayloadEvent::Delta(chunk.response)
        });
    }
    Ok(PayloadEvent::Delta(chunk.response))
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}
