//! Configuration management for llmask.
//!
//! Configuration is loaded from `~/.config/llmask/config.toml`.

use crate::orchestrator::Pacing;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Sampling options passed to the backend.
    #[serde(default)]
    pub generation: GenerationOptions,
    /// Delays shown before the request is sent.
    #[serde(default)]
    pub pacing: PacingConfig,
    /// Terminal output preferences.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Backend configuration for LLM providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Google Gemini API.
    Gemini {
        /// Model name (default: gemini-2.5-flash).
        #[serde(default = "default_gemini_model")]
        model: String,
        /// API key (prefer GEMINI_API_KEY env var).
        #[serde(default)]
        api_key: Option<String>,
    },
    /// Ollama local backend.
    Ollama {
        /// Model name (default: qwen2.5:7b).
        #[serde(default = "default_ollama_model")]
        model: String,
        /// Ollama host URL (default: http://localhost:11434).
        #[serde(default = "default_ollama_host")]
        host: String,
    },
    /// Anthropic Claude API.
    Anthropic {
        /// Model name (default: claude-3-5-haiku-latest).
        #[serde(default = "default_anthropic_model")]
        model: String,
        /// API key (prefer ANTHROPIC_API_KEY env var).
        #[serde(default)]
        api_key: Option<String>,
    },
    /// OpenAI API.
    OpenAI {
        /// Model name (default: gpt-4o-mini).
        #[serde(default = "default_openai_model")]
        model: String,
        /// API key (prefer OPENAI_API_KEY env var).
        #[serde(default)]
        api_key: Option<String>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Gemini {
            model: default_gemini_model(),
            api_key: None,
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Sampling options. Unset values use the provider's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Pre-flight status delays, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,
    #[serde(default = "default_prepare_delay_ms")]
    pub prepare_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            connect_delay_ms: default_connect_delay_ms(),
            prepare_delay_ms: default_prepare_delay_ms(),
        }
    }
}

fn default_connect_delay_ms() -> u64 {
    500
}

fn default_prepare_delay_ms() -> u64 {
    300
}

impl From<&PacingConfig> for Pacing {
    fn from(config: &PacingConfig) -> Self {
        Pacing {
            connect: Duration::from_millis(config.connect_delay_ms),
            prepare: Duration::from_millis(config.prepare_delay_ms),
        }
    }
}

/// When to colour terminal output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Colour only when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn enabled(self) -> bool {
        match self {
            ColorChoice::Auto => atty::is(atty::Stream::Stdout),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

/// Terminal output preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub color: ColorChoice,
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("llmask"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, using defaults if not found.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Get the backend type as a string.
    pub fn backend_type(&self) -> &'static str {
        match &self.backend {
            BackendConfig::Gemini { .. } => "gemini",
            BackendConfig::Ollama { .. } => "ollama",
            BackendConfig::Anthropic { .. } => "anthropic",
            BackendConfig::OpenAI { .. } => "openai",
        }
    }

    /// Get the model name.
    pub fn model_name(&self) -> &str {
        match &self.backend {
            BackendConfig::Gemini { model, .. } => model,
            BackendConfig::Ollama { model, .. } => model,
            BackendConfig::Anthropic { model, .. } => model,
            BackendConfig::OpenAI { model, .. } => model,
        }
    }
}
