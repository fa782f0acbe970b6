//! # Provider Configuration
//!
//! Configuration types for model providers. Each `[[providers]]` entry binds
//! one endpoint and the models served by it; a model is addressed by the key
//! `<provider id>/<model name>`.
//!
//! | Type | API | API Key Required |
//! |------|-----|------------------|
//! | `openai` | OpenAI chat completions | Yes |
//! | `groq` | OpenAI-compatible chat completions | Yes |
//! | `anthropic` | Anthropic messages | Yes |
//! | `gemini` | Google generateContent | Yes |
//! | `ollama` | Local Ollama `/api/chat` | No |

use super::error::ConfigError;
use crate::constants::DEFAULT_PROVIDER_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    Anthropic,
    Gemini,
    Ollama,
}

impl ProviderKind {
    /// Parse a provider type string (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAi),
            "groq" => Some(ProviderKind::Groq),
            "anthropic" | "claude" => Some(ProviderKind::Anthropic),
            "gemini" | "google" | "google-ai" => Some(ProviderKind::Gemini),
            "ollama" => Some(ProviderKind::Ollama),
            _ => None,
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Groq => "https://api.groq.com/openai",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::Ollama => "http://127.0.0.1:11434",
        }
    }
}

/// Configuration for one model provider.
///
/// # Example
///
/// ```toml
/// [[providers]]
/// id = "openai"
/// type = "openai"
/// api_key = "OPENAI_API_KEY"
/// models = ["gpt-4o", "gpt-4o-mini"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelProviderConfig {
    /// Unique identifier, the first half of every model key
    pub id: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API path override (e.g. "v1beta/models" for Gemini)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_path: Option<String>,
    pub timeout_secs: u64,
    pub models: Vec<String>,
}

impl ModelProviderConfig {
    /// Model keys served by this provider, in configuration order.
    pub fn model_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.models
            .iter()
            .map(move |model| format!("{}/{}", self.id, model))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct RawProviderConfig {
    pub(super) id: String,
    #[serde(rename = "type", default)]
    pub(super) provider_type: Option<String>,
    pub(super) endpoint: Option<String>,
    pub(super) api_key: Option<String>,
    #[serde(default)]
    pub(super) api_path: Option<String>,
    #[serde(default)]
    pub(super) timeout_secs: Option<u64>,
    #[serde(default)]
    pub(super) models: Vec<RawModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum RawModelInfo {
    Name(String),
    Detailed { name: String },
}

impl RawModelInfo {
    fn into_name(self) -> String {
        match self {
            RawModelInfo::Name(name) | RawModelInfo::Detailed { name } => name,
        }
    }
}

impl TryFrom<RawProviderConfig> for ModelProviderConfig {
    type Error = ConfigError;

    fn try_from(raw: RawProviderConfig) -> Result<Self, Self::Error> {
        // The provider id doubles as the type when none is given.
        let type_name = raw.provider_type.unwrap_or_else(|| raw.id.clone());
        let kind =
            ProviderKind::parse(&type_name).ok_or_else(|| ConfigError::UnsupportedProvider {
                provider: raw.id.clone(),
                kind: type_name.clone(),
            })?;

        let models: Vec<String> = raw
            .models
            .into_iter()
            .map(RawModelInfo::into_name)
            .filter(|name| !name.trim().is_empty())
            .collect();
        if models.is_empty() {
            return Err(ConfigError::NoModels { provider: raw.id });
        }

        Ok(Self {
            endpoint: raw
                .endpoint
                .filter(|endpoint| !endpoint.trim().is_empty())
                .unwrap_or_else(|| kind.default_endpoint().to_string()),
            id: raw.id,
            kind,
            api_key: raw.api_key,
            api_path: raw.api_path,
            timeout_secs: raw.timeout_secs.unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
            models,
        })
    }
}
