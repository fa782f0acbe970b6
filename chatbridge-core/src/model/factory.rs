//! Provider factory - creates clients from config

use super::clients::{AnthropicClient, GeminiClient, OllamaClient, OpenAiClient};
use super::types::{ModelError, ModelResponse};
use crate::config::{ModelProviderConfig, ProviderKind};
use crate::domain::types::{ChatMessage, ToolDescriptor};
use std::env;
use tracing::warn;

/// Resolve API key from environment variable
pub fn resolve_api_key(provider: &str, env_var: Option<&str>) -> Option<String> {
    let raw = env_var.map(str::trim)?;
    if raw.is_empty() {
        return None;
    }
    match env::var(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                provider,
                env_var = raw,
                %err,
                "API key environment variable is not set"
            );
            None
        }
    }
}

/// One client per provider wire format.
#[derive(Clone)]
pub enum ProviderClient {
    OpenAi(OpenAiClient),
    Anthropic(AnthropicClient),
    Gemini(GeminiClient),
    Ollama(OllamaClient),
}

impl ProviderClient {
    /// Build the client matching the provider's `type`. Groq speaks the
    /// OpenAI format.
    pub fn from_config(config: &ModelProviderConfig) -> Result<Self, ModelError> {
        Ok(match config.kind {
            ProviderKind::OpenAi | ProviderKind::Groq => {
                ProviderClient::OpenAi(OpenAiClient::from_config(config)?)
            }
            ProviderKind::Anthropic => ProviderClient::Anthropic(AnthropicClient::from_config(config)?),
            ProviderKind::Gemini => ProviderClient::Gemini(GeminiClient::from_config(config)?),
            ProviderKind::Ollama => ProviderClient::Ollama(OllamaClient::from_config(config)?),
        })
    }

    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ModelError> {
        match self {
            ProviderClient::OpenAi(client) => client.chat(model, messages, tools).await,
            ProviderClient::Anthropic(client) => client.chat(model, messages, tools).await,
            ProviderClient::Gemini(client) => client.chat(model, messages, tools).await,
            ProviderClient::Ollama(client) => client.chat(model, messages, tools).await,
        }
    }
}
