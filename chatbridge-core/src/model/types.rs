//! Model types - Request, Response, and Error types

use crate::domain::types::{ChatMessage, ToolCallRequest, ToolDescriptor};
use thiserror::Error;

/// Request for one chat completion.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model key, `<provider id>/<model name>`
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Tools offered to the model; empty disables tool calling.
    pub tools: Vec<ToolDescriptor>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools,
        }
    }
}

/// Text of a completion plus the tool calls it requested, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model '{model}' is not configured")]
    UnknownModel { model: String },
    #[error("provider '{provider}' requires an API key")]
    MissingApiKey { provider: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to provider '{provider}' timed out")]
    Timeout { provider: String },
    #[error("provider '{provider}' rate limited the request")]
    RateLimited {
        provider: String,
        retry_after: Option<u64>,
    },
    #[error("provider '{provider}' returned HTTP {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ModelError {
    pub fn unknown_model(model: impl Into<String>) -> Self {
        Self::UnknownModel {
            model: model.into(),
        }
    }

    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    /// Classify a transport-level reqwest failure.
    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        let provider = provider.into();
        if source.is_timeout() {
            Self::Timeout { provider }
        } else {
            Self::Network { provider, source }
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Message safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            ModelError::UnknownModel { model } => {
                format!("Model '{model}' is not available. Pick one of the configured models.")
            }
            ModelError::MissingApiKey { provider } => {
                format!("Provider '{provider}' has no API key configured.")
            }
            ModelError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Could not connect to model provider '{provider}'.")
                } else {
                    format!("Network error while calling '{provider}'.")
                }
            }
            ModelError::Timeout { provider } => {
                format!("The request to '{provider}' took too long.")
            }
            ModelError::RateLimited {
                provider,
                retry_after: Some(seconds),
            } => format!("'{provider}' is rate limiting requests; retry in {seconds}s."),
            ModelError::RateLimited { provider, .. } => {
                format!("'{provider}' is rate limiting requests; try again later.")
            }
            ModelError::Api { provider, status, .. } => {
                format!("Request to '{provider}' failed with status {status}.")
            }
            ModelError::InvalidResponse { provider, .. } => {
                format!("The response from '{provider}' could not be understood.")
            }
        }
    }
}
