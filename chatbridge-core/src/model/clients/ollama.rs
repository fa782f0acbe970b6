//! Ollama client implementation

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::ModelProviderConfig;
use crate::domain::types::{ChatMessage, ToolCallRequest, ToolDescriptor};
use crate::model::adapter::MessageAdapter;
use crate::model::types::{ModelError, ModelResponse};

const DEFAULT_API_PATH: &str = "/api/chat";

/// Ollama client for local LLM
#[derive(Clone)]
pub struct OllamaClient {
    base: HttpClientBase,
    api_path: String,
}

impl OllamaClient {
    /// Creates client from provider config.
    pub fn from_config(config: &ModelProviderConfig) -> Result<Self, ModelError> {
        Ok(Self {
            base: HttpClientBase::from_config(config)?,
            api_path: config
                .api_path
                .clone()
                .unwrap_or_else(|| DEFAULT_API_PATH.to_string()),
        })
    }

    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ModelError> {
        let url = self.base.build_url(&self.api_path);
        let payload = build_request(model, messages, tools);

        info!(
            provider = self.base.id.as_str(),
            model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending request to Ollama"
        );

        let response: OllamaResponse = self.base.post_no_auth(&url, &payload).await?;
        debug!("Received response from Ollama");

        parse_response(&self.base.id, response)
    }
}

fn build_request(model: &str, messages: &[ChatMessage], tools: &[ToolDescriptor]) -> OllamaRequest {
    OllamaRequest {
        model: model.to_string(),
        messages: MessageAdapter::to_ollama_format(messages),
        tools: if tools.is_empty() {
            None
        } else {
            Some(MessageAdapter::to_openai_tools(tools))
        },
        stream: false,
    }
}

fn parse_response(provider: &str, response: OllamaResponse) -> Result<ModelResponse, ModelError> {
    let message = response
        .message
        .ok_or_else(|| ModelError::invalid_response(provider, "missing message"))?;

    let tool_calls = message
        .tool_calls
        .into_iter()
        .enumerate()
        .map(|(index, call)| {
            ToolCallRequest::new(
                format!("call_{index}"),
                call.function.name,
                call.function.arguments.unwrap_or_else(|| json!({})),
            )
        })
        .collect();

    Ok(ModelResponse::with_tool_calls(message.content, tool_calls))
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Deserialize)]
struct OllamaFunction {
    name: String,
    arguments: Option<Value>,
}
