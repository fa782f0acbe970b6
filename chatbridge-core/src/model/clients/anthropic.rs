//! Anthropic messages API client

use serde_json::{Value, json};
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::ModelProviderConfig;
use crate::domain::types::{ChatMessage, ToolCallRequest, ToolDescriptor};
use crate::model::adapter::MessageAdapter;
use crate::model::types::{ModelError, ModelResponse};

const DEFAULT_API_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicClient {
    base: HttpClientBase,
    api_path: String,
}

impl AnthropicClient {
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
            "Sending request to Anthropic"
        );

        let body: Value = self
            .base
            .post_with_key_header(
                &url,
                "x-api-key",
                &[("anthropic-version", ANTHROPIC_VERSION)],
                &payload,
            )
            .await?;
        debug!("Received response from Anthropic");

        parse_response(&self.base.id, &body)
    }
}

fn build_request(model: &str, messages: &[ChatMessage], tools: &[ToolDescriptor]) -> Value {
    let (system, messages) = MessageAdapter::to_anthropic_format(messages);
    let mut body = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": messages
    });
    if let Some(system) = system {
        body["system"] = json!(system);
    }
    if !tools.is_empty() {
        body["tools"] = json!(MessageAdapter::to_anthropic_tools(tools));
    }
    body
}

fn parse_response(provider: &str, body: &Value) -> Result<ModelResponse, ModelError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| ModelError::invalid_response(provider, "missing content blocks"))?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(text) = block["text"].as_str() {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(text);
                }
            }
            Some("tool_use") => {
                let id = block["id"].as_str().unwrap_or_default();
                let name = block["name"].as_str().unwrap_or_default();
                tool_calls.push(ToolCallRequest::new(id, name, block["input"].clone()));
            }
            _ => {}
        }
    }

    Ok(ModelResponse::with_tool_calls(content, tool_calls))
}
