//! OpenAI-compatible client implementation (OpenAI, Groq and friends)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::base::HttpClientBase;
use crate::config::ModelProviderConfig;
use crate::domain::types::{ChatMessage, ToolCallRequest, ToolDescriptor};
use crate::model::adapter::MessageAdapter;
use crate::model::types::{ModelError, ModelResponse};

const DEFAULT_API_PATH: &str = "/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiClient {
    base: HttpClientBase,
    api_path: String,
}

impl OpenAiClient {
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
            "Sending request to OpenAI-compatible provider"
        );

        let response: OpenAiResponse = self.base.post_with_bearer(&url, &payload).await?;
        debug!("Received response from OpenAI-compatible provider");

        parse_response(&self.base.id, response)
    }
}

fn build_request(model: &str, messages: &[ChatMessage], tools: &[ToolDescriptor]) -> OpenAiRequest {
    OpenAiRequest {
        model: model.to_string(),
        messages: MessageAdapter::to_openai_format(messages),
        tools: if tools.is_empty() {
            None
        } else {
            Some(MessageAdapter::to_openai_tools(tools))
        },
        stream: false,
    }
}

fn parse_response(provider: &str, response: OpenAiResponse) -> Result<ModelResponse, ModelError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .ok_or_else(|| ModelError::invalid_response(provider, "missing message"))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, call)| {
            let arguments = parse_arguments(provider, &call.function.name, &call.function.arguments);
            ToolCallRequest::new(
                call.id.unwrap_or_else(|| format!("call_{index}")),
                call.function.name,
                arguments,
            )
        })
        .collect();

    Ok(ModelResponse::with_tool_calls(
        message.content.unwrap_or_default(),
        tool_calls,
    ))
}

/// Arguments arrive JSON-encoded; undecodable text is passed on as a string
/// so the tool server reports the problem.
fn parse_arguments(provider: &str, tool: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!(provider, tool, %err, "tool call arguments are not valid JSON");
        Value::String(raw.to_string())
    })
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: Option<String>,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
