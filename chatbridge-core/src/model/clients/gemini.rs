//! Gemini client implementation

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::ModelProviderConfig;
use crate::domain::types::{ChatMessage, ToolCallRequest, ToolDescriptor};
use crate::model::adapter::MessageAdapter;
use crate::model::types::{ModelError, ModelResponse};

const DEFAULT_API_PATH: &str = "v1beta/models";

/// Gemini client for Google AI
#[derive(Clone)]
pub struct GeminiClient {
    base: HttpClientBase,
    api_path: String,
}

impl GeminiClient {
    pub fn from_config(config: &ModelProviderConfig) -> Result<Self, ModelError> {
        Ok(Self {
            base: HttpClientBase::from_config(config)?,
            api_path: config
                .api_path
                .clone()
                .unwrap_or_else(|| DEFAULT_API_PATH.to_string()),
        })
    }

    fn build_model_url(&self, model: &str) -> String {
        let path = self.api_path.trim_matches('/');
        self.base.build_url(&format!("{path}/{model}:generateContent"))
    }

    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ModelError> {
        let url = self.build_model_url(model);
        let payload = build_request(messages, tools);

        info!(
            provider = self.base.id.as_str(),
            model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending request to Gemini"
        );

        let response: GeminiResponse = self.base.post_with_query_key(&url, &payload).await?;
        debug!("Received response from Gemini");

        parse_response(&self.base.id, response)
    }
}

fn build_request(messages: &[ChatMessage], tools: &[ToolDescriptor]) -> Value {
    let (system_text, contents) = MessageAdapter::to_gemini_format(messages);
    let mut payload = json!({ "contents": contents });

    if let Some(system) = system_text {
        payload["system_instruction"] = json!({
            "parts": [{"text": system}]
        });
    }
    if !tools.is_empty() {
        payload["tools"] = json!([{
            "functionDeclarations": MessageAdapter::to_gemini_tools(tools)
        }]);
    }
    payload
}

fn parse_response(provider: &str, response: GeminiResponse) -> Result<ModelResponse, ModelError> {
    let parts = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .ok_or_else(|| ModelError::invalid_response(provider, "missing candidate content"))?;

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if let Some(text) = part.text {
            texts.push(text);
        }
        if let Some(call) = part.function_call {
            let id = format!("call_{}", tool_calls.len());
            let args = call.args.unwrap_or_else(|| json!({}));
            tool_calls.push(ToolCallRequest::new(id, call.name, args));
        }
    }

    Ok(ModelResponse::with_tool_calls(texts.concat(), tool_calls))
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Option<Value>,
}
