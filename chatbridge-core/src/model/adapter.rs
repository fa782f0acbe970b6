//! Message adapters - convert between different API formats

use crate::domain::types::{ChatMessage, MessageRole, ToolDescriptor};
use serde_json::{Map, Value, json};

/// Adapter for converting messages and tool catalogues to provider formats
pub struct MessageAdapter;

impl MessageAdapter {
    /// Convert messages to OpenAI chat-completions format.
    ///
    /// Tool-call arguments are sent as a JSON-encoded string.
    pub fn to_openai_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| match msg.role {
                MessageRole::Assistant if !msg.tool_calls.is_empty() => {
                    let calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string()
                                }
                            })
                        })
                        .collect();
                    let content = if msg.content.is_empty() {
                        Value::Null
                    } else {
                        Value::String(msg.content.clone())
                    };
                    json!({ "role": "assistant", "content": content, "tool_calls": calls })
                }
                MessageRole::Tool => json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
                    "content": msg.content
                }),
                role => json!({ "role": role.as_str(), "content": msg.content }),
            })
            .collect()
    }

    /// Convert messages to Ollama format.
    ///
    /// Same shape as OpenAI except tool-call arguments stay JSON objects and
    /// tool results name the tool instead of a call id.
    pub fn to_ollama_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| match msg.role {
                MessageRole::Assistant if !msg.tool_calls.is_empty() => {
                    let calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({ "function": { "name": call.name, "arguments": call.arguments } })
                        })
                        .collect();
                    json!({ "role": "assistant", "content": msg.content, "tool_calls": calls })
                }
                MessageRole::Tool => json!({
                    "role": "tool",
                    "tool_name": msg.name.clone().unwrap_or_default(),
                    "content": msg.content
                }),
                role => json!({ "role": role.as_str(), "content": msg.content }),
            })
            .collect()
    }

    /// Convert messages to Anthropic format
    /// Returns: (system_text, messages)
    ///
    /// Consecutive tool results are merged into one user message of
    /// `tool_result` blocks.
    pub fn to_anthropic_format(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut out: Vec<Value> = Vec::new();

        for message in messages {
            match message.role {
                MessageRole::System => system_parts.push(message.content.clone()),
                MessageRole::User => {
                    if !message.content.is_empty() {
                        out.push(json!({ "role": "user", "content": message.content }));
                    }
                }
                MessageRole::Assistant => {
                    let mut blocks = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(json!({ "type": "text", "text": message.content }));
                    }
                    for call in &message.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": object_or_empty(&call.arguments)
                        }));
                    }
                    if !blocks.is_empty() {
                        out.push(json!({ "role": "assistant", "content": blocks }));
                    }
                }
                MessageRole::Tool => {
                    let block = json!({
                        "type": "tool_result",
                        "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                        "content": message.content
                    });
                    push_merged(&mut out, "user", block, is_anthropic_tool_results);
                }
            }
        }

        (join_system(system_parts), out)
    }

    /// Convert messages to Gemini format
    /// Returns: (system_instruction_text, contents)
    pub fn to_gemini_format(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for message in messages {
            match message.role {
                MessageRole::System => system_parts.push(message.content.clone()),
                MessageRole::User => contents.push(json!({
                    "role": "user",
                    "parts": [{"text": message.content}]
                })),
                MessageRole::Assistant => {
                    let mut parts = Vec::new();
                    if !message.content.is_empty() || message.tool_calls.is_empty() {
                        parts.push(json!({ "text": message.content }));
                    }
                    for call in &message.tool_calls {
                        parts.push(json!({
                            "functionCall": {
                                "name": call.name,
                                "args": object_or_empty(&call.arguments)
                            }
                        }));
                    }
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
                MessageRole::Tool => {
                    let part = json!({
                        "functionResponse": {
                            "name": message.name.clone().unwrap_or_default(),
                            "response": { "content": message.content }
                        }
                    });
                    push_gemini_function_response(&mut contents, part);
                }
            }
        }

        (join_system(system_parts), contents)
    }

    /// OpenAI and Ollama `tools` array.
    pub fn to_openai_tools(tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema
                    }
                })
            })
            .collect()
    }

    pub fn to_anthropic_tools(tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema
                })
            })
            .collect()
    }

    /// Gemini `functionDeclarations`; schemas are stripped of keywords the
    /// API rejects.
    pub fn to_gemini_tools(tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": sanitize_gemini_schema(&tool.input_schema)
                })
            })
            .collect()
    }
}

/// Remove `$schema` and `additionalProperties` at every depth.
pub fn sanitize_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != "$schema" && key.as_str() != "additionalProperties")
                .map(|(key, value)| (key.clone(), sanitize_gemini_schema(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_gemini_schema).collect()),
        other => other.clone(),
    }
}

fn object_or_empty(arguments: &Value) -> Value {
    if arguments.is_object() {
        arguments.clone()
    } else {
        json!({})
    }
}

fn join_system(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn is_anthropic_tool_results(message: &Value) -> bool {
    message["content"]
        .as_array()
        .and_then(|blocks| blocks.first())
        .is_some_and(|block| block["type"] == "tool_result")
}

/// Append `block` to the last message when `same_kind` says it holds the
/// same sort of blocks, otherwise start a new message.
fn push_merged(out: &mut Vec<Value>, role: &str, block: Value, same_kind: fn(&Value) -> bool) {
    if let Some(last) = out.last_mut() {
        if last["role"] == role && same_kind(last) {
            if let Some(blocks) = last["content"].as_array_mut() {
                blocks.push(block);
                return;
            }
        }
    }
    out.push(json!({ "role": role, "content": [block] }));
}

fn push_gemini_function_response(contents: &mut Vec<Value>, part: Value) {
    if let Some(last) = contents.last_mut() {
        let holds_responses = last["parts"]
            .as_array()
            .and_then(|parts| parts.first())
            .is_some_and(|p| p.get("functionResponse").is_some());
        if last["role"] == "user" && holds_responses {
            if let Some(parts) = last["parts"].as_array_mut() {
                parts.push(part);
                return;
            }
        }
    }
    contents.push(json!({ "role": "user", "parts": [part] }));
}
