use super::error::ChatError;
use super::store::MessageStore;
use crate::domain::types::{Chat, ChatMessage, StoredMessage, ToolCallRequest, ToolDescriptor, TurnRole};
use crate::model::{ModelError, ModelGateway, ModelRequest, ModelResponse};
use crate::tooling::{ToolInvokeError, ToolServerInterface};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Drives a chat through the model gateway and the tool servers.
///
/// One message is at most two model calls: the first may request tools,
/// the second sees their results and produces the answer.
pub struct ChatService<G: ModelGateway> {
    gateway: G,
    tools: Arc<dyn ToolServerInterface>,
    store: Arc<dyn MessageStore>,
    chat_locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

/// Persisted form of a response that requested tools.
#[derive(Serialize)]
struct ToolCallAnnouncement<'a> {
    content: &'a str,
    tool_calls: &'a [ToolCallRequest],
}

/// Result of running one requested tool call.
struct ToolOutcome {
    /// Text handed back to the model for this call.
    text: String,
    /// Turn persisted for this call.
    turn: String,
    /// A tool server was actually reached.
    invoked: bool,
}

impl<G: ModelGateway> ChatService<G> {
    pub fn new(gateway: G, tools: Arc<dyn ToolServerInterface>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            gateway,
            tools,
            store,
            chat_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn available_models(&self) -> Vec<String> {
        self.gateway.models()
    }

    /// Names of the tools currently offered to models.
    pub async fn available_tools(&self) -> Vec<String> {
        self.tools
            .tools(None)
            .await
            .into_iter()
            .map(|tool| tool.name)
            .collect()
    }

    pub async fn create_chat(&self, title: &str) -> Result<Chat, ChatError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::EmptyInput { field: "title" });
        }
        let chat = self.store.create_chat(title).await?;
        info!(chat_id = chat.id, "Created chat");
        Ok(chat)
    }

    pub async fn chats(&self) -> Result<Vec<Chat>, ChatError> {
        Ok(self.store.list_chats().await?)
    }

    pub async fn messages(&self, chat_id: u64) -> Result<Vec<StoredMessage>, ChatError> {
        self.require_chat(chat_id).await?;
        Ok(self.store.messages_by_chat(chat_id).await?)
    }

    /// Append `content` to the chat, run the tool-calling loop with `model`
    /// and return the final answer.
    pub async fn send_message(&self, chat_id: u64, content: &str, model: &str) -> Result<String, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyInput { field: "content" });
        }
        if !self.gateway.supports(model) {
            return Err(ModelError::unknown_model(model).into());
        }
        self.require_chat(chat_id).await?;

        let lock = self.chat_lock(chat_id).await;
        let _guard = lock.lock().await;

        let user_turn = self.store.create_message(chat_id, content, TurnRole::Human).await?;
        let mut messages: Vec<ChatMessage> = self
            .store
            .messages_by_chat(chat_id)
            .await?
            .into_iter()
            .filter(|turn| turn.id != user_turn.id)
            .map(|turn| to_prompt_message(&turn))
            .collect();
        messages.push(ChatMessage::user(content));

        let tools = self.tools.tools(None).await;
        debug!(chat_id, model, history = messages.len(), tools = tools.len(), "Generating response");
        let first = self
            .gateway
            .generate(ModelRequest::new(model, messages.clone(), tools.clone()))
            .await?;

        if !first.has_tool_calls() {
            self.store.create_message(chat_id, &first.content, TurnRole::Ai).await?;
            return Ok(first.content);
        }

        self.run_tool_round(chat_id, model, messages, tools, first).await
    }

    async fn run_tool_round(
        &self,
        chat_id: u64,
        model: &str,
        mut messages: Vec<ChatMessage>,
        tools: Vec<ToolDescriptor>,
        first: ModelResponse,
    ) -> Result<String, ChatError> {
        let announcement = serde_json::to_string(&ToolCallAnnouncement {
            content: &first.content,
            tool_calls: &first.tool_calls,
        })?;
        self.store.create_message(chat_id, &announcement, TurnRole::Tool).await?;

        info!(chat_id, calls = first.tool_calls.len(), "Model requested tool calls");
        let outcomes = join_all(first.tool_calls.iter().map(|call| self.run_tool(call))).await;
        for outcome in &outcomes {
            self.store.create_message(chat_id, &outcome.turn, TurnRole::Tool).await?;
        }

        if !outcomes.iter().any(|outcome| outcome.invoked) {
            warn!(chat_id, "No requested tool could be resolved; keeping the first response");
            self.store.create_message(chat_id, &first.content, TurnRole::Ai).await?;
            return Ok(first.content);
        }

        messages.push(ChatMessage::assistant_with_calls(
            first.content.clone(),
            first.tool_calls.clone(),
        ));
        for (call, outcome) in first.tool_calls.iter().zip(outcomes) {
            messages.push(ChatMessage::tool_result(call, outcome.text));
        }

        let second = self
            .gateway
            .generate(ModelRequest::new(model, messages, tools))
            .await?;
        if second.has_tool_calls() {
            debug!(
                chat_id,
                calls = second.tool_calls.len(),
                "Ignoring tool calls in the follow-up response"
            );
        }
        self.store.create_message(chat_id, &second.content, TurnRole::Ai).await?;
        Ok(second.content)
    }

    async fn run_tool(&self, call: &ToolCallRequest) -> ToolOutcome {
        let input = call.arguments.to_string();
        let Some(server) = self.tools.resolve_server(&call.name).await else {
            let err = ToolInvokeError::UnknownTool {
                tool: call.name.clone(),
            };
            warn!(tool = %call.name, "No connected server provides the requested tool");
            return failure(call, &input, &err.to_string(), false);
        };

        debug!(server = %server, tool = %call.name, "Invoking tool");
        match self
            .tools
            .invoke_tool(&server, &call.name, call.arguments.clone())
            .await
        {
            Ok(result) if is_error_result(&result) => {
                failure(call, &input, &tool_output_text(&result), true)
            }
            Ok(result) => {
                let output = tool_output_text(&result);
                ToolOutcome {
                    turn: format!("Tool execution: {}\nInput: {input}\nOutput: {output}", call.name),
                    text: output,
                    invoked: true,
                }
            }
            Err(err) => {
                warn!(server = %server, tool = %call.name, %err, "Tool call failed");
                failure(call, &input, &err.to_string(), true)
            }
        }
    }

    async fn require_chat(&self, chat_id: u64) -> Result<Chat, ChatError> {
        self.store
            .chat_by_id(chat_id)
            .await?
            .ok_or(ChatError::ChatNotFound { chat_id })
    }

    async fn chat_lock(&self, chat_id: u64) -> Arc<Mutex<()>> {
        let mut locks = self.chat_locks.lock().await;
        Arc::clone(locks.entry(chat_id).or_default())
    }
}

fn failure(call: &ToolCallRequest, input: &str, message: &str, invoked: bool) -> ToolOutcome {
    let text = format!("Error executing tool {}: {message}", call.name);
    ToolOutcome {
        turn: format!("Tool execution error: {}\nInput: {input}\nError: {text}", call.name),
        text,
        invoked,
    }
}

fn to_prompt_message(turn: &StoredMessage) -> ChatMessage {
    match turn.role {
        TurnRole::Human => ChatMessage::user(turn.content.clone()),
        TurnRole::Ai | TurnRole::Tool | TurnRole::System => ChatMessage::assistant(turn.content.clone()),
    }
}

fn is_error_result(result: &Value) -> bool {
    result.get("isError").and_then(Value::as_bool).unwrap_or(false)
}

/// Text content blocks of an MCP tool result joined by newlines, or the
/// serialized result when it has none.
fn tool_output_text(result: &Value) -> String {
    let texts: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| {
                    block
                        .get("type")
                        .and_then(Value::as_str)
                        .is_some_and(|kind| kind.eq_ignore_ascii_case("text"))
                })
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if texts.is_empty() {
        result.to_string()
    } else {
        texts.join("\n")
    }
}
