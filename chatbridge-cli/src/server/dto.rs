use chatbridge_core::tooling::ConnectionSnapshot;
use chatbridge_core::types::{Chat, StoredMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerListResponse {
    pub servers: Vec<ConnectionSnapshot>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<Chat>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub content: String,
}
