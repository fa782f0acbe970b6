use crate::domain::types::{Chat, StoredMessage, TurnRole};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chat {chat_id} not found")]
    NotFound { chat_id: u64 },
    #[error("failed to write to the message store: {reason}")]
    WriteFailed { reason: String },
}

/// Append-only persistence of chats and their turns.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_chat(&self, title: &str) -> Result<Chat, StoreError>;

    async fn create_message(
        &self,
        chat_id: u64,
        content: &str,
        role: TurnRole,
    ) -> Result<StoredMessage, StoreError>;

    /// Turns of a chat in creation order.
    async fn messages_by_chat(&self, chat_id: u64) -> Result<Vec<StoredMessage>, StoreError>;

    async fn chat_by_id(&self, chat_id: u64) -> Result<Option<Chat>, StoreError>;

    async fn list_chats(&self) -> Result<Vec<Chat>, StoreError>;
}

/// Process-local store; contents are lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    chats: BTreeMap<u64, Chat>,
    messages: BTreeMap<u64, Vec<StoredMessage>>,
    next_chat_id: u64,
    next_message_id: u64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn create_chat(&self, title: &str) -> Result<Chat, StoreError> {
        let mut state = self.state.lock().await;
        state.next_chat_id += 1;
        let chat = Chat {
            id: state.next_chat_id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        state.chats.insert(chat.id, chat.clone());
        state.messages.insert(chat.id, Vec::new());
        Ok(chat)
    }

    async fn create_message(
        &self,
        chat_id: u64,
        content: &str,
        role: TurnRole,
    ) -> Result<StoredMessage, StoreError> {
        let mut state = self.state.lock().await;
        if !state.chats.contains_key(&chat_id) {
            return Err(StoreError::NotFound { chat_id });
        }
        state.next_message_id += 1;
        let message = StoredMessage {
            id: state.next_message_id,
            chat_id,
            content: content.to_string(),
            role,
            created_at: Utc::now(),
        };
        state
            .messages
            .entry(chat_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn messages_by_chat(&self, chat_id: u64) -> Result<Vec<StoredMessage>, StoreError> {
        let state = self.state.lock().await;
        state
            .messages
            .get(&chat_id)
            .cloned()
            .ok_or(StoreError::NotFound { chat_id })
    }

    async fn chat_by_id(&self, chat_id: u64) -> Result<Option<Chat>, StoreError> {
        Ok(self.state.lock().await.chats.get(&chat_id).cloned())
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        Ok(self.state.lock().await.chats.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_keep_creation_order() {
        let store = InMemoryStore::new();
        let chat = store.create_chat("math").await.expect("chat");

        store.create_message(chat.id, "2+3?", TurnRole::Human).await.expect("write");
        store.create_message(chat.id, "5", TurnRole::Ai).await.expect("write");

        let messages = store.messages_by_chat(chat.id).await.expect("read");
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["2+3?", "5"]);
        assert!(messages[0].id < messages[1].id);
        assert_eq!(messages[1].role, TurnRole::Ai);
    }

    #[tokio::test]
    async fn writing_to_missing_chat_fails() {
        let store = InMemoryStore::new();
        let err = store
            .create_message(42, "hello", TurnRole::Human)
            .await
            .expect_err("missing chat");
        assert!(matches!(err, StoreError::NotFound { chat_id: 42 }));
        assert!(store.chat_by_id(42).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn chats_are_listed_by_id() {
        let store = InMemoryStore::new();
        store.create_chat("first").await.expect("chat");
        store.create_chat("second").await.expect("chat");

        let titles: Vec<_> = store
            .list_chats()
            .await
            .expect("list")
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, ["first", "second"]);
    }
}
