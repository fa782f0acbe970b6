use super::store::StoreError;
use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat {chat_id} not found")]
    ChatNotFound { chat_id: u64 },
    #[error("{field} must not be empty")]
    EmptyInput { field: &'static str },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode tool-call turn: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChatError {
    pub fn user_message(&self) -> String {
        match self {
            ChatError::ChatNotFound { chat_id } => format!("Chat {chat_id} does not exist."),
            ChatError::EmptyInput { field } => format!("The {field} must not be empty."),
            ChatError::Model(err) => err.user_message(),
            ChatError::Store(_) | ChatError::Encode(_) => {
                "The conversation could not be saved.".to_string()
            }
        }
    }
}
