//! Handler test fixtures.

use crate::server::ServerState;
use async_trait::async_trait;
use chatbridge_core::model::{ModelRequest, ModelResponse};
use chatbridge_core::types::MessageRole;
use chatbridge_core::{ChatService, ConnectionManager, InMemoryStore, ModelError, ModelGateway};
use std::sync::Arc;

/// `stub/echo` repeats the last user message; `stub/down` always times out.
pub(crate) struct EchoGateway;

#[async_trait]
impl ModelGateway for EchoGateway {
    fn models(&self) -> Vec<String> {
        vec!["stub/echo".to_string(), "stub/down".to_string()]
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        if request.model == "stub/down" {
            return Err(ModelError::Timeout {
                provider: "stub".to_string(),
            });
        }
        let last = request
            .messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::User)
            .map(|message| message.content.clone())
            .unwrap_or_default();
        Ok(ModelResponse::new(format!("echo: {last}")))
    }
}

pub(crate) fn state() -> Arc<ServerState<EchoGateway>> {
    let manager = Arc::new(ConnectionManager::new());
    let chat = ChatService::new(EchoGateway, manager.clone(), Arc::new(InMemoryStore::new()));
    Arc::new(ServerState::new(Arc::new(chat), manager))
}
