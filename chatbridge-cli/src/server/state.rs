use chatbridge_core::{ChatService, ConnectionManager, ModelGateway};
use std::sync::Arc;

pub(crate) struct ServerState<G: ModelGateway> {
    chat: Arc<ChatService<G>>,
    manager: Arc<ConnectionManager>,
}

impl<G: ModelGateway> ServerState<G> {
    pub(crate) fn new(chat: Arc<ChatService<G>>, manager: Arc<ConnectionManager>) -> Self {
        Self { chat, manager }
    }

    pub(crate) fn chat(&self) -> Arc<ChatService<G>> {
        Arc::clone(&self.chat)
    }

    pub(crate) fn manager(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.manager)
    }
}
