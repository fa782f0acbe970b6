use super::super::dto::{
    ChatListResponse, CreateChatRequest, MessageListResponse, ModelListResponse, SendMessageRequest,
    SendMessageResponse,
};
use super::super::error::{Rejection, reject};
use super::super::state::ServerState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chatbridge_core::ModelGateway;
use chatbridge_core::types::Chat;
use std::sync::Arc;
use tracing::{debug, info};

pub async fn models_handler<G: ModelGateway>(
    State(state): State<Arc<ServerState<G>>>,
) -> Json<ModelListResponse> {
    Json(ModelListResponse {
        models: state.chat().available_models(),
    })
}

pub async fn list_chats_handler<G: ModelGateway>(
    State(state): State<Arc<ServerState<G>>>,
) -> Result<Json<ChatListResponse>, Rejection> {
    let chats = state.chat().chats().await.map_err(reject)?;
    debug!(chat_count = chats.len(), "Serving /chats request");
    Ok(Json(ChatListResponse { chats }))
}

pub async fn create_chat_handler<G: ModelGateway>(
    State(state): State<Arc<ServerState<G>>>,
    Json(payload): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<Chat>), Rejection> {
    let chat = state.chat().create_chat(&payload.title).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(chat)))
}

pub async fn list_messages_handler<G: ModelGateway>(
    State(state): State<Arc<ServerState<G>>>,
    Path(chat_id): Path<u64>,
) -> Result<Json<MessageListResponse>, Rejection> {
    let messages = state.chat().messages(chat_id).await.map_err(reject)?;
    Ok(Json(MessageListResponse { messages }))
}

/// Run one user message through the tool-calling loop.
pub async fn send_message_handler<G: ModelGateway>(
    State(state): State<Arc<ServerState<G>>>,
    Path(chat_id): Path<u64>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, Rejection> {
    let SendMessageRequest { content, model } = payload;
    info!(chat_id, model = %model, "Received message");

    let content = state
        .chat()
        .send_message(chat_id, &content, &model)
        .await
        .map_err(reject)?;

    info!(chat_id, "Message answered");
    Ok(Json(SendMessageResponse { content }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::routes::testing::{EchoGateway, state};
    use chatbridge_core::types::TurnRole;

    async fn new_chat(state: &Arc<ServerState<EchoGateway>>, title: &str) -> Chat {
        let (status, Json(chat)) = create_chat_handler(
            State(Arc::clone(state)),
            Json(CreateChatRequest {
                title: title.to_string(),
            }),
        )
        .await
        .expect("chat created");
        assert_eq!(status, StatusCode::CREATED);
        chat
    }

    async fn send(
        state: &Arc<ServerState<EchoGateway>>,
        chat_id: u64,
        content: &str,
        model: &str,
    ) -> Result<Json<SendMessageResponse>, Rejection> {
        send_message_handler(
            State(Arc::clone(state)),
            Path(chat_id),
            Json(SendMessageRequest {
                content: content.to_string(),
                model: model.to_string(),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn lists_configured_models() {
        let Json(body) = models_handler(State(state())).await;
        assert_eq!(body.models, ["stub/echo", "stub/down"]);
    }

    #[tokio::test]
    async fn message_round_trip_is_persisted() {
        let state = state();
        let chat = new_chat(&state, "Demo").await;

        let Json(reply) = send(&state, chat.id, "hello", "stub/echo").await.expect("answer");
        assert_eq!(reply.content, "echo: hello");

        let Json(history) = list_messages_handler(State(Arc::clone(&state)), Path(chat.id))
            .await
            .expect("history");
        let roles: Vec<_> = history.messages.iter().map(|turn| turn.role).collect();
        assert_eq!(roles, [TurnRole::Human, TurnRole::Ai]);

        let Json(chats) = list_chats_handler(State(state)).await.expect("chats");
        assert_eq!(chats.chats, [chat]);
    }

    #[tokio::test]
    async fn blank_title_is_a_bad_request() {
        let err = create_chat_handler(
            State(state()),
            Json(CreateChatRequest {
                title: "   ".to_string(),
            }),
        )
        .await
        .expect_err("rejected");
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn send_failures_map_to_statuses() {
        let state = state();
        let chat = new_chat(&state, "Demo").await;

        let (status, _) = send(&state, chat.id, "", "stub/echo").await.expect_err("empty");
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, Json(body)) = send(&state, chat.id, "hi", "nope/model").await.expect_err("model");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("nope/model"));

        let (status, _) = send(&state, 404, "hi", "stub/echo").await.expect_err("chat");
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&state, chat.id, "hi", "stub/down").await.expect_err("down");
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn unknown_chat_history_is_not_found() {
        let err = list_messages_handler(State(state()), Path(7))
            .await
            .expect_err("missing");
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
