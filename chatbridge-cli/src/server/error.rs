use super::dto::ErrorResponse;
use axum::Json;
use axum::http::StatusCode;
use chatbridge_core::{ChatError, ModelError, StoreError};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub(crate) type Rejection = (StatusCode, Json<ErrorResponse>);

pub(crate) fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::EmptyInput { .. } => StatusCode::BAD_REQUEST,
        ChatError::Model(ModelError::UnknownModel { .. }) => StatusCode::BAD_REQUEST,
        ChatError::ChatNotFound { .. } | ChatError::Store(StoreError::NotFound { .. }) => {
            StatusCode::NOT_FOUND
        }
        ChatError::Model(_) => StatusCode::BAD_GATEWAY,
        ChatError::Store(_) | ChatError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Turn a chat failure into the JSON error body of a REST response.
pub(crate) fn reject(err: ChatError) -> Rejection {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(%err, status = status.as_u16(), "Request failed");
    } else {
        warn!(%err, status = status.as_u16(), "Request rejected");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
        }),
    )
}
