use super::error::ServerError;
use super::routes;
use super::state::ServerState;
use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use chatbridge_core::ModelGateway;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

pub(super) async fn serve<G>(
    state: Arc<ServerState<G>>,
    addr: SocketAddr,
    cors_origins: &[String],
) -> Result<(), ServerError>
where
    G: ModelGateway + 'static,
{
    info!(%addr, "Binding REST server");
    let app = router(state).layer(cors_layer(cors_origins));

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

fn router<G>(state: Arc<ServerState<G>>) -> Router
where
    G: ModelGateway + 'static,
{
    Router::new()
        .route("/models", get(routes::chat::models_handler::<G>))
        .route("/tools", get(routes::tools::tools_handler::<G>))
        .route("/servers", get(routes::tools::servers_handler::<G>))
        .route(
            "/chats",
            get(routes::chat::list_chats_handler::<G>).post(routes::chat::create_chat_handler::<G>),
        )
        .route(
            "/chats/{id}/messages",
            get(routes::chat::list_messages_handler::<G>)
                .post(routes::chat::send_message_handler::<G>),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => warn!(%err, "Failed to listen for the shutdown signal"),
    }
}
