use super::super::dto::{ServerListResponse, ToolListResponse};
use super::super::state::ServerState;
use axum::Json;
use axum::extract::State;
use chatbridge_core::ModelGateway;
use std::sync::Arc;
use tracing::debug;

pub async fn tools_handler<G: ModelGateway>(
    State(state): State<Arc<ServerState<G>>>,
) -> Json<ToolListResponse> {
    let tools = state.chat().available_tools().await;
    debug!(tool_count = tools.len(), "Serving /tools request");
    Json(ToolListResponse { tools })
}

/// Status, cached tools and last error of every registered tool server.
pub async fn servers_handler<G: ModelGateway>(
    State(state): State<Arc<ServerState<G>>>,
) -> Json<ServerListResponse> {
    let servers = state.manager().connections().await;
    debug!(server_count = servers.len(), "Serving /servers request");
    Json(ServerListResponse { servers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::routes::testing::state;

    #[tokio::test]
    async fn no_servers_means_no_tools() {
        let state = state();
        let Json(tools) = tools_handler(State(Arc::clone(&state))).await;
        assert!(tools.tools.is_empty());

        let Json(servers) = servers_handler(State(state)).await;
        assert!(servers.servers.is_empty());
    }
}
