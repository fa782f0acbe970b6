mod dto;
mod error;
mod router;
mod routes;
mod state;

pub use error::ServerError;
pub(crate) use state::ServerState;

use chatbridge_core::ModelGateway;
use std::net::SocketAddr;
use std::sync::Arc;

/// Serve the REST API until ctrl-c.
pub async fn serve<G>(
    state: Arc<ServerState<G>>,
    addr: SocketAddr,
    cors_origins: &[String],
) -> Result<(), ServerError>
where
    G: ModelGateway + 'static,
{
    router::serve(state, addr, cors_origins).await
}
