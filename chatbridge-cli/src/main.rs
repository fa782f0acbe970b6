mod server;

use chatbridge_core::{AppConfig, ChatService, ConnectionManager, DynamicModelGateway, InMemoryStore};
use clap::Parser;
use server::ServerState;
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "chatbridge",
    version,
    about = "Chat backend that lets configured models call MCP tool servers"
)]
struct Cli {
    /// Application config file; defaults to config/chatbridge.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Tool-server map overriding the one named in the config file
    #[arg(long)]
    mcp_config: Option<PathBuf>,
    /// REST bind address overriding `[server].bind`
    #[arg(long)]
    addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    info!("Starting chatbridge");
    let cli = Cli::parse();
    debug!(config = ?cli.config, mcp_config = ?cli.mcp_config, addr = ?cli.addr, "CLI arguments parsed");

    let config = AppConfig::load(cli.config.as_deref())?;
    let addr = match cli.addr {
        Some(addr) => addr,
        None => config.rest_server.bind_addr()?,
    };

    let gateway = DynamicModelGateway::from_configs(&config.providers)?;
    info!(models = config.model_keys().len(), "Model gateway ready");

    let manager = Arc::new(ConnectionManager::new());
    match cli.mcp_config.as_deref().or(config.mcp_config.as_deref()) {
        Some(path) => manager.initialize_from_file(path).await?,
        None => warn!("No tool-server map configured; models will run without tools"),
    }

    let chat = ChatService::new(gateway, manager.clone(), Arc::new(InMemoryStore::new()));
    let state = Arc::new(ServerState::new(Arc::new(chat), Arc::clone(&manager)));

    info!(%addr, "Starting REST server");
    let served = server::serve(state, addr, &config.rest_server.cors_origins).await;

    info!("Closing tool-server connections");
    manager.dispose().await;
    served?;

    info!("chatbridge stopped");
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
