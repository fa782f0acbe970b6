pub mod app;
pub mod error;
pub mod loader;
pub mod provider;
pub mod server;

pub use app::{AppConfig, RestServerConfig};
pub use error::ConfigError;
pub use provider::{ModelProviderConfig, ProviderKind};
pub use server::{McpSettings, ServerConfig, TransportConfig};
