//! # chatbridge-core
//!
//! Connects a chat backend to external MCP tool servers and to a set of
//! model providers, and runs the tool-calling loop between them.
//!
//! ## Modules
//!
//! - [`config`] - application config (TOML) and the tool-server map (JSON)
//! - [`tooling`] - tool-server connections, transports and the connection manager
//! - [`model`] - the model gateway and one client per provider
//! - [`chat`] - message store and the send-message orchestrator
//! - [`domain`] - shared value types

pub mod chat;
pub mod config;
pub mod constants;
pub mod domain;
pub mod model;
pub mod tooling;

pub use chat::{ChatError, ChatService, InMemoryStore, MessageStore, StoreError};
pub use config::{AppConfig, ConfigError, McpSettings, ModelProviderConfig, ServerConfig};
pub use domain::types;
pub use model::{DynamicModelGateway, ModelError, ModelGateway};
pub use tooling::{ConnectionManager, ConnectionStatus, ToolInvokeError, ToolServerInterface};
