use super::connection::{ConnectionSnapshot, ConnectionStatus, ToolServerConnection};
use super::error::ToolInvokeError;
use super::interface::ToolServerInterface;
use super::transport::{NativeTransportFactory, TransportFactory};
use crate::config::{ConfigError, McpSettings};
use crate::domain::types::{ResourceDescriptor, ToolDescriptor};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{info, warn};

/// Owns every tool-server connection, in registration order.
pub struct ConnectionManager {
    factory: Arc<dyn TransportFactory>,
    connections: RwLock<Vec<ToolServerConnection>>,
    lifecycle: AsyncMutex<()>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_factory(Arc::new(NativeTransportFactory))
    }

    pub fn with_factory(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            connections: RwLock::new(Vec::new()),
            lifecycle: AsyncMutex::new(()),
        }
    }

    /// Load the tool-server map at `path` and connect to it.
    pub async fn initialize_from_file(&self, path: &Path) -> Result<(), ConfigError> {
        let settings = McpSettings::load(path)?;
        self.initialize(&settings).await;
        Ok(())
    }

    /// Replace the connection set with one connection per enabled server and
    /// connect them concurrently. Failures are logged and stay visible in
    /// [`ConnectionManager::connections`].
    pub async fn initialize(&self, settings: &McpSettings) {
        let _guard = self.lifecycle.lock().await;
        self.close_all().await;

        let registered: Vec<ToolServerConnection> = settings
            .enabled()
            .cloned()
            .map(|config| ToolServerConnection::new(config, Arc::clone(&self.factory)))
            .collect();
        *self.connections.write().await = registered.clone();

        let outcomes = join_all(registered.iter().map(ToolServerConnection::connect)).await;
        let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
        for err in outcomes.into_iter().filter_map(Result::err) {
            warn!(server = %err.server, error = %err.source, "Failed to connect to MCP server");
        }
        info!(
            servers = registered.len(),
            failed, "MCP connection manager initialized"
        );

        self.warn_duplicate_tools().await;
    }

    /// Tools of every connected server, or of `server` only.
    pub async fn tools(&self, server: Option<&str>) -> Vec<ToolDescriptor> {
        let mut tools = Vec::new();
        for connection in self.selected(server).await {
            if connection.status().await == ConnectionStatus::Connected {
                tools.extend(connection.tools().await);
            }
        }
        tools
    }

    pub async fn resources(&self, server: Option<&str>) -> Vec<ResourceDescriptor> {
        let mut resources = Vec::new();
        for connection in self.selected(server).await {
            if connection.status().await == ConnectionStatus::Connected {
                resources.extend(connection.resources().await);
            }
        }
        resources
    }

    pub async fn connections(&self) -> Vec<ConnectionSnapshot> {
        let connections = self.connections.read().await.clone();
        join_all(connections.iter().map(ToolServerConnection::snapshot)).await
    }

    /// First connected server, in registration order, that offers `tool`.
    pub async fn resolve_server(&self, tool: &str) -> Option<String> {
        let connections = self.connections.read().await.clone();
        for connection in connections {
            if connection.status().await != ConnectionStatus::Connected {
                continue;
            }
            if connection.tools().await.iter().any(|t| t.name == tool) {
                return Some(connection.name().to_string());
            }
        }
        None
    }

    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<Value, ToolInvokeError> {
        let connection = self
            .find(server)
            .await
            .ok_or_else(|| ToolInvokeError::UnknownServer {
                server: server.to_string(),
            })?;
        connection.invoke(tool, arguments).await
    }

    /// Route a call by tool name alone.
    pub async fn invoke(&self, tool: &str, arguments: Value) -> Result<Value, ToolInvokeError> {
        let server = self
            .resolve_server(tool)
            .await
            .ok_or_else(|| ToolInvokeError::UnknownTool {
                tool: tool.to_string(),
            })?;
        self.call_tool(&server, tool, arguments).await
    }

    /// Close every connection and forget them.
    pub async fn dispose(&self) {
        let _guard = self.lifecycle.lock().await;
        self.close_all().await;
    }

    async fn close_all(&self) {
        let previous = std::mem::take(&mut *self.connections.write().await);
        if previous.is_empty() {
            return;
        }
        join_all(previous.iter().map(ToolServerConnection::close)).await;
        info!(count = previous.len(), "Closed MCP connections");
    }

    async fn find(&self, server: &str) -> Option<ToolServerConnection> {
        self.connections
            .read()
            .await
            .iter()
            .find(|connection| connection.name() == server)
            .cloned()
    }

    async fn selected(&self, server: Option<&str>) -> Vec<ToolServerConnection> {
        let connections = self.connections.read().await;
        match server {
            Some(name) => connections
                .iter()
                .filter(|connection| connection.name() == name)
                .cloned()
                .collect(),
            None => connections.clone(),
        }
    }

    async fn warn_duplicate_tools(&self) {
        let mut owners: HashMap<String, String> = HashMap::new();
        let connections = self.connections.read().await.clone();
        for connection in connections {
            for tool in connection.tools().await {
                match owners.get(&tool.name) {
                    Some(owner) => warn!(
                        tool = %tool.name,
                        server = connection.name(),
                        owner = %owner,
                        "Duplicate tool name; calls go to the first server that registered it"
                    ),
                    None => {
                        owners.insert(tool.name, connection.name().to_string());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ToolServerInterface for ConnectionManager {
    async fn tools(&self, server: Option<&str>) -> Vec<ToolDescriptor> {
        ConnectionManager::tools(self, server).await
    }

    async fn resolve_server(&self, tool: &str) -> Option<String> {
        ConnectionManager::resolve_server(self, tool).await
    }

    async fn invoke_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<Value, ToolInvokeError> {
        self.call_tool(server, tool, arguments).await
    }
}
