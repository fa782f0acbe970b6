use super::error::{ConnectionError, ToolInvokeError};
use super::rpc::{Inbound, RpcSession};
use super::transport::{EventReceiver, TransportEvent, TransportFactory};
use crate::config::ServerConfig;
use crate::constants::{CLIENT_NAME, DEFAULT_RESOURCE_MIME_TYPE, PROTOCOL_VERSION};
use crate::domain::types::{ResourceDescriptor, ToolDescriptor};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const TOOLS_CHANGED: &str = "notifications/tools/list_changed";
const RESOURCES_CHANGED: &str = "notifications/resources/list_changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Point-in-time view of one connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub name: String,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tools: Vec<ToolDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
    pub disabled: bool,
}

/// One supervised link to a tool server.
///
/// Status moves `connecting -> connected -> disconnected`; a transport error
/// or close reaches `disconnected` from any state and nothing reconnects.
#[derive(Clone)]
pub struct ToolServerConnection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    config: ServerConfig,
    factory: Arc<dyn TransportFactory>,
    state: RwLock<ConnectionState>,
    session: RwLock<Option<Arc<RpcSession>>>,
}

struct ConnectionState {
    status: ConnectionStatus,
    error: Option<String>,
    tools: Vec<ToolDescriptor>,
    resources: Vec<ResourceDescriptor>,
}

impl ToolServerConnection {
    pub fn new(config: ServerConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                config,
                factory,
                state: RwLock::new(ConnectionState {
                    status: ConnectionStatus::Connecting,
                    error: None,
                    tools: Vec::new(),
                    resources: Vec::new(),
                }),
                session: RwLock::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.inner.state.read().await.status
    }

    /// Open the transport, run the handshake and discover capabilities.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let inner = &self.inner;
        {
            let mut state = inner.state.write().await;
            state.status = ConnectionStatus::Connecting;
            state.error = None;
        }

        match inner.establish().await {
            Ok(()) => Ok(()),
            Err(source) => {
                inner.mark_failed(source.to_string()).await;
                if let Some(session) = inner.session.write().await.take() {
                    session.close().await;
                }
                Err(ConnectionError {
                    server: inner.config.name.clone(),
                    source,
                })
            }
        }
    }

    /// Run `tools/call` with the server's request timeout and return the raw
    /// result.
    pub async fn invoke(&self, tool: &str, arguments: Value) -> Result<Value, ToolInvokeError> {
        let inner = &self.inner;
        if inner.config.disabled {
            return Err(ToolInvokeError::Disabled {
                server: inner.config.name.clone(),
            });
        }
        if inner.state.read().await.status != ConnectionStatus::Connected {
            return Err(inner.not_connected());
        }
        let session = inner
            .session
            .read()
            .await
            .clone()
            .ok_or_else(|| inner.not_connected())?;

        debug!(server = %inner.config.name, tool, "Calling tool");
        session
            .request(
                "tools/call",
                json!({ "name": tool, "arguments": arguments }),
                inner.config.request_timeout(),
            )
            .await
    }

    /// Release the transport. Safe to call on a connection that never
    /// finished connecting.
    pub async fn close(&self) {
        let session = self.inner.session.write().await.take();
        if let Some(session) = session {
            session.close().await;
        }
        self.inner.state.write().await.status = ConnectionStatus::Disconnected;
    }

    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.inner.state.read().await.tools.clone()
    }

    pub async fn resources(&self) -> Vec<ResourceDescriptor> {
        self.inner.state.read().await.resources.clone()
    }

    pub async fn snapshot(&self) -> ConnectionSnapshot {
        let state = self.inner.state.read().await;
        ConnectionSnapshot {
            name: self.inner.config.name.clone(),
            status: state.status,
            error: state.error.clone(),
            tools: state.tools.clone(),
            resources: state.resources.clone(),
            disabled: self.inner.config.disabled,
        }
    }
}

impl ConnectionInner {
    async fn establish(self: &Arc<Self>) -> Result<(), ToolInvokeError> {
        let name = self.config.name.as_str();
        let wait = self.config.discovery_timeout();

        let (transport, events) = self.factory.open(&self.config).await?;
        let session = Arc::new(RpcSession::new(name, transport));
        *self.session.write().await = Some(Arc::clone(&session));
        tokio::spawn(pump(Arc::downgrade(self), Arc::clone(&session), events));

        let init = session
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "clientInfo": {
                        "name": CLIENT_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": {}
                }),
                wait,
            )
            .await?;
        session.notify("notifications/initialized", json!({})).await?;

        let advertises_resources = init
            .get("capabilities")
            .and_then(|caps| caps.get("resources"))
            .is_some();

        self.refresh_tools(&session).await;
        if advertises_resources {
            self.refresh_resources(&session).await;
        }

        let mut state = self.state.write().await;
        // The transport may have died during discovery.
        if state.status == ConnectionStatus::Connecting {
            state.status = ConnectionStatus::Connected;
            info!(
                server = name,
                transport = self.config.transport.kind(),
                tools = state.tools.len(),
                resources = state.resources.len(),
                "Connected to MCP server"
            );
            Ok(())
        } else {
            Err(ToolInvokeError::Terminated {
                server: name.to_string(),
            })
        }
    }

    async fn refresh_tools(&self, session: &RpcSession) {
        let result = session
            .request("tools/list", json!({}), self.config.discovery_timeout())
            .await;
        match result {
            Ok(value) => {
                let tools = parse_tools(&value, &self.config);
                debug!(server = %self.config.name, count = tools.len(), "Discovered tools");
                self.state.write().await.tools = tools;
            }
            Err(err) => {
                warn!(server = %self.config.name, %err, "tools/list failed");
            }
        }
    }

    async fn refresh_resources(&self, session: &RpcSession) {
        let result = session
            .request("resources/list", json!({}), self.config.discovery_timeout())
            .await;
        match result {
            Ok(value) => {
                let resources = parse_resources(&value);
                debug!(server = %self.config.name, count = resources.len(), "Discovered resources");
                self.state.write().await.resources = resources;
            }
            Err(err) => {
                warn!(server = %self.config.name, %err, "resources/list failed");
            }
        }
    }

    async fn mark_failed(&self, message: String) {
        warn!(server = %self.config.name, error = %message, "MCP server disconnected");
        let mut state = self.state.write().await;
        state.status = ConnectionStatus::Disconnected;
        state.error = Some(message);
    }

    /// Stream of `session` ended; only the current session may flip status.
    async fn mark_closed(&self, session: &Arc<RpcSession>) {
        let mut current = self.session.write().await;
        if current
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, session))
        {
            current.take();
            self.state.write().await.status = ConnectionStatus::Disconnected;
        }
    }

    fn not_connected(&self) -> ToolInvokeError {
        ToolInvokeError::NotConnected {
            server: self.config.name.clone(),
        }
    }
}

async fn pump(inner: Weak<ConnectionInner>, session: Arc<RpcSession>, mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message(value) => {
                let Inbound::Notification(method) = session.dispatch(value).await else {
                    continue;
                };
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                // Discovery responses arrive through this loop, so refresh elsewhere.
                let session = Arc::clone(&session);
                match method.as_str() {
                    TOOLS_CHANGED => {
                        tokio::spawn(async move { inner.refresh_tools(&session).await });
                    }
                    RESOURCES_CHANGED => {
                        tokio::spawn(async move { inner.refresh_resources(&session).await });
                    }
                    _ => {}
                }
            }
            TransportEvent::Error(message) => {
                if let Some(inner) = inner.upgrade() {
                    inner.mark_failed(message).await;
                }
            }
            TransportEvent::Closed => break,
        }
    }

    session.fail_all_pending().await;
    if let Some(inner) = inner.upgrade() {
        inner.mark_closed(&session).await;
    }
}

fn parse_tools(result: &Value, config: &ServerConfig) -> Vec<ToolDescriptor> {
    let Some(array) = result.get("tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    array
        .iter()
        .filter_map(|tool| {
            let name = tool.get("name").and_then(Value::as_str)?;
            Some(ToolDescriptor {
                name: name.to_string(),
                description: tool
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                input_schema: tool
                    .get("inputSchema")
                    .cloned()
                    .unwrap_or_else(|| json!({ "type": "object" })),
                auto_approve: config.is_auto_approved(name),
            })
        })
        .collect()
}

fn parse_resources(result: &Value) -> Vec<ResourceDescriptor> {
    let Some(array) = result.get("resources").and_then(Value::as_array) else {
        return Vec::new();
    };
    let text = |entry: &Value, key: &str| entry.get(key).and_then(Value::as_str).map(String::from);
    array
        .iter()
        .filter_map(|entry| {
            Some(ResourceDescriptor {
                uri: text(entry, "uri")?,
                mime_type: text(entry, "mimeType")
                    .unwrap_or_else(|| DEFAULT_RESOURCE_MIME_TYPE.to_string()),
                name: text(entry, "name"),
                title: text(entry, "title"),
                description: text(entry, "description"),
            })
        })
        .collect()
}
