//! In-process transports standing in for real tool servers.

use super::error::ToolInvokeError;
use super::transport::{EventReceiver, EventSender, Transport, TransportEvent, TransportFactory};
use crate::config::{ServerConfig, TransportConfig};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};

/// Records every outbound message and never answers.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: AsyncMutex<Vec<Value>>,
    notify: Notify,
}

impl RecordingTransport {
    pub(crate) async fn sent(&self) -> Vec<Value> {
        self.sent.lock().await.clone()
    }

    pub(crate) async fn wait_for_sent(&self, count: usize) -> Vec<Value> {
        loop {
            let notified = self.notify.notified();
            {
                let sent = self.sent.lock().await;
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, message: &Value) -> Result<(), ToolInvokeError> {
        self.sent.lock().await.push(message.clone());
        self.notify.notify_waiters();
        Ok(())
    }

    async fn close(&self) {}
}

/// Behaviour of one scripted tool server.
#[derive(Debug, Clone)]
pub(crate) struct FakeServer {
    pub(crate) tools: Vec<Value>,
    pub(crate) resources: Option<Vec<Value>>,
    /// Transport cannot be opened at all.
    pub(crate) refuse_open: bool,
    /// `initialize` is never answered.
    pub(crate) silent_initialize: bool,
    /// `tools/list` answers with a JSON-RPC error.
    pub(crate) broken_tool_list: bool,
}

impl FakeServer {
    pub(crate) fn with_tools(names: &[&str]) -> Self {
        Self {
            tools: names
                .iter()
                .map(|name| {
                    json!({
                        "name": name,
                        "description": format!("{name} tool"),
                        "inputSchema": {"type": "object"}
                    })
                })
                .collect(),
            resources: None,
            refuse_open: false,
            silent_initialize: false,
            broken_tool_list: false,
        }
    }

    pub(crate) fn with_resources(mut self, uris: &[&str]) -> Self {
        self.resources = Some(uris.iter().map(|uri| json!({ "uri": uri })).collect());
        self
    }

    pub(crate) fn refusing() -> Self {
        Self {
            refuse_open: true,
            ..Self::with_tools(&[])
        }
    }

    pub(crate) fn silent() -> Self {
        Self {
            silent_initialize: true,
            ..Self::with_tools(&[])
        }
    }
}

/// Opens [`FakeTransport`]s from a table of scripted servers.
#[derive(Default)]
pub(crate) struct FakeTransportFactory {
    servers: HashMap<String, FakeServer>,
    links: AsyncMutex<HashMap<String, Arc<FakeTransport>>>,
    opened: AsyncMutex<Vec<String>>,
}

impl FakeTransportFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn server(mut self, name: &str, server: FakeServer) -> Self {
        self.servers.insert(name.to_string(), server);
        self
    }

    /// Live transport of `name`, if it was opened.
    pub(crate) async fn link(&self, name: &str) -> Option<Arc<FakeTransport>> {
        self.links.lock().await.get(name).cloned()
    }

    pub(crate) async fn opened(&self) -> Vec<String> {
        self.opened.lock().await.clone()
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn open(
        &self,
        server: &ServerConfig,
    ) -> Result<(Arc<dyn Transport>, EventReceiver), ToolInvokeError> {
        self.opened.lock().await.push(server.name.clone());
        let script = self
            .servers
            .get(&server.name)
            .cloned()
            .unwrap_or_else(|| FakeServer::with_tools(&[]));
        if script.refuse_open {
            return Err(ToolInvokeError::Transport {
                server: server.name.clone(),
                message: "connection refused".to_string(),
            });
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(FakeTransport {
            script: AsyncMutex::new(script),
            events: events_tx,
            closed: AsyncMutex::new(false),
        });
        self.links
            .lock()
            .await
            .insert(server.name.clone(), Arc::clone(&transport));
        Ok((transport, events_rx))
    }
}

/// Scripted MCP server living on the other end of the channel.
///
/// Tools: `add` sums `a` and `b`, `echo` returns its arguments as text,
/// `fail` answers with a JSON-RPC error, `hang` never answers and `slow`
/// answers after 50ms.
pub(crate) struct FakeTransport {
    script: AsyncMutex<FakeServer>,
    events: EventSender,
    closed: AsyncMutex<bool>,
}

impl FakeTransport {
    pub(crate) fn emit(&self, message: Value) {
        let _ = self.events.send(TransportEvent::Message(message));
    }

    /// Simulate the server going away.
    pub(crate) fn crash(&self, reason: &str) {
        let _ = self.events.send(TransportEvent::Error(reason.to_string()));
        let _ = self.events.send(TransportEvent::Closed);
    }

    pub(crate) async fn set_tools(&self, names: &[&str]) {
        self.script.lock().await.tools = FakeServer::with_tools(names).tools;
    }

    pub(crate) async fn is_closed(&self) -> bool {
        *self.closed.lock().await
    }

    async fn answer(&self, method: &str, params: &Value) -> Option<Result<Value, (i64, String)>> {
        let script = self.script.lock().await;
        match method {
            "initialize" if script.silent_initialize => None,
            "initialize" => {
                let mut capabilities = json!({ "tools": { "listChanged": true } });
                if script.resources.is_some() {
                    capabilities["resources"] = json!({});
                }
                Some(Ok(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": capabilities,
                    "serverInfo": { "name": "fake", "version": "0.0.0" }
                })))
            }
            "tools/list" if script.broken_tool_list => Some(Err((-32603, "boom".to_string()))),
            "tools/list" => Some(Ok(json!({ "tools": script.tools }))),
            "resources/list" => Some(Ok(json!({
                "resources": script.resources.clone().unwrap_or_default()
            }))),
            "tools/call" => call_tool(params),
            other => Some(Err((-32601, format!("unknown method {other}")))),
        }
    }
}

fn call_tool(params: &Value) -> Option<Result<Value, (i64, String)>> {
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
    let text = |text: String| Ok(json!({ "content": [{ "type": "text", "text": text }] }));
    match params.get("name").and_then(Value::as_str).unwrap_or_default() {
        "add" => {
            let a = arguments.get("a").and_then(Value::as_f64).unwrap_or_default();
            let b = arguments.get("b").and_then(Value::as_f64).unwrap_or_default();
            Some(text(format!("{}", a + b)))
        }
        "echo" | "slow" => Some(text(arguments.to_string())),
        "fail" => Some(Err((-32000, "tool exploded".to_string()))),
        "hang" => None,
        other => Some(Err((-32602, format!("unknown tool {other}")))),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: &Value) -> Result<(), ToolInvokeError> {
        if *self.closed.lock().await {
            return Err(ToolInvokeError::Transport {
                server: "fake".to_string(),
                message: "closed".to_string(),
            });
        }
        let (Some(id), Some(method)) = (
            message.get("id").cloned(),
            message.get("method").and_then(Value::as_str),
        ) else {
            return Ok(());
        };
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let reply = match self.answer(method, &params).await {
            Some(Ok(result)) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Some(Err((code, text))) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": text }
            }),
            None => return Ok(()),
        };

        let is_slow = params.get("name").and_then(Value::as_str) == Some("slow");
        if is_slow {
            let events = self.events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = events.send(TransportEvent::Message(reply));
            });
        } else {
            let _ = self.events.send(TransportEvent::Message(reply));
        }
        Ok(())
    }

    async fn close(&self) {
        *self.closed.lock().await = true;
        let _ = self.events.send(TransportEvent::Closed);
    }
}

/// Subprocess config for a fake server; the command is never run.
pub(crate) fn server_config(name: &str, auto_approve: &[&str]) -> ServerConfig {
    ServerConfig {
        name: name.to_string(),
        transport: TransportConfig::Subprocess {
            command: PathBuf::from(format!("{name}-server")),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        },
        disabled: false,
        timeout: None,
        auto_approve: auto_approve.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
    }
}
