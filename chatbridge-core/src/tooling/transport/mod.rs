//! Transports carry JSON-RPC messages to and from one tool server.
//!
//! Outbound messages go through [`Transport::send`]. Inbound traffic, errors
//! and the end of the stream are reported on an unbounded channel returned
//! alongside the transport, so the connection can observe a crashed process
//! or a dropped stream without polling.

mod sse;
mod stdio;

pub use sse::SseTransport;
pub use stdio::StdioTransport;

use super::error::ToolInvokeError;
use crate::config::{ServerConfig, TransportConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum TransportEvent {
    /// One decoded JSON-RPC message from the server.
    Message(Value),
    /// The transport failed; the message is recorded on the connection.
    Error(String),
    /// The transport will deliver nothing more.
    Closed,
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &Value) -> Result<(), ToolInvokeError>;

    /// Release the underlying process or stream. Never fails.
    async fn close(&self);
}

/// Opens the transport described by a server's configuration.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        server: &ServerConfig,
    ) -> Result<(Arc<dyn Transport>, EventReceiver), ToolInvokeError>;
}

/// Opens real subprocess and HTTP event-stream transports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTransportFactory;

#[async_trait]
impl TransportFactory for NativeTransportFactory {
    async fn open(
        &self,
        server: &ServerConfig,
    ) -> Result<(Arc<dyn Transport>, EventReceiver), ToolInvokeError> {
        match &server.transport {
            TransportConfig::Subprocess {
                command,
                args,
                env,
                cwd,
            } => {
                let (transport, events) =
                    StdioTransport::spawn(&server.name, command, args, env, cwd.as_deref())?;
                Ok((Arc::new(transport), events))
            }
            TransportConfig::NetworkStream { url } => {
                let (transport, events) =
                    SseTransport::connect(&server.name, url.clone(), server.discovery_timeout())
                        .await?;
                Ok((Arc::new(transport), events))
            }
        }
    }
}
