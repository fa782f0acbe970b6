use super::{EventReceiver, EventSender, Transport, TransportEvent};
use crate::tooling::error::ToolInvokeError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

const ENDPOINT_EVENT: &str = "endpoint";
const MESSAGE_EVENT: &str = "message";

/// MCP over HTTP with server-sent events.
///
/// The GET stream delivers server messages; client messages are POSTed to
/// the endpoint announced by the server's first `endpoint` event.
pub struct SseTransport {
    server: String,
    client: Client,
    endpoint: Url,
    reader: AsyncMutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    pub async fn connect(
        server: &str,
        url: Url,
        wait: Duration,
    ) -> Result<(Self, EventReceiver), ToolInvokeError> {
        let client = Client::new();
        let mut source = EventSource::new(client.get(url.clone())).map_err(|err| {
            ToolInvokeError::Transport {
                server: server.to_string(),
                message: err.to_string(),
            }
        })?;
        source.set_retry_policy(Box::new(Never));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = StreamReader {
            server: server.to_string(),
            base: url,
            endpoint: Some(endpoint_tx),
            events: events_tx,
        };
        let handle = tokio::spawn(reader.run(source));

        let endpoint = match timeout(wait, endpoint_rx).await {
            Ok(Ok(Ok(endpoint))) => endpoint,
            Ok(Ok(Err(message))) => {
                handle.abort();
                return Err(ToolInvokeError::Transport {
                    server: server.to_string(),
                    message,
                });
            }
            Ok(Err(_)) => {
                handle.abort();
                return Err(ToolInvokeError::Transport {
                    server: server.to_string(),
                    message: "event stream closed before announcing an endpoint".to_string(),
                });
            }
            Err(_) => {
                handle.abort();
                return Err(ToolInvokeError::Timeout {
                    server: server.to_string(),
                    method: ENDPOINT_EVENT.to_string(),
                    timeout: wait,
                });
            }
        };
        debug!(server, endpoint = %endpoint, "MCP event stream ready");

        Ok((
            Self {
                server: server.to_string(),
                client,
                endpoint,
                reader: AsyncMutex::new(Some(handle)),
            },
            events_rx,
        ))
    }

    fn transport_error(&self, message: impl Into<String>) -> ToolInvokeError {
        ToolInvokeError::Transport {
            server: self.server.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn send(&self, message: &Value) -> Result<(), ToolInvokeError> {
        if self.reader.lock().await.is_none() {
            return Err(self.transport_error("event stream closed"));
        }
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(message)
            .send()
            .await
            .map_err(|err| self.transport_error(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.transport_error(format!("POST returned {status}: {body}")));
        }
        Ok(())
    }

    async fn close(&self) {
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
    }
}

type EndpointSender = oneshot::Sender<Result<Url, String>>;

struct StreamReader {
    server: String,
    base: Url,
    endpoint: Option<EndpointSender>,
    events: EventSender,
}

impl StreamReader {
    async fn run(mut self, mut source: EventSource) {
        while let Some(next) = source.next().await {
            match next {
                Ok(Event::Open) => debug!(server = %self.server, "MCP event stream opened"),
                Ok(Event::Message(event)) => match event.event.as_str() {
                    ENDPOINT_EVENT => self.announce_endpoint(event.data.trim()),
                    MESSAGE_EVENT => self.forward(&event.data),
                    other => debug!(server = %self.server, event = other, "ignoring event"),
                },
                Err(EventSourceError::StreamEnded) => {
                    self.fail("event stream ended".to_string());
                    break;
                }
                Err(err) => {
                    self.fail(format!("event stream error: {err}"));
                    break;
                }
            }
        }
        source.close();
        let _ = self.events.send(TransportEvent::Closed);
    }

    fn announce_endpoint(&mut self, data: &str) {
        let Some(sender) = self.endpoint.take() else {
            debug!(server = %self.server, "ignoring repeated endpoint event");
            return;
        };
        let resolved = self
            .base
            .join(data)
            .map_err(|err| format!("invalid endpoint '{data}': {err}"))
            .and_then(|endpoint| {
                if endpoint.origin() == self.base.origin() {
                    Ok(endpoint)
                } else {
                    Err(format!("endpoint origin does not match stream origin: {endpoint}"))
                }
            });
        let _ = sender.send(resolved);
    }

    fn forward(&self, data: &str) {
        match serde_json::from_str::<Value>(data) {
            Ok(value) => {
                let _ = self.events.send(TransportEvent::Message(value));
            }
            Err(source) => {
                warn!(server = %self.server, %source, "received invalid JSON from MCP server");
            }
        }
    }

    fn fail(&mut self, message: String) {
        // Before the endpoint arrives the failure belongs to connect().
        match self.endpoint.take() {
            Some(sender) => {
                let _ = sender.send(Err(message));
            }
            None => {
                let _ = self.events.send(TransportEvent::Error(message));
            }
        }
    }
}
