use super::error::ToolInvokeError;
use super::transport::Transport;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

const METHOD_NOT_FOUND: i64 = -32601;

type Responder = oneshot::Sender<Result<Value, ToolInvokeError>>;

/// What the connection still has to act on after an inbound message.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Inbound {
    Handled,
    Notification(String),
}

/// JSON-RPC request/response correlation over one transport.
pub(super) struct RpcSession {
    server: String,
    transport: Arc<dyn Transport>,
    pending: AsyncMutex<HashMap<String, Responder>>,
    id_counter: AtomicU64,
}

impl RpcSession {
    pub(super) fn new(server: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            server: server.into(),
            transport,
            pending: AsyncMutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
        }
    }

    /// Send a request and wait for its `result`, failing with
    /// [`ToolInvokeError::Timeout`] once `wait` elapses.
    pub(super) async fn request(
        &self,
        method: &str,
        params: Value,
        wait: Duration,
    ) -> Result<Value, ToolInvokeError> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        // One budget covers the write and the reply.
        let exchange = async {
            self.transport.send(&payload).await?;
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(ToolInvokeError::Cancelled {
                    server: self.server.clone(),
                }),
            }
        };

        let outcome = match timeout(wait, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolInvokeError::Timeout {
                server: self.server.clone(),
                method: method.to_string(),
                timeout: wait,
            }),
        };
        if outcome.is_err() {
            self.pending.lock().await.remove(&id);
        }
        outcome.map(|value| value.get("result").cloned().unwrap_or(Value::Null))
    }

    pub(super) async fn notify(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.transport.send(&payload).await
    }

    /// Route one inbound message: responses complete their pending request,
    /// server requests are answered here, notifications are handed back.
    pub(super) async fn dispatch(&self, value: Value) -> Inbound {
        match (value.get("id").cloned(), value.get("method").and_then(Value::as_str)) {
            (Some(id), Some(method)) => {
                let method = method.to_string();
                if let Err(err) = self.answer_server_request(id, &method).await {
                    warn!(server = %self.server, method = %method, %err, "failed to answer server request");
                }
                Inbound::Handled
            }
            (Some(id), None) => {
                self.complete(id, value).await;
                Inbound::Handled
            }
            (None, Some(method)) => {
                debug!(server = %self.server, method, "received notification from server");
                Inbound::Notification(method.to_string())
            }
            (None, None) => {
                debug!(server = %self.server, "ignoring message without id or method");
                Inbound::Handled
            }
        }
    }

    pub(super) async fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(ToolInvokeError::Terminated {
                server: self.server.clone(),
            }));
        }
    }

    pub(super) async fn close(&self) {
        self.transport.close().await;
        self.fail_all_pending().await;
    }

    async fn complete(&self, id: Value, value: Value) {
        let Some(key) = response_key(&id) else {
            return;
        };
        let responder = self.pending.lock().await.remove(&key);
        let Some(sender) = responder else {
            debug!(server = %self.server, response_id = %key, "received response for unknown request");
            return;
        };

        let outcome = match value.get("error") {
            Some(error) => Err(self.rpc_error(error)),
            None => Ok(value),
        };
        let _ = sender.send(outcome);
    }

    async fn answer_server_request(&self, id: Value, method: &str) -> Result<(), ToolInvokeError> {
        let reply = if method == "ping" {
            json!({ "jsonrpc": "2.0", "id": id, "result": {} })
        } else {
            warn!(server = %self.server, method, "server sent unsupported request");
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": METHOD_NOT_FOUND,
                    "message": format!("client does not implement method '{method}'"),
                }
            })
        };
        self.transport.send(&reply).await
    }

    fn rpc_error(&self, error: &Value) -> ToolInvokeError {
        match error.as_object() {
            Some(err) => ToolInvokeError::Rpc {
                server: self.server.clone(),
                code: err.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            },
            None => ToolInvokeError::Transport {
                server: self.server.clone(),
                message: "missing error payload in response".to_string(),
            },
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tooling::testing::RecordingTransport;

    fn session() -> (Arc<RpcSession>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let session = Arc::new(RpcSession::new("calc", transport.clone()));
        (session, transport)
    }

    #[tokio::test]
    async fn response_completes_matching_request() {
        let (session, transport) = session();
        let caller = Arc::clone(&session);
        let pending = tokio::spawn(async move {
            caller
                .request("tools/list", json!({}), Duration::from_secs(5))
                .await
        });

        let sent = transport.wait_for_sent(1).await;
        let id = sent[0]["id"].clone();
        assert_eq!(sent[0]["method"], json!("tools/list"));

        let outcome = session
            .dispatch(json!({"jsonrpc": "2.0", "id": id, "result": {"tools": []}}))
            .await;
        assert_eq!(outcome, Inbound::Handled);

        let result = pending.await.expect("join").expect("result");
        assert_eq!(result, json!({"tools": []}));
    }

    #[tokio::test]
    async fn error_response_becomes_rpc_error() {
        let (session, transport) = session();
        let caller = Arc::clone(&session);
        let pending = tokio::spawn(async move {
            caller
                .request("tools/call", json!({}), Duration::from_secs(5))
                .await
        });

        let id = transport.wait_for_sent(1).await[0]["id"].clone();
        session
            .dispatch(json!({"id": id, "error": {"code": -32602, "message": "bad args"}}))
            .await;

        let err = pending.await.expect("join").expect_err("rpc error");
        match err {
            ToolInvokeError::Rpc { code, message, .. } => {
                assert_eq!(code, -32602);
                assert_eq!(message, "bad args");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let (session, _transport) = session();
        let err = session
            .request("initialize", json!({}), Duration::from_millis(50))
            .await
            .expect_err("timeout");
        assert!(err.is_timeout());
        assert!(session.pending.lock().await.is_empty());
    }

    /// A transport whose writes never complete, like a full pipe or a
    /// hung POST.
    struct StalledTransport;

    #[async_trait::async_trait]
    impl Transport for StalledTransport {
        async fn send(&self, _message: &Value) -> Result<(), ToolInvokeError> {
            std::future::pending().await
        }

        async fn close(&self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_counts_against_the_budget() {
        let session = RpcSession::new("calc", Arc::new(StalledTransport));
        let err = session
            .request("tools/call", json!({}), Duration::from_millis(100))
            .await
            .expect_err("timeout");
        assert!(matches!(err, ToolInvokeError::Timeout { ref method, .. } if method == "tools/call"));
        assert!(session.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn ping_is_answered_with_empty_result() {
        let (session, transport) = session();
        session
            .dispatch(json!({"jsonrpc": "2.0", "id": 7, "method": "ping"}))
            .await;
        let sent = transport.sent().await;
        assert_eq!(sent, vec![json!({"jsonrpc": "2.0", "id": 7, "result": {}})]);
    }

    #[tokio::test]
    async fn unknown_server_request_gets_method_not_found() {
        let (session, transport) = session();
        session
            .dispatch(json!({"id": "s-1", "method": "sampling/createMessage"}))
            .await;
        let sent = transport.sent().await;
        assert_eq!(sent[0]["error"]["code"], json!(-32601));
        assert_eq!(sent[0]["id"], json!("s-1"));
    }

    #[tokio::test]
    async fn notifications_are_handed_back() {
        let (session, _transport) = session();
        let outcome = session
            .dispatch(json!({"jsonrpc": "2.0", "method": "notifications/tools/list_changed"}))
            .await;
        assert_eq!(
            outcome,
            Inbound::Notification("notifications/tools/list_changed".to_string())
        );
    }

    #[tokio::test]
    async fn closing_fails_pending_requests() {
        let (session, transport) = session();
        let caller = Arc::clone(&session);
        let pending = tokio::spawn(async move {
            caller
                .request("tools/call", json!({}), Duration::from_secs(5))
                .await
        });
        transport.wait_for_sent(1).await;

        session.fail_all_pending().await;
        let err = pending.await.expect("join").expect_err("terminated");
        assert!(matches!(err, ToolInvokeError::Terminated { .. }));
    }
}
