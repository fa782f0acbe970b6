use super::{EventReceiver, EventSender, Transport, TransportEvent};
use crate::constants::INHERITED_ENV_VARS;
use crate::tooling::error::ToolInvokeError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// How long a child that closed stdout gets to report its exit status.
const EXIT_GRACE: Duration = Duration::from_secs(1);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Newline-delimited JSON-RPC over a child process's stdin and stdout.
pub struct StdioTransport {
    server: String,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    child: Arc<AsyncMutex<Option<Child>>>,
    closing: Arc<AtomicBool>,
}

impl StdioTransport {
    /// Spawn the server process and start reading its output.
    ///
    /// The child sees only a small set of variables inherited from this
    /// process, overlaid with the configured `env`.
    pub fn spawn(
        server: &str,
        command: &Path,
        args: &[String],
        env_vars: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> Result<(Self, EventReceiver), ToolInvokeError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env_clear();
        for key in INHERITED_ENV_VARS {
            if let Ok(value) = env::var(key) {
                cmd.env(key, value);
            }
        }
        cmd.envs(env_vars);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ToolInvokeError::Spawn {
            server: server.to_string(),
            source,
        })?;
        debug!(server, command = %command.display(), pid = child.id(), "Spawned MCP server process");

        let transport_error = |message: &str| ToolInvokeError::Transport {
            server: server.to_string(),
            message: message.to_string(),
        };
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| transport_error("failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| transport_error("failed to capture server stdout"))?;
        let stderr = child.stderr.take();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            server: server.to_string(),
            writer: AsyncMutex::new(Some(BufWriter::new(stdin))),
            child: Arc::new(AsyncMutex::new(Some(child))),
            closing: Arc::new(AtomicBool::new(false)),
        };

        let reader = StdoutReader {
            server: server.to_string(),
            child: Arc::clone(&transport.child),
            closing: Arc::clone(&transport.closing),
            events: events_tx,
        };
        tokio::spawn(reader.run(stdout));
        if let Some(stderr) = stderr {
            tokio::spawn(log_stderr(server.to_string(), stderr));
        }

        Ok((transport, events_rx))
    }

    fn transport_error(&self, message: impl Into<String>) -> ToolInvokeError {
        ToolInvokeError::Transport {
            server: self.server.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let mut encoded =
            serde_json::to_vec(message).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.clone(),
                source,
            })?;
        encoded.push(b'\n');

        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| self.transport_error("writer not initialised"))?;
        stream
            .write_all(&encoded)
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|source| self.transport_error(source.to_string()))
    }

    async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.writer.lock().await.take();

        let mut child = self.child.lock().await;
        if let Some(mut running) = child.take() {
            if let Err(err) = running.kill().await {
                debug!(
                    server = %self.server,
                    %err,
                    "failed to kill MCP server process (may have already exited)"
                );
            }
            let _ = running.wait().await;
        }
    }
}

struct StdoutReader {
    server: String,
    child: Arc<AsyncMutex<Option<Child>>>,
    closing: Arc<AtomicBool>,
    events: EventSender,
}

impl StdoutReader {
    async fn run(self, stdout: ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(raw)) => self.handle_line(&raw),
                Ok(None) => break,
                Err(err) => {
                    if !self.closing.load(Ordering::SeqCst) {
                        let _ = self
                            .events
                            .send(TransportEvent::Error(format!("failed to read server output: {err}")));
                    }
                    break;
                }
            }
        }

        if !self.closing.load(Ordering::SeqCst) {
            let reason = self.exit_reason().await;
            let _ = self.events.send(TransportEvent::Error(reason));
        }
        let _ = self.events.send(TransportEvent::Closed);
    }

    fn handle_line(&self, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        if trimmed.starts_with('\u{1b}') {
            debug!(
                server = %self.server,
                line = trimmed,
                "skipping non-JSON ANSI log line from MCP server"
            );
            return;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                let _ = self.events.send(TransportEvent::Message(value));
            }
            Err(source) => {
                warn!(
                    server = %self.server,
                    line = trimmed,
                    %source,
                    "received invalid JSON from MCP server"
                );
            }
        }
    }

    /// Exit status of the child if it ends within [`EXIT_GRACE`]. The child
    /// lock is only held per poll so `close` can always take the process.
    async fn exit_reason(&self) -> String {
        let deadline = Instant::now() + EXIT_GRACE;
        loop {
            let polled = match self.child.lock().await.as_mut() {
                Some(running) => running.try_wait().ok().flatten(),
                None => None,
            };
            if let Some(status) = polled {
                return format!("server process exited ({status})");
            }
            if Instant::now() >= deadline {
                return "server closed its output stream".to_string();
            }
            sleep(EXIT_POLL_INTERVAL).await;
        }
    }
}

async fn log_stderr(server: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            debug!(server = %server, line = trimmed, "MCP server stderr");
        }
    }
}
