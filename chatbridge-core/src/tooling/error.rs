use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("MCP server '{server}' is not configured")]
    UnknownServer { server: String },
    #[error("no connected MCP server provides tool '{tool}'")]
    UnknownTool { tool: String },
    #[error("MCP server '{server}' is not connected")]
    NotConnected { server: String },
    #[error("MCP server '{server}' is disabled")]
    Disabled { server: String },
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("'{method}' request to MCP server '{server}' timed out after {timeout:?}")]
    Timeout {
        server: String,
        method: String,
        timeout: Duration,
    },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
}

impl ToolInvokeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolInvokeError::Timeout { .. })
    }
}

/// A tool server could not be brought to the connected state.
#[derive(Debug, Error)]
#[error("failed to connect to MCP server '{server}': {source}")]
pub struct ConnectionError {
    pub server: String,
    #[source]
    pub source: ToolInvokeError,
}
