//! Application constants
//!
//! Single source of truth for paths, protocol values and timeouts.

use std::time::Duration;

/// Default application configuration file path
pub const CONFIG_PATH: &str = "config/chatbridge.toml";

/// Default environment file path
pub const ENV_PATH: &str = "config/.env";

/// MCP protocol revision sent during the handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client name reported to tool servers
pub const CLIENT_NAME: &str = "chatbridge";

/// Discovery and handshake budget for servers without an explicit timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Tool-call budget for servers without an explicit timeout
pub const DEFAULT_SERVER_TIMEOUT_SECS: f64 = 30.0;

/// Smallest accepted per-server timeout, in seconds
pub const MIN_SERVER_TIMEOUT_SECS: f64 = 5.0;

/// Mime type recorded for resources that do not declare one
pub const DEFAULT_RESOURCE_MIME_TYPE: &str = "application/octet-stream";

/// Default request timeout for model provider calls, in seconds
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

/// Default bind address of the REST server
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Environment variables a subprocess tool server inherits from this process
pub const INHERITED_ENV_VARS: &[&str] = &["HOME", "LOGNAME", "PATH", "SHELL", "TERM", "USER"];
