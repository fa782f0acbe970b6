//! # Tool-server map
//!
//! Tool servers are described in a JSON document of the form
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "calc": { "command": "calc-server", "args": ["--stdio"], "autoApprove": ["add"] },
//!     "search": { "url": "http://localhost:3001/sse", "timeout": 60 }
//!   }
//! }
//! ```
//!
//! An entry with a `command` is spawned as a subprocess; an entry with only a
//! `url` is reached over an HTTP event stream. Entries keep the order they
//! have in the file, which is the order the connection manager registers them
//! in. Validation is all-or-nothing: one bad entry rejects the whole map.

use super::error::ConfigError;
use crate::constants::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SERVER_TIMEOUT_SECS, MIN_SERVER_TIMEOUT_SECS};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// How a tool server is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Spawned child process speaking JSON-RPC over stdin/stdout.
    Subprocess {
        command: PathBuf,
        args: Vec<String>,
        env: HashMap<String, String>,
        cwd: Option<PathBuf>,
    },
    /// Remote server speaking JSON-RPC over HTTP with an SSE return channel.
    NetworkStream { url: Url },
}

impl TransportConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Subprocess { .. } => "subprocess",
            TransportConfig::NetworkStream { .. } => "network-stream",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub name: String,
    pub transport: TransportConfig,
    pub disabled: bool,
    /// Explicitly configured timeout; `None` when the entry omits it.
    pub timeout: Option<Duration>,
    pub auto_approve: BTreeSet<String>,
}

impl ServerConfig {
    /// Budget for a `tools/call` request.
    pub fn request_timeout(&self) -> Duration {
        self.timeout
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_SERVER_TIMEOUT_SECS))
    }

    /// Budget for transport open, handshake and capability discovery.
    pub fn discovery_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn is_auto_approved(&self, tool: &str) -> bool {
        self.auto_approve.contains(tool)
    }
}

/// Validated tool-server map, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct McpSettings {
    pub servers: Vec<ServerConfig>,
}

impl McpSettings {
    /// Read and validate the tool-server map at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Reading tool server map");
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings =
            serde_json::from_str(content).map_err(|source| ConfigError::ServerMap { source })?;
        let servers = raw
            .mcp_servers
            .into_iter()
            .map(|(name, entry)| parse_entry(name, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { servers })
    }

    /// Servers that should be connected.
    pub fn enabled(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|server| !server.disabled)
    }

    pub fn get(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|server| server.name == name)
    }
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(rename = "mcpServers")]
    mcp_servers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawServer {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    cwd: Option<String>,
    url: Option<String>,
    #[serde(default)]
    disabled: bool,
    timeout: Option<f64>,
    #[serde(default)]
    auto_approve: Vec<String>,
}

fn parse_entry(name: String, entry: Value) -> Result<ServerConfig, ConfigError> {
    let raw: RawServer = serde_json::from_value(entry)
        .map_err(|err| ConfigError::invalid_server(&name, err.to_string()))?;
    ServerConfig::from_raw(name, raw)
}

impl ServerConfig {
    pub(crate) fn from_raw(name: String, raw: RawServer) -> Result<Self, ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::invalid_server(name, "server name cannot be empty"));
        }

        let timeout = match raw.timeout {
            None => None,
            Some(secs) if secs.is_finite() && secs >= MIN_SERVER_TIMEOUT_SECS => {
                let timeout = Duration::try_from_secs_f64(secs).map_err(|err| {
                    ConfigError::invalid_server(&name, format!("timeout {secs} is out of range: {err}"))
                })?;
                Some(timeout)
            }
            Some(secs) => {
                return Err(ConfigError::invalid_server(
                    name,
                    format!("timeout must be a number >= {MIN_SERVER_TIMEOUT_SECS}, got {secs}"),
                ));
            }
        };

        let transport = match (raw.command, raw.url) {
            (Some(command), _) => {
                let command = expand(&name, &command)?;
                if command.trim().is_empty() {
                    return Err(ConfigError::invalid_server(name, "command cannot be empty"));
                }
                let args = raw
                    .args
                    .iter()
                    .map(|arg| expand(&name, arg))
                    .collect::<Result<Vec<_>, _>>()?;
                let cwd = match raw.cwd {
                    Some(dir) => Some(PathBuf::from(expand(&name, &dir)?)),
                    None => None,
                };
                TransportConfig::Subprocess {
                    command: PathBuf::from(command),
                    args,
                    env: raw.env,
                    cwd,
                }
            }
            (None, Some(url)) => {
                let url = Url::parse(&url).map_err(|err| {
                    ConfigError::invalid_server(&name, format!("invalid url '{url}': {err}"))
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::invalid_server(
                        name,
                        format!("url scheme '{}' is not http or https", url.scheme()),
                    ));
                }
                TransportConfig::NetworkStream { url }
            }
            (None, None) => {
                return Err(ConfigError::invalid_server(
                    name,
                    "entry needs either a 'command' or a 'url'",
                ));
            }
        };

        Ok(Self {
            name,
            transport,
            disabled: raw.disabled,
            timeout,
            auto_approve: raw.auto_approve.into_iter().collect(),
        })
    }
}

/// Expand `~` and `${VAR}`; an undefined variable rejects the entry.
fn expand(server: &str, value: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .map_err(|err| ConfigError::invalid_server(server, format!("cannot expand '{value}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn parse(json: &str) -> Result<McpSettings, ConfigError> {
        McpSettings::from_json_str(json)
    }

    #[test]
    fn parses_subprocess_entry_with_defaults() {
        let settings = parse(
            r#"{"mcpServers": {"calc": {"command": "calc-server", "autoApprove": ["add"]}}}"#,
        )
        .expect("valid map");

        let server = &settings.servers[0];
        assert_eq!(server.name, "calc");
        assert!(!server.disabled);
        assert_eq!(server.timeout, None);
        assert_eq!(server.request_timeout(), Duration::from_secs(30));
        assert_eq!(server.discovery_timeout(), Duration::from_millis(5000));
        assert!(server.is_auto_approved("add"));
        assert!(!server.is_auto_approved("sub"));
        match &server.transport {
            TransportConfig::Subprocess { command, args, env, cwd } => {
                assert_eq!(command, &PathBuf::from("calc-server"));
                assert!(args.is_empty());
                assert!(env.is_empty());
                assert!(cwd.is_none());
            }
            other => panic!("unexpected transport {other:?}"),
        }
    }

    #[test]
    fn parses_network_entry_with_explicit_timeout() {
        let settings =
            parse(r#"{"mcpServers": {"search": {"url": "http://localhost:3001/sse", "timeout": 12}}}"#)
                .expect("valid map");

        let server = &settings.servers[0];
        assert_eq!(server.transport.kind(), "network-stream");
        assert_eq!(server.request_timeout(), Duration::from_secs(12));
        assert_eq!(server.discovery_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn command_takes_precedence_over_url() {
        let settings = parse(
            r#"{"mcpServers": {"both": {"command": "srv", "url": "http://localhost/sse"}}}"#,
        )
        .expect("valid map");
        assert_eq!(settings.servers[0].transport.kind(), "subprocess");
    }

    #[test]
    fn keeps_file_order() {
        let settings = parse(
            r#"{"mcpServers": {
                "zeta": {"command": "z"},
                "alpha": {"command": "a"},
                "mid": {"url": "https://example.com/sse"}
            }}"#,
        )
        .expect("valid map");
        let names: Vec<_> = settings.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn disabled_servers_are_listed_but_not_enabled() {
        let settings = parse(
            r#"{"mcpServers": {
                "on": {"command": "a"},
                "off": {"command": "b", "disabled": true}
            }}"#,
        )
        .expect("valid map");
        assert_eq!(settings.servers.len(), 2);
        let enabled: Vec<_> = settings.enabled().map(|s| s.name.as_str()).collect();
        assert_eq!(enabled, ["on"]);
    }

    #[test]
    fn rejects_timeout_below_minimum() {
        let err = parse(r#"{"mcpServers": {"calc": {"command": "c", "timeout": 2}}}"#)
            .expect_err("timeout too small");
        assert!(matches!(err, ConfigError::InvalidServer { ref server, .. } if server == "calc"));
    }

    #[test]
    fn rejects_timeout_too_large_for_a_duration() {
        let err = parse(r#"{"mcpServers": {"a": {"command": "x", "timeout": 1e30}}}"#)
            .expect_err("timeout out of range");
        assert!(matches!(err, ConfigError::InvalidServer { ref server, .. } if server == "a"));
    }

    #[test]
    fn rejects_undefined_variable_in_command() {
        let err = parse(
            r#"{"mcpServers": {"calc": {"command": "${CHATBRIDGE_TEST_UNSET_ROOT}/calc"}}}"#,
        )
        .expect_err("undefined variable");
        match err {
            ConfigError::InvalidServer { server, reason } => {
                assert_eq!(server, "calc");
                assert!(reason.contains("CHATBRIDGE_TEST_UNSET_ROOT"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_undefined_variable_in_args() {
        let err = parse(
            r#"{"mcpServers": {"calc": {"command": "calc", "args": ["$CHATBRIDGE_TEST_UNSET_ARG"]}}}"#,
        )
        .expect_err("undefined variable");
        assert!(matches!(err, ConfigError::InvalidServer { ref server, .. } if server == "calc"));
    }

    #[test]
    fn rejects_invalid_url() {
        let err = parse(r#"{"mcpServers": {"remote": {"url": "not a url"}}}"#)
            .expect_err("invalid url");
        assert!(matches!(err, ConfigError::InvalidServer { .. }));
    }

    #[test]
    fn rejects_non_http_url() {
        let err = parse(r#"{"mcpServers": {"remote": {"url": "ftp://example.com/feed"}}}"#)
            .expect_err("unsupported scheme");
        assert!(matches!(err, ConfigError::InvalidServer { .. }));
    }

    #[test]
    fn one_bad_entry_rejects_the_whole_map() {
        let err = parse(
            r#"{"mcpServers": {
                "good": {"command": "ok"},
                "bad": {"args": ["no command or url"]}
            }}"#,
        )
        .expect_err("bad entry");
        assert!(matches!(err, ConfigError::InvalidServer { ref server, .. } if server == "bad"));
    }

    #[test]
    fn rejects_wrongly_typed_fields() {
        let err = parse(r#"{"mcpServers": {"calc": {"command": "c", "args": "--flag"}}}"#)
            .expect_err("args must be a list");
        assert!(matches!(err, ConfigError::InvalidServer { .. }));
    }

    #[test]
    fn rejects_missing_server_map() {
        let err = parse(r#"{"servers": {}}"#).expect_err("missing mcpServers");
        assert!(matches!(err, ConfigError::ServerMap { .. }));
    }

    #[test]
    fn expands_env_vars_in_command_and_args() {
        unsafe {
            env::set_var("CHATBRIDGE_TEST_ROOT", "/opt/tools");
            env::set_var("CHATBRIDGE_TEST_ARG", "example-arg");
        }

        let settings = parse(
            r#"{"mcpServers": {"calc": {
                "command": "${CHATBRIDGE_TEST_ROOT}/calc",
                "args": ["--flag", "${CHATBRIDGE_TEST_ARG}"],
                "cwd": "${CHATBRIDGE_TEST_ROOT}/work"
            }}}"#,
        )
        .expect("valid map");

        match &settings.servers[0].transport {
            TransportConfig::Subprocess { command, args, cwd, .. } => {
                assert_eq!(command, &PathBuf::from("/opt/tools/calc"));
                assert!(args.contains(&"example-arg".to_string()));
                assert_eq!(cwd.as_deref(), Some(Path::new("/opt/tools/work")));
            }
            other => panic!("unexpected transport {other:?}"),
        }

        unsafe {
            env::remove_var("CHATBRIDGE_TEST_ROOT");
            env::remove_var("CHATBRIDGE_TEST_ARG");
        }
    }
}
