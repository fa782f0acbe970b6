use super::error::ConfigError;
use super::provider::ModelProviderConfig;
use super::server::McpSettings;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// REST server section of the application config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestServerConfig {
    pub bind: String,
    pub cors_origins: Vec<String>,
}

impl RestServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress {
                addr: self.bind.clone(),
            })
    }
}

/// Application configuration loaded from chatbridge.toml
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the tool-server map, resolved relative to the config file
    pub mcp_config: Option<PathBuf>,
    pub rest_server: RestServerConfig,
    pub providers: Vec<ModelProviderConfig>,
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    /// Parse configuration from TOML text; relative paths stay as written.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        super::loader::parse_config(content, Path::new("<inline>"), None)
    }

    /// Load the tool-server map this config points at.
    ///
    /// A config without `mcp_config` has no tool servers.
    pub fn mcp_settings(&self) -> Result<McpSettings, ConfigError> {
        match &self.mcp_config {
            Some(path) => McpSettings::load(path),
            None => Ok(McpSettings::default()),
        }
    }

    /// Every model key, in configuration order.
    pub fn model_keys(&self) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(ModelProviderConfig::model_keys)
            .collect()
    }
}
