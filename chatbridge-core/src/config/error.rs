use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid tool server map: {source}")]
    ServerMap {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid tool server entry '{server}': {reason}")]
    InvalidServer { server: String, reason: String },

    #[error("no providers configured - at least one [[providers]] entry is required")]
    NoProvidersConfigured,

    #[error("provider '{provider}' is configured more than once")]
    DuplicateProvider { provider: String },

    #[error("provider '{provider}' has an unsupported type '{kind}'")]
    UnsupportedProvider { provider: String, kind: String },

    #[error("provider '{provider}' does not list any models")]
    NoModels { provider: String },

    #[error("model '{model}' is listed more than once")]
    DuplicateModel { model: String },

    #[error("invalid REST bind address '{addr}'")]
    InvalidBindAddress { addr: String },
}

impl ConfigError {
    pub(crate) fn invalid_server(server: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidServer {
            server: server.into(),
            reason: reason.into(),
        }
    }
}
