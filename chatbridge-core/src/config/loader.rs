use super::AppConfig;
use super::app::RestServerConfig;
use super::error::ConfigError;
use super::provider::{ModelProviderConfig, RawProviderConfig};
use crate::constants::{CONFIG_PATH, DEFAULT_BIND_ADDR, ENV_PATH};
use dotenvy::from_filename;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::debug;

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    mcp_config: Option<String>,
    #[serde(default)]
    server: RawRestServer,
    #[serde(default)]
    providers: Vec<RawProviderConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRestServer {
    bind: Option<String>,
    #[serde(default)]
    cors_origins: Vec<String>,
}

/// Ensures environment variables are loaded from config/.env
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        if from_filename(ENV_PATH).is_ok() {
            debug!(path = ENV_PATH, "Loaded environment file");
        }
    });
}

/// Load and validate configuration from a file path
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    let config_path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));
    read_config(config_path)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading application configuration file");

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

    parse_config(&content, path, path.parent())
}

pub(super) fn parse_config(
    content: &str,
    path: &Path,
    base_dir: Option<&Path>,
) -> Result<AppConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_and_build(parsed, base_dir)
}

fn validate_and_build(parsed: RawConfig, base_dir: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if parsed.providers.is_empty() {
        return Err(ConfigError::NoProvidersConfigured);
    }

    let mut provider_ids = HashSet::new();
    let mut model_keys = HashSet::new();
    let mut providers: Vec<ModelProviderConfig> = Vec::new();
    for raw_provider in parsed.providers {
        let provider = ModelProviderConfig::try_from(raw_provider)?;
        if !provider_ids.insert(provider.id.clone()) {
            return Err(ConfigError::DuplicateProvider {
                provider: provider.id,
            });
        }
        for key in provider.model_keys() {
            if !model_keys.insert(key.clone()) {
                return Err(ConfigError::DuplicateModel { model: key });
            }
        }
        providers.push(provider);
    }

    let rest_server = RestServerConfig {
        bind: parsed
            .server
            .bind
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        cors_origins: parsed.server.cors_origins,
    };
    rest_server.bind_addr()?;

    let mcp_config = parsed
        .mcp_config
        .map(|raw| resolve_relative(&expand(&raw), base_dir));

    Ok(AppConfig {
        mcp_config,
        rest_server,
        providers,
    })
}

fn resolve_relative(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(raw);
    match base_dir {
        Some(dir) if path.is_relative() && !dir.as_os_str().is_empty() => dir.join(path),
        _ => path,
    }
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
