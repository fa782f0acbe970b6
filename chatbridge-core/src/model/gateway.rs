//! Model gateway routing `<provider id>/<model>` keys to provider clients

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use super::factory::ProviderClient;
use super::types::{ModelError, ModelRequest, ModelResponse};
use crate::config::ModelProviderConfig;

/// Uniform entry point for every configured model.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Model keys in configuration order.
    fn models(&self) -> Vec<String>;

    fn supports(&self, model: &str) -> bool {
        self.models().iter().any(|key| key == model)
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}

/// Gateway over the providers of the application config.
#[derive(Default)]
pub struct DynamicModelGateway {
    backends: HashMap<String, ProviderClient>,
    models: Vec<String>,
}

impl DynamicModelGateway {
    /// Create gateway from config list using factory
    pub fn from_configs(configs: &[ModelProviderConfig]) -> Result<Self, ModelError> {
        let mut backends = HashMap::new();
        let mut models = Vec::new();

        for config in configs {
            backends.insert(config.id.clone(), ProviderClient::from_config(config)?);
            models.extend(config.model_keys());
        }

        Ok(Self { backends, models })
    }
}

/// Split `provider/model`; the model part may itself contain slashes.
pub fn split_model_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
        .filter(|(provider, model)| !provider.is_empty() && !model.is_empty())
}

#[async_trait]
impl ModelGateway for DynamicModelGateway {
    fn models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        if !self.supports(&request.model) {
            return Err(ModelError::unknown_model(&request.model));
        }
        let (provider, model) =
            split_model_key(&request.model).ok_or_else(|| ModelError::unknown_model(&request.model))?;
        let client = self
            .backends
            .get(provider)
            .ok_or_else(|| ModelError::unknown_model(&request.model))?;

        debug!(provider, model, "Routing model request");
        client.chat(model, &request.messages, &request.tools).await
    }
}
