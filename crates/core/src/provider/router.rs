//! Model-prefix routing across registered providers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};

use super::error::ProviderError;
use super::traits::{ChatStream, Provider};
use super::types::{ChatRequest, Credentials};

/// Dispatches `"<provider>:<model>"` to the provider registered under `<provider>`.
///
/// Models without a registered prefix go to the default provider unchanged,
/// so vendor-qualified names like `"openai/gpt-4o"` still reach the aggregator.
pub struct RoutingProvider {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
    default: RwLock<String>,
}

impl RoutingProvider {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            default: RwLock::new(default.into()),
        }
    }

    pub fn register(&self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        info!(provider = %name, "Registered chat provider");
        self.providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name, provider);
    }

    pub fn with_provider(self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn set_default(&self, name: impl Into<String>) {
        *self
            .default
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = name.into();
    }

    pub fn default_name(&self) -> String {
        self.default
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Registered provider names, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Picks the provider for `model` and the model name to forward to it.
    pub fn resolve(&self, model: &str) -> Result<(Arc<dyn Provider>, String), ProviderError> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some((prefix, rest)) = model.split_once(':') {
            if let Some(provider) = providers.get(prefix) {
                return Ok((provider.clone(), rest.to_string()));
            }
        }

        let default = self.default_name();
        let provider = providers
            .get(&default)
            .cloned()
            .ok_or(ProviderError::UnknownProvider(default))?;
        Ok((provider, model.to_string()))
    }

    /// Hot-swaps credentials of the named provider.
    pub fn update_credentials(
        &self,
        name: &str,
        credentials: Credentials,
    ) -> Result<(), ProviderError> {
        let provider = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))?;
        provider.update_credentials(credentials)
    }
}

#[async_trait]
impl Provider for RoutingProvider {
    fn name(&self) -> &str {
        "router"
    }

    async fn chat(&self, mut request: ChatRequest) -> Result<ChatStream, ProviderError> {
        let (provider, model) = self.resolve(&request.model)?;
        debug!(requested = %request.model, provider = %provider.name(), model = %model, "Routing chat request");
        request.model = model;
        provider.chat(request).await
    }
}
