// Provider configuration and client construction.

use crate::openai::OpenAiClient;
use crate::traits::ChatClient;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A configured upstream LLM provider.
///
/// Everything speaks the OpenAI chat wire format; `base_url` points
/// self-hosted or third-party compatible endpoints at the same client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model names served by this provider
    #[serde(default)]
    pub models: Vec<String>,
}

impl ProviderConfig {
    pub fn openai(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            base_url: None,
            models: Vec::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }
}

/// Factory for building chat clients from provider configuration.
pub struct ClientFactory;

impl ClientFactory {
    pub fn create_chat_client(config: &ProviderConfig) -> Result<Arc<dyn ChatClient>> {
        let client = match &config.base_url {
            Some(base_url) => OpenAiClient::with_base_url(&config.api_key, base_url)?,
            None => OpenAiClient::new(&config.api_key)?,
        };
        Ok(Arc::new(client))
    }
}
