// Model routing and cost accounting.

use crate::provider::{ClientFactory, ProviderConfig};
use crate::traits::{ChatClient, TokenUsage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Micro-credit rates for one model, per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRate {
    pub input_per_1k: u64,
    pub output_per_1k: u64,
}

impl ModelRate {
    pub fn new(input_per_1k: u64, output_per_1k: u64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }
}

/// Per-model pricing used to settle a run against the credit ledger.
///
/// All arithmetic is in integer micro-credits; partial 1K-token blocks are
/// charged pro rata, rounded up, so a non-empty response never costs zero.
#[derive(Debug, Clone, Default)]
pub struct CostTable {
    rates: HashMap<String, ModelRate>,
    default_rate: Option<ModelRate>,
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, model: impl Into<String>, rate: ModelRate) -> Self {
        self.rates.insert(model.into(), rate);
        self
    }

    pub fn with_default_rate(mut self, rate: ModelRate) -> Self {
        self.default_rate = Some(rate);
        self
    }

    pub fn rate_for(&self, model: &str) -> Option<ModelRate> {
        self.rates.get(model).copied().or(self.default_rate)
    }

    /// Cost of `usage` against `model`, in micro-credits.
    ///
    /// Unknown models without a default rate cost zero rather than failing
    /// the run; the gateway logs the missing rate at startup.
    pub fn cost_of(&self, model: &str, usage: &TokenUsage) -> u64 {
        let Some(rate) = self.rate_for(model) else {
            return 0;
        };

        scaled_cost(usage.input_tokens, rate.input_per_1k)
            + scaled_cost(usage.output_tokens, rate.output_per_1k)
    }
}

fn scaled_cost(tokens: u32, rate_per_1k: u64) -> u64 {
    if tokens == 0 || rate_per_1k == 0 {
        return 0;
    }
    (tokens as u64 * rate_per_1k).div_ceil(1000)
}

/// Routes requests to the chat client that serves a given model.
///
/// Clients are built by the `ClientFactory` from provider configs; the
/// attached cost table settles finished runs against the credit ledger.
pub struct ModelRouter {
    routes: HashMap<String, Arc<dyn ChatClient>>,
    default_client: Arc<dyn ChatClient>,
    default_model: String,
    costs: CostTable,
}

impl ModelRouter {
    pub fn new(default_client: Arc<dyn ChatClient>, default_model: impl Into<String>) -> Self {
        Self {
            routes: HashMap::new(),
            default_client,
            default_model: default_model.into(),
            costs: CostTable::new(),
        }
    }

    /// Build a router from provider configs; the first provider is the
    /// default, and every listed model routes to its provider's client.
    pub fn from_providers(
        providers: &[ProviderConfig],
        default_model: impl Into<String>,
        costs: CostTable,
    ) -> Result<Self> {
        let first = providers.first().context("At least one LLM provider is required")?;
        let default_client = ClientFactory::create_chat_client(first)?;

        let mut router = Self::new(default_client, default_model).with_costs(costs);

        for provider in providers {
            let client = ClientFactory::create_chat_client(provider)?;
            for model in &provider.models {
                router.register(model.clone(), Arc::clone(&client));
            }
        }

        Ok(router)
    }

    pub fn with_costs(mut self, costs: CostTable) -> Self {
        self.costs = costs;
        self
    }

    pub fn register(&mut self, model: impl Into<String>, client: Arc<dyn ChatClient>) {
        self.routes.insert(model.into(), client);
    }

    /// Client serving `model`; unknown models fall back to the default
    /// provider so a misconfigured agent degrades instead of failing.
    pub fn resolve(&self, model: &str) -> Arc<dyn ChatClient> {
        match self.routes.get(model) {
            Some(client) => Arc::clone(client),
            None => {
                tracing::debug!(model, "no route for model, using default provider");
                Arc::clone(&self.default_client)
            }
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn costs(&self) -> &CostTable {
        &self.costs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ChatRequest, ChatResponse, TokenStream};
    use async_trait::async_trait;

    struct NullClient;

    #[async_trait]
    impl ChatClient for NullClient {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            anyhow::bail!("not wired")
        }

        async fn chat_stream(&self, _request: ChatRequest) -> Result<TokenStream> {
            anyhow::bail!("not wired")
        }
    }

    #[test]
    fn cost_rounds_up_partial_blocks() {
        let costs = CostTable::new().with_rate("gpt-4o", ModelRate::new(5000, 15000));

        // 100 input tokens at 5000/1k = 500 exactly; 1 output token rounds up to 15
        let usage = TokenUsage::new(100, 1);
        assert_eq!(costs.cost_of("gpt-4o", &usage), 515);
    }

    #[test]
    fn zero_usage_costs_nothing() {
        let costs = CostTable::new().with_rate("gpt-4o", ModelRate::new(5000, 15000));
        assert_eq!(costs.cost_of("gpt-4o", &TokenUsage::default()), 0);
    }

    #[test]
    fn unknown_model_uses_default_rate() {
        let costs = CostTable::new().with_default_rate(ModelRate::new(1000, 1000));
        let usage = TokenUsage::new(1000, 1000);
        assert_eq!(costs.cost_of("mystery-model", &usage), 2000);
    }

    #[test]
    fn unknown_model_without_default_is_free() {
        let costs = CostTable::new();
        let usage = TokenUsage::new(1000, 1000);
        assert_eq!(costs.cost_of("mystery-model", &usage), 0);
    }

    #[test]
    fn resolve_falls_back_to_default_client() {
        let router = ModelRouter::new(Arc::new(NullClient), "gpt-4o-mini");
        // Must not panic for an unregistered model
        let _ = router.resolve("unrouted-model");
        assert_eq!(router.default_model(), "gpt-4o-mini");
    }
}
