use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Guardrails for a supervisor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub max_iterations: usize,
    pub execution_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            execution_timeout: Duration::from_secs(300),
        }
    }
}

impl SupervisorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }
}

/// Per-run LLM parameters, resolved from the selected agent's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// How much stored history is replayed into a run's context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextPolicy {
    LastK { k: usize },
    AllMessages,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        Self::LastK { k: 20 }
    }
}
