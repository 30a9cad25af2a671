use agora_types::LlmSettings;
use serde::{Deserialize, Serialize};

/// A named agent the supervisor can hand a run to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub model: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Names of tools this agent may call
    #[serde(default)]
    pub tools: Vec<String>,

    /// Lowercased keywords that route a user message to this agent
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl AgentProfile {
    pub fn llm_settings(&self) -> LlmSettings {
        let mut settings = LlmSettings::new(&self.model);
        if let Some(temp) = self.temperature {
            settings = settings.with_temperature(temp);
        }
        if let Some(max) = self.max_tokens {
            settings = settings.with_max_tokens(max);
        }
        settings
    }
}

/// Registry of agents with a required default.
///
/// Selection scans specialists in registration order and falls back to the
/// default agent; the returned reason string is surfaced to clients in the
/// `agent_selected` event.
pub struct AgentRegistry {
    specialists: Vec<AgentProfile>,
    default_agent: AgentProfile,
}

impl AgentRegistry {
    pub fn new(default_agent: AgentProfile) -> Self {
        Self {
            specialists: Vec::new(),
            default_agent,
        }
    }

    pub fn register(&mut self, profile: AgentProfile) {
        self.specialists.push(profile);
    }

    pub fn with_agent(mut self, profile: AgentProfile) -> Self {
        self.register(profile);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AgentProfile> {
        if self.default_agent.name == name {
            return Some(&self.default_agent);
        }
        self.specialists.iter().find(|a| a.name == name)
    }

    pub fn default_agent(&self) -> &AgentProfile {
        &self.default_agent
    }

    /// Pick the agent for a user message.
    pub fn select(&self, user_message: &str) -> (&AgentProfile, String) {
        let haystack = user_message.to_lowercase();

        for agent in &self.specialists {
            for keyword in &agent.keywords {
                if !keyword.is_empty() && haystack.contains(&keyword.to_lowercase()) {
                    return (agent, format!("matched keyword \"{}\"", keyword));
                }
            }
        }

        (&self.default_agent, "default agent".to_string())
    }
}
