use agora_llm::ModelRate;
use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub mongodb: MongoDbConfig,
    pub llm: LlmConfig,
    pub auth: AuthConfig,
    pub credits: CreditsConfig,
    pub supervisor: SupervisorSettings,
    pub logging: LoggingConfig,

    #[serde(default)]
    pub agents: AgentsConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: String,
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub auth_service_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins accepted on WebSocket upgrade; empty allows any
    #[serde(default)]
    pub allowed_ws_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoDbConfig {
    pub database: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub default_model: String,
    /// Context window budget in tokens, never sent to the provider
    pub max_context_tokens: usize,
    /// Extra openai-compatible base URL, e.g. a local proxy
    #[serde(default)]
    pub base_url: Option<String>,
    /// Models served by the configured provider
    #[serde(default)]
    pub models: Vec<String>,
    /// Micro-credit rates per 1K tokens, keyed by model name
    #[serde(default)]
    pub rates: HashMap<String, RateConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateConfig {
    pub input_per_1k: u64,
    pub output_per_1k: u64,
}

impl From<RateConfig> for ModelRate {
    fn from(rate: RateConfig) -> Self {
        ModelRate::new(rate.input_per_1k, rate.output_per_1k)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Seconds between token expiry checks on live connections
    pub refresh_check_secs: u64,
    /// Refresh when the token expires within this many seconds
    pub expiry_margin_secs: u64,
    /// Circuit breaker over the auth service
    pub breaker_failure_threshold: usize,
    pub breaker_success_threshold: usize,
    pub breaker_cooldown_secs: u64,
}

impl AuthConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_check_secs)
    }

    pub fn expiry_margin(&self) -> Duration {
        Duration::from_secs(self.expiry_margin_secs)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditsConfig {
    /// Micro-credits granted to a user on first sight
    pub initial_grant: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSettings {
    pub max_iterations: usize,
    pub execution_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Agent roster; deserialized straight into `AgentProfile`s.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub default_agent: Option<agora_agents::AgentProfile>,
    #[serde(default)]
    pub specialists: Vec<agora_agents::AgentProfile>,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_, MONGODB_, LLM_, AUTH_, LOG_ prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::default()
                    .prefix("SERVER")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("MONGODB")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LLM")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("AUTH")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LOG")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let mut cfg: Config = config.try_deserialize()?;

        // Secrets live in ENV, never in TOML
        cfg.mongodb_uri = std::env::var("MONGODB_URI").map_err(|_| {
            ConfigError::Message("MONGODB_URI environment variable is required".to_string())
        })?;
        cfg.jwt_secret = std::env::var("JWT_SECRET").map_err(|_| {
            ConfigError::Message("JWT_SECRET environment variable is required".to_string())
        })?;
        cfg.openai_api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ConfigError::Message("OPENAI_API_KEY environment variable is required".to_string())
        })?;
        cfg.auth_service_url = std::env::var("AUTH_SERVICE_URL").unwrap_or_default();

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 3000
        allowed_ws_origins = ["http://localhost:3000"]

        [cors]
        enabled = true
        origins = ["http://localhost:3000"]

        [mongodb]
        database = "agora_test"
        timeout_ms = 3000

        [llm]
        default_model = "gpt-4o-mini"
        max_context_tokens = 8000
        models = ["gpt-4o-mini", "gpt-4o"]

        [llm.rates.gpt-4o-mini]
        input_per_1k = 150
        output_per_1k = 600

        [auth]
        refresh_check_secs = 30
        expiry_margin_secs = 120
        breaker_failure_threshold = 5
        breaker_success_threshold = 2
        breaker_cooldown_secs = 30

        [credits]
        initial_grant = 10000000

        [supervisor]
        max_iterations = 25
        execution_timeout_secs = 300

        [logging]
        level = "debug"
        format = "json"

        [agents.default_agent]
        name = "general"
        description = "General assistant"
        system_prompt = "You are a helpful assistant."
        model = "gpt-4o-mini"

        [[agents.specialists]]
        name = "coder"
        description = "Code assistant"
        system_prompt = "You write code."
        model = "gpt-4o"
        tools = ["now"]
        keywords = ["code", "bug"]
    "#;

    #[test]
    fn config_deserializes_from_toml() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.mongodb.database, "agora_test");
        assert_eq!(config.llm.rates["gpt-4o-mini"].input_per_1k, 150);
        assert_eq!(config.auth.expiry_margin(), Duration::from_secs(120));
    }

    #[test]
    fn agent_roster_deserializes() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let default_agent = config.agents.default_agent.unwrap();
        assert_eq!(default_agent.name, "general");
        assert_eq!(config.agents.specialists.len(), 1);
        assert_eq!(config.agents.specialists[0].keywords, vec!["code", "bug"]);
    }
}
