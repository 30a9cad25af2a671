use crate::auth::AuthClient;
use crate::resilience::{CircuitBreaker, CircuitState};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency above which a passing probe counts as degraded.
const DEGRADED_LATENCY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Outcome of one probe run.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub name: String,
    pub status: ProbeStatus,
    /// 0-100; 0 for failures, reduced by latency otherwise
    pub score: u8,
    pub latency_ms: u64,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A named dependency check.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> anyhow::Result<()>;
}

/// Runs every registered probe and folds the results into readiness.
///
/// Failures are counted per probe across runs; once a probe fails
/// `failure_threshold` times in a row the service reports not-ready even
/// if an individual run later squeaks through as degraded.
pub struct HealthChecker {
    probes: Vec<Arc<dyn HealthProbe>>,
    failure_threshold: u32,
    failures: RwLock<HashMap<String, u32>>,
}

impl HealthChecker {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            probes: Vec::new(),
            failure_threshold: failure_threshold.max(1),
            failures: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, probe: Arc<dyn HealthProbe>) {
        self.probes.push(probe);
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.register(probe);
        self
    }

    pub async fn run_all(&self) -> Vec<ProbeReport> {
        let mut reports = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            reports.push(self.run_one(probe.as_ref()).await);
        }
        reports
    }

    async fn run_one(&self, probe: &dyn HealthProbe) -> ProbeReport {
        let start = Instant::now();
        let outcome = probe.check().await;
        let latency = start.elapsed();
        let latency_ms = latency.as_millis() as u64;

        let (status, message) = match outcome {
            Ok(()) if latency >= DEGRADED_LATENCY => (ProbeStatus::Degraded, None),
            Ok(()) => (ProbeStatus::Healthy, None),
            Err(e) => {
                tracing::warn!(probe = probe.name(), error = %e, "health probe failed");
                (ProbeStatus::Unhealthy, Some(e.to_string()))
            }
        };

        let consecutive_failures = {
            let mut failures = self.failures.write();
            let count = failures.entry(probe.name().to_string()).or_insert(0);
            if status == ProbeStatus::Unhealthy {
                *count += 1;
            } else {
                *count = 0;
            }
            *count
        };

        ProbeReport {
            name: probe.name().to_string(),
            status,
            score: score(status, latency_ms),
            latency_ms,
            consecutive_failures,
            message,
        }
    }

    /// Overall status: worst probe wins.
    pub fn overall(reports: &[ProbeReport]) -> ProbeStatus {
        let mut overall = ProbeStatus::Healthy;
        for report in reports {
            match report.status {
                ProbeStatus::Unhealthy => return ProbeStatus::Unhealthy,
                ProbeStatus::Degraded => overall = ProbeStatus::Degraded,
                ProbeStatus::Healthy => {}
            }
        }
        overall
    }

    /// Ready to take traffic: no probe unhealthy, none past the
    /// consecutive-failure threshold.
    pub fn ready(&self, reports: &[ProbeReport]) -> bool {
        reports.iter().all(|r| {
            r.status != ProbeStatus::Unhealthy && r.consecutive_failures < self.failure_threshold
        })
    }
}

/// 0 for failures; otherwise 100 minus a latency penalty, floor 10.
fn score(status: ProbeStatus, latency_ms: u64) -> u8 {
    if status == ProbeStatus::Unhealthy {
        return 0;
    }
    let penalty = (latency_ms / 25).min(90) as u8;
    100 - penalty
}

/// Database reachability via `ping`.
pub struct MongoProbe {
    client: mongodb::Client,
    database: String,
}

impl MongoProbe {
    pub fn new(client: mongodb::Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for MongoProbe {
    fn name(&self) -> &str {
        "mongodb"
    }

    async fn check(&self) -> anyhow::Result<()> {
        self.client
            .database(&self.database)
            .run_command(bson::doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}

/// Auth service reachability.
pub struct AuthServiceProbe {
    auth: AuthClient,
}

impl AuthServiceProbe {
    pub fn new(auth: AuthClient) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl HealthProbe for AuthServiceProbe {
    fn name(&self) -> &str {
        "auth_service"
    }

    async fn check(&self) -> anyhow::Result<()> {
        self.auth.ping().await
    }
}

/// LLM provider reachability via its model listing endpoint.
pub struct LlmProviderProbe {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl LlmProviderProbe {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/models", base),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for LlmProviderProbe {
    fn name(&self) -> &str {
        "llm_provider"
    }

    async fn check(&self) -> anyhow::Result<()> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("llm provider unhealthy: {}", response.status());
        }
        Ok(())
    }
}

/// Surfaces the auth-service circuit breaker in health output: an open
/// circuit means refreshes are failing fast right now.
pub struct BreakerProbe {
    breaker: Arc<CircuitBreaker>,
}

impl BreakerProbe {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }
}

#[async_trait]
impl HealthProbe for BreakerProbe {
    fn name(&self) -> &str {
        "auth_breaker"
    }

    async fn check(&self) -> anyhow::Result<()> {
        match self.breaker.state() {
            CircuitState::Open => anyhow::bail!("circuit open"),
            CircuitState::HalfOpen | CircuitState::Closed => Ok(()),
        }
    }
}
