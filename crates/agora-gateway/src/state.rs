use crate::auth::{AuthClient, JwtVerifier};
use crate::config::Config;
use crate::health::HealthChecker;
use crate::resilience::CircuitBreaker;
use crate::ws::WsManager;
use agora_agents::Supervisor;
use agora_persist::PersistClient;
use std::sync::Arc;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub persist: Arc<PersistClient>,
    pub supervisor: Arc<Supervisor>,
    pub ws: Arc<WsManager>,
    pub verifier: JwtVerifier,
    pub auth_client: AuthClient,
    pub auth_breaker: Arc<CircuitBreaker>,
    pub health: Arc<HealthChecker>,
}
