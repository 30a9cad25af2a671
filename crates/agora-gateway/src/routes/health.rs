use crate::health::{HealthChecker, ProbeReport, ProbeStatus};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthSummary {
    pub status: ProbeStatus,
    pub ready: bool,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthDetail {
    pub status: ProbeStatus,
    pub ready: bool,
    pub connections: usize,
    pub probes: Vec<ProbeReport>,
}

/// `GET /health`: overall status summary.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Overall health summary")),
    tag = "health"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthSummary> {
    let reports = state.health.run_all().await;
    Json(HealthSummary {
        status: HealthChecker::overall(&reports),
        ready: state.health.ready(&reports),
        connections: state.ws.connection_count(),
    })
}

/// `GET /health/live`: process liveness, never touches dependencies.
#[utoipa::path(
    get,
    path = "/health/live",
    responses((status = 200, description = "Process is alive")),
    tag = "health"
)]
pub async fn live() -> StatusCode {
    StatusCode::OK
}

/// `GET /health/ready`: 503 until every dependency probe passes.
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Ready for traffic"),
        (status = 503, description = "A dependency is unhealthy")
    ),
    tag = "health"
)]
pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    let reports = state.health.run_all().await;
    let ready = state.health.ready(&reports);

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(serde_json::json!({ "ready": ready }))).into_response()
}

/// `GET /health/detailed`: per-probe reports with scores and latency.
#[utoipa::path(
    get,
    path = "/health/detailed",
    responses((status = 200, description = "Per-probe health detail")),
    tag = "health"
)]
pub async fn detailed(State(state): State<Arc<AppState>>) -> Json<HealthDetail> {
    let reports = state.health.run_all().await;
    Json(HealthDetail {
        status: HealthChecker::overall(&reports),
        ready: state.health.ready(&reports),
        connections: state.ws.connection_count(),
        probes: reports,
    })
}
