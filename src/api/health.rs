//! Health check endpoints
//!
//! This module provides health check endpoints for monitoring
//! and container orchestration (Kubernetes, ECS, etc.)

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::server::state::AppState;

/// Response for the main health check endpoint
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub store: String,
    pub uptime_seconds: u64,
}

/// Response for readiness probe
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub config_loaded: bool,
    pub store: bool,
    pub check_in_queue_configured: bool,
    pub passenger_queue_configured: bool,
}

/// Response for liveness probe
#[derive(Serialize)]
pub struct LivenessResponse {
    pub alive: bool,
}

/// Main health check endpoint
///
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.settings.app_version.clone(),
        environment: state.settings.environment.to_string(),
        store: state.settings.store_backend.to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Readiness probe endpoint
///
/// The service is ready once the flight table answers. A missing check-in
/// queue is reported but does not block traffic, flight CRUD still works.
///
/// GET /ready
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let checks = ReadinessChecks {
        config_loaded: true,
        store: state.store.health_check().await,
        check_in_queue_configured: state.settings.check_in_flight_queue_url.is_some(),
        passenger_queue_configured: state.settings.check_in_passenger_queue_url.is_some(),
    };

    let ready = checks.config_loaded && checks.store;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    if !ready {
        tracing::warn!(checks = ?checks, "Service not ready");
    }

    (status, Json(ReadinessResponse { ready, checks }))
}

/// Liveness probe endpoint
///
/// GET /liveness
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { alive: true })
}
