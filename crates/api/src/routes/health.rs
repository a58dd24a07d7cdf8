//! Health endpoints.

use axum::{http::StatusCode, response::IntoResponse, Json};
use telemetry::{health, HealthStatus};

/// GET /health - full component report.
pub async fn health_handler() -> impl IntoResponse {
    let report = health().report();
    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}

/// GET /health/ready - can the service serve reads and ingest?
pub async fn ready_handler() -> impl IntoResponse {
    if health().is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// GET /health/live - is the process up?
pub async fn live_handler() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
