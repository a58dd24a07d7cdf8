//! API routes.

pub mod events;
pub mod health;
pub mod metrics;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/events", post(events::ingest_handler))
        .route("/api/v1/metrics/active-users", get(metrics::active_users_handler))
        .route("/api/v1/metrics/pageviews", get(metrics::page_views_handler))
        .route(
            "/api/v1/metrics/active-sessions",
            get(metrics::active_sessions_handler),
        )
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
