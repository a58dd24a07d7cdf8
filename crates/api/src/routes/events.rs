//! Ingestion endpoint handler.
//!
//! Admission control runs before the body is even parsed: a rejected
//! client pays for nothing but the rate-limit check.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use analytics_core::UserEvent;
use chrono::Utc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, warn};
use validator::Validate;

use crate::extractors::ClientId;
use crate::response::{AcceptedResponse, ApiError};
use crate::state::AppState;

/// Largest tolerated clock skew into the future, in milliseconds.
const MAX_FUTURE_SKEW_MS: i64 = 120_000;

/// POST /api/v1/events - synchronous ingestion path.
///
/// Accepts one JSON event, applies the same processing as the
/// message-transport path, and returns 202 on success.
pub async fn ingest_handler(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let start = Instant::now();

    if !state.rate_limiter.admit(&client_id) {
        metrics().rate_limited_requests.inc();
        debug!(client_id = %client_id, "Ingestion request rejected by rate limiter");
        return Err(ApiError::rate_limited());
    }

    let event: UserEvent =
        serde_json::from_slice(&body).map_err(|e| ApiError::invalid_event(e.to_string()))?;
    event
        .validate()
        .map_err(|e| ApiError::invalid_event(e.to_string()))?;

    if let Some(ts) = event.timestamp {
        let skew_ms = ts.timestamp_millis() - Utc::now().timestamp_millis();
        if skew_ms > MAX_FUTURE_SKEW_MS {
            warn!(
                user_id = %event.user_id,
                skew_ms = skew_ms,
                "Rejecting event with future timestamp"
            );
            return Err(ApiError::timestamp_too_future());
        }
    }

    state.processor.process(&event).await?;

    metrics().events_ingested_http.inc();
    metrics()
        .ingest_latency_ms
        .observe(start.elapsed().as_millis() as u64);

    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::accepted())))
}
