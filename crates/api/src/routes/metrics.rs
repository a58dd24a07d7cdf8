//! Read endpoints for the windowed counters.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::response::{
    ActiveSessionsResponse, ActiveUsersResponse, ApiError, PageViewsResponse,
};
use crate::state::AppState;

/// GET /api/v1/metrics/active-users
pub async fn active_users_handler(
    State(state): State<AppState>,
) -> Result<Json<ActiveUsersResponse>, ApiError> {
    let now_ms = Utc::now().timestamp_millis();
    let count = state.store.count_active_users(now_ms).await?;

    Ok(Json(ActiveUsersResponse {
        active_users_last5m: count,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PageViewsQuery {
    pub url: String,
}

/// GET /api/v1/metrics/pageviews?url=...
pub async fn page_views_handler(
    State(state): State<AppState>,
    Query(query): Query<PageViewsQuery>,
) -> Result<Json<PageViewsResponse>, ApiError> {
    let now_ms = Utc::now().timestamp_millis();
    let count = state.store.count_page_views(&query.url, now_ms).await?;

    Ok(Json(PageViewsResponse {
        url: query.url,
        page_views_last15m: count,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ActiveSessionsQuery {
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// GET /api/v1/metrics/active-sessions?userId=...
pub async fn active_sessions_handler(
    State(state): State<AppState>,
    Query(query): Query<ActiveSessionsQuery>,
) -> Result<Json<ActiveSessionsResponse>, ApiError> {
    let count = state.store.count_sessions(&query.user_id).await?;

    Ok(Json(ActiveSessionsResponse {
        user_id: query.user_id,
        active_sessions_last5m: count,
    }))
}
