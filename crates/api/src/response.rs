//! Standardized API responses.

use analytics_core::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Body returned when an event is accepted for processing.
#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub status: String,
}

impl AcceptedResponse {
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
        }
    }
}

/// Active-user count over the trailing window.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUsersResponse {
    pub active_users_last5m: u64,
}

/// Page-view count for one URL over the trailing window.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewsResponse {
    pub url: String,
    pub page_views_last15m: u64,
}

/// Session count for one user.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionsResponse {
    pub user_id: String,
    pub active_sessions_last5m: u64,
}

/// Error body; the `error` field is a stable machine-readable token.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// API error with status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                detail: None,
            },
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.body.detail = Some(detail.into());
        self
    }

    pub fn rate_limited() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
    }

    pub fn timestamp_too_future() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "timestamp_too_future")
    }

    pub fn invalid_event(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_event").with_detail(detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error").with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match &err {
            Error::InvalidArgument(msg) => Self::invalid_event(msg.clone()),
            Error::RateLimited(_) => Self::rate_limited(),
            Error::Transient(msg) => {
                Self::new(status, "dependency_unavailable").with_detail(msg.clone())
            }
            _ => Self::new(status, "internal_error").with_detail(err.to_string()),
        }
    }
}
