//! Request extractors.

use analytics_core::rate_limit::ANONYMOUS_CLIENT;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Caller-supplied client identifier, from the `X-Client-Id` header.
///
/// Blank or absent ids collapse to the shared anonymous bucket.
#[derive(Debug, Clone)]
pub struct ClientId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let client = parts
            .headers
            .get("X-Client-Id")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS_CLIENT);

        Ok(ClientId(client.to_string()))
    }
}
