//! Unified error types for the analytics pipeline.
//!
//! The pipeline's retry policy keys off these variants:
//! - `InvalidArgument` is never retried
//! - `Transient` is retried with backoff, then dead-lettered
//! - `PoisonMessage` is dead-lettered without consuming retry budget
//! - `FatalPublish` means the dead-letter send itself failed

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the analytics pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A required input was missing or empty. Callers must fix the input
    /// before resubmission.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The substrate or transport was temporarily unavailable.
    #[error("transient dependency failure: {0}")]
    Transient(String),

    /// A message that can never be processed (malformed payload, or an
    /// error class marked non-retryable).
    #[error("poison message: {0}")]
    PoisonMessage(String),

    /// Dead-letter publication failed. The consumer offset must not be
    /// advanced past the affected message.
    #[error("dead-letter publish failed: {0}")]
    FatalPublish(String),

    /// Admission denied by the rate limiter.
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn poison(msg: impl Into<String>) -> Self {
        Self::PoisonMessage(msg.into())
    }

    pub fn fatal_publish(msg: impl Into<String>) -> Self {
        Self::FatalPublish(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short error-class name carried in dead-letter headers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Transient(_) => "Transient",
            Self::PoisonMessage(_) => "PoisonMessage",
            Self::FatalPublish(_) => "FatalPublish",
            Self::RateLimited(_) => "RateLimited",
            Self::Serialization(_) => "Serialization",
            Self::Internal(_) => "Internal",
        }
    }

    /// Whether the pipeline's default policy may retry this failure.
    ///
    /// Serialization failures count as poison: re-decoding the same bytes
    /// cannot succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Internal(_))
    }

    /// HTTP status for surfacing this error on the ingestion API.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) => 400,
            Self::PoisonMessage(_) => 400,
            Self::Serialization(_) => 400,
            Self::RateLimited(_) => 429,
            Self::Transient(_) => 503,
            Self::FatalPublish(_) => 500,
            Self::Internal(_) => 500,
        }
    }
}
