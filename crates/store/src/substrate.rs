//! The ordered key-value substrate the aggregation store runs on.

use analytics_core::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Primitives the aggregation store needs from its backing store.
///
/// Any store offering these operations is substitutable; scores are opaque
/// f64 values (the aggregation layer uses epoch milliseconds throughout).
#[async_trait]
pub trait Substrate: Send + Sync {
    /// Inserts or updates `member` in the sorted set at `key` with `score`.
    async fn upsert_scored(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Counts members of the sorted set at `key` with score >= `min_score`.
    /// Missing keys count as empty.
    async fn count_scored_at_least(&self, key: &str, min_score: f64) -> Result<u64>;

    /// Removes members of the sorted set at `key` with score <= `max_score`.
    /// Returns the number removed.
    async fn remove_scored_up_to(&self, key: &str, max_score: f64) -> Result<u64>;

    /// Adds `member` to the plain set at `key`.
    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    /// Cardinality of the plain set at `key`. Missing keys count as empty.
    async fn set_len(&self, key: &str) -> Result<u64>;

    /// Sets or refreshes the TTL of `key`. A no-op for missing keys.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}

/// Shared substrate handle.
pub type SharedSubstrate = Arc<dyn Substrate>;
