//! Per-client token-bucket admission control.
//!
//! One bucket per client id, created lazily and refilled continuously at a
//! fixed rate. The bucket map is sharded (dashmap), so admits for different
//! clients do not serialize behind a single lock; the refill-and-consume
//! sequence for one bucket is atomic under its shard's entry lock.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Client id used when the caller supplies none.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens added per second
    #[serde(default = "default_tokens_per_second")]
    pub tokens_per_second: f64,
    /// Maximum tokens a bucket can hold
    #[serde(default = "default_capacity")]
    pub capacity: u32,
}

fn default_tokens_per_second() -> f64 {
    200.0
}

fn default_capacity() -> u32 {
    400
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tokens_per_second: default_tokens_per_second(),
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, tokens_per_second: f64, capacity: u32) -> bool {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.last_refill).as_millis() as f64;
        self.tokens = (self.tokens + elapsed_ms * tokens_per_second / 1000.0).min(capacity as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token-bucket rate limiter keyed by client id.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Admits or rejects one unit of work for the given client.
    ///
    /// A blank client id maps to [`ANONYMOUS_CLIENT`].
    pub fn admit(&self, client_id: &str) -> bool {
        let key = if client_id.trim().is_empty() {
            ANONYMOUS_CLIENT
        } else {
            client_id
        };

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.capacity));

        bucket.try_consume(self.config.tokens_per_second, self.config.capacity)
    }

    /// Removes buckets that have not been touched within `max_age`.
    ///
    /// Not required for correctness; bounds memory when client ids churn.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < max_age);
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Shared rate limiter handle.
pub type SharedRateLimiter = Arc<RateLimiter>;
