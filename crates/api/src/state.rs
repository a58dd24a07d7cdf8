//! Application state shared across handlers.

use aggregate_store::AggregateStore;
use analytics_core::SharedRateLimiter;
use pipeline::EventProcessor;
use std::sync::Arc;
use std::time::Duration;

/// How often idle rate-limiter buckets are swept.
const RATE_LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Buckets idle longer than this are dropped.
const RATE_LIMITER_BUCKET_MAX_AGE: Duration = Duration::from_secs(900);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Applies ingested events to the aggregation store
    pub processor: Arc<EventProcessor>,
    /// Read side for the metrics endpoints
    pub store: AggregateStore,
    /// Admission control for the ingestion endpoint
    pub rate_limiter: SharedRateLimiter,
}

impl AppState {
    pub fn new(
        processor: Arc<EventProcessor>,
        store: AggregateStore,
        rate_limiter: SharedRateLimiter,
    ) -> Self {
        Self {
            processor,
            store,
            rate_limiter,
        }
    }

    /// Starts the periodic sweep of idle rate-limiter buckets.
    pub fn start_rate_limiter_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let rate_limiter = self.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMITER_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                rate_limiter.cleanup(RATE_LIMITER_BUCKET_MAX_AGE);
            }
        })
    }
}
