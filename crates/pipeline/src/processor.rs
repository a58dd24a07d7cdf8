//! Business logic turning one decoded event into aggregation writes.

use aggregate_store::AggregateStore;
use analytics_core::{Result, SessionIdGenerator, UserEvent};
use chrono::Utc;
use telemetry::metrics;
use tracing::debug;

/// Applies one event to the aggregation store.
///
/// The three writes are independent and individually idempotent-enough
/// for at-least-once delivery; no atomicity is attempted across them. The
/// first failure propagates to the pipeline, which owns retry.
pub struct EventProcessor {
    store: AggregateStore,
}

impl EventProcessor {
    pub fn new(store: AggregateStore) -> Self {
        Self { store }
    }

    pub async fn process(&self, event: &UserEvent) -> Result<()> {
        let start = std::time::Instant::now();
        let ts = event.timestamp.unwrap_or_else(Utc::now);

        self.store.mark_active_user(event.user_id, ts).await?;
        self.store
            .record_page_view(event.page_url_or_empty(), ts)
            .await?;

        let session_id = match event.session_id.as_deref() {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => SessionIdGenerator::generate(event.user_id, event.page_url.as_deref(), ts),
        };
        self.store
            .add_session(&event.user_id.to_string(), &session_id)
            .await?;

        metrics().events_processed.inc();
        metrics()
            .process_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        debug!(
            user_id = %event.user_id,
            event_type = %event.event_type,
            session_id = %session_id,
            "Event processed"
        );
        Ok(())
    }
}
