//! In-process metrics collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram for latency tracking, in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; 9],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 9] = [1, 5, 10, 25, 50, 100, 500, 1000, 5000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        self.buckets[Self::BUCKET_BOUNDS.len() - 1].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }
}

/// Collected metrics for the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Transport
    pub messages_fetched: Counter,
    pub dead_letters_published: Counter,
    pub dead_letter_publish_failures: Counter,
    pub generator_events: Counter,

    // Pipeline
    pub events_processed: Counter,
    pub process_failures: Counter,
    pub poison_messages: Counter,
    pub retries_attempted: Counter,

    // HTTP ingestion
    pub events_ingested_http: Counter,
    pub rate_limited_requests: Counter,

    // Latency
    pub process_latency_ms: Histogram,
    pub ingest_latency_ms: Histogram,

    // Gauges
    pub active_workers: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            messages_fetched: self.messages_fetched.get(),
            events_processed: self.events_processed.get(),
            process_failures: self.process_failures.get(),
            poison_messages: self.poison_messages.get(),
            retries_attempted: self.retries_attempted.get(),
            dead_letters_published: self.dead_letters_published.get(),
            dead_letter_publish_failures: self.dead_letter_publish_failures.get(),
            events_ingested_http: self.events_ingested_http.get(),
            rate_limited_requests: self.rate_limited_requests.get(),
            generator_events: self.generator_events.get(),
            process_latency_mean_ms: self.process_latency_ms.mean(),
            ingest_latency_mean_ms: self.ingest_latency_ms.mean(),
            active_workers: self.active_workers.get(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub messages_fetched: u64,
    pub events_processed: u64,
    pub process_failures: u64,
    pub poison_messages: u64,
    pub retries_attempted: u64,
    pub dead_letters_published: u64,
    pub dead_letter_publish_failures: u64,
    pub events_ingested_http: u64,
    pub rate_limited_requests: u64,
    pub generator_events: u64,
    pub process_latency_mean_ms: f64,
    pub ingest_latency_mean_ms: f64,
    pub active_workers: u64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
