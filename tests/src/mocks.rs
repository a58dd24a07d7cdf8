//! Mock implementations for testing.

use aggregate_store::{MemorySubstrate, Substrate};
use analytics_core::{Error, Result};
use async_trait::async_trait;
use kafka_transport::{DeadLetterRecord, DeadLetterSink, EventSource, RawMessage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Source that serves scripted batches, then signals shutdown.
///
/// Implements the same `EventSource` trait as the Kafka source, so the
/// pipeline worker under test runs the real fetch/handle/commit loop
/// without a broker.
pub struct MockSource {
    partition: i32,
    batches: Mutex<VecDeque<Vec<RawMessage>>>,
    committed: Mutex<Vec<i64>>,
    /// Flipped when the script runs out, so `run()` terminates.
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl MockSource {
    pub fn new(partition: i32) -> Self {
        Self {
            partition,
            batches: Mutex::new(VecDeque::new()),
            committed: Mutex::new(Vec::new()),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Makes an exhausted source request shutdown through `tx`.
    pub fn shutdown_when_drained(self, tx: watch::Sender<bool>) -> Self {
        *self.shutdown_tx.lock() = Some(tx);
        self
    }

    pub fn push_batch(&self, batch: Vec<RawMessage>) {
        self.batches.lock().push_back(batch);
    }

    /// Offsets committed so far, in order.
    pub fn committed(&self) -> Vec<i64> {
        self.committed.lock().clone()
    }
}

#[async_trait]
impl EventSource for MockSource {
    async fn fetch(&self) -> Result<Vec<RawMessage>> {
        if let Some(batch) = self.batches.lock().pop_front() {
            return Ok(batch);
        }
        if let Some(tx) = self.shutdown_tx.lock().as_ref() {
            let _ = tx.send(true);
        }
        Ok(Vec::new())
    }

    async fn commit(&self, next_offset: i64) -> Result<()> {
        self.committed.lock().push(next_offset);
        Ok(())
    }

    fn partition(&self) -> i32 {
        self.partition
    }
}

/// Dead-letter sink that captures records in memory.
pub struct MockDeadLetterSink {
    records: Mutex<Vec<DeadLetterRecord>>,
    should_fail: Mutex<bool>,
}

impl MockDeadLetterSink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            should_fail: Mutex::new(false),
        }
    }

    pub fn captured(&self) -> Vec<DeadLetterRecord> {
        self.records.lock().clone()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Simulate an unavailable dead-letter destination.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }
}

impl Default for MockDeadLetterSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeadLetterSink for MockDeadLetterSink {
    async fn publish(&self, record: DeadLetterRecord) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(Error::fatal_publish("mock dead-letter sink failure"));
        }
        self.records.lock().push(record);
        Ok(())
    }
}

/// Substrate whose first N scored writes fail with a transient error.
///
/// Counts write attempts so tests can assert exact delivery counts.
pub struct FlakySubstrate {
    inner: MemorySubstrate,
    remaining_failures: AtomicU32,
    write_attempts: AtomicU32,
}

impl FlakySubstrate {
    pub fn failing_times(n: u32) -> Self {
        Self {
            inner: MemorySubstrate::new(),
            remaining_failures: AtomicU32::new(n),
            write_attempts: AtomicU32::new(0),
        }
    }

    /// Fails every scored write, forever.
    pub fn always_failing() -> Self {
        Self::failing_times(u32::MAX)
    }

    pub fn write_attempts(&self) -> u32 {
        self.write_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Substrate for FlakySubstrate {
    async fn upsert_scored(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(Error::transient("substrate unavailable"));
        }
        self.inner.upsert_scored(key, member, score).await
    }

    async fn count_scored_at_least(&self, key: &str, min_score: f64) -> Result<u64> {
        self.inner.count_scored_at_least(key, min_score).await
    }

    async fn remove_scored_up_to(&self, key: &str, max_score: f64) -> Result<u64> {
        self.inner.remove_scored_up_to(key, max_score).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        self.inner.set_add(key, member).await
    }

    async fn set_len(&self, key: &str) -> Result<u64> {
        self.inner.set_len(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.inner.expire(key, ttl).await
    }
}
