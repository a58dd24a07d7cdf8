//! Per-partition pipeline worker.
//!
//! Drives each consumed message through decode -> process -> acknowledge,
//! with retry/backoff and dead-letter routing on failure. The consumer
//! offset advances only after a message was processed or dead-lettered,
//! giving at-least-once delivery.

use crate::processor::EventProcessor;
use crate::retry::RetryPolicy;
use analytics_core::{Error, Result, UserEvent};
use kafka_transport::{
    topics::headers, DeadLetterRecord, DeadLetterSink, EventSource, RawMessage,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pause before refetching after a transport error or failed dead-letter
/// publish.
const FETCH_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Failure context attached to a dead-letter record.
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub attempts: u32,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub error: String,
}

impl RetryContext {
    pub fn new(message: &RawMessage, attempts: u32, error: &Error) -> Self {
        Self {
            attempts,
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            error: format!("{}: {}", error.kind(), error),
        }
    }

    /// Dead-letter headers locating the original message and describing
    /// the terminal error.
    pub fn headers(&self) -> BTreeMap<String, Vec<u8>> {
        let mut map = BTreeMap::new();
        map.insert(
            headers::ORIGINAL_TOPIC.to_string(),
            self.topic.clone().into_bytes(),
        );
        map.insert(
            headers::ORIGINAL_PARTITION.to_string(),
            self.partition.to_string().into_bytes(),
        );
        map.insert(
            headers::ORIGINAL_OFFSET.to_string(),
            self.offset.to_string().into_bytes(),
        );
        map.insert(
            headers::EXCEPTION_MESSAGE.to_string(),
            self.error.clone().into_bytes(),
        );
        map
    }
}

/// Terminal state of one message's handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    DeadLettered,
    /// Shutdown interrupted handling; the message was not acknowledged.
    Aborted,
}

/// Worker consuming one partition.
pub struct PipelineWorker {
    source: Arc<dyn EventSource>,
    dead_letters: Arc<dyn DeadLetterSink>,
    processor: Arc<EventProcessor>,
    policy: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl PipelineWorker {
    pub fn new(
        source: Arc<dyn EventSource>,
        dead_letters: Arc<dyn DeadLetterSink>,
        processor: Arc<EventProcessor>,
        policy: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            dead_letters,
            processor,
            policy,
            shutdown,
        }
    }

    /// Main loop: fetch, handle each message in order, commit.
    pub async fn run(mut self) -> Result<()> {
        info!(
            partition = self.source.partition(),
            max_attempts = self.policy.max_attempts,
            "Pipeline worker starting"
        );
        metrics().active_workers.inc();

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let messages = tokio::select! {
                _ = self.shutdown.changed() => break,
                fetched = self.source.fetch() => match fetched {
                    Ok(messages) => messages,
                    Err(e) => {
                        error!(partition = self.source.partition(), "Fetch error: {}", e);
                        if self.pause(FETCH_ERROR_BACKOFF).await.is_err() {
                            break;
                        }
                        self.source.reset_connection().await;
                        continue;
                    }
                },
            };

            let mut aborted = false;
            for message in &messages {
                match self.handle(message).await {
                    Ok(Outcome::Aborted) => {
                        aborted = true;
                        break;
                    }
                    Ok(outcome) => {
                        debug!(
                            partition = message.partition,
                            offset = message.offset,
                            outcome = ?outcome,
                            "Message acknowledged"
                        );
                        self.source.commit(message.offset + 1).await?;
                    }
                    Err(e) => {
                        // Dead-letter publish failed: do not advance past
                        // this message; refetch resumes from it.
                        error!(
                            partition = message.partition,
                            offset = message.offset,
                            "Message handling fatal: {}", e
                        );
                        let _ = self.pause(FETCH_ERROR_BACKOFF).await;
                        aborted = *self.shutdown.borrow();
                        break;
                    }
                }
            }

            if aborted {
                break;
            }
        }

        metrics().active_workers.dec();
        info!(partition = self.source.partition(), "Pipeline worker stopped");
        Ok(())
    }

    /// Handles one message to a terminal state.
    ///
    /// Returns `Err` only when dead-letter publication itself failed.
    pub async fn handle(&mut self, message: &RawMessage) -> Result<Outcome> {
        let mut attempt: u32 = 1;

        loop {
            match self.attempt_once(message).await {
                Ok(()) => return Ok(Outcome::Processed),
                Err(e) => {
                    metrics().process_failures.inc();

                    if !self.policy.is_retryable(&e) {
                        warn!(
                            partition = message.partition,
                            offset = message.offset,
                            error = %e,
                            "Non-retryable failure, routing to dead letter"
                        );
                        metrics().poison_messages.inc();
                        self.dead_letter(message, attempt, &e).await?;
                        return Ok(Outcome::DeadLettered);
                    }

                    if attempt >= self.policy.max_attempts {
                        warn!(
                            partition = message.partition,
                            offset = message.offset,
                            attempts = attempt,
                            error = %e,
                            "Retries exhausted, routing to dead letter"
                        );
                        self.dead_letter(message, attempt, &e).await?;
                        return Ok(Outcome::DeadLettered);
                    }

                    let backoff = self.policy.backoff(attempt);
                    warn!(
                        partition = message.partition,
                        offset = message.offset,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retry scheduled"
                    );
                    metrics().retries_attempted.inc();
                    attempt += 1;

                    if self.pause(backoff).await.is_err() {
                        return Ok(Outcome::Aborted);
                    }
                }
            }
        }
    }

    /// One delivery attempt: decode then process.
    async fn attempt_once(&self, message: &RawMessage) -> Result<()> {
        let event: UserEvent = serde_json::from_slice(&message.payload)
            .map_err(|e| Error::poison(format!("malformed event payload: {e}")))?;
        self.processor.process(&event).await
    }

    async fn dead_letter(&self, message: &RawMessage, attempts: u32, error: &Error) -> Result<()> {
        let (topic, partition) = self
            .policy
            .dead_letter_destination(&message.topic, message.partition);
        let context = RetryContext::new(message, attempts, error);

        let record = DeadLetterRecord {
            topic,
            partition,
            payload: message.payload.clone(),
            headers: context.headers(),
        };

        self.dead_letters.publish(record).await
    }

    /// Sleeps for `duration`, returning `Err(())` if shutdown fires first.
    async fn pause(&mut self, duration: Duration) -> std::result::Result<(), ()> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.shutdown.changed() => Err(()),
        }
    }
}
