//! Kafka consumer for the ingestion pipeline.
//!
//! Uses rskafka for Kafka-compatible consumption with manual offset
//! management: the offset only advances after a message has been fully
//! handled, giving at-least-once delivery.

use crate::config::KafkaConfig;
use analytics_core::{Error, Result};
use async_trait::async_trait;
use rskafka::client::{
    partition::{OffsetAt, UnknownTopicHandling},
    ClientBuilder,
};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// A raw message pulled from the transport, before decoding.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Source of raw messages for one partition.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Pulls the next batch of messages in partition order.
    async fn fetch(&self) -> Result<Vec<RawMessage>>;

    /// Advances the consumer position to `next_offset`. Called only after
    /// every message below `next_offset` was processed or dead-lettered.
    async fn commit(&self, next_offset: i64) -> Result<()>;

    /// Partition this source reads.
    fn partition(&self) -> i32;

    /// Drops any cached connection so the next fetch reconnects.
    async fn reset_connection(&self) {}
}

/// rskafka-backed source for a single partition.
pub struct KafkaSource {
    config: KafkaConfig,
    partition: i32,
    partition_client: RwLock<Option<Arc<rskafka::client::partition::PartitionClient>>>,
    /// Next offset to read
    current_offset: AtomicI64,
    initialized: AtomicBool,
}

impl KafkaSource {
    pub fn new(config: KafkaConfig, partition: i32) -> Self {
        info!(
            group_id = %config.group_id,
            topic = %config.topic,
            partition = partition,
            "Creating Kafka source"
        );

        Self {
            config,
            partition,
            partition_client: RwLock::new(None),
            current_offset: AtomicI64::new(-1),
            initialized: AtomicBool::new(false),
        }
    }

    async fn ensure_connected(&self) -> Result<Arc<rskafka::client::partition::PartitionClient>> {
        {
            let client = self.partition_client.read().await;
            if let Some(ref c) = *client {
                return Ok(c.clone());
            }
        }

        let client = ClientBuilder::new(vec![self.config.broker_string()])
            .build()
            .await
            .map_err(|e| Error::transient(format!("failed to connect to brokers: {e}")))?;

        let partition_client = client
            .partition_client(
                self.config.topic.clone(),
                self.partition,
                UnknownTopicHandling::Error,
            )
            .await
            .map_err(|e| Error::transient(format!("failed to get partition client: {e}")))?;

        let partition_client = Arc::new(partition_client);

        if !self.initialized.load(Ordering::SeqCst) {
            // No consumer-group coordination: each source tracks its own
            // position and starts from the configured end of the log.
            let offset_at = if self.config.starts_at_latest() {
                OffsetAt::Latest
            } else {
                OffsetAt::Earliest
            };
            let offset = partition_client
                .get_offset(offset_at)
                .await
                .map_err(|e| Error::transient(format!("failed to get offset: {e}")))?;

            self.current_offset.store(offset, Ordering::SeqCst);
            self.initialized.store(true, Ordering::SeqCst);

            info!(
                topic = %self.config.topic,
                partition = self.partition,
                offset = offset,
                "Source initialized at offset"
            );
        }

        {
            let mut client_guard = self.partition_client.write().await;
            *client_guard = Some(partition_client.clone());
        }

        Ok(partition_client)
    }
}

#[async_trait]
impl EventSource for KafkaSource {
    async fn fetch(&self) -> Result<Vec<RawMessage>> {
        let client = self.ensure_connected().await?;
        let current = self.current_offset.load(Ordering::SeqCst);

        let (records, _watermark) = client
            .fetch_records(
                current,
                1..self.config.fetch_max_bytes,
                self.config.fetch_max_wait_ms,
            )
            .await
            .map_err(|e| {
                error!(partition = self.partition, "Fetch error: {}", e);
                Error::transient(format!("failed to fetch records: {e}"))
            })?;

        let messages: Vec<RawMessage> = records
            .into_iter()
            .map(|record| RawMessage {
                topic: self.config.topic.clone(),
                partition: self.partition,
                offset: record.offset,
                payload: record.record.value.unwrap_or_default(),
            })
            .collect();

        metrics().messages_fetched.inc_by(messages.len() as u64);

        if !messages.is_empty() {
            debug!(
                partition = self.partition,
                count = messages.len(),
                offset_start = messages[0].offset,
                "Fetched batch"
            );
        }

        Ok(messages)
    }

    async fn commit(&self, next_offset: i64) -> Result<()> {
        let prev = self.current_offset.swap(next_offset, Ordering::SeqCst);

        debug!(
            partition = self.partition,
            prev_offset = prev,
            new_offset = next_offset,
            "Committed offset"
        );

        Ok(())
    }

    fn partition(&self) -> i32 {
        self.partition
    }

    async fn reset_connection(&self) {
        let mut client = self.partition_client.write().await;
        *client = None;
        info!(partition = self.partition, "Source connection reset");
    }
}
