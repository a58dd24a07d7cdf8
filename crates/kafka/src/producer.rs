//! Kafka publisher: dead-letter delivery and synthetic event publishing.

use crate::config::KafkaConfig;
use analytics_core::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use rskafka::client::{
    partition::{Compression, UnknownTopicHandling},
    ClientBuilder,
};
use rskafka::record::Record;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Default bound on how long a publish waits for broker confirmation.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// A record bound for a dead-letter topic.
///
/// Carries the original payload untouched plus headers locating the
/// message on its source topic and describing the terminal error.
#[derive(Debug, Clone)]
pub struct DeadLetterRecord {
    /// Destination dead-letter topic
    pub topic: String,
    /// Original partition, preserved when non-negative
    pub partition: Option<i32>,
    pub payload: Vec<u8>,
    pub headers: BTreeMap<String, Vec<u8>>,
}

/// Destination for messages that exhausted their handling budget.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Publishes one dead-letter record, waiting for confirmation.
    ///
    /// An error here is fatal for the message's handling path: the caller
    /// must not advance the consumer offset past it.
    async fn publish(&self, record: DeadLetterRecord) -> Result<()>;
}

/// Publisher with cached per-topic-partition clients.
pub struct KafkaPublisher {
    config: KafkaConfig,
    send_timeout: Duration,
    /// Cached partition clients keyed by "topic:partition"
    clients: RwLock<BTreeMap<String, Arc<rskafka::client::partition::PartitionClient>>>,
}

impl KafkaPublisher {
    pub fn new(config: KafkaConfig) -> Self {
        Self::with_send_timeout(config, DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_send_timeout(config: KafkaConfig, send_timeout: Duration) -> Self {
        Self {
            config,
            send_timeout,
            clients: RwLock::new(BTreeMap::new()),
        }
    }

    /// Gets or creates a partition client for a topic.
    async fn get_client(
        &self,
        topic: &str,
        partition: i32,
    ) -> Result<Arc<rskafka::client::partition::PartitionClient>> {
        let key = format!("{topic}:{partition}");

        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(&key) {
                return Ok(client.clone());
            }
        }

        let client = ClientBuilder::new(vec![self.config.broker_string()])
            .build()
            .await
            .map_err(|e| Error::transient(format!("failed to connect to brokers: {e}")))?;

        let partition_client = client
            .partition_client(topic.to_string(), partition, UnknownTopicHandling::Error)
            .await
            .map_err(|e| Error::transient(format!("failed to get partition client: {e}")))?;

        let partition_client = Arc::new(partition_client);

        {
            let mut clients = self.clients.write().await;
            clients.insert(key, partition_client.clone());
        }

        Ok(partition_client)
    }

    /// Publishes one keyed event payload, used by the synthetic generator.
    pub async fn publish_event(
        &self,
        topic: &str,
        partition: i32,
        key: String,
        payload: Vec<u8>,
    ) -> Result<()> {
        let client = self.get_client(topic, partition).await?;

        let record = Record {
            key: Some(key.into_bytes()),
            value: Some(payload),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        client
            .produce(vec![record], Compression::NoCompression)
            .await
            .map_err(|e| Error::transient(format!("failed to produce: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl DeadLetterSink for KafkaPublisher {
    async fn publish(&self, record: DeadLetterRecord) -> Result<()> {
        // Broker picks nothing here: rskafka writes to an explicit
        // partition, so a negative original partition lands on 0.
        let partition = record.partition.unwrap_or(0);
        let topic = record.topic.clone();

        let client = self
            .get_client(&topic, partition)
            .await
            .map_err(|e| Error::fatal_publish(e.to_string()))?;

        let kafka_record = Record {
            key: None,
            value: Some(record.payload),
            headers: record.headers,
            timestamp: Utc::now(),
        };

        let produce = client.produce(vec![kafka_record], Compression::NoCompression);

        match tokio::time::timeout(self.send_timeout, produce).await {
            Ok(Ok(_offsets)) => {
                metrics().dead_letters_published.inc();
                debug!(topic = %topic, partition = partition, "Published dead-letter record");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(topic = %topic, "Dead-letter publish failed: {}", e);
                metrics().dead_letter_publish_failures.inc();
                Err(Error::fatal_publish(format!("produce to {topic} failed: {e}")))
            }
            Err(_) => {
                error!(topic = %topic, "Dead-letter publish timed out");
                metrics().dead_letter_publish_failures.inc();
                Err(Error::fatal_publish(format!(
                    "produce to {topic} timed out after {:?}",
                    self.send_timeout
                )))
            }
        }
    }
}
