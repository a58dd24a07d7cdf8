//! Transport configuration.

use serde::{Deserialize, Serialize};

/// Kafka consumer/producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    /// Ingestion topic
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Consumer group id
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Partitions this process consumes; one worker per partition
    #[serde(default = "default_partitions")]
    pub partitions: Vec<i32>,
    /// Where to start when no offset is known ("earliest" or "latest")
    #[serde(default = "default_offset_reset")]
    pub offset_reset: String,
    /// Maximum bytes per fetch
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: i32,
    /// Maximum time a fetch waits for data, in milliseconds
    #[serde(default = "default_fetch_max_wait_ms")]
    pub fetch_max_wait_ms: i32,
}

fn default_topic() -> String {
    "user_events".to_string()
}

fn default_group_id() -> String {
    "liftlab-analytics".to_string()
}

fn default_partitions() -> Vec<i32> {
    vec![0, 1, 2]
}

fn default_offset_reset() -> String {
    "earliest".to_string()
}

fn default_fetch_max_bytes() -> i32 {
    1024 * 1024
}

fn default_fetch_max_wait_ms() -> i32 {
    500
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: default_topic(),
            group_id: default_group_id(),
            partitions: default_partitions(),
            offset_reset: default_offset_reset(),
            fetch_max_bytes: default_fetch_max_bytes(),
            fetch_max_wait_ms: default_fetch_max_wait_ms(),
        }
    }
}

impl KafkaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    pub fn starts_at_latest(&self) -> bool {
        self.offset_reset.eq_ignore_ascii_case("latest")
    }
}
