//! Broker connectivity check.

use crate::config::KafkaConfig;
use rskafka::client::ClientBuilder;
use tracing::error;

/// Attempts a broker connection; used for startup and readiness checks.
pub async fn check_connection(config: &KafkaConfig) -> bool {
    match ClientBuilder::new(vec![config.broker_string()]).build().await {
        Ok(_) => true,
        Err(e) => {
            error!("Broker connection check failed: {}", e);
            false
        }
    }
}
