//! Synthetic event generator.
//!
//! Publishes randomized user-behavior events onto the ingestion topic at a
//! configurable rate, for load testing and local development. Shares the
//! wire format with real producers.

use crate::config::KafkaConfig;
use crate::producer::KafkaPublisher;
use analytics_core::{EventType, UserEvent};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

const PAGES: &[&str] = &[
    "/home",
    "/product/123",
    "/checkout",
    "/search?q=shoes",
    "/category/electronics",
];

/// Generated traffic skips PURCHASE so conversion metrics stay plausible.
const GENERATED_TYPES: &[EventType] = &[
    EventType::PageView,
    EventType::Click,
    EventType::AddToCart,
    EventType::Checkout,
    EventType::Search,
];

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_events_per_second")]
    pub events_per_second: u32,
    /// Target topic; the ingestion topic when unset
    #[serde(default)]
    pub topic: Option<String>,
}

fn default_events_per_second() -> u32 {
    100
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            events_per_second: default_events_per_second(),
            topic: None,
        }
    }
}

/// Background task publishing synthetic events once per second.
pub struct EventGenerator {
    publisher: Arc<KafkaPublisher>,
    kafka: KafkaConfig,
    config: GeneratorConfig,
}

impl EventGenerator {
    pub fn new(publisher: Arc<KafkaPublisher>, kafka: KafkaConfig, config: GeneratorConfig) -> Self {
        Self {
            publisher,
            kafka,
            config,
        }
    }

    /// Spawns the generation loop. Returns immediately when disabled.
    pub fn start(self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.enabled {
            return None;
        }

        let topic = self
            .config
            .topic
            .clone()
            .unwrap_or_else(|| self.kafka.topic.clone());
        let rate = self.config.events_per_second;

        info!(topic = %topic, rate = rate, "Starting synthetic event generator");

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));

            loop {
                ticker.tick().await;

                for (partition, key, payload) in self.next_batch() {
                    if let Err(e) = self
                        .publisher
                        .publish_event(&topic, partition, key, payload)
                        .await
                    {
                        error!("Failed to send synthetic event: {}", e);
                    }
                }

                telemetry::metrics()
                    .generator_events
                    .inc_by(rate as u64);
            }
        }))
    }

    /// One second's worth of randomized events, built before any await so
    /// the thread-local RNG never crosses a suspension point.
    fn next_batch(&self) -> Vec<(i32, String, Vec<u8>)> {
        let mut rng = rand::thread_rng();
        let partitions = &self.kafka.partitions;
        let mut batch = Vec::with_capacity(self.config.events_per_second as usize);

        for _ in 0..self.config.events_per_second {
            let user_id = Uuid::new_v4();
            let event_type = GENERATED_TYPES[rng.gen_range(0..GENERATED_TYPES.len())];
            let page = PAGES[rng.gen_range(0..PAGES.len())];

            let event = UserEvent::new(user_id, event_type)
                .with_timestamp(Utc::now())
                .with_page_url(page);

            let partition = partitions[rng.gen_range(0..partitions.len())];

            match serde_json::to_vec(&event) {
                Ok(payload) => batch.push((partition, user_id.to_string(), payload)),
                Err(e) => error!("Failed to serialize synthetic event: {}", e),
            }
        }

        batch
    }
}
