//! Pulse analytics pipeline.
//!
//! Near-real-time user-behavior aggregation:
//! - Kafka-compatible consumer with retry/backoff and dead-letter routing
//! - Sliding-window counters on an ordered key-value substrate
//! - Rate-limited HTTP ingestion and metrics read API
//! - Optional synthetic load generator

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use aggregate_store::{AggregateStore, MemorySubstrate, RedisSubstrate, SharedSubstrate, SubstrateConfig};
use analytics_core::{RateLimitConfig, RateLimiter};
use api::{router, AppState};
use kafka_transport::{EventGenerator, GeneratorConfig, KafkaConfig, KafkaPublisher, KafkaSource};
use pipeline::{EventProcessor, PipelineWorker, RetryConfig, RetryPolicy};
use telemetry::{health, init_tracing_from_env, metrics};

/// How often the metrics snapshot is logged.
const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    kafka: KafkaConfig,
    #[serde(default)]
    retry: RetryConfig,
    #[serde(default)]
    rate_limiter: RateLimitConfig,
    #[serde(default)]
    substrate: SubstrateConfig,
    #[serde(default)]
    generator: GeneratorConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            kafka: KafkaConfig::default(),
            retry: RetryConfig::default(),
            rate_limiter: RateLimitConfig::default(),
            substrate: SubstrateConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting Pulse analytics pipeline v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    info!(
        brokers = ?config.kafka.brokers,
        topic = %config.kafka.topic,
        partitions = ?config.kafka.partitions,
        "Loaded Kafka config"
    );

    // Connect the aggregation substrate
    let substrate = connect_substrate(&config.substrate).await?;
    let store = AggregateStore::new(substrate);
    let processor = Arc::new(EventProcessor::new(store.clone()));

    // Transport health check
    if kafka_transport::health::check_connection(&config.kafka).await {
        health().transport.set_healthy();
        info!("Broker connection: healthy");
    } else {
        health().transport.set_unhealthy("Connection failed");
        error!("Broker connection: unhealthy");
    }

    // Shared publisher for dead letters and the synthetic generator
    let publisher = Arc::new(KafkaPublisher::with_send_timeout(
        config.kafka.clone(),
        config.retry.send_timeout(),
    ));

    // Start one pipeline worker per partition
    let policy = RetryPolicy::from_config(&config.retry);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_handles = Vec::new();

    for &partition in &config.kafka.partitions {
        let source = Arc::new(KafkaSource::new(config.kafka.clone(), partition));
        let worker = PipelineWorker::new(
            source,
            publisher.clone(),
            processor.clone(),
            policy.clone(),
            shutdown_rx.clone(),
        );
        worker_handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                error!(partition = partition, "Pipeline worker fatal error: {}", e);
            }
        }));
    }
    info!(workers = worker_handles.len(), "Pipeline workers started");

    // Optional synthetic load
    let _generator_handle =
        EventGenerator::new(publisher.clone(), config.kafka.clone(), config.generator.clone())
            .start();

    // Periodic metrics snapshot logging
    let _metrics_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_LOG_INTERVAL);
        loop {
            ticker.tick().await;
            let snapshot = metrics().snapshot();
            info!(
                processed = snapshot.events_processed,
                failures = snapshot.process_failures,
                dead_lettered = snapshot.dead_letters_published,
                rate_limited = snapshot.rate_limited_requests,
                "Pipeline metrics"
            );
        }
    });

    // HTTP API
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limiter.clone()));
    let state = AppState::new(processor, store, rate_limiter);
    let _cleanup_handle = state.start_rate_limiter_cleanup();
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop workers: no new fetches, in-flight backoff sleeps interrupted
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from defaults, config file, and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ANALYTICS")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Nested list/option fields don't parse reliably from the environment;
    // map the common deployment variables by hand.
    if let Ok(brokers) = std::env::var("ANALYTICS_KAFKA_BROKERS") {
        config.kafka.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(topic) = std::env::var("ANALYTICS_KAFKA_TOPIC") {
        config.kafka.topic = topic;
    }
    if let Ok(redis_url) = std::env::var("ANALYTICS_SUBSTRATE_REDIS_URL") {
        config.substrate.redis_url = Some(redis_url);
    }

    Ok(config)
}

/// Connect the configured substrate backend and record its health.
async fn connect_substrate(config: &SubstrateConfig) -> Result<SharedSubstrate> {
    match &config.redis_url {
        Some(url) => {
            let redis = RedisSubstrate::connect(url)
                .await
                .context("Failed to connect to Redis substrate")?;
            if redis.health_check().await {
                health().substrate.set_healthy();
                info!("Substrate connection: healthy");
            } else {
                health().substrate.set_unhealthy("Ping failed");
                error!("Substrate connection: unhealthy");
            }
            Ok(Arc::new(redis))
        }
        None => {
            info!("No redis_url configured, using in-memory substrate");
            health().substrate.set_healthy();
            Ok(Arc::new(MemorySubstrate::new()))
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
