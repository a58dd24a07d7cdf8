//! Retry policy for message handling.
//!
//! A plain value passed into the pipeline, not configuration metadata: max
//! attempts, exponential backoff bounds, which errors are never retried,
//! and where dead letters go.

use analytics_core::Error;
use kafka_transport::topics::{dead_letter_topic, DEAD_LETTER_SUFFIX};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Serializable retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total delivery attempts, first included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Suffix deriving the dead-letter topic from the original
    #[serde(default = "default_dead_letter_suffix")]
    pub dead_letter_suffix: String,
    /// Bound on waiting for dead-letter send confirmation
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_interval_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_interval_ms() -> u64 {
    10_000
}

fn default_dead_letter_suffix() -> String {
    DEAD_LETTER_SUFFIX.to_string()
}

fn default_send_timeout_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_interval_ms: default_initial_interval_ms(),
            multiplier: default_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            dead_letter_suffix: default_dead_letter_suffix(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl RetryConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

type NonRetryablePredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// The pipeline's retry behavior as a first-class value.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub dead_letter_suffix: String,
    non_retryable: NonRetryablePredicate,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            multiplier: config.multiplier,
            max_interval: Duration::from_millis(config.max_interval_ms),
            dead_letter_suffix: config.dead_letter_suffix.clone(),
            non_retryable: Arc::new(|e| !e.is_retryable()),
        }
    }

    /// Replaces the non-retryable predicate.
    pub fn with_non_retryable(
        mut self,
        predicate: impl Fn(&Error) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.non_retryable = Arc::new(predicate);
        self
    }

    /// Whether a failed attempt with this error may be retried.
    pub fn is_retryable(&self, error: &Error) -> bool {
        !(self.non_retryable)(error)
    }

    /// Backoff before the attempt after `attempt` (1-based) failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31) as i32;
        let ms = self.initial_interval.as_millis() as f64 * self.multiplier.powi(exp);
        let capped = ms.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Dead-letter destination for a message from `topic`/`partition`.
    /// The partition is preserved only when non-negative.
    pub fn dead_letter_destination(&self, topic: &str, partition: i32) -> (String, Option<i32>) {
        (
            dead_letter_topic(topic, &self.dead_letter_suffix),
            (partition >= 0).then_some(partition),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_interval", &self.initial_interval)
            .field("multiplier", &self.multiplier)
            .field("max_interval", &self.max_interval)
            .field("dead_letter_suffix", &self.dead_letter_suffix)
            .finish()
    }
}
