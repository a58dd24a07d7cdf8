//! Ingestion pipeline for the analytics system.
//!
//! A worker per partition pulls raw messages from the transport, decodes
//! them, applies the aggregation writes, and acknowledges. Failures run
//! through an explicit retry policy with exponential backoff and
//! dead-letter routing.

pub mod processor;
pub mod retry;
pub mod worker;

pub use processor::EventProcessor;
pub use retry::{RetryConfig, RetryPolicy};
pub use worker::{Outcome, PipelineWorker, RetryContext};
