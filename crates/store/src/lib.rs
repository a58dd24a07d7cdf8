//! Sliding-window aggregation store for the analytics pipeline.
//!
//! The windowed counters live on top of a small `Substrate` trait (sorted
//! sets, plain sets, per-key TTL) so the backing store is swappable: Redis
//! in production, an in-memory implementation for tests and local runs.

pub mod aggregates;
pub mod config;
pub mod memory;
pub mod redis_backend;
pub mod substrate;

pub use aggregates::AggregateStore;
pub use config::SubstrateConfig;
pub use memory::MemorySubstrate;
pub use redis_backend::RedisSubstrate;
pub use substrate::{SharedSubstrate, Substrate};
