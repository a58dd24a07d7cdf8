//! Internal telemetry for the analytics pipeline.
//!
//! Counters and histograms are plain process-local atomics; snapshots are
//! logged periodically rather than exported to an external metrics system.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
