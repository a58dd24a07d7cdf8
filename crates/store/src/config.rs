//! Substrate configuration.

use serde::{Deserialize, Serialize};

/// Where the aggregation store keeps its data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubstrateConfig {
    /// Redis connection URL (e.g. `redis://localhost:6379`). When unset,
    /// counters live in process memory and vanish on restart.
    #[serde(default)]
    pub redis_url: Option<String>,
}
