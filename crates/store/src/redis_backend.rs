//! Redis substrate backend.
//!
//! Sorted sets carry the windowed counters, plain sets carry session
//! membership, and per-key TTLs are the safety net against orphaned keys.
//! All Redis failures surface as `Error::Transient` so the pipeline's retry
//! policy governs them.

use analytics_core::{Error, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

use crate::substrate::Substrate;

/// Substrate backed by a Redis server.
#[derive(Clone)]
pub struct RedisSubstrate {
    conn: ConnectionManager,
}

impl RedisSubstrate {
    /// Connects to Redis at `url` (e.g. `redis://localhost:6379`).
    ///
    /// The connection manager reconnects on its own after transient drops.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::transient(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::transient(format!("failed to connect to redis: {e}")))?;

        info!(url = %url, "Connected to Redis substrate");
        Ok(Self { conn })
    }

    /// Round-trips a PING to verify the connection.
    pub async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }
}

fn transient(e: redis::RedisError) -> Error {
    Error::transient(format!("redis: {e}"))
}

#[async_trait]
impl Substrate for RedisSubstrate {
    async fn upsert_scored(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key, member, score).await.map_err(transient)?;
        Ok(())
    }

    async fn count_scored_at_least(&self, key: &str, min_score: f64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = conn
            .zcount(key, min_score, "+inf")
            .await
            .map_err(transient)?;
        Ok(count)
    }

    async fn remove_scored_up_to(&self, key: &str, max_score: f64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .zrembyscore(key, "-inf", max_score)
            .await
            .map_err(transient)?;
        Ok(removed)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(key, member).await.map_err(transient)?;
        Ok(())
    }

    async fn set_len(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.scard(key).await.map_err(transient)?;
        Ok(len)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: bool = conn
            .expire(key, ttl.as_secs() as i64)
            .await
            .map_err(transient)?;
        Ok(())
    }
}
