//! Windowed aggregate counters.
//!
//! Sliding windows are approximated with score-range queries instead of
//! exact rolling counters: every write carries an epoch-millisecond score,
//! reads filter by score range, and writes opportunistically trim entries
//! that fell out of the window. Per-key TTLs are a second line of defense
//! against keys orphaned by users who stop sending events.

use analytics_core::{Error, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use crate::substrate::SharedSubstrate;

/// Window over which a user counts as active.
pub const ACTIVE_USER_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Extra slack kept when trimming the active-user set on write.
const ACTIVE_USER_PURGE_MARGIN: Duration = Duration::from_secs(1);

/// Window over which page views are counted.
pub const PAGE_VIEW_WINDOW: Duration = Duration::from_secs(15 * 60);

/// TTL of a page's whole sorted set, refreshed on every write.
pub const PAGE_VIEW_KEY_TTL: Duration = Duration::from_secs(20 * 60);

/// TTL of a user's session set, refreshed on every write.
pub const SESSION_TTL: Duration = Duration::from_secs(5 * 60);

const ACTIVE_USERS_KEY: &str = "active_users";

/// Hex characters of the URL digest kept in a page key.
const PAGE_KEY_DIGEST_LEN: usize = 20;

/// Sliding-window aggregation store.
///
/// Owns all windowed structures; no other component writes to the
/// substrate directly.
#[derive(Clone)]
pub struct AggregateStore {
    substrate: SharedSubstrate,
}

impl AggregateStore {
    pub fn new(substrate: SharedSubstrate) -> Self {
        Self { substrate }
    }

    /// Bounded-length key for a page, independent of URL length.
    fn page_key(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        let hex: String = digest
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        format!("pv:{}", &hex[..PAGE_KEY_DIGEST_LEN])
    }

    fn session_key(user_id: &str) -> String {
        format!("sessions:{user_id}")
    }

    /// Records the user as active at `ts` and trims entries that fell out
    /// of the window.
    pub async fn mark_active_user(&self, user_id: Uuid, ts: DateTime<Utc>) -> Result<()> {
        if user_id.is_nil() {
            return Err(Error::invalid_argument("user id must not be nil"));
        }

        let score_ms = ts.timestamp_millis();
        self.substrate
            .upsert_scored(ACTIVE_USERS_KEY, &user_id.to_string(), score_ms as f64)
            .await?;

        let cutoff_ms = score_ms
            - ACTIVE_USER_WINDOW.as_millis() as i64
            - ACTIVE_USER_PURGE_MARGIN.as_millis() as i64;
        if cutoff_ms > 0 {
            self.substrate
                .remove_scored_up_to(ACTIVE_USERS_KEY, cutoff_ms as f64)
                .await?;
        }
        Ok(())
    }

    /// Number of users active within the 5-minute window ending at `now_ms`.
    pub async fn count_active_users(&self, now_ms: i64) -> Result<u64> {
        if now_ms < 0 {
            return Ok(0);
        }
        let min_score = now_ms - ACTIVE_USER_WINDOW.as_millis() as i64;
        self.substrate
            .count_scored_at_least(ACTIVE_USERS_KEY, min_score as f64)
            .await
    }

    /// Appends one view of `url` at `ts` and refreshes the key's TTL.
    ///
    /// Each view is a distinct nonce-keyed entry, so replays count again by
    /// design. An empty URL is the caller's bug, not a bucket of its own.
    pub async fn record_page_view(&self, url: &str, ts: DateTime<Utc>) -> Result<()> {
        if url.is_empty() {
            return Err(Error::invalid_argument("page url must not be empty"));
        }

        let key = Self::page_key(url);
        let nonce = Uuid::new_v4().to_string();
        self.substrate
            .upsert_scored(&key, &nonce, ts.timestamp_millis() as f64)
            .await?;
        self.substrate.expire(&key, PAGE_VIEW_KEY_TTL).await?;
        Ok(())
    }

    /// Views of `url` within the 15-minute window ending at `now_ms`.
    pub async fn count_page_views(&self, url: &str, now_ms: i64) -> Result<u64> {
        if url.is_empty() || now_ms < 0 {
            return Ok(0);
        }
        let min_score = now_ms - PAGE_VIEW_WINDOW.as_millis() as i64;
        self.substrate
            .count_scored_at_least(&Self::page_key(url), min_score as f64)
            .await
    }

    /// Adds `session_id` to the user's session set and refreshes its TTL.
    pub async fn add_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        if user_id.is_empty() || session_id.is_empty() {
            return Err(Error::invalid_argument(
                "user id and session id must not be empty",
            ));
        }

        let key = Self::session_key(user_id);
        self.substrate.set_add(&key, session_id).await?;
        self.substrate.expire(&key, SESSION_TTL).await?;
        Ok(())
    }

    /// Distinct sessions currently tracked for the user.
    pub async fn count_sessions(&self, user_id: &str) -> Result<u64> {
        if user_id.is_empty() {
            return Ok(0);
        }
        self.substrate.set_len(&Self::session_key(user_id)).await
    }
}
