//! Deterministic session-id derivation.
//!
//! Used when a producer omits the session id. Equal (user, page) inputs
//! within the same time bucket always derive the same id, so replays and
//! bursty producers land in one session instead of fanning out.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Width of the session time bucket, in seconds. Events from the same user
/// on the same page within one bucket share a derived session id.
pub const SESSION_BUCKET_SECS: i64 = 60;

/// Hex characters of the digest kept in the derived id.
const DIGEST_PREFIX_LEN: usize = 12;

/// Marker substituted for an absent page url in the digest input.
const NO_PAGE_MARKER: &str = "-";

pub struct SessionIdGenerator;

impl SessionIdGenerator {
    /// Derives a session id from user id, page url, and a coarse time bucket.
    ///
    /// Always returns an id: if the digest path cannot produce one, the
    /// fallback of `"<userId>-<epoch_millis>"` is used instead.
    pub fn generate(user_id: Uuid, page_url: Option<&str>, timestamp: DateTime<Utc>) -> String {
        match Self::digest_session(user_id, page_url, timestamp) {
            Some(id) => id,
            None => Self::fallback_session_id(user_id, timestamp),
        }
    }

    /// Primary path: SHA-256 over `"<userId>|<page>|<bucket>"`, truncated.
    ///
    /// Returns `None` when the digest cannot supply `DIGEST_PREFIX_LEN` hex
    /// characters.
    pub fn digest_session(
        user_id: Uuid,
        page_url: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Option<String> {
        let bucket = timestamp.timestamp().div_euclid(SESSION_BUCKET_SECS);
        let page = match page_url {
            Some(p) if !p.is_empty() => p,
            _ => NO_PAGE_MARKER,
        };

        let mut hasher = Sha256::new();
        hasher.update(user_id.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(page.as_bytes());
        hasher.update(b"|");
        hasher.update(bucket.to_string().as_bytes());

        let hex = hex_encode(&hasher.finalize());
        let prefix = hex.get(..DIGEST_PREFIX_LEN)?;
        Some(format!("{user_id}-{prefix}"))
    }

    /// Fallback path when the digest is unavailable.
    pub fn fallback_session_id(user_id: Uuid, timestamp: DateTime<Utc>) -> String {
        format!("{user_id}-{}", timestamp.timestamp_millis())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
