//! In-memory substrate backend.
//!
//! Used by tests and by local runs with no Redis configured. TTLs are
//! enforced lazily: expired keys are dropped when next touched.

use analytics_core::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::substrate::Substrate;

#[derive(Debug)]
enum Value {
    Scored(HashMap<String, f64>),
    Set(HashSet<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn scored() -> Self {
        Self {
            value: Value::Scored(HashMap::new()),
            expires_at: None,
        }
    }

    fn set() -> Self {
        Self {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Substrate backed by process memory.
#[derive(Default)]
pub struct MemorySubstrate {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemorySubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `key` if its TTL has elapsed, then runs `f` on the map.
    fn with_live_entries<T>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
        let mut entries = self.entries.lock();
        let expired = entries
            .get(key)
            .is_some_and(|e| e.is_expired(Instant::now()));
        if expired {
            entries.remove(key);
        }
        f(&mut entries)
    }
}

#[async_trait]
impl Substrate for MemorySubstrate {
    async fn upsert_scored(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.with_live_entries(key, |entries| {
            let entry = entries.entry(key.to_string()).or_insert_with(Entry::scored);
            if let Value::Scored(members) = &mut entry.value {
                members.insert(member.to_string(), score);
            }
        });
        Ok(())
    }

    async fn count_scored_at_least(&self, key: &str, min_score: f64) -> Result<u64> {
        Ok(self.with_live_entries(key, |entries| match entries.get(key) {
            Some(Entry {
                value: Value::Scored(members),
                ..
            }) => members.values().filter(|&&s| s >= min_score).count() as u64,
            _ => 0,
        }))
    }

    async fn remove_scored_up_to(&self, key: &str, max_score: f64) -> Result<u64> {
        Ok(self.with_live_entries(key, |entries| match entries.get_mut(key) {
            Some(Entry {
                value: Value::Scored(members),
                ..
            }) => {
                let before = members.len();
                members.retain(|_, &mut s| s > max_score);
                (before - members.len()) as u64
            }
            _ => 0,
        }))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        self.with_live_entries(key, |entries| {
            let entry = entries.entry(key.to_string()).or_insert_with(Entry::set);
            if let Value::Set(members) = &mut entry.value {
                members.insert(member.to_string());
            }
        });
        Ok(())
    }

    async fn set_len(&self, key: &str) -> Result<u64> {
        Ok(self.with_live_entries(key, |entries| match entries.get(key) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => members.len() as u64,
            _ => 0,
        }))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.with_live_entries(key, |entries| {
            if let Some(entry) = entries.get_mut(key) {
                entry.expires_at = Some(Instant::now() + ttl);
            }
        });
        Ok(())
    }
}
