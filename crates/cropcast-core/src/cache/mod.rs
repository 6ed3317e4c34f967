//! In-memory TTL cache
//!
//! Entries older than the TTL are treated as absent and dropped when read.
//! There is no size bound and no LRU eviction. The store is not synchronized;
//! the fetcher keeps it behind a mutex.

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

/// A cached value with the time it was fetched
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Key the entry is stored under
    pub key: String,
    /// Cached value
    pub value: V,
    /// When the value was stored
    pub fetched_at: DateTime<Utc>,
}

/// Key → value store with lazy TTL expiry
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::max_value());
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    /// Fresh value for `key`, if any
    ///
    /// An entry is still fresh at exactly `fetched_at + ttl`.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => now - entry.fetched_at > self.ttl,
        };

        if expired {
            if let Some(entry) = self.entries.remove(key) {
                debug!(key = %entry.key, fetched_at = %entry.fetched_at, "Dropping expired entry");
            }
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` under `key`, stamped with the current time
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            fetched_at: self.clock.now(),
        };
        self.entries.insert(key, entry);
    }

    /// Drop an entry regardless of age
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Number of stored entries, including ones not yet found expired
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
