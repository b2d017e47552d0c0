//! In-memory storage implementation
//!
//! `DashMap`-backed store suitable for single-process deployments, tests
//! and simulation. Conditional operations run under the shard lock of the
//! key, which makes them atomic with respect to each other.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cinder_core::{Clock, SystemClock, UnixMillis};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, trace};

use crate::error::StorageError;
use crate::{KvStore, expiry_from_ttl, is_expired, parse_counter};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<UnixMillis>,
}

impl StoredValue {
    fn is_live(&self, now: UnixMillis) -> bool {
        !is_expired(self.expires_at, now)
    }
}

/// In-memory implementation of KvStore
///
/// Expiry is evaluated lazily against the injected [`Clock`]; call
/// [`KvStore::purge_expired`] periodically to reclaim memory.
pub struct InMemoryKvStore {
    entries: DashMap<String, StoredValue>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl InMemoryKvStore {
    /// Create a store driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store driven by a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of entries held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check for a raw entry regardless of expiry
    pub fn contains_raw(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn stored(&self, value: String, ttl: Option<Duration>) -> StoredValue {
        StoredValue {
            value,
            expires_at: expiry_from_ttl(self.clock.now_millis(), ttl),
        }
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        trace!(key, ttl_secs = ttl.map(|t| t.as_secs()), "Storing entry");
        let stored = self.stored(value, ttl);
        self.entries.insert(key.to_string(), stored);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = self.clock.now_millis();

        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        // The read guard is released; recheck so a concurrent rewrite survives
        self.entries.remove_if(key, |_, v| !v.is_live(now));
        trace!(key, "Dropped expired entry on read");
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        trace!(key, "Deleting entry");
        self.entries.remove(key);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        let now = self.clock.now_millis();
        let stored = self.stored(value, ttl);

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) if entry.get().is_live(now) => Ok(false),
            Entry::Occupied(mut entry) => {
                entry.insert(stored);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(stored);
                Ok(true)
            }
        }
    }

    async fn delete_if_exists(&self, key: &str) -> Result<bool, StorageError> {
        let now = self.clock.now_millis();
        match self.entries.remove(key) {
            Some((_, stored)) => Ok(stored.is_live(now)),
            None => Ok(false),
        }
    }

    async fn replace_if_exists(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        let now = self.clock.now_millis();

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) if entry.get().is_live(now) => {
                entry.insert(StoredValue {
                    value,
                    expires_at: expiry_from_ttl(now, ttl),
                });
                Ok(true)
            }
            Entry::Occupied(entry) => {
                entry.remove();
                Ok(false)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn increment(&self, key: &str, ttl_if_new: Option<Duration>) -> Result<u64, StorageError> {
        let now = self.clock.now_millis();

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) if entry.get().is_live(now) => {
                let next = parse_counter(&entry.get().value)? + 1;
                entry.get_mut().value = next.to_string();
                Ok(next)
            }
            Entry::Occupied(mut entry) => {
                entry.insert(StoredValue {
                    value: "1".to_string(),
                    expires_at: expiry_from_ttl(now, ttl_if_new),
                });
                Ok(1)
            }
            Entry::Vacant(entry) => {
                entry.insert(StoredValue {
                    value: "1".to_string(),
                    expires_at: expiry_from_ttl(now, ttl_if_new),
                });
                Ok(1)
            }
        }
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, v| v.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired entries");
        }
        Ok(removed)
    }
}
