//! Persistent storage on redb
//!
//! All entries live in a single table keyed by the string key. Each value is
//! a postcard-encoded [`StoredEntry`] carrying the payload and its absolute
//! expiry. Conditional operations run inside one write transaction, and redb
//! serializes write transactions, so they are atomic.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cinder_core::{Clock, SystemClock, UnixMillis};
use redb::{Database, ReadableTable, ReadableTableMetadata, Table, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};

use crate::error::StorageError;
use crate::{KvStore, expiry_from_ttl, is_expired, parse_counter};

// Key: entry key, Value: postcard-encoded StoredEntry
const KV_ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("kv_entries");

type KvTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

/// Configuration for the redb store
#[derive(Debug, Clone)]
pub struct RedbKvConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl Default for RedbKvConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/cinder.redb"),
        }
    }
}

impl RedbKvConfig {
    /// Config for a database file at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    expires_at: Option<UnixMillis>,
}

impl StoredEntry {
    fn encode(&self) -> Result<Vec<u8>, StorageError> {
        postcard::to_allocvec(self).map_err(|e| StorageError::serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(postcard::from_bytes(bytes)?)
    }

    fn is_live(&self, now: UnixMillis) -> bool {
        !is_expired(self.expires_at, now)
    }
}

/// Read the live entry under `key` inside an open write transaction
fn live_entry(
    table: &KvTable<'_>,
    key: &str,
    now: UnixMillis,
) -> Result<Option<StoredEntry>, StorageError> {
    let raw = table
        .get(key)
        .map_err(StorageError::database)?
        .map(|guard| guard.value().to_vec());

    match raw {
        Some(bytes) => {
            let entry = StoredEntry::decode(&bytes)?;
            Ok(entry.is_live(now).then_some(entry))
        }
        None => Ok(None),
    }
}

/// Persistent KvStore backed by a redb database file
pub struct RedbKvStore {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    config: RedbKvConfig,
}

impl std::fmt::Debug for RedbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKvStore")
            .field("config", &self.config)
            .finish()
    }
}

impl RedbKvStore {
    /// Open or create the database, driven by the system clock
    pub fn open(config: RedbKvConfig) -> Result<Self, StorageError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open or create the database with a custom clock
    #[instrument(skip(config, clock), fields(path = %config.db_path.display()))]
    pub fn open_with_clock(
        config: RedbKvConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&config.db_path).map_err(StorageError::database)?;
        info!("Opened redb database");

        let store = Self {
            db: Arc::new(db),
            clock,
            config,
        };
        store.init_table()?;
        Ok(store)
    }

    fn init_table(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        write_txn
            .open_table(KV_ENTRIES)
            .map_err(StorageError::database)?;
        write_txn.commit().map_err(StorageError::database)?;

        debug!("Initialized kv_entries table");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbKvConfig {
        &self.config
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn raw_len(&self) -> Result<u64, StorageError> {
        let read_txn = self.db.begin_read().map_err(StorageError::database)?;
        let table = read_txn
            .open_table(KV_ENTRIES)
            .map_err(StorageError::database)?;
        table.len().map_err(StorageError::database)
    }

    /// Run `f` against the table inside one write transaction and commit
    fn with_write<T>(
        &self,
        f: impl FnOnce(&mut KvTable<'_>, UnixMillis) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let now = self.clock.now_millis();
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        let result = {
            let mut table = write_txn
                .open_table(KV_ENTRIES)
                .map_err(StorageError::database)?;
            f(&mut table, now)?
        };
        write_txn.commit().map_err(StorageError::database)?;
        Ok(result)
    }

    fn insert(
        table: &mut KvTable<'_>,
        key: &str,
        entry: &StoredEntry,
    ) -> Result<(), StorageError> {
        let bytes = entry.encode()?;
        table
            .insert(key, bytes.as_slice())
            .map_err(StorageError::database)?;
        Ok(())
    }

    fn remove(table: &mut KvTable<'_>, key: &str) -> Result<bool, StorageError> {
        let removed = table.remove(key).map_err(StorageError::database)?;
        Ok(removed.is_some())
    }
}

#[async_trait]
impl KvStore for RedbKvStore {
    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        trace!(key, "Storing entry");
        self.with_write(|table, now| {
            let entry = StoredEntry {
                value,
                expires_at: expiry_from_ttl(now, ttl),
            };
            Self::insert(table, key, &entry)
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = self.clock.now_millis();

        let raw = {
            let read_txn = self.db.begin_read().map_err(StorageError::database)?;
            let table = read_txn
                .open_table(KV_ENTRIES)
                .map_err(StorageError::database)?;
            let bytes = table
                .get(key)
                .map_err(StorageError::database)?
                .map(|guard| guard.value().to_vec());
            bytes
        };

        let Some(bytes) = raw else {
            return Ok(None);
        };

        let entry = StoredEntry::decode(&bytes)?;
        if entry.is_live(now) {
            return Ok(Some(entry.value));
        }

        // Expired: drop it unless it was rewritten in the meantime
        self.with_write(|table, now| {
            if live_entry(table, key, now)?.is_none() {
                Self::remove(table, key)?;
            }
            Ok(())
        })?;
        trace!(key, "Dropped expired entry on read");
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        trace!(key, "Deleting entry");
        self.with_write(|table, _| Self::remove(table, key).map(|_| ()))
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        self.with_write(|table, now| {
            if live_entry(table, key, now)?.is_some() {
                return Ok(false);
            }
            let entry = StoredEntry {
                value,
                expires_at: expiry_from_ttl(now, ttl),
            };
            Self::insert(table, key, &entry)?;
            Ok(true)
        })
    }

    async fn delete_if_exists(&self, key: &str) -> Result<bool, StorageError> {
        self.with_write(|table, now| {
            let was_live = live_entry(table, key, now)?.is_some();
            Self::remove(table, key)?;
            Ok(was_live)
        })
    }

    async fn replace_if_exists(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        self.with_write(|table, now| {
            if live_entry(table, key, now)?.is_none() {
                Self::remove(table, key)?;
                return Ok(false);
            }
            let entry = StoredEntry {
                value,
                expires_at: expiry_from_ttl(now, ttl),
            };
            Self::insert(table, key, &entry)?;
            Ok(true)
        })
    }

    async fn increment(&self, key: &str, ttl_if_new: Option<Duration>) -> Result<u64, StorageError> {
        self.with_write(|table, now| {
            let entry = match live_entry(table, key, now)? {
                Some(existing) => {
                    let next = parse_counter(&existing.value)? + 1;
                    StoredEntry {
                        value: next.to_string(),
                        expires_at: existing.expires_at,
                    }
                }
                None => StoredEntry {
                    value: "1".to_string(),
                    expires_at: expiry_from_ttl(now, ttl_if_new),
                },
            };
            let count = parse_counter(&entry.value)?;
            Self::insert(table, key, &entry)?;
            Ok(count)
        })
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        let removed = self.with_write(|table, now| {
            let mut dead = Vec::new();
            for item in table.iter().map_err(StorageError::database)? {
                let (key, value) = item.map_err(StorageError::database)?;
                let expired = match StoredEntry::decode(value.value()) {
                    Ok(entry) => !entry.is_live(now),
                    // Unreadable entries can never be served, so drop them too
                    Err(_) => true,
                };
                if expired {
                    dead.push(key.value().to_string());
                }
            }

            for key in &dead {
                Self::remove(table, key)?;
            }
            Ok(dead.len())
        })?;

        if removed > 0 {
            debug!(removed, "Purged expired entries");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::ManualClock;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> (RedbKvStore, ManualClock) {
        let clock = ManualClock::new(5_000_000);
        let config = RedbKvConfig::at(dir.path().join("kv.redb"));
        let store = RedbKvStore::open_with_clock(config, Arc::new(clock.clone())).unwrap();
        (store, clock)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let (store, _) = open_store(&dir);

        store.put("k", "v".into(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entry_removed_on_read() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = open_store(&dir);

        store
            .put("k", "v".into(), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(10));

        assert_eq!(store.raw_len().unwrap(), 1);
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.raw_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_conditional_ops() {
        let dir = TempDir::new().unwrap();
        let (store, _) = open_store(&dir);

        assert!(store.put_if_absent("k", "a".into(), None).await.unwrap());
        assert!(!store.put_if_absent("k", "b".into(), None).await.unwrap());

        assert!(store.replace_if_exists("k", "c".into(), None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("c"));
        assert!(!store.replace_if_exists("other", "x".into(), None).await.unwrap());

        assert!(store.delete_if_exists("k").await.unwrap());
        assert!(!store.delete_if_exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_keeps_window() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = open_store(&dir);
        let window = Some(Duration::from_secs(60));

        assert_eq!(store.increment("rl", window).await.unwrap(), 1);
        assert_eq!(store.increment("rl", window).await.unwrap(), 2);
        clock.advance(Duration::from_secs(60));
        assert_eq!(store.increment("rl", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = open_store(&dir);

        store
            .put("a", "1".into(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        store
            .put("b", "2".into(), Some(Duration::from_secs(100)))
            .await
            .unwrap();
        store.put("c", "3".into(), None).await.unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.raw_len().unwrap(), 2);
    }
}
