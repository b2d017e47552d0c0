//! # Cinder Storage
//!
//! The key-value collaborator that holds opaque paste records.
//!
//! Values are strings the store never interprets; every entry may carry a
//! time-to-live after which it behaves as absent.
//!
//! ## Features
//!
//! - **KvStore trait**: `put`/`get`/`delete` plus the conditional operations
//!   the paste lifecycle relies on for at-most-once reads
//! - **InMemoryKvStore**: `DashMap`-backed store with atomic conditional ops
//! - **RedbKvStore**: persistent store on a single redb table
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use cinder_storage::{InMemoryKvStore, KvStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryKvStore::new();
//!     store.put("paste:Ab12Cd34", "{...}".into(), Some(Duration::from_secs(600))).await.unwrap();
//!
//!     // Only one caller can win the delete
//!     assert!(store.delete_if_exists("paste:Ab12Cd34").await.unwrap());
//!     assert!(!store.delete_if_exists("paste:Ab12Cd34").await.unwrap());
//! }
//! ```

pub mod error;
pub mod memory;
pub mod persistent;

// Re-exports
pub use error::StorageError;
pub use memory::InMemoryKvStore;
pub use persistent::{RedbKvConfig, RedbKvStore};

use std::time::Duration;

use async_trait::async_trait;
use cinder_core::UnixMillis;

/// Key-value store with per-entry TTL
///
/// A `ttl` of `None` means the entry never expires. Expired entries must be
/// indistinguishable from absent ones for every operation.
///
/// The conditional operations have default implementations built from
/// `get`/`put`/`delete`. Those defaults are not atomic; a backend that can
/// do better should override them. Both shipped backends do.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store a value, replacing any existing entry
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>)
    -> Result<(), StorageError>;

    /// Fetch a live value
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove a value; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Store a value only if no live entry exists under `key`
    ///
    /// Returns `true` if the value was stored.
    async fn put_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        if self.get(key).await?.is_some() {
            return Ok(false);
        }
        self.put(key, value, ttl).await?;
        Ok(true)
    }

    /// Remove a live entry, reporting whether this call removed it
    ///
    /// When several callers race on the same key, at most one sees `true`.
    async fn delete_if_exists(&self, key: &str) -> Result<bool, StorageError> {
        if self.get(key).await?.is_none() {
            return Ok(false);
        }
        self.delete(key).await?;
        Ok(true)
    }

    /// Overwrite a live entry, leaving missing keys untouched
    ///
    /// Returns `true` if the value was replaced.
    async fn replace_if_exists(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        if self.get(key).await?.is_none() {
            return Ok(false);
        }
        self.put(key, value, ttl).await?;
        Ok(true)
    }

    /// Increment a decimal counter, creating it at 1 with `ttl_if_new`
    ///
    /// Backends that track expiry keep an existing counter's original
    /// expiry, giving fixed windows. The default re-applies `ttl_if_new`.
    async fn increment(&self, key: &str, ttl_if_new: Option<Duration>) -> Result<u64, StorageError> {
        let next = match self.get(key).await? {
            Some(raw) => parse_counter(&raw)? + 1,
            None => 1,
        };
        self.put(key, next.to_string(), ttl_if_new).await?;
        Ok(next)
    }

    /// Drop every expired entry, returning how many were removed
    async fn purge_expired(&self) -> Result<usize, StorageError> {
        Ok(0)
    }
}

/// Absolute expiry for a TTL measured from `now`
pub(crate) fn expiry_from_ttl(now: UnixMillis, ttl: Option<Duration>) -> Option<UnixMillis> {
    ttl.map(|ttl| {
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now.saturating_add(millis)
    })
}

/// Whether an entry with the given expiry is dead at `now`
pub(crate) fn is_expired(expires_at: Option<UnixMillis>, now: UnixMillis) -> bool {
    matches!(expires_at, Some(at) if at <= now)
}

pub(crate) fn parse_counter(raw: &str) -> Result<u64, StorageError> {
    raw.parse::<u64>()
        .map_err(|e| StorageError::deserialization(format!("counter is not an integer: {}", e)))
}
