//! Paste lifecycle state machine
//!
//! `Active` pastes move to `Expired` when the clock passes their expiry
//! (checked lazily on access) and to `Consumed` on the first successful read
//! when burn-after-read is set. Expiry always wins over burning.
//!
//! The store is the only shared state. A record is written once with
//! `put_if_absent` and removed with `delete_if_exists`; its view count sits
//! under a separate key bumped with the store's atomic `increment`, so
//! concurrent reads never lose a view and an aborted request never leaves a
//! half-written record behind.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cinder_core::{Clock, DEFAULT_ID_LENGTH, PasteId, SystemClock, UnixMillis};
use cinder_crypto::{CryptoError, EncryptedPayload, PasswordHash};
use cinder_storage::KvStore;
use tracing::{debug, info, instrument, warn};

use crate::error::{PasteError, PasteResult};
use crate::expiry::Expiry;
use crate::record::{PasteRecord, PasteState, storage_key, views_key};

/// Default cap on the encoded content size (1 MB)
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 1_000_000;

/// Tuning for [`PasteLifecycle`]
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Length of generated paste ids
    pub id_length: usize,
    /// How many ids to try before giving up on a create
    pub max_id_attempts: u32,
    /// Extra store TTL past a paste's expiry, so an expired paste is still
    /// seen (and reported as expired) rather than silently missing
    pub expiry_grace: Duration,
    /// Largest accepted `content` string, in bytes
    pub max_content_bytes: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            id_length: DEFAULT_ID_LENGTH,
            max_id_attempts: 8,
            expiry_grace: Duration::from_secs(60),
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        }
    }
}

/// A paste to be created
#[derive(Clone, Default)]
pub struct NewPaste {
    /// `base64(nonce || ciphertext || tag)` produced by the client
    pub content: String,
    pub expiry: Expiry,
    pub burn_after_read: bool,
    /// Optional read gate; an empty string counts as no password
    pub password: Option<String>,
}

impl NewPaste {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn expiry(mut self, expiry: impl Into<Expiry>) -> Self {
        self.expiry = expiry.into();
        self
    }

    pub fn burn_after_read(mut self, burn: bool) -> Self {
        self.burn_after_read = burn;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    fn effective_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Debug for NewPaste {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewPaste")
            .field("content_len", &self.content.len())
            .field("expiry", &self.expiry)
            .field("burn_after_read", &self.burn_after_read)
            .field("has_password", &self.effective_password().is_some())
            .finish()
    }
}

/// Outcome of a successful create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPaste {
    pub id: PasteId,
    pub created_at: UnixMillis,
    pub expires_at: Option<UnixMillis>,
}

/// What a successful read hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteView {
    pub id: PasteId,
    pub content: String,
    pub burn_after_read: bool,
    pub created_at: UnixMillis,
    pub expires_at: Option<UnixMillis>,
    /// View count including this read
    pub views: u64,
    /// `Consumed` when this read burned the paste, otherwise `Active`
    pub state: PasteState,
}

/// Governs create, read and delete for pastes held in a [`KvStore`]
#[derive(Clone)]
pub struct PasteLifecycle {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
}

impl fmt::Debug for PasteLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasteLifecycle")
            .field("config", &self.config)
            .finish()
    }
}

impl PasteLifecycle {
    /// Create a lifecycle driven by the system clock
    pub fn new(store: Arc<dyn KvStore>, config: LifecycleConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Validate and store a new paste under a fresh id
    #[instrument(
        skip(self, paste),
        fields(size = paste.content.len(), burn = paste.burn_after_read)
    )]
    pub async fn create(&self, paste: NewPaste) -> PasteResult<CreatedPaste> {
        self.validate_content(&paste.content)?;

        let now = self.clock.now_millis();
        let expires_at = paste.expiry.resolve(now)?;

        let password_hash = match paste.effective_password() {
            Some(password) => Some(hash_password(password.to_string()).await?),
            None => None,
        };

        let ttl = self.store_ttl(expires_at, now);
        let mut record = PasteRecord {
            id: PasteId::generate(self.config.id_length),
            content: paste.content,
            created_at: now,
            expires_at,
            burn_after_read: paste.burn_after_read,
            password_hash,
        };

        for attempt in 1..=self.config.max_id_attempts {
            let key = storage_key(&record.id);
            if self.store.put_if_absent(&key, record.to_json()?, ttl).await? {
                info!(
                    paste_id = %record.id,
                    expires_at = ?record.expires_at,
                    has_password = record.requires_password(),
                    "Created paste"
                );
                return Ok(CreatedPaste {
                    id: record.id,
                    created_at: now,
                    expires_at,
                });
            }

            debug!(attempt, "Paste id collision, drawing another");
            record.id = PasteId::generate(self.config.id_length);
        }

        warn!(attempts = self.config.max_id_attempts, "Could not allocate a paste id");
        Err(PasteError::IdSpaceExhausted(self.config.max_id_attempts))
    }

    /// Read a paste, enforcing expiry, the password gate and burn-after-read
    ///
    /// Checks run in a fixed order: missing record, expiry (which also
    /// deletes the record), password, then the view increment and the burn.
    /// Of several concurrent reads of a burn-after-read paste, at most one
    /// returns the content; the others see `NotFound`.
    #[instrument(skip(self, password), fields(paste_id = %id))]
    pub async fn read(&self, id: &PasteId, password: Option<&str>) -> PasteResult<PasteView> {
        let key = storage_key(id);

        let Some(raw) = self.store.get(&key).await? else {
            return Err(PasteError::NotFound);
        };
        let record = PasteRecord::from_json(&raw)?;

        let now = self.clock.now_millis();
        if record.is_expired(now) {
            self.store.delete(&key).await?;
            self.store.delete(&views_key(id)).await?;
            info!(state = %PasteState::Expired, "Paste expired on access");
            return Err(PasteError::Expired);
        }

        let supplied = password.filter(|p| !p.is_empty());
        if record.requires_password() && !verify_password(&record, supplied).await? {
            debug!("Password missing or wrong");
            return Err(PasteError::PasswordRequired);
        }

        let counter = views_key(id);
        let (views, state) = if record.burn_after_read {
            if !self.store.delete_if_exists(&key).await? {
                debug!("Lost burn race");
                return Err(PasteError::NotFound);
            }
            self.store.delete(&counter).await?;
            info!(state = %PasteState::Consumed, "Paste burned after read");
            (1, PasteState::Consumed)
        } else {
            let ttl = self.store_ttl(record.expires_at, now);
            let views = self.store.increment(&counter, ttl).await?;

            // A delete or sweep may have landed since the record was loaded
            if self.store.get(&key).await?.is_none() {
                self.store.delete(&counter).await?;
                debug!("Paste removed during read");
                return Err(PasteError::NotFound);
            }
            debug!(views, "Paste read");
            (views, PasteState::Active)
        };

        Ok(PasteView {
            id: record.id,
            content: record.content,
            burn_after_read: record.burn_after_read,
            created_at: record.created_at,
            expires_at: record.expires_at,
            views,
            state,
        })
    }

    /// Delete a paste, returning whether one was removed
    ///
    /// Deleting a missing paste is not an error.
    #[instrument(skip(self), fields(paste_id = %id))]
    pub async fn delete(&self, id: &PasteId) -> PasteResult<bool> {
        let removed = self.store.delete_if_exists(&storage_key(id)).await?;
        self.store.delete(&views_key(id)).await?;
        if removed {
            info!(state = %PasteState::Deleted, "Paste deleted");
        }
        Ok(removed)
    }

    /// Remove expired entries from the store
    pub async fn sweep(&self) -> PasteResult<usize> {
        Ok(self.store.purge_expired().await?)
    }

    fn validate_content(&self, content: &str) -> PasteResult<()> {
        if content.trim().is_empty() {
            return Err(PasteError::InvalidRequest("content is required".into()));
        }

        if content.len() > self.config.max_content_bytes {
            return Err(PasteError::PayloadTooLarge {
                size: content.len(),
                max: self.config.max_content_bytes,
            });
        }

        EncryptedPayload::from_base64(content).map_err(|_| {
            PasteError::InvalidRequest("content must be base64(nonce || ciphertext)".into())
        })?;
        Ok(())
    }

    /// Store TTL for a record: its remaining life plus the grace margin
    fn store_ttl(&self, expires_at: Option<UnixMillis>, now: UnixMillis) -> Option<Duration> {
        expires_at.map(|at| {
            let remaining = u64::try_from(at.saturating_sub(now)).unwrap_or(0);
            Duration::from_millis(remaining).saturating_add(self.config.expiry_grace)
        })
    }
}

/// Argon2 is CPU-bound, so it runs on the blocking pool
async fn hash_password(password: String) -> PasteResult<PasswordHash> {
    let hash = tokio::task::spawn_blocking(move || PasswordHash::derive(&password))
        .await
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))??;
    Ok(hash)
}

async fn verify_password(record: &PasteRecord, supplied: Option<&str>) -> PasteResult<bool> {
    let (Some(hash), Some(candidate)) = (record.password_hash.clone(), supplied) else {
        return Ok(record.password_satisfied(supplied));
    };
    let candidate = candidate.to_string();

    let ok = tokio::task::spawn_blocking(move || hash.verify(&candidate))
        .await
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::ManualClock;
    use cinder_crypto::{CipherEngine, SymmetricKey};
    use cinder_storage::{InMemoryKvStore, StorageError};

    fn sealed() -> String {
        CipherEngine::seal("hello", &SymmetricKey::generate()).unwrap()
    }

    fn lifecycle() -> (PasteLifecycle, Arc<InMemoryKvStore>, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let store = Arc::new(InMemoryKvStore::with_clock(Arc::new(clock.clone())));
        let lifecycle = PasteLifecycle::with_clock(
            store.clone(),
            Arc::new(clock.clone()),
            LifecycleConfig::default(),
        );
        (lifecycle, store, clock)
    }

    #[tokio::test]
    async fn test_create_stores_record_under_prefixed_key() {
        let (lifecycle, store, _) = lifecycle();
        let created = lifecycle.create(NewPaste::new(sealed())).await.unwrap();

        assert_eq!(created.id.as_str().len(), DEFAULT_ID_LENGTH);
        assert_eq!(created.expires_at, None);
        assert!(store.contains_raw(&format!("paste:{}", created.id)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_content() {
        let (lifecycle, _, _) = lifecycle();

        let blank = lifecycle.create(NewPaste::new("   ")).await;
        assert!(matches!(blank, Err(PasteError::InvalidRequest(_))));

        let not_base64 = lifecycle.create(NewPaste::new("not base64!")).await;
        assert!(matches!(not_base64, Err(PasteError::InvalidRequest(_))));

        // Valid base64 but shorter than nonce + tag
        let short = lifecycle.create(NewPaste::new("AAAA")).await;
        assert!(matches!(short, Err(PasteError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_oversized_content() {
        let (lifecycle, _, _) = lifecycle();
        let huge = "A".repeat(DEFAULT_MAX_CONTENT_BYTES + 4);
        let result = lifecycle.create(NewPaste::new(huge)).await;
        assert!(matches!(result, Err(PasteError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_create_rejects_past_expiry() {
        let (lifecycle, _, clock) = lifecycle();
        let paste = NewPaste::new(sealed()).expiry(Expiry::At(clock.now_millis() - 1));
        assert!(matches!(
            lifecycle.create(paste).await,
            Err(PasteError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_read_counts_views() {
        let (lifecycle, _, _) = lifecycle();
        let created = lifecycle.create(NewPaste::new(sealed())).await.unwrap();

        let first = lifecycle.read(&created.id, None).await.unwrap();
        let second = lifecycle.read(&created.id, None).await.unwrap();
        assert_eq!(first.views, 1);
        assert_eq!(second.views, 2);
        assert_eq!(second.state, PasteState::Active);
    }

    #[tokio::test]
    async fn test_view_counter_shares_record_ttl() {
        let (lifecycle, store, clock) = lifecycle();
        let paste = NewPaste::new(sealed()).expiry(Expiry::After(Duration::from_secs(600)));
        let created = lifecycle.create(paste).await.unwrap();

        lifecycle.read(&created.id, None).await.unwrap();
        assert_eq!(
            store.get(&views_key(&created.id)).await.unwrap().as_deref(),
            Some("1")
        );

        // Record and counter both outlive the expiry by the grace period only
        clock.advance(Duration::from_secs(661));
        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_drops_view_counter() {
        let (lifecycle, store, _) = lifecycle();
        let created = lifecycle.create(NewPaste::new(sealed())).await.unwrap();
        lifecycle.read(&created.id, None).await.unwrap();
        assert!(store.contains_raw(&views_key(&created.id)));

        assert!(lifecycle.delete(&created.id).await.unwrap());
        assert!(store.is_empty());
    }

    /// Deletes the paste record right before the view counter is bumped,
    /// as a DELETE landing mid-read would
    struct DeleteDuringRead {
        inner: Arc<InMemoryKvStore>,
    }

    #[async_trait::async_trait]
    impl KvStore for DeleteDuringRead {
        async fn put(
            &self,
            key: &str,
            value: String,
            ttl: Option<Duration>,
        ) -> Result<(), StorageError> {
            self.inner.put(key, value, ttl).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }

        async fn increment(
            &self,
            key: &str,
            ttl_if_new: Option<Duration>,
        ) -> Result<u64, StorageError> {
            let id = key.trim_start_matches(crate::record::VIEWS_KEY_PREFIX);
            self.inner.delete(&format!("paste:{}", id)).await?;
            self.inner.increment(key, ttl_if_new).await
        }
    }

    #[tokio::test]
    async fn test_read_racing_delete_leaves_no_counter() {
        let inner = Arc::new(InMemoryKvStore::new());
        let lifecycle = PasteLifecycle::new(
            Arc::new(DeleteDuringRead {
                inner: inner.clone(),
            }),
            LifecycleConfig::default(),
        );
        let created = lifecycle.create(NewPaste::new(sealed())).await.unwrap();

        assert!(matches!(
            lifecycle.read(&created.id, None).await,
            Err(PasteError::NotFound)
        ));
        assert!(inner.is_empty());
    }

    #[tokio::test]
    async fn test_expired_burn_paste_reports_expired() {
        let (lifecycle, store, clock) = lifecycle();
        let paste = NewPaste::new(sealed())
            .expiry(Expiry::After(Duration::from_secs(60)))
            .burn_after_read(true);
        let created = lifecycle.create(paste).await.unwrap();

        clock.advance(Duration::from_secs(61));
        assert!(matches!(
            lifecycle.read(&created.id, None).await,
            Err(PasteError::Expired)
        ));
        assert!(!store.contains_raw(&format!("paste:{}", created.id)));
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (lifecycle, _, _) = lifecycle();
        let id = PasteId::parse("Zz99Zz99").unwrap();
        assert!(matches!(
            lifecycle.read(&id, None).await,
            Err(PasteError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_empty_password_means_none() {
        let (lifecycle, _, _) = lifecycle();
        let created = lifecycle
            .create(NewPaste::new(sealed()).password(""))
            .await
            .unwrap();
        assert!(lifecycle.read(&created.id, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (lifecycle, _, _) = lifecycle();
        let created = lifecycle.create(NewPaste::new(sealed())).await.unwrap();

        assert!(lifecycle.delete(&created.id).await.unwrap());
        assert!(!lifecycle.delete(&created.id).await.unwrap());
        assert!(matches!(
            lifecycle.read(&created.id, None).await,
            Err(PasteError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let (lifecycle, store, _) = lifecycle();
        store
            .put("paste:Bad0Bad0", "{oops".into(), None)
            .await
            .unwrap();
        let id = PasteId::parse("Bad0Bad0").unwrap();
        assert!(matches!(
            lifecycle.read(&id, None).await,
            Err(PasteError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_new_paste_debug_hides_secrets() {
        let paste = NewPaste::new("c2VjcmV0").password("hunter2");
        let debug = format!("{:?}", paste);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("c2VjcmV0"));
        assert!(debug.contains("has_password: true"));
    }

    #[test]
    fn test_store_ttl_adds_grace() {
        let (lifecycle, _, _) = lifecycle();
        assert_eq!(lifecycle.store_ttl(None, 0), None);
        assert_eq!(
            lifecycle.store_ttl(Some(600_000), 0),
            Some(Duration::from_secs(660))
        );
    }
}
