//! End-to-end lifecycle scenarios against real stores and a manual clock

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use cinder_core::ManualClock;
use cinder_crypto::{CipherEngine, CryptoError, EncryptedPayload, SymmetricKey};
use cinder_paste::{
    Expiry, ExpiryPreset, LifecycleConfig, NewPaste, PasteError, PasteLifecycle, PasteState,
    storage_key, views_key,
};
use cinder_storage::{InMemoryKvStore, KvStore, RedbKvConfig, RedbKvStore};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

struct Harness {
    lifecycle: PasteLifecycle,
    store: Arc<dyn KvStore>,
    clock: ManualClock,
}

fn memory_harness() -> Harness {
    cinder_logging::init_testing();
    let clock = ManualClock::new(1_700_000_000_000);
    let store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::with_clock(Arc::new(clock.clone())));
    let lifecycle = PasteLifecycle::with_clock(
        store.clone(),
        Arc::new(clock.clone()),
        LifecycleConfig::default(),
    );
    Harness {
        lifecycle,
        store,
        clock,
    }
}

#[tokio::test]
async fn test_ttl_paste_expires_and_is_removed() {
    let h = memory_harness();
    let key = SymmetricKey::generate();
    let content = CipherEngine::seal("short-lived", &key).unwrap();

    let created = h
        .lifecycle
        .create(NewPaste::new(content).expiry(Expiry::After(Duration::from_secs(600))))
        .await
        .unwrap();

    let view = h.lifecycle.read(&created.id, None).await.unwrap();
    assert_eq!(CipherEngine::open(&view.content, &key).unwrap(), "short-lived");

    h.clock.advance(Duration::from_secs(601));
    assert!(matches!(
        h.lifecycle.read(&created.id, None).await,
        Err(PasteError::Expired)
    ));
    assert!(h.store.get(&storage_key(&created.id)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_burn_after_read_second_read_not_found() {
    let h = memory_harness();
    let content = CipherEngine::seal("once", &SymmetricKey::generate()).unwrap();

    let created = h
        .lifecycle
        .create(NewPaste::new(content.clone()).burn_after_read(true))
        .await
        .unwrap();

    let first = h.lifecycle.read(&created.id, None).await.unwrap();
    assert_eq!(first.content, content);
    assert_eq!(first.state, PasteState::Consumed);
    assert_eq!(first.views, 1);

    assert!(matches!(
        h.lifecycle.read(&created.id, None).await,
        Err(PasteError::NotFound)
    ));
}

#[tokio::test]
async fn test_password_gate() {
    let h = memory_harness();
    let content = CipherEngine::seal("gated", &SymmetricKey::generate()).unwrap();

    let created = h
        .lifecycle
        .create(NewPaste::new(content).password("abc123"))
        .await
        .unwrap();

    assert!(matches!(
        h.lifecycle.read(&created.id, None).await,
        Err(PasteError::PasswordRequired)
    ));
    assert!(matches!(
        h.lifecycle.read(&created.id, Some("wrong")).await,
        Err(PasteError::PasswordRequired)
    ));
    assert_ok!(h.lifecycle.read(&created.id, Some("abc123")).await);
}

#[tokio::test]
async fn test_expired_paste_with_password_reports_expired() {
    let h = memory_harness();
    let content = CipherEngine::seal("gated and short-lived", &SymmetricKey::generate()).unwrap();

    let created = h
        .lifecycle
        .create(
            NewPaste::new(content)
                .password("abc123")
                .expiry(Expiry::After(Duration::from_secs(600))),
        )
        .await
        .unwrap();
    assert_ok!(h.lifecycle.read(&created.id, Some("abc123")).await);

    // Expiry is checked before the password, so a wrong guess learns nothing
    h.clock.advance(Duration::from_secs(601));
    assert!(matches!(
        h.lifecycle.read(&created.id, Some("wrong")).await,
        Err(PasteError::Expired)
    ));
    assert!(h.store.get(&storage_key(&created.id)).await.unwrap().is_none());
    assert!(h.store.get(&views_key(&created.id)).await.unwrap().is_none());

    assert!(matches!(
        h.lifecycle.read(&created.id, Some("abc123")).await,
        Err(PasteError::NotFound)
    ));
}

#[tokio::test]
async fn test_failed_password_does_not_count_or_burn() {
    let h = memory_harness();
    let content = CipherEngine::seal("gated", &SymmetricKey::generate()).unwrap();

    let created = h
        .lifecycle
        .create(
            NewPaste::new(content)
                .password("abc123")
                .burn_after_read(true),
        )
        .await
        .unwrap();

    for _ in 0..3 {
        assert_err!(h.lifecycle.read(&created.id, Some("nope")).await);
    }
    let view = assert_ok!(h.lifecycle.read(&created.id, Some("abc123")).await);
    assert_eq!(view.views, 1);
    assert_eq!(view.state, PasteState::Consumed);
}

#[tokio::test]
async fn test_stored_record_holds_no_plaintext_or_key() {
    let h = memory_harness();
    let key = SymmetricKey::generate();
    let content = CipherEngine::seal("top secret words", &key).unwrap();

    let created = h
        .lifecycle
        .create(NewPaste::new(content).password("abc123"))
        .await
        .unwrap();

    let raw = h
        .store
        .get(&storage_key(&created.id))
        .await
        .unwrap()
        .unwrap();
    assert!(!raw.contains("top secret words"));
    assert!(!raw.contains(&key.export()));
    assert!(!raw.contains(&key.to_url_fragment()));
    assert!(!raw.contains("abc123"));
    assert!(raw.contains("$argon2id$"));
}

#[tokio::test]
async fn test_tampered_stored_content_fails_to_decrypt() {
    let h = memory_harness();
    let key = SymmetricKey::generate();
    let content = CipherEngine::seal("integrity", &key).unwrap();
    let created = h.lifecycle.create(NewPaste::new(content)).await.unwrap();

    let view = h.lifecycle.read(&created.id, None).await.unwrap();
    let mut payload = EncryptedPayload::from_base64(&view.content).unwrap();
    let last = payload.ciphertext.len() - 1;
    payload.ciphertext[last] ^= 0x55;

    assert_eq!(
        CipherEngine::decrypt(&payload, &key),
        Err(CryptoError::Decryption)
    );
}

#[tokio::test]
async fn test_preset_expiry() {
    let h = memory_harness();
    let content = CipherEngine::seal("hour", &SymmetricKey::generate()).unwrap();
    let created = h
        .lifecycle
        .create(NewPaste::new(content).expiry(ExpiryPreset::OneHour))
        .await
        .unwrap();

    assert_eq!(
        created.expires_at,
        Some(created.created_at + 3_600_000)
    );

    h.clock.advance(Duration::from_secs(3_600));
    assert!(h.lifecycle.read(&created.id, None).await.is_ok());
    h.clock.advance(Duration::from_secs(1));
    assert!(matches!(
        h.lifecycle.read(&created.id, None).await,
        Err(PasteError::Expired)
    ));
}

#[tokio::test]
async fn test_sweep_reclaims_unread_expired_pastes() {
    let h = memory_harness();
    let content = CipherEngine::seal("forgotten", &SymmetricKey::generate()).unwrap();
    let created = h
        .lifecycle
        .create(NewPaste::new(content).expiry(ExpiryPreset::TenMinutes))
        .await
        .unwrap();

    // Past expiry plus the grace margin
    h.clock.advance(Duration::from_secs(600 + 61));
    assert_eq!(h.lifecycle.sweep().await.unwrap(), 1);
    assert!(matches!(
        h.lifecycle.read(&created.id, None).await,
        Err(PasteError::NotFound)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_burn_reads_at_most_one_succeeds() {
    let h = memory_harness();
    let content = CipherEngine::seal("race", &SymmetricKey::generate()).unwrap();
    let created = h
        .lifecycle
        .create(NewPaste::new(content).burn_after_read(true))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let lifecycle = h.lifecycle.clone();
        let id = created.id.clone();
        handles.push(tokio::spawn(async move { lifecycle.read(&id, None).await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert!(matches!(err, PasteError::NotFound)),
        }
    }
    assert_eq!(successes, 1);
}

async fn assert_concurrent_reads_all_counted(
    lifecycle: &PasteLifecycle,
    password: Option<&str>,
    readers: u64,
) {
    let content = CipherEngine::seal("popular", &SymmetricKey::generate()).unwrap();
    let mut paste = NewPaste::new(content);
    if let Some(password) = password {
        paste = paste.password(password);
    }
    let created = lifecycle.create(paste).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..readers {
        let lifecycle = lifecycle.clone();
        let id = created.id.clone();
        let password = password.map(str::to_string);
        handles.push(tokio::spawn(async move {
            lifecycle.read(&id, password.as_deref()).await
        }));
    }

    let mut seen = BTreeSet::new();
    for handle in handles {
        let view = assert_ok!(handle.await.unwrap());
        assert_eq!(view.state, PasteState::Active);
        seen.insert(view.views);
    }
    // Every reader got its own count, none was lost
    assert_eq!(seen, (1..=readers).collect::<BTreeSet<_>>());

    let last = lifecycle.read(&created.id, password).await.unwrap();
    assert_eq!(last.views, readers + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_password_reads_count_every_view() {
    let h = memory_harness();
    assert_concurrent_reads_all_counted(&h.lifecycle, Some("pw"), 16).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_count_every_view() {
    let h = memory_harness();
    assert_concurrent_reads_all_counted(&h.lifecycle, None, 64).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_count_every_view_on_redb() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn KvStore> =
        Arc::new(RedbKvStore::open(RedbKvConfig::at(dir.path().join("views.redb"))).unwrap());
    let lifecycle = PasteLifecycle::new(store, LifecycleConfig::default());

    assert_concurrent_reads_all_counted(&lifecycle, None, 32).await;
}

#[tokio::test]
async fn test_lifecycle_on_redb_store() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(1_700_000_000_000);
    let store: Arc<dyn KvStore> = Arc::new(
        RedbKvStore::open_with_clock(
            RedbKvConfig::at(dir.path().join("pastes.redb")),
            Arc::new(clock.clone()),
        )
        .unwrap(),
    );
    let lifecycle =
        PasteLifecycle::with_clock(store, Arc::new(clock.clone()), LifecycleConfig::default());

    let content = CipherEngine::seal("durable", &SymmetricKey::generate()).unwrap();
    let created = lifecycle
        .create(
            NewPaste::new(content)
                .expiry(ExpiryPreset::TenMinutes)
                .burn_after_read(true),
        )
        .await
        .unwrap();

    assert!(lifecycle.read(&created.id, None).await.is_ok());
    assert!(matches!(
        lifecycle.read(&created.id, None).await,
        Err(PasteError::NotFound)
    ));
}
