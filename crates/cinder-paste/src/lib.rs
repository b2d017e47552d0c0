//! # Cinder Paste
//!
//! The lifecycle of a stored paste: creation under a fresh id, lazy expiry,
//! an optional password gate, view counting and burn-after-read.
//!
//! The content handled here is always the client's encrypted envelope. This
//! crate never sees a content key or a plaintext.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cinder_paste::{ExpiryPreset, LifecycleConfig, NewPaste, PasteLifecycle};
//! use cinder_storage::InMemoryKvStore;
//!
//! let lifecycle = PasteLifecycle::new(Arc::new(InMemoryKvStore::new()), LifecycleConfig::default());
//! let created = lifecycle
//!     .create(NewPaste::new(content).expiry(ExpiryPreset::OneHour).burn_after_read(true))
//!     .await?;
//! let view = lifecycle.read(&created.id, None).await?;
//! ```

pub mod error;
pub mod expiry;
pub mod lifecycle;
pub mod rate_limit;
pub mod record;

pub use error::{PasteError, PasteResult};
pub use expiry::{Expiry, ExpiryPreset};
pub use lifecycle::{
    CreatedPaste, DEFAULT_MAX_CONTENT_BYTES, LifecycleConfig, NewPaste, PasteLifecycle, PasteView,
};
pub use rate_limit::{
    KvRateLimiter, RATE_LIMIT_KEY_PREFIX, RateDecision, RateLimitConfig, RateLimiter,
};
pub use record::{
    PASTE_KEY_PREFIX, PasteRecord, PasteState, VIEWS_KEY_PREFIX, storage_key, views_key,
};
