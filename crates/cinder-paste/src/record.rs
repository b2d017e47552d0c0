//! The server-side paste record and its visibility states
//!
//! A record holds only the opaque encrypted envelope. The content key never
//! reaches this layer, and the password is kept as an Argon2id hash.

use std::fmt;
use std::time::Duration;

use cinder_core::{PasteId, UnixMillis};
use cinder_crypto::PasswordHash;
use serde::{Deserialize, Serialize};

use crate::error::{PasteError, PasteResult};

/// Prefix of every paste key in the store
pub const PASTE_KEY_PREFIX: &str = "paste:";

/// Prefix of the per-paste view counters
pub const VIEWS_KEY_PREFIX: &str = "views:";

/// Store key for a paste id
pub fn storage_key(id: &PasteId) -> String {
    format!("{}{}", PASTE_KEY_PREFIX, id)
}

/// Store key of the view counter kept beside a paste
pub fn views_key(id: &PasteId) -> String {
    format!("{}{}", VIEWS_KEY_PREFIX, id)
}

/// A stored paste
///
/// Written once on create and never rewritten. Views live under
/// [`views_key`] so that concurrent reads can bump them atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteRecord {
    pub id: PasteId,
    /// `base64(nonce || ciphertext || tag)`, never interpreted here
    pub content: String,
    pub created_at: UnixMillis,
    /// `None` means the paste never expires
    pub expires_at: Option<UnixMillis>,
    #[serde(default)]
    pub burn_after_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<PasswordHash>,
}

impl PasteRecord {
    /// Expired once the clock is strictly past `expires_at`
    pub fn is_expired(&self, now: UnixMillis) -> bool {
        matches!(self.expires_at, Some(at) if now > at)
    }

    /// Visibility at `now`, ignoring whether it has been read
    pub fn state(&self, now: UnixMillis) -> PasteState {
        if self.is_expired(now) {
            PasteState::Expired
        } else {
            PasteState::Active
        }
    }

    pub fn requires_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Check a supplied password against the stored hash
    ///
    /// Records without a hash accept anything.
    pub fn password_satisfied(&self, supplied: Option<&str>) -> bool {
        match (&self.password_hash, supplied) {
            (None, _) => true,
            (Some(hash), Some(candidate)) => hash.verify(candidate),
            (Some(_), None) => false,
        }
    }

    /// Time left before expiry, `None` for pastes that never expire
    pub fn time_to_expiry(&self, now: UnixMillis) -> Option<Duration> {
        self.expires_at
            .map(|at| Duration::from_millis(u64::try_from(at.saturating_sub(now)).unwrap_or(0)))
    }

    pub fn to_json(&self) -> PasteResult<String> {
        serde_json::to_string(self).map_err(|e| PasteError::CorruptRecord(e.to_string()))
    }

    pub fn from_json(raw: &str) -> PasteResult<Self> {
        serde_json::from_str(raw).map_err(|e| PasteError::CorruptRecord(e.to_string()))
    }
}

/// Where a paste stands in its lifecycle
///
/// `Active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasteState {
    Active,
    /// Time-triggered, evaluated lazily on access
    Expired,
    /// Burned by its first successful read
    Consumed,
    /// Removed explicitly
    Deleted,
}

impl PasteState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PasteState::Active)
    }
}

impl fmt::Display for PasteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PasteState::Active => "active",
            PasteState::Expired => "expired",
            PasteState::Consumed => "consumed",
            PasteState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}
