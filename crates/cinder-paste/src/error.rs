//! Error types for cinder-paste

use cinder_crypto::CryptoError;
use cinder_storage::StorageError;
use thiserror::Error;

/// Errors from paste lifecycle operations
#[derive(Debug, Error)]
pub enum PasteError {
    /// No record exists under the id, or it was already consumed
    #[error("Paste not found")]
    NotFound,

    /// The record outlived its expiry and has been removed
    #[error("Paste has expired")]
    Expired,

    /// A password is set and none or a wrong one was supplied
    #[error("Password required")]
    PasswordRequired,

    /// Encrypted content exceeds the configured limit
    #[error("Content too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The request itself is malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every generated id collided with an existing paste
    #[error("No free paste id after {0} attempts")]
    IdSpaceExhausted(u32),

    /// A stored record could not be decoded
    #[error("Corrupt paste record: {0}")]
    CorruptRecord(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl PasteError {
    /// Whether the caller should treat the paste as gone
    pub fn is_gone(&self) -> bool {
        matches!(self, PasteError::NotFound | PasteError::Expired)
    }
}

/// Result type for paste operations
pub type PasteResult<T> = Result<T, PasteError>;
