//! Error types for cinder-crypto

use thiserror::Error;

/// Errors that can occur during cryptographic operations
///
/// `Decryption` carries no detail: a wrong key, a corrupted
/// ciphertext and a tampered nonce look the same to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid key material: {0}")]
    KeyFormat(String),

    #[error("Cannot decrypt: key or ciphertext invalid")]
    Decryption,

    #[error("Encryption failed")]
    Encryption,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
