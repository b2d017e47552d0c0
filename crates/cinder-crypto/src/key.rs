//! Symmetric key generation and encoding
//!
//! A [`SymmetricKey`] is created per paste in the client and never reaches
//! the server. It is exported as standard base64 (what WebCrypto `raw`
//! export produces) and mapped to a URL-fragment-safe alphabet for sharing.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Key size (32 bytes, AES-256)
pub const KEY_SIZE: usize = 32;

/// 256-bit AEAD key
///
/// The key bytes are wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generate a new random key
    ///
    /// Uses the thread-local CSPRNG, which is seeded from the OS.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create from raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Get the raw key bytes (use with caution)
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Export the raw key as standard, padded base64
    pub fn export(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    /// Import a key previously produced by [`SymmetricKey::export`]
    pub fn import(encoded: &str) -> CryptoResult<Self> {
        let mut decoded = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::KeyFormat(format!("invalid base64: {}", e)))?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::KeyFormat(format!(
                "expected {} bytes, got {}",
                KEY_SIZE, len
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    /// Export in the URL-fragment-safe alphabet
    pub fn to_url_fragment(&self) -> String {
        encode_key_for_url(&self.export())
    }

    /// Import from the URL-fragment-safe alphabet
    pub fn from_url_fragment(fragment: &str) -> CryptoResult<Self> {
        Self::import(&decode_key_from_url(fragment))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Map standard base64 to the URL-safe alphabet and strip padding
///
/// `+` becomes `-`, `/` becomes `_`, and `=` is removed.
pub fn encode_key_for_url(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect()
}

/// Inverse of [`encode_key_for_url`]: restore the alphabet and re-pad
pub fn decode_key_from_url(encoded: &str) -> String {
    let mut key: String = encoded
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    while key.len() % 4 != 0 {
        key.push('=');
    }
    key
}
