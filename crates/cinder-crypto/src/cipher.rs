//! Authenticated encryption for paste content
//!
//! Uses AES-256-GCM so content sealed here opens in a browser through
//! WebCrypto and vice versa. The wire envelope is
//! `base64(nonce || ciphertext || tag)`; the nonce is always the first
//! [`NONCE_SIZE`] bytes.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::key::SymmetricKey;

/// Nonce size for AES-GCM (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size appended to every ciphertext (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Smallest well-formed envelope: a nonce plus the tag of an empty message
pub const MIN_PAYLOAD_SIZE: usize = NONCE_SIZE + TAG_SIZE;

/// Encrypted data with the nonce it was sealed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// Nonce used for encryption
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the authentication tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Serialize as `nonce || ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Split `nonce || ciphertext` at the fixed nonce width
    ///
    /// Envelopes too short to hold a nonce and a tag fail the same way a
    /// forged one would.
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        if data.len() < MIN_PAYLOAD_SIZE {
            return Err(CryptoError::Decryption);
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&data[..NONCE_SIZE]);

        Ok(Self {
            nonce,
            ciphertext: data[NONCE_SIZE..].to_vec(),
        })
    }

    /// Encode the envelope for the network boundary
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode an envelope received over the network boundary
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::Decryption)?;
        Self::from_bytes(&bytes)
    }
}

/// AES-256-GCM encryption engine
///
/// Stateless: every call draws its own nonce, so there is no counter to
/// persist or share between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct CipherEngine;

impl CipherEngine {
    /// Encrypt a UTF-8 plaintext under a fresh random nonce
    pub fn encrypt(plaintext: &str, key: &SymmetricKey) -> CryptoResult<EncryptedPayload> {
        Self::encrypt_bytes(plaintext.as_bytes(), key)
    }

    /// Encrypt arbitrary bytes under a fresh random nonce
    pub fn encrypt_bytes(plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<EncryptedPayload> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);
        Self::encrypt_with_nonce(plaintext, key, nonce)
    }

    pub(crate) fn encrypt_with_nonce(
        plaintext: &[u8],
        key: &SymmetricKey,
        nonce: [u8; NONCE_SIZE],
    ) -> CryptoResult<EncryptedPayload> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Encryption)?;

        Ok(EncryptedPayload { nonce, ciphertext })
    }

    /// Decrypt and authenticate, returning the raw plaintext bytes
    ///
    /// Nothing is returned unless the tag verifies.
    pub fn decrypt_bytes(payload: &EncryptedPayload, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        cipher
            .decrypt(Nonce::from_slice(&payload.nonce), payload.ciphertext.as_slice())
            .map_err(|_| CryptoError::Decryption)
    }

    /// Decrypt and authenticate a UTF-8 plaintext
    pub fn decrypt(payload: &EncryptedPayload, key: &SymmetricKey) -> CryptoResult<String> {
        let plaintext = Self::decrypt_bytes(payload, key)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
    }

    /// Encrypt and encode in one step, producing the value sent as `content`
    pub fn seal(plaintext: &str, key: &SymmetricKey) -> CryptoResult<String> {
        Ok(Self::encrypt(plaintext, key)?.to_base64())
    }

    /// Decode and decrypt a `content` value produced by [`CipherEngine::seal`]
    pub fn open(content: &str, key: &SymmetricKey) -> CryptoResult<String> {
        let payload = EncryptedPayload::from_base64(content)?;
        Self::decrypt(&payload, key)
    }
}
