//! Password hashes for the optional read gate
//!
//! The gate is enforced server-side and is independent of the content key.
//! Only a salted Argon2id PHC string is ever stored; candidates are checked
//! with the PHC verifier, never by comparing plaintext.

use std::fmt;

use argon2::password_hash::{
    PasswordHash as PhcString, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};

/// Salt length in bytes
const SALT_SIZE: usize = 16;

/// Argon2id v1.3 with the crate's default cost; verification reads the
/// parameters back from the PHC string
fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

/// Argon2id hash of a paste password in PHC string format
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a password with a fresh random salt
    pub fn derive(password: &str) -> CryptoResult<Self> {
        let mut salt_bytes = [0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;

        let phc = hasher()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
        Ok(Self(phc.to_string()))
    }

    /// Wrap an existing PHC string, checking that it parses
    pub fn from_phc(phc: impl Into<String>) -> CryptoResult<Self> {
        let phc = phc.into();
        PhcString::new(&phc).map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
        Ok(Self(phc))
    }

    /// Check a candidate password against this hash
    pub fn verify(&self, candidate: &str) -> bool {
        match PhcString::new(&self.0) {
            Ok(parsed) => hasher()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// The PHC string
    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

impl TryFrom<String> for PasswordHash {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_phc(value)
    }
}

impl From<PasswordHash> for String {
    fn from(hash: PasswordHash) -> Self {
        hash.0
    }
}
