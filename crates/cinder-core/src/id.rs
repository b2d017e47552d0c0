//! Paste identifiers
//!
//! Ids are short alphanumeric tokens drawn from the thread-local CSPRNG.
//! Eight characters give roughly 47 bits of entropy, so uniqueness is
//! enforced by the store (claim-if-absent) rather than by length alone.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::error::IdError;

/// Length of generated ids
pub const DEFAULT_ID_LENGTH: usize = 8;

/// Shortest id accepted from callers
pub const MIN_ID_LENGTH: usize = 4;

/// Longest id accepted from callers
pub const MAX_ID_LENGTH: usize = 64;

/// Opaque identifier of a stored paste
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PasteId(String);

impl PasteId {
    /// Generate a random id of the given length
    ///
    /// The length is clamped into `MIN_ID_LENGTH..=MAX_ID_LENGTH`.
    pub fn generate(length: usize) -> Self {
        let length = length.clamp(MIN_ID_LENGTH, MAX_ID_LENGTH);
        let id: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Validate and wrap an id received from a caller
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        if !(MIN_ID_LENGTH..=MAX_ID_LENGTH).contains(&raw.len()) {
            return Err(IdError::InvalidLength(raw.len()));
        }
        if !raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(IdError::InvalidCharacter);
        }
        Ok(Self(raw.to_string()))
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PasteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PasteId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PasteId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PasteId> for String {
    fn from(id: PasteId) -> Self {
        id.0
    }
}

impl AsRef<str> for PasteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
