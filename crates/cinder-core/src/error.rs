//! Error types for cinder-core

use thiserror::Error;

/// Errors produced when parsing a paste identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("Paste id length {0} is outside the accepted range")]
    InvalidLength(usize),

    #[error("Paste id contains a non-alphanumeric character")]
    InvalidCharacter,
}
