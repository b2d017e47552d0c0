//! Errors raised by key-value backends

use thiserror::Error;

/// Failure of a [`KvStore`](crate::KvStore) operation
///
/// Missing and expired keys are not errors; they surface as `None` or
/// `false` from the operation itself.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file or its directory could not be created or read
    #[error("Store I/O failed: {0}")]
    Io(String),

    /// The redb engine rejected a transaction
    #[error("Store database error: {0}")]
    Database(String),

    #[error("Failed to encode stored entry: {0}")]
    Serialization(String),

    /// A stored entry or counter could not be decoded
    #[error("Stored entry is unreadable: {0}")]
    Deserialization(String),
}

impl StorageError {
    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

// Only decoding goes through `?`; encoding maps its error explicitly
impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_cause() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
        let err: StorageError = io_err.into();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(err.to_string().contains("read-only volume"));
    }

    #[test]
    fn test_truncated_entry_is_deserialization() {
        let err: StorageError = postcard::from_bytes::<(String, Option<i64>)>(&[0xFF])
            .unwrap_err()
            .into();
        assert!(matches!(err, StorageError::Deserialization(_)));
    }

    #[test]
    fn test_database_helper() {
        let err = StorageError::database("table kv_entries missing");
        assert_eq!(err.to_string(), "Store database error: table kv_entries missing");
    }
}
