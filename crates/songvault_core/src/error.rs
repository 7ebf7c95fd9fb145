//! Error types for SongVault core.

use std::io;
use thiserror::Error;

/// Result type for core cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in SongVault cache operations.
///
/// Every variant carries its retry classification: only
/// [`CacheError::Transient`] (and transient storage failures) are worth
/// retrying; everything else surfaces immediately.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Malformed input - the caller's fault, never retried.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the invalid input.
        message: String,
    },

    /// The requested song is not in the cache.
    #[error("song not found: {id}")]
    NotFound {
        /// The id that was not found.
        id: String,
    },

    /// A stored document fails the record shape check.
    ///
    /// Triggers the recovery path, not a retry.
    #[error("Corrupted data: {message}")]
    CorruptedData {
        /// Description of the corruption.
        message: String,
    },

    /// The platform storage budget is exhausted. Not retried.
    #[error("storage quota exceeded: {usage} of {quota} bytes used")]
    QuotaExceeded {
        /// Bytes currently stored.
        usage: u64,
        /// The platform budget in bytes.
        quota: u64,
    },

    /// An I/O-like failure expected to succeed on retry.
    #[error("transient failure: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// The bounded retry budget was exhausted.
    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Total attempts made.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },

    /// An operation was called before `initialize()` succeeded.
    #[error("cache not initialized")]
    NotInitialized,

    /// The underlying storage is locked by another process.
    #[error("lock conflict: storage is held by another process")]
    LockConflict,

    /// Preference schema migration failed.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CacheError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a corrupted-data error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::CorruptedData {
            message: message.into(),
        }
    }

    /// Creates a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a migration failure error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }

    /// Returns whether the operation that produced this error is worth
    /// retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<songvault_storage::StorageError> for CacheError {
    fn from(e: songvault_storage::StorageError) -> Self {
        use songvault_storage::StorageError;
        match e {
            StorageError::Transient(message) => Self::Transient { message },
            StorageError::Corrupted(message) => Self::CorruptedData { message },
            StorageError::Locked => Self::LockConflict,
            StorageError::QuotaExceeded { usage, quota } => Self::QuotaExceeded { usage, quota },
            StorageError::Io(e) => Self::Io(e),
            other => Self::Transient {
                message: other.to_string(),
            },
        }
    }
}

impl From<ciborium::ser::Error<io::Error>> for CacheError {
    fn from(e: ciborium::ser::Error<io::Error>) -> Self {
        Self::validation(format!("failed to encode document: {e}"))
    }
}

impl From<ciborium::de::Error<io::Error>> for CacheError {
    fn from(e: ciborium::de::Error<io::Error>) -> Self {
        Self::corrupted(format!("failed to decode document: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(CacheError::transient("io hiccup").is_retryable());
        assert!(!CacheError::validation("empty id").is_retryable());
        assert!(!CacheError::not_found("x").is_retryable());
        assert!(!CacheError::corrupted("bad shape").is_retryable());
        assert!(!CacheError::LockConflict.is_retryable());
        assert!(!CacheError::NotInitialized.is_retryable());
    }

    #[test]
    fn corrupted_display_is_recognizable() {
        let err = CacheError::corrupted("missing title");
        assert!(err.to_string().contains("Corrupted data"));
    }

    #[test]
    fn storage_errors_map_to_taxonomy() {
        use songvault_storage::StorageError;

        let e: CacheError = StorageError::Locked.into();
        assert!(matches!(e, CacheError::LockConflict));

        let e: CacheError = StorageError::transient("flaky").into();
        assert!(e.is_retryable());

        let e: CacheError = StorageError::QuotaExceeded {
            usage: 10,
            quota: 5,
        }
        .into();
        assert!(matches!(e, CacheError::QuotaExceeded { .. }));
    }
}
