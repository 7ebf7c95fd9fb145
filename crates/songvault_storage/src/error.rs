//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A transient backend failure expected to succeed on retry.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// The stored blob for a key is unreadable.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the cache directory lock.
    #[error("storage locked: another process has exclusive access")]
    Locked,

    /// The platform storage budget is exhausted.
    #[error("storage quota exceeded: {usage} of {quota} bytes used")]
    QuotaExceeded {
        /// Bytes currently stored.
        usage: u64,
        /// The platform budget in bytes.
        quota: u64,
    },

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,

    /// A key is not valid for this backend.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Creates a transient failure error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates a corrupted storage error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
