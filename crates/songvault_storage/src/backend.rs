//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for SongVault.
///
/// Storage backends are **opaque keyed blob stores**. They map string keys
/// to byte blobs and provide simple operations for reading, writing, and
/// enumerating documents. The core crate owns all document interpretation -
/// backends do not understand song records, preferences, or CBOR framing.
///
/// # Invariants
///
/// - `get` returns exactly the bytes most recently `put` under that key
/// - `put` replaces any previous blob for the key (no merge)
/// - A single `put` is atomic: a crash mid-write leaves either the old
///   blob or the new one, never a torn mixture
/// - `keys` reflects all committed puts not yet deleted
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing and ephemeral caches
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads the blob stored under `key`.
    ///
    /// Returns `None` if no blob exists for the key.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs or the platform
    /// storage budget is exhausted.
    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Stores several blobs, flushing once at the end.
    ///
    /// Each individual write is atomic; a crash between writes leaves a
    /// prefix of the batch committed. Callers that need stronger guarantees
    /// reconcile with a derived aggregate on startup.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; earlier writes remain committed.
    fn put_many(&self, entries: &[(String, Vec<u8>)]) -> StorageResult<()> {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        self.flush()
    }

    /// Deletes the blob stored under `key`.
    ///
    /// Returns `true` if a blob existed and was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Returns all keys with committed blobs, in unspecified order.
    ///
    /// # Errors
    ///
    /// Returns an error if the key set cannot be enumerated.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Flushes all pending writes to durable storage.
    ///
    /// After this returns successfully, all previously written blobs
    /// are guaranteed to survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;

    /// Returns the total bytes currently stored across all keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the usage cannot be determined.
    fn usage(&self) -> StorageResult<u64>;

    /// Returns the platform storage budget in bytes, if one is known.
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity cannot be determined.
    fn capacity(&self) -> StorageResult<Option<u64>>;

    /// Removes every blob, returning the backend to an empty state.
    ///
    /// Used by the corruption recovery path.
    ///
    /// # Errors
    ///
    /// Returns an error if the wipe fails part-way; remaining blobs
    /// are left in place.
    fn wipe(&self) -> StorageResult<()>;
}
