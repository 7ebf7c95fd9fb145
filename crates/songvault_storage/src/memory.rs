//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// An in-memory storage backend.
///
/// This backend holds all blobs in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral caches that don't need persistence
///
/// # Fault Injection
///
/// Tests can make the next N writes fail with a transient error via
/// [`MemoryBackend::fail_next_puts`], which exercises retry paths without
/// a real flaky disk.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use songvault_storage::{StorageBackend, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// backend.put("prefs", b"doc").unwrap();
/// assert_eq!(backend.usage().unwrap(), 3);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    /// Injectable platform budget. None means unlimited.
    capacity: Option<u64>,
    /// Number of upcoming puts that fail with a transient error.
    failing_puts: AtomicU32,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with a simulated platform storage budget.
    ///
    /// Useful for testing quota warnings without filling a real disk.
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Makes the next `count` calls to `put` fail with a transient error.
    pub fn fail_next_puts(&self, count: u32) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns whether the backend holds no blobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let pending = self.failing_puts.load(Ordering::SeqCst);
        if pending > 0
            && self
                .failing_puts
                .compare_exchange(pending, pending - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(StorageError::transient("injected write failure"));
        }

        let mut blobs = self.blobs.write();
        if let Some(capacity) = self.capacity {
            let usage: u64 = blobs
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len() as u64)
                .sum();
            if usage + value.len() as u64 > capacity {
                return Err(StorageError::QuotaExceeded {
                    usage: usage + value.len() as u64,
                    quota: capacity,
                });
            }
        }
        blobs.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.blobs.write().remove(key).is_some())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.blobs.read().keys().cloned().collect())
    }

    fn flush(&self) -> StorageResult<()> {
        // Nothing pending for an in-memory backend.
        Ok(())
    }

    fn usage(&self) -> StorageResult<u64> {
        Ok(self.blobs.read().values().map(|v| v.len() as u64).sum())
    }

    fn capacity(&self) -> StorageResult<Option<u64>> {
        Ok(self.capacity)
    }

    fn wipe(&self) -> StorageResult<()> {
        self.blobs.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let backend = MemoryBackend::new();

        backend.put("a", b"one").unwrap();
        assert_eq!(backend.get("a").unwrap(), Some(b"one".to_vec()));

        assert!(backend.delete("a").unwrap());
        assert!(backend.get("a").unwrap().is_none());
        assert!(!backend.delete("a").unwrap());
    }

    #[test]
    fn put_replaces() {
        let backend = MemoryBackend::new();
        backend.put("k", b"old").unwrap();
        backend.put("k", b"new value").unwrap();

        assert_eq!(backend.get("k").unwrap(), Some(b"new value".to_vec()));
        assert_eq!(backend.usage().unwrap(), 9);
    }

    #[test]
    fn keys_and_usage() {
        let backend = MemoryBackend::new();
        backend.put("x", b"12").unwrap();
        backend.put("y", b"345").unwrap();

        let mut keys = backend.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(backend.usage().unwrap(), 5);
    }

    #[test]
    fn capacity_enforced() {
        let backend = MemoryBackend::with_capacity(4);
        backend.put("a", b"1234").unwrap();

        let err = backend.put("b", b"5").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
    }

    #[test]
    fn overwrite_within_capacity() {
        let backend = MemoryBackend::with_capacity(4);
        backend.put("a", b"1234").unwrap();
        // Replacing the same key frees its old bytes first.
        backend.put("a", b"abcd").unwrap();
    }

    #[test]
    fn injected_failures_are_consumed() {
        let backend = MemoryBackend::new();
        backend.fail_next_puts(2);

        assert!(backend.put("a", b"x").is_err());
        assert!(backend.put("a", b"x").is_err());
        backend.put("a", b"x").unwrap();
    }

    #[test]
    fn wipe_clears_everything() {
        let backend = MemoryBackend::new();
        backend.put("a", b"1").unwrap();
        backend.put("b", b"2").unwrap();

        backend.wipe().unwrap();
        assert!(backend.is_empty());
        assert_eq!(backend.usage().unwrap(), 0);
    }

    #[test]
    fn put_many_commits_all() {
        let backend = MemoryBackend::new();
        let entries = vec![
            ("a".to_string(), b"1".to_vec()),
            ("b".to_string(), b"2".to_vec()),
        ];
        backend.put_many(&entries).unwrap();
        assert_eq!(backend.len(), 2);
    }
}
