//! Cache fixtures and helpers.
//!
//! Provides convenience functions for setting up test caches
//! and common test data.

use songvault_core::{CacheConfig, CachedSong, SongCache};
use songvault_storage::{MemoryBackend, StorageBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A test cache with automatic cleanup.
pub struct TestCache {
    /// The cache instance, already initialized.
    pub cache: SongCache,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestCache {
    /// Creates an initialized in-memory test cache.
    pub fn memory() -> Self {
        Self::memory_with(CacheConfig::default())
    }

    /// Creates an initialized in-memory test cache with a custom config.
    pub fn memory_with(config: CacheConfig) -> Self {
        let cache = SongCache::in_memory(config);
        let init = cache.initialize();
        assert!(init.success, "failed to initialize cache: {:?}", init.error);
        Self {
            cache,
            _temp_dir: None,
        }
    }

    /// Creates an initialized file-backed test cache in a temp
    /// directory.
    pub fn file() -> Self {
        Self::file_with(CacheConfig::default())
    }

    /// Creates an initialized file-backed test cache with a custom
    /// config.
    pub fn file_with(config: CacheConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache =
            SongCache::open(temp_dir.path(), config).expect("Failed to open file cache");
        let init = cache.initialize();
        assert!(init.success, "failed to initialize cache: {:?}", init.error);
        Self {
            cache,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the cache directory if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }

    /// Consumes the fixture, returning the temp directory so a second
    /// handle can reopen the same files.
    pub fn into_dir(self) -> Option<TempDir> {
        let Self { cache, _temp_dir } = self;
        cache.close().expect("Failed to close cache");
        _temp_dir
    }
}

impl std::ops::Deref for TestCache {
    type Target = SongCache;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

/// Creates an initialized cache over a backend handle the caller keeps,
/// so tests can corrupt raw documents or inject faults from outside.
pub fn cache_with_shared_backend(config: CacheConfig) -> (SongCache, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let cache = SongCache::with_backend(
        Arc::clone(&backend) as Arc<dyn StorageBackend>,
        config,
    );
    let init = cache.initialize();
    assert!(init.success, "failed to initialize cache: {:?}", init.error);
    (cache, backend)
}

/// Runs a test with a temporary in-memory cache.
pub fn with_temp_cache<F>(test: F)
where
    F: FnOnce(&SongCache),
{
    let fixture = TestCache::memory();
    test(&fixture.cache);
}

/// Builds a small valid song with the given id.
pub fn sample_song(id: &str) -> CachedSong {
    CachedSong::new(id, format!("Song {id}"))
        .with_artist("Test Artist")
        .with_lyrics("Sample lyrics for testing")
        .with_key("G")
        .with_tags(vec!["test".to_string()])
}

/// Builds a song whose lyrics are padded to roughly the given payload
/// size, for quota and eviction tests.
pub fn sized_song(id: &str, lyrics_len: usize) -> CachedSong {
    CachedSong::new(id, format!("Song {id}")).with_lyrics("x".repeat(lyrics_len))
}
