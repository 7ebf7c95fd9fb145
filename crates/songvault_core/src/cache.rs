//! The cache facade.
//!
//! [`SongCache`] ties the stores, quota manager, event bus, and executor
//! together behind a single handle. Every public operation runs through
//! the executor, so callers get an [`OperationResult`] with timing and
//! retry bookkeeping instead of a bare `Result`.

use crate::clock::MonotonicClock;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::events::{EventBus, EventKind, ListenerHandle, StorageEvent};
use crate::executor::OperationExecutor;
use crate::prefs::{
    CacheSettingsPatch, DisplaySettingsPatch, PreferenceStore, PreferencesPatch, PrefValue,
    UserPreferences, PREFS_KEY,
};
use crate::quota::{CleanupOptions, CleanupReport, QuotaManager, QuotaStatus};
use crate::result::OperationResult;
use crate::song::CachedSong;
use crate::store::{BatchReport, SongStore, META_KEY, SONG_PREFIX};
use crate::sync::{SyncCoordinator, SyncReport, SyncTransport};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use songvault_storage::{FileBackend, MemoryBackend, StorageBackend};
use std::path::Path;
use std::sync::Arc;

/// Backend key the layout manifest lives under.
const MANIFEST_KEY: &str = "manifest";

/// Current storage layout version.
pub const LAYOUT_VERSION: u32 = 2;

/// Versions the on-disk layout so it can be migrated forward.
///
/// Version 1 had no aggregate metadata document; migrating to version 2
/// computes one from the live songs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct LayoutManifest {
    layout_version: u32,
}

impl LayoutManifest {
    fn current() -> Self {
        Self {
            layout_version: LAYOUT_VERSION,
        }
    }

    fn encode(&self) -> CacheResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> CacheResult<Self> {
        ciborium::from_reader(bytes)
            .map_err(|err| CacheError::corrupted(format!("layout manifest undecodable: {err}")))
    }
}

/// Lifecycle of a cache handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Ready,
    Closed,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Number of cached songs.
    pub total_songs: u64,
    /// Aggregate payload bytes across cached songs.
    pub total_size_bytes: u64,
    /// When the last cleanup or eviction pass ran, epoch millis.
    pub last_cleanup_at: Option<u64>,
    /// Bytes the backend reports in use, payloads and bookkeeping both.
    pub backend_usage_bytes: u64,
    /// The backend's capacity, if it knows one.
    pub backend_capacity_bytes: Option<u64>,
}

/// Approximate memory footprint of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Aggregate payload bytes across cached songs.
    pub payload_bytes: u64,
    /// Number of cached songs.
    pub song_count: u64,
    /// Event listeners currently registered.
    pub listener_count: usize,
    /// Bytes the backend reports in use, bookkeeping included.
    pub backend_usage_bytes: u64,
}

/// Actions taken by a corruption recovery pass.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Human-readable description of each repair, in order.
    pub actions: Vec<String>,
    /// Song documents that were undecodable and removed.
    pub songs_discarded: usize,
}

/// Durable client-side cache for songs and user preferences.
///
/// All methods are safe to call from multiple threads. Operations fail
/// with [`CacheError::NotInitialized`] until [`SongCache::initialize`]
/// has run.
pub struct SongCache {
    backend: Arc<dyn StorageBackend>,
    store: Arc<SongStore>,
    prefs: PreferenceStore,
    quota: QuotaManager,
    executor: OperationExecutor,
    bus: Arc<EventBus>,
    config: CacheConfig,
    state: RwLock<Lifecycle>,
}

impl SongCache {
    /// Creates a cache over an arbitrary backend.
    pub fn with_backend(backend: Arc<dyn StorageBackend>, config: CacheConfig) -> Self {
        let bus = Arc::new(EventBus::new());
        let clock = Arc::new(MonotonicClock::new());
        let store = Arc::new(SongStore::new(
            Arc::clone(&backend),
            Arc::clone(&bus),
            Arc::clone(&clock),
        ));
        let prefs = PreferenceStore::new(Arc::clone(&backend), Arc::clone(&bus));
        let quota = QuotaManager::new(
            config.quota,
            Arc::clone(&store),
            Arc::clone(&bus),
            Arc::clone(&clock),
        );
        let executor = OperationExecutor::new(
            config.retry.clone(),
            config.slow_op_threshold,
            Arc::clone(&bus),
        );
        Self {
            backend,
            store,
            prefs,
            quota,
            executor,
            bus,
            config,
            state: RwLock::new(Lifecycle::Created),
        }
    }

    /// Creates a cache backed by process memory. Nothing survives the
    /// handle.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), config)
    }

    /// Opens a cache persisted under the given directory.
    ///
    /// Fails with [`CacheError::LockConflict`] when another process holds
    /// the directory.
    pub fn open(path: impl AsRef<Path>, config: CacheConfig) -> CacheResult<Self> {
        let backend = FileBackend::open(path.as_ref())?;
        Ok(Self::with_backend(Arc::new(backend), config))
    }

    /// Prepares the cache for use: verifies the layout manifest,
    /// migrating older layouts forward, and warms the aggregate
    /// metadata. Calling it again on a ready cache is a no-op.
    pub fn initialize(&self) -> OperationResult<()> {
        self.executor.execute("initialize", || {
            if *self.state.read() == Lifecycle::Ready {
                return Ok(());
            }
            self.initialize_layout()?;
            *self.state.write() = Lifecycle::Ready;
            Ok(())
        })
    }

    /// Flushes and marks the handle closed. Safe to call repeatedly and
    /// after a failed initialize.
    pub fn close(&self) -> CacheResult<()> {
        let mut state = self.state.write();
        if *state == Lifecycle::Closed {
            return Ok(());
        }
        if *state == Lifecycle::Ready {
            self.backend.flush()?;
        }
        *state = Lifecycle::Closed;
        tracing::debug!("cache closed");
        Ok(())
    }

    // Song operations.

    /// Saves a song, creating or replacing it, then enforces quota.
    ///
    /// Returns the stored snapshot with its bookkeeping filled in. Note
    /// that quota pressure may evict the song just saved if it is
    /// immediately the least recently used.
    pub fn save_song(&self, song: &CachedSong) -> OperationResult<CachedSong> {
        self.executor.execute("save_song", || {
            self.ensure_ready()?;
            let stored = self.store.save(song)?;
            self.quota.enforce_after_write()?;
            Ok(stored)
        })
    }

    /// Saves many songs in one pass. Individual failures are collected
    /// in the report rather than aborting the batch; quota is enforced
    /// once at the end.
    pub fn save_songs_batch(&self, songs: &[CachedSong]) -> OperationResult<BatchReport> {
        self.executor.execute("save_songs_batch", || {
            self.ensure_ready()?;
            let report = self.store.save_batch(songs)?;
            self.quota.enforce_after_write()?;
            Ok(report)
        })
    }

    /// Fetches a song by id, refreshing its last-access time.
    pub fn get_song(&self, id: &str) -> OperationResult<CachedSong> {
        self.executor.execute("get_song", || {
            self.ensure_ready()?;
            self.store.get(id)
        })
    }

    /// Case-insensitive substring search over titles, artists, lyrics,
    /// and tags. An empty query returns everything, most recently
    /// accessed first.
    pub fn search_songs(&self, query: &str) -> OperationResult<Vec<CachedSong>> {
        self.executor.execute("search_songs", || {
            self.ensure_ready()?;
            self.store.search(query)
        })
    }

    /// Deletes a song by id. Fails with [`CacheError::NotFound`] when it
    /// does not exist.
    pub fn delete_song(&self, id: &str) -> OperationResult<()> {
        self.executor.execute("delete_song", || {
            self.ensure_ready()?;
            self.store.delete(id)
        })
    }

    /// Lists all cached song ids in lexicographic order without reading
    /// payloads.
    pub fn list_song_ids(&self) -> OperationResult<Vec<String>> {
        self.executor.execute("list_song_ids", || {
            self.ensure_ready()?;
            self.store.list_ids()
        })
    }

    /// Removes every cached song. Preferences are untouched.
    pub fn clear_all_songs(&self) -> OperationResult<usize> {
        self.executor.execute("clear_all_songs", || {
            self.ensure_ready()?;
            self.store.clear()
        })
    }

    // Preference operations.

    /// Returns the current preferences, falling back to defaults when
    /// none are stored.
    pub fn get_preferences(&self) -> OperationResult<UserPreferences> {
        self.executor.execute("get_preferences", || {
            self.ensure_ready()?;
            self.prefs.get()
        })
    }

    /// Replaces the whole preference document after validation.
    pub fn save_preferences(&self, prefs: &UserPreferences) -> OperationResult<()> {
        self.executor.execute("save_preferences", || {
            self.ensure_ready()?;
            self.prefs.save(prefs)
        })
    }

    /// Applies a partial preference update and returns the merged
    /// document.
    pub fn update_preferences(&self, patch: &PreferencesPatch) -> OperationResult<UserPreferences> {
        self.executor.execute("update_preferences", || {
            self.ensure_ready()?;
            self.prefs.update(patch)
        })
    }

    /// Applies a partial update to the display settings only.
    pub fn update_display_settings(
        &self,
        patch: &DisplaySettingsPatch,
    ) -> OperationResult<UserPreferences> {
        self.executor.execute("update_display_settings", || {
            self.ensure_ready()?;
            self.prefs.update_display_settings(patch)
        })
    }

    /// Applies a partial update to the cache settings only.
    pub fn update_cache_settings(
        &self,
        patch: &CacheSettingsPatch,
    ) -> OperationResult<UserPreferences> {
        self.executor.execute("update_cache_settings", || {
            self.ensure_ready()?;
            self.prefs.update_cache_settings(patch)
        })
    }

    /// Sets a single preference by dotted path, e.g.
    /// `"displaySettings.showChords"`.
    pub fn update_preference(&self, path: &str, value: &PrefValue) -> OperationResult<UserPreferences> {
        self.executor.execute("update_preference", || {
            self.ensure_ready()?;
            self.prefs.set_path(path, value)
        })
    }

    /// Restores default preferences.
    pub fn reset_preferences(&self) -> OperationResult<UserPreferences> {
        self.executor.execute("reset_preferences", || {
            self.ensure_ready()?;
            self.prefs.reset()
        })
    }

    /// Serializes preferences as JSON for transfer to another device.
    pub fn export_preferences(&self) -> OperationResult<String> {
        self.executor.execute("export_preferences", || {
            self.ensure_ready()?;
            self.prefs.export()
        })
    }

    /// Imports a JSON preference export, either merging over the current
    /// document or replacing it wholesale.
    pub fn import_preferences(&self, json: &str, merge: bool) -> OperationResult<UserPreferences> {
        self.executor.execute("import_preferences", || {
            self.ensure_ready()?;
            self.prefs.import(json, merge)
        })
    }

    // Maintenance.

    /// Runs a manual cleanup pass.
    pub fn cleanup(&self, options: CleanupOptions) -> OperationResult<CleanupReport> {
        self.executor.execute("cleanup", || {
            self.ensure_ready()?;
            self.quota.cleanup(options)
        })
    }

    /// Compares backend usage against the platform budget. Advisory
    /// only.
    pub fn check_storage_quota(&self) -> OperationResult<QuotaStatus> {
        self.executor.execute("check_storage_quota", || {
            self.ensure_ready()?;
            self.quota.check_storage_quota()
        })
    }

    /// Returns point-in-time cache statistics.
    pub fn get_cache_stats(&self) -> OperationResult<CacheStats> {
        self.executor.execute("get_cache_stats", || {
            self.ensure_ready()?;
            let meta = self.store.metadata()?;
            Ok(CacheStats {
                total_songs: meta.total_songs,
                total_size_bytes: meta.total_size_bytes,
                last_cleanup_at: meta.last_cleanup_at,
                backend_usage_bytes: self.backend.usage()?,
                backend_capacity_bytes: self.backend.capacity()?,
            })
        })
    }

    /// Approximates what the cache is holding on to: payload bytes, song
    /// count, and listener count.
    pub fn get_memory_usage(&self) -> OperationResult<MemoryUsage> {
        self.executor.execute("get_memory_usage", || {
            self.ensure_ready()?;
            let meta = self.store.metadata()?;
            Ok(MemoryUsage {
                payload_bytes: meta.total_size_bytes,
                song_count: meta.total_songs,
                listener_count: self.bus.total_listeners(),
                backend_usage_bytes: self.backend.usage()?,
            })
        })
    }

    /// Pulls the remote catalog through the given transport and upserts
    /// every song, then enforces quota.
    pub fn sync_with_server<T: SyncTransport>(&self, transport: &T) -> OperationResult<SyncReport> {
        self.executor.execute("sync_with_server", || {
            self.ensure_ready()?;
            let coordinator = SyncCoordinator::new(
                transport,
                Arc::clone(&self.store),
                Arc::clone(&self.bus),
                self.config.retry.clone(),
            );
            let report = coordinator.sync()?;
            self.quota.enforce_after_write()?;
            Ok(report)
        })
    }

    /// Scans the whole store and repairs what it can: undecodable song
    /// documents are discarded, an unreadable preference document is
    /// reset to defaults, and the manifest and aggregate metadata are
    /// rewritten. Never panics; runs even when initialize failed, and
    /// leaves the cache ready on success.
    pub fn recover_from_corruption(&self) -> OperationResult<RecoveryReport> {
        self.executor.execute("recover_from_corruption", || {
            let mut report = RecoveryReport::default();

            for key in self.backend.keys()? {
                let Some(id) = key.strip_prefix(SONG_PREFIX) else {
                    continue;
                };
                let undecodable = match self.backend.get(&key)? {
                    None => false,
                    Some(bytes) => CachedSong::decode(&bytes).is_err(),
                };
                if undecodable {
                    self.backend.delete(&key)?;
                    report.songs_discarded += 1;
                    report.actions.push(format!("discarded corrupted song {id}"));
                    self.bus.emit(&StorageEvent::Error {
                        operation: "recover_from_corruption".to_string(),
                        message: format!("discarded corrupted song {id}"),
                    });
                }
            }

            if let Some(bytes) = self.backend.get(PREFS_KEY)? {
                if UserPreferences::decode(&bytes).is_err() {
                    self.backend.delete(PREFS_KEY)?;
                    report
                        .actions
                        .push("reset unreadable preferences to defaults".to_string());
                }
            }

            let manifest_ok = matches!(
                self.backend.get(MANIFEST_KEY)?,
                Some(bytes) if LayoutManifest::decode(&bytes).is_ok()
            );
            if !manifest_ok {
                self.backend
                    .put(MANIFEST_KEY, &LayoutManifest::current().encode()?)?;
                report.actions.push("rewrote layout manifest".to_string());
            }

            self.store.recompute_metadata(None)?;
            self.backend.flush()?;
            *self.state.write() = Lifecycle::Ready;

            tracing::info!(
                songs_discarded = report.songs_discarded,
                repairs = report.actions.len(),
                "corruption recovery completed"
            );
            Ok(report)
        })
    }

    // Events.

    /// Registers a listener for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&StorageEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, listener)
    }

    /// Removes a previously registered listener. Returns whether it was
    /// still registered.
    pub fn unsubscribe(&self, handle: &ListenerHandle) -> bool {
        self.bus.unsubscribe(handle)
    }

    /// The event bus, for wiring into host frameworks.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn ensure_ready(&self) -> CacheResult<()> {
        match *self.state.read() {
            Lifecycle::Ready => Ok(()),
            Lifecycle::Created | Lifecycle::Closed => Err(CacheError::NotInitialized),
        }
    }

    fn initialize_layout(&self) -> CacheResult<()> {
        match self.backend.get(MANIFEST_KEY)? {
            None => {
                // Fresh store, or one written before manifests existed.
                // A pre-manifest store is recognizable by live song keys
                // and treated as layout 1.
                let has_songs = self
                    .backend
                    .keys()?
                    .iter()
                    .any(|k| k.starts_with(SONG_PREFIX));
                if has_songs {
                    self.migrate_from_v1()?;
                } else {
                    self.store.recompute_metadata(None)?;
                }
            }
            Some(bytes) => {
                let manifest = LayoutManifest::decode(&bytes)?;
                match manifest.layout_version {
                    LAYOUT_VERSION => {
                        // Warm the aggregate so stats never start cold.
                        if self.backend.get(META_KEY)?.is_none() {
                            self.store.recompute_metadata(None)?;
                        }
                    }
                    1 => self.migrate_from_v1()?,
                    newer => {
                        return Err(CacheError::migration_failed(format!(
                            "layout version {newer} is newer than supported {LAYOUT_VERSION}"
                        )))
                    }
                }
            }
        }

        self.backend
            .put(MANIFEST_KEY, &LayoutManifest::current().encode()?)?;

        // Reading preferences migrates an old document in place.
        self.prefs.get()?;

        self.backend.flush()?;
        tracing::debug!(layout_version = LAYOUT_VERSION, "cache initialized");
        Ok(())
    }

    /// Layout 1 kept no aggregate metadata document. Building one from
    /// the live songs is the whole migration.
    fn migrate_from_v1(&self) -> CacheResult<()> {
        tracing::info!(from = 1, to = LAYOUT_VERSION, "migrating storage layout");
        self.store
            .recompute_metadata(None)
            .map_err(|err| CacheError::migration_failed(format!("layout migration: {err}")))?;
        Ok(())
    }
}

impl std::fmt::Debug for SongCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SongCache")
            .field("config", &self.config)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuotaConfig;

    fn ready_cache() -> SongCache {
        let cache = SongCache::in_memory(CacheConfig::default());
        assert!(cache.initialize().success);
        cache
    }

    fn song(id: &str, title: &str) -> CachedSong {
        CachedSong::new(id, title).with_lyrics("la la la")
    }

    #[test]
    fn operations_fail_before_initialize() {
        let cache = SongCache::in_memory(CacheConfig::default());
        let result = cache.save_song(&song("a", "Alpha"));
        assert!(!result.success);
        assert_eq!(
            result.error_message(),
            Some(CacheError::NotInitialized.to_string().as_str())
        );
    }

    #[test]
    fn initialize_is_idempotent() {
        let cache = SongCache::in_memory(CacheConfig::default());
        assert!(cache.initialize().success);
        cache.save_song(&song("a", "Alpha")).into_data().unwrap();

        assert!(cache.initialize().success);
        assert_eq!(
            cache.get_cache_stats().into_data().unwrap().total_songs,
            1
        );
    }

    #[test]
    fn close_is_idempotent_and_gates_operations() {
        let cache = ready_cache();
        cache.close().unwrap();
        cache.close().unwrap();
        assert!(!cache.get_song("a").success);
    }

    #[test]
    fn close_is_safe_before_initialize() {
        let cache = SongCache::in_memory(CacheConfig::default());
        cache.close().unwrap();
    }

    #[test]
    fn save_and_get_round_trip() {
        let cache = ready_cache();
        let stored = cache.save_song(&song("a", "Alpha")).into_data().unwrap();
        assert!(stored.size_bytes > 0);

        let fetched = cache.get_song("a").into_data().unwrap();
        assert_eq!(fetched.title, "Alpha");
    }

    #[test]
    fn get_missing_song_reports_not_found() {
        let cache = ready_cache();
        let result = cache.get_song("missing");
        assert!(!result.success);
        assert!(result
            .error_message()
            .is_some_and(|m| m.contains("not found")));
    }

    #[test]
    fn save_enforces_quota() {
        let config =
            CacheConfig::default().with_quota(QuotaConfig::new(5, 1 << 20));
        let cache = SongCache::in_memory(config);
        assert!(cache.initialize().success);

        for i in 0..6 {
            assert!(cache.save_song(&song(&format!("s{i}"), "T")).success);
        }
        let stats = cache.get_cache_stats().into_data().unwrap();
        assert_eq!(stats.total_songs, 4); // drained to the 80% target
    }

    #[test]
    fn stats_track_the_live_set() {
        let cache = ready_cache();
        cache.save_song(&song("a", "Alpha")).into_data().unwrap();
        let b = cache.save_song(&song("b", "Beta")).into_data().unwrap();

        cache.delete_song("a").into_data().unwrap();
        let stats = cache.get_cache_stats().into_data().unwrap();
        assert_eq!(stats.total_songs, 1);
        assert_eq!(stats.total_size_bytes, b.size_bytes);
    }

    #[test]
    fn manifest_newer_than_supported_fails_initialize() {
        let backend = Arc::new(MemoryBackend::new());
        let manifest = LayoutManifest {
            layout_version: LAYOUT_VERSION + 1,
        };
        backend.put(MANIFEST_KEY, &manifest.encode().unwrap()).unwrap();

        let cache = SongCache::with_backend(backend, CacheConfig::default());
        let result = cache.initialize();
        assert!(!result.success);
        assert!(result
            .error_message()
            .is_some_and(|m| m.contains("migration failed")));
        // The failed handle can still be closed.
        cache.close().unwrap();
    }

    #[test]
    fn pre_manifest_store_is_migrated() {
        // Simulate a layout-1 store: song documents but no manifest and
        // no aggregate metadata.
        let seed = SongCache::in_memory(CacheConfig::default());
        assert!(seed.initialize().success);
        seed.save_song(&song("a", "Alpha")).into_data().unwrap();
        let backend = Arc::clone(&seed.backend);
        backend.delete(MANIFEST_KEY).unwrap();
        backend.delete(META_KEY).unwrap();

        let cache = SongCache::with_backend(backend, CacheConfig::default());
        assert!(cache.initialize().success);
        let stats = cache.get_cache_stats().into_data().unwrap();
        assert_eq!(stats.total_songs, 1);
    }

    #[test]
    fn recovery_discards_undecodable_songs() {
        let cache = ready_cache();
        cache.save_song(&song("good", "Good")).into_data().unwrap();
        cache.backend.put("song/bad", b"garbage").unwrap();

        let report = cache.recover_from_corruption().into_data().unwrap();
        assert_eq!(report.songs_discarded, 1);
        assert!(report.actions.iter().any(|a| a.contains("bad")));

        let ids = cache.list_song_ids().into_data().unwrap();
        assert_eq!(ids, vec!["good"]);
        let stats = cache.get_cache_stats().into_data().unwrap();
        assert_eq!(stats.total_songs, 1);
    }

    #[test]
    fn recovery_resets_unreadable_preferences() {
        let cache = ready_cache();
        cache.backend.put(PREFS_KEY, b"garbage").unwrap();

        let report = cache.recover_from_corruption().into_data().unwrap();
        assert!(report.actions.iter().any(|a| a.contains("preferences")));
        assert_eq!(
            cache.get_preferences().into_data().unwrap(),
            UserPreferences::default()
        );
    }

    #[test]
    fn recovery_rewrites_a_missing_manifest() {
        let cache = ready_cache();
        cache.backend.delete(MANIFEST_KEY).unwrap();

        let report = cache.recover_from_corruption().into_data().unwrap();
        assert!(report.actions.iter().any(|a| a.contains("manifest")));

        let bytes = cache.backend.get(MANIFEST_KEY).unwrap().unwrap();
        assert_eq!(
            LayoutManifest::decode(&bytes).unwrap(),
            LayoutManifest::current()
        );
    }

    #[test]
    fn recovery_runs_without_initialize_and_leaves_cache_ready() {
        let cache = SongCache::in_memory(CacheConfig::default());
        assert!(cache.recover_from_corruption().success);
        assert!(cache.save_song(&song("a", "Alpha")).success);
    }

    #[test]
    fn subscribe_receives_facade_events() {
        use parking_lot::Mutex;

        let cache = ready_cache();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = {
            let seen = Arc::clone(&seen);
            cache.subscribe(EventKind::DataChanged, move |e| seen.lock().push(e.clone()))
        };

        cache.save_song(&song("a", "Alpha")).into_data().unwrap();
        assert_eq!(seen.lock().len(), 1);

        assert!(cache.unsubscribe(&handle));
        cache.save_song(&song("b", "Beta")).into_data().unwrap();
        assert_eq!(seen.lock().len(), 1);
    }
}
