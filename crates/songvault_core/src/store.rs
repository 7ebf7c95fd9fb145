//! Persistent song store.
//!
//! Songs live in the backend under a `song/` key prefix, with the derived
//! aggregate under a fixed `meta` key. Mutating operations serialize at the
//! persistence boundary: one write guard per store operation, so two
//! concurrent saves to the same id resolve to last-commit-wins and two
//! saves to different ids never corrupt the aggregate.

use crate::clock::MonotonicClock;
use crate::error::{CacheError, CacheResult};
use crate::events::{ChangeOp, EventBus, StorageEvent};
use crate::metadata::CacheMetadata;
use crate::song::CachedSong;
use songvault_storage::StorageBackend;
use parking_lot::Mutex;
use std::sync::Arc;

/// Key prefix for song documents.
pub(crate) const SONG_PREFIX: &str = "song/";
/// Key of the aggregate metadata document.
pub(crate) const META_KEY: &str = "meta";

/// Per-item outcome report for a batch save.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Songs persisted, with bookkeeping fields filled in.
    pub saved: Vec<CachedSong>,
    /// Failed items as `(id, error message)` pairs.
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    /// Number of items persisted.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.saved.len()
    }
}

/// Key-value persistence for cached songs.
pub struct SongStore {
    backend: Arc<dyn StorageBackend>,
    bus: Arc<EventBus>,
    clock: Arc<MonotonicClock>,
    /// Serializes mutating operations at the persistence boundary.
    write_guard: Mutex<()>,
}

impl SongStore {
    /// Creates a store over the given backend.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        bus: Arc<EventBus>,
        clock: Arc<MonotonicClock>,
    ) -> Self {
        Self {
            backend,
            bus,
            clock,
            write_guard: Mutex::new(()),
        }
    }

    fn song_key(id: &str) -> String {
        format!("{SONG_PREFIX}{id}")
    }

    /// Saves one song, with full-replace semantics.
    ///
    /// Computes `size_bytes`, sets `cached_at` on first insert (preserved
    /// on update), refreshes `last_accessed`, persists, recomputes the
    /// aggregate, and emits `DataChanged`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty id or title, or any persistence
    /// failure.
    pub fn save(&self, song: &CachedSong) -> CacheResult<CachedSong> {
        song.validate()?;
        let _guard = self.write_guard.lock();

        let existing = self.read_song(&song.id).ok().flatten();
        let now = self.clock.now_millis();

        let mut stored = song.clone();
        stored.cached_at = existing.as_ref().map(|e| e.cached_at).unwrap_or(now);
        stored.last_accessed = now;
        stored.size_bytes = stored.encoded_payload_size()?;

        self.backend.put(&Self::song_key(&stored.id), &stored.encode()?)?;
        self.recompute_metadata_locked(None)?;

        let operation = if existing.is_some() {
            ChangeOp::Update
        } else {
            ChangeOp::Create
        };
        self.bus.emit(&StorageEvent::DataChanged {
            operation,
            id: stored.id.clone(),
        });

        Ok(stored)
    }

    /// Saves several songs, reporting success or failure per item.
    ///
    /// Emits `BatchOperationStarted` before and `BatchOperationCompleted`
    /// after. A failed item does not roll back items already written; the
    /// aggregate is recomputed once at the end.
    pub fn save_batch(&self, songs: &[CachedSong]) -> CacheResult<BatchReport> {
        self.bus.emit(&StorageEvent::BatchOperationStarted {
            operation: "save_batch".to_string(),
            item_count: songs.len(),
        });

        let mut report = BatchReport::default();
        let mut changes = Vec::with_capacity(songs.len());
        {
            let _guard = self.write_guard.lock();
            for song in songs {
                match self.save_one_locked(song) {
                    Ok((stored, operation)) => {
                        changes.push((stored.id.clone(), operation));
                        report.saved.push(stored);
                    }
                    Err(e) => report.failed.push((song.id.clone(), e.to_string())),
                }
            }
            self.backend.flush()?;
            self.recompute_metadata_locked(None)?;
        }

        for (id, operation) in changes {
            self.bus.emit(&StorageEvent::DataChanged { operation, id });
        }
        self.bus.emit(&StorageEvent::BatchOperationCompleted {
            operation: "save_batch".to_string(),
            succeeded: report.succeeded(),
            failed: report.failed.len(),
        });

        Ok(report)
    }

    /// Saves one song while the write guard is already held, reporting
    /// whether the write was a first insert or a replacement.
    fn save_one_locked(&self, song: &CachedSong) -> CacheResult<(CachedSong, ChangeOp)> {
        song.validate()?;
        let existing = self.read_song(&song.id).ok().flatten();
        let now = self.clock.now_millis();

        let operation = if existing.is_some() {
            ChangeOp::Update
        } else {
            ChangeOp::Create
        };

        let mut stored = song.clone();
        stored.cached_at = existing.as_ref().map(|e| e.cached_at).unwrap_or(now);
        stored.last_accessed = now;
        stored.size_bytes = stored.encoded_payload_size()?;

        self.backend.put(&Self::song_key(&stored.id), &stored.encode()?)?;
        Ok((stored, operation))
    }

    /// Returns the song with the given id, refreshing `last_accessed`.
    ///
    /// The refresh is persisted, so recency-based eviction sees it.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, `CorruptedData` if the stored document fails
    /// the record shape check.
    pub fn get(&self, id: &str) -> CacheResult<CachedSong> {
        let _guard = self.write_guard.lock();
        let mut song = self
            .read_song(id)?
            .ok_or_else(|| CacheError::not_found(id))?;

        song.last_accessed = self.clock.now_millis();
        self.backend.put(&Self::song_key(id), &song.encode()?)?;
        Ok(song)
    }

    /// Case-insensitive substring search over title, artist, lyrics, and
    /// tags. An empty query returns all songs.
    ///
    /// The result is a finite snapshot ordered by recency (most recently
    /// accessed first), recomputed from scratch on every call. Search does
    /// not refresh access times. Corrupted documents are skipped.
    pub fn search(&self, query: &str) -> CacheResult<Vec<CachedSong>> {
        let query_lower = query.to_lowercase();
        let mut results: Vec<CachedSong> = self
            .load_all()?
            .into_iter()
            .filter(|song| song.matches_query(&query_lower))
            .collect();
        results.sort_by(|a, b| {
            b.last_accessed
                .cmp(&a.last_accessed)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(results)
    }

    /// Deletes one song.
    ///
    /// # Errors
    ///
    /// `NotFound` if no song has the given id.
    pub fn delete(&self, id: &str) -> CacheResult<()> {
        let _guard = self.write_guard.lock();
        if !self.backend.delete(&Self::song_key(id))? {
            return Err(CacheError::not_found(id));
        }
        self.recompute_metadata_locked(None)?;
        self.bus.emit(&StorageEvent::DataChanged {
            operation: ChangeOp::Delete,
            id: id.to_string(),
        });
        Ok(())
    }

    /// Deletes every song, returning how many were removed.
    pub fn clear(&self) -> CacheResult<usize> {
        let _guard = self.write_guard.lock();
        let ids = self.list_ids_inner()?;
        for id in &ids {
            self.backend.delete(&Self::song_key(id))?;
        }
        self.recompute_metadata_locked(None)?;
        for id in &ids {
            self.bus.emit(&StorageEvent::DataChanged {
                operation: ChangeOp::Delete,
                id: id.clone(),
            });
        }
        Ok(ids.len())
    }

    /// Returns all stored song ids without deserializing payloads.
    ///
    /// Used for presence checks; does not touch access times.
    pub fn list_ids(&self) -> CacheResult<Vec<String>> {
        self.list_ids_inner()
    }

    fn list_ids_inner(&self) -> CacheResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .backend
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(SONG_PREFIX).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Loads all decodable songs, skipping corrupted documents.
    pub fn load_all(&self) -> CacheResult<Vec<CachedSong>> {
        let mut songs = Vec::new();
        for id in self.list_ids_inner()? {
            match self.read_song(&id) {
                Ok(Some(song)) => songs.push(song),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id, error = %e, "skipping corrupted song document");
                }
            }
        }
        Ok(songs)
    }

    /// Reads one song document without touching access times.
    fn read_song(&self, id: &str) -> CacheResult<Option<CachedSong>> {
        match self.backend.get(&Self::song_key(id))? {
            Some(bytes) => Ok(Some(CachedSong::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns the persisted aggregate, recomputing it if the metadata
    /// document is missing or unreadable.
    pub fn metadata(&self) -> CacheResult<CacheMetadata> {
        match self.backend.get(META_KEY)? {
            Some(bytes) => match CacheMetadata::decode(&bytes) {
                Ok(meta) => Ok(meta),
                Err(_) => {
                    tracing::warn!("metadata document unreadable, recomputing");
                    let _guard = self.write_guard.lock();
                    self.recompute_metadata_locked(None)
                }
            },
            None => {
                let _guard = self.write_guard.lock();
                self.recompute_metadata_locked(None)
            }
        }
    }

    /// Recomputes and persists the aggregate metadata.
    ///
    /// `last_cleanup_at` overrides the carried-over cleanup timestamp when
    /// given (set by cleanup passes).
    pub fn recompute_metadata(&self, last_cleanup_at: Option<u64>) -> CacheResult<CacheMetadata> {
        let _guard = self.write_guard.lock();
        self.recompute_metadata_locked(last_cleanup_at)
    }

    fn recompute_metadata_locked(
        &self,
        last_cleanup_at: Option<u64>,
    ) -> CacheResult<CacheMetadata> {
        let carried = last_cleanup_at.or_else(|| {
            self.backend
                .get(META_KEY)
                .ok()
                .flatten()
                .and_then(|bytes| CacheMetadata::decode(&bytes).ok())
                .and_then(|meta| meta.last_cleanup_at)
        });

        let songs = self.load_all()?;
        let meta = CacheMetadata::recompute(&songs, carried);
        self.backend.put(META_KEY, &meta.encode()?)?;
        Ok(meta)
    }

    /// Removes the given songs on behalf of an eviction or cleanup pass.
    ///
    /// Unlike [`SongStore::delete`], absent ids are skipped silently (a
    /// foreground delete may have raced the pass). Returns the number of
    /// songs removed and the bytes reclaimed; the aggregate is recomputed
    /// with the given cleanup timestamp.
    pub fn remove_for_cleanup(
        &self,
        ids: &[String],
        cleanup_at: u64,
    ) -> CacheResult<(usize, u64)> {
        let _guard = self.write_guard.lock();
        let mut removed = 0usize;
        let mut bytes_freed = 0u64;

        for id in ids {
            let size = self
                .read_song(id)
                .ok()
                .flatten()
                .map(|song| song.size_bytes)
                .unwrap_or(0);
            if self.backend.delete(&Self::song_key(id))? {
                removed += 1;
                bytes_freed += size;
                self.bus.emit(&StorageEvent::DataChanged {
                    operation: ChangeOp::Delete,
                    id: id.clone(),
                });
            }
        }

        self.recompute_metadata_locked(Some(cleanup_at))?;
        Ok((removed, bytes_freed))
    }

    /// Returns a reference to the underlying backend.
    pub(crate) fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }
}

impl std::fmt::Debug for SongStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SongStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songvault_storage::MemoryBackend;

    fn create_store() -> SongStore {
        SongStore::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(EventBus::new()),
            Arc::new(MonotonicClock::new()),
        )
    }

    fn song(id: &str, title: &str) -> CachedSong {
        CachedSong::new(id, title).with_lyrics("la la la")
    }

    #[test]
    fn save_fills_bookkeeping() {
        let store = create_store();
        let stored = store.save(&song("a", "Alpha")).unwrap();

        assert!(stored.cached_at > 0);
        assert_eq!(stored.last_accessed, stored.cached_at);
        assert!(stored.size_bytes > 0);
    }

    #[test]
    fn save_rejects_invalid_songs() {
        let store = create_store();
        let err = store.save(&song("", "Alpha")).unwrap_err();
        assert!(matches!(err, CacheError::Validation { .. }));
    }

    #[test]
    fn update_preserves_cached_at_and_recomputes_size() {
        let store = create_store();
        let first = store.save(&song("a", "Alpha")).unwrap();

        let bigger = song("a", "Alpha").with_lyrics("much longer lyrics this time around");
        let second = store.save(&bigger).unwrap();

        assert_eq!(second.cached_at, first.cached_at);
        assert!(second.last_accessed > first.last_accessed);
        assert!(second.size_bytes > first.size_bytes);
    }

    #[test]
    fn get_refreshes_last_accessed_persistently() {
        let store = create_store();
        let stored = store.save(&song("a", "Alpha")).unwrap();

        let read = store.get("a").unwrap();
        assert!(read.last_accessed > stored.last_accessed);

        // The refresh was persisted, not just returned.
        let again = store.get("a").unwrap();
        assert!(again.last_accessed > read.last_accessed);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = create_store();
        assert!(matches!(
            store.get("ghost").unwrap_err(),
            CacheError::NotFound { .. }
        ));
    }

    #[test]
    fn get_corrupted_document_fails_shape_check() {
        let store = create_store();
        store
            .backend()
            .put(&SongStore::song_key("bad"), b"\x00\x01 junk")
            .unwrap();

        let err = store.get("bad").unwrap_err();
        assert!(err.to_string().contains("Corrupted data"));
    }

    #[test]
    fn search_matches_across_fields() {
        let store = create_store();
        store
            .save(&song("1", "Amazing Grace").with_artist("Newton"))
            .unwrap();
        store
            .save(&song("2", "Be Thou My Vision").with_tags(vec!["hymn".into()]))
            .unwrap();
        store.save(&song("3", "Oceans")).unwrap();

        assert_eq!(store.search("grace").unwrap().len(), 1);
        assert_eq!(store.search("newton").unwrap().len(), 1);
        assert_eq!(store.search("HYMN").unwrap().len(), 1);
        assert_eq!(store.search("").unwrap().len(), 3);
        assert!(store.search("zebra").unwrap().is_empty());
    }

    #[test]
    fn search_orders_by_recency() {
        let store = create_store();
        store.save(&song("old", "One")).unwrap();
        store.save(&song("new", "Two")).unwrap();
        store.get("old").unwrap();

        let results = store.search("").unwrap();
        assert_eq!(results[0].id, "old");
        assert_eq!(results[1].id, "new");
    }

    #[test]
    fn search_skips_corrupted_documents() {
        let store = create_store();
        store.save(&song("good", "Fine")).unwrap();
        store
            .backend()
            .put(&SongStore::song_key("bad"), b"junk")
            .unwrap();

        let results = store.search("").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "good");
    }

    #[test]
    fn delete_and_clear() {
        let store = create_store();
        store.save(&song("a", "Alpha")).unwrap();
        store.save(&song("b", "Beta")).unwrap();

        store.delete("a").unwrap();
        assert!(matches!(
            store.delete("a").unwrap_err(),
            CacheError::NotFound { .. }
        ));

        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.list_ids().unwrap().is_empty());
    }

    #[test]
    fn list_ids_skips_non_song_documents() {
        let store = create_store();
        store.save(&song("a", "Alpha")).unwrap();
        // Metadata document exists alongside the song but is not an id.
        assert_eq!(store.list_ids().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn metadata_tracks_live_set() {
        let store = create_store();
        let a = store.save(&song("a", "Alpha")).unwrap();
        let b = store.save(&song("b", "Beta")).unwrap();

        let meta = store.metadata().unwrap();
        assert_eq!(meta.total_songs, 2);
        assert_eq!(meta.total_size_bytes, a.size_bytes + b.size_bytes);

        store.delete("a").unwrap();
        let meta = store.metadata().unwrap();
        assert_eq!(meta.total_songs, 1);
        assert_eq!(meta.total_size_bytes, b.size_bytes);
    }

    #[test]
    fn batch_reports_per_item_outcomes() {
        let store = create_store();
        store.save(&song("a", "Alpha")).unwrap();

        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            store
                .bus
                .subscribe(crate::events::EventKind::BatchOperationCompleted, move |e| {
                    events.lock().push(e.clone());
                });
        }
        let changes = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let changes = Arc::clone(&changes);
            store
                .bus
                .subscribe(crate::events::EventKind::DataChanged, move |e| {
                    changes.lock().push(e.clone());
                });
        }

        let batch = vec![
            song("a", "Alpha Revised"),
            song("", "No Id"),
            song("c", "Gamma"),
        ];
        let report = store.save_batch(&batch).unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "");

        // Written items stay written despite the failed one.
        assert_eq!(store.list_ids().unwrap(), vec!["a", "c"]);

        // Replacing an existing record is an update, a first insert is a
        // create, same as the single-save path.
        assert_eq!(
            *changes.lock(),
            vec![
                StorageEvent::DataChanged {
                    operation: ChangeOp::Update,
                    id: "a".into(),
                },
                StorageEvent::DataChanged {
                    operation: ChangeOp::Create,
                    id: "c".into(),
                },
            ]
        );

        let recorded = events.lock();
        assert_eq!(
            recorded[0],
            StorageEvent::BatchOperationCompleted {
                operation: "save_batch".into(),
                succeeded: 2,
                failed: 1,
            }
        );
    }

    #[test]
    fn remove_for_cleanup_skips_absent_ids() {
        let store = create_store();
        let a = store.save(&song("a", "Alpha")).unwrap();

        let (removed, bytes) = store
            .remove_for_cleanup(&["a".to_string(), "ghost".to_string()], 42)
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(bytes, a.size_bytes);
        assert_eq!(store.metadata().unwrap().last_cleanup_at, Some(42));
    }
}
