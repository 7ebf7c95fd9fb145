//! Pull-based sync with a remote song catalog.
//!
//! The transport is a trait so tests and embedders can supply their own
//! wire layer. A sync pass fetches the remote catalog and upserts every
//! song through the normal save path, so quota enforcement and change
//! events apply to synced data exactly as they do to local writes.

use crate::error::{CacheError, CacheResult};
use crate::events::{EventBus, StorageEvent};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::song::CachedSong;
use crate::store::{BatchReport, SongStore};
use std::sync::Arc;

/// A song as the remote catalog describes it. Bookkeeping fields are
/// assigned locally when the song is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSong {
    /// Catalog identifier.
    pub id: String,
    /// Song title.
    pub title: String,
    /// Performing artist, if known.
    pub artist: Option<String>,
    /// Full lyric text.
    pub lyrics: String,
    /// Musical key, if known.
    pub key: Option<String>,
    /// Free-form labels.
    pub tags: Vec<String>,
}

impl From<RemoteSong> for CachedSong {
    fn from(remote: RemoteSong) -> Self {
        let mut song = CachedSong::new(remote.id, remote.title).with_lyrics(remote.lyrics);
        song.artist = remote.artist;
        song.key = remote.key;
        song.tags = remote.tags;
        song
    }
}

/// Wire layer a sync pass pulls from.
pub trait SyncTransport: Send + Sync {
    /// Fetches the current remote catalog.
    ///
    /// Connectivity failures should be reported as
    /// [`CacheError::Transient`] so the pass retries them.
    fn fetch_songs(&self) -> CacheResult<Vec<RemoteSong>>;
}

impl<T: SyncTransport + ?Sized> SyncTransport for &T {
    fn fetch_songs(&self) -> CacheResult<Vec<RemoteSong>> {
        (**self).fetch_songs()
    }
}

/// Outcome of a completed sync pass.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Songs stored locally.
    pub items_synced: usize,
    /// Ids that failed to store, with the failure message.
    pub failed: Vec<(String, String)>,
}

/// Drives sync passes against a transport.
pub struct SyncCoordinator<T: SyncTransport> {
    transport: T,
    store: Arc<SongStore>,
    bus: Arc<EventBus>,
    policy: RetryPolicy,
}

impl<T: SyncTransport> SyncCoordinator<T> {
    /// Creates a coordinator. Fetches retry per the given policy.
    pub fn new(transport: T, store: Arc<SongStore>, bus: Arc<EventBus>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            store,
            bus,
            policy,
        }
    }

    /// Runs one sync pass: fetch the catalog, upsert every song.
    ///
    /// Emits `SyncStarted` up front and `SyncCompleted` on success. A
    /// song that fails to store does not abort the pass; a failed fetch
    /// does, after exhausting the retry budget.
    pub fn sync(&self) -> CacheResult<SyncReport> {
        self.bus.emit(&StorageEvent::SyncStarted);

        let (fetched, _retries) = run_with_retry(&self.policy, || self.transport.fetch_songs());
        let remote = match fetched {
            Ok(remote) => remote,
            Err(err) => {
                tracing::warn!(error = %err, "sync fetch failed");
                return Err(err);
            }
        };

        let songs: Vec<CachedSong> = remote.into_iter().map(CachedSong::from).collect();
        let report = self.upsert_all(&songs)?;

        tracing::info!(items_synced = report.items_synced, "sync pass completed");
        self.bus.emit(&StorageEvent::SyncCompleted {
            items_synced: report.items_synced,
        });
        Ok(report)
    }

    fn upsert_all(&self, songs: &[CachedSong]) -> CacheResult<SyncReport> {
        let batch: BatchReport = self.store.save_batch(songs)?;
        Ok(SyncReport {
            items_synced: batch.saved.len(),
            failed: batch.failed,
        })
    }
}

impl<T: SyncTransport> std::fmt::Debug for SyncCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// In-memory transport for tests: serves queued responses in order.
pub struct MockTransport {
    responses: parking_lot::Mutex<Vec<CacheResult<Vec<RemoteSong>>>>,
}

impl MockTransport {
    /// Creates a transport with no queued responses. An exhausted queue
    /// serves an empty catalog.
    pub fn new() -> Self {
        Self {
            responses: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Queues a successful catalog response.
    pub fn push_catalog(&self, songs: Vec<RemoteSong>) {
        self.responses.lock().push(Ok(songs));
    }

    /// Queues a failure response.
    pub fn push_error(&self, err: CacheError) {
        self.responses.lock().push(Err(err));
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTransport for MockTransport {
    fn fetch_songs(&self) -> CacheResult<Vec<RemoteSong>> {
        let mut queue = self.responses.lock();
        if queue.is_empty() {
            return Ok(Vec::new());
        }
        queue.remove(0)
    }
}
