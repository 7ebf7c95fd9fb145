//! Quota enforcement and least-recently-used eviction.
//!
//! Two symmetric limits bound the cache: a maximum song count and a
//! maximum aggregate payload size. Crossing 80% of either limit emits a
//! warning; exceeding a limit triggers eviction, which drains the cache
//! back down to the 80% targets (hysteresis prevents thrashing right at
//! the boundary). Victims are picked oldest-access-first, ties broken by
//! insertion order for determinism.

use crate::clock::MonotonicClock;
use crate::config::{QuotaConfig, PLATFORM_WARNING_THRESHOLD, SOFT_THRESHOLD};
use crate::error::CacheResult;
use crate::events::{EventBus, StorageEvent};
use crate::song::CachedSong;
use crate::store::SongStore;
use std::sync::Arc;
use std::time::Duration;

/// Options for a manual cleanup pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    /// Also remove songs whose last access is older than this age,
    /// regardless of size pressure.
    pub max_age: Option<Duration>,
    /// Compute and report the candidate set without deleting anything.
    pub dry_run: bool,
}

/// Report of an eviction or cleanup pass.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Ids selected for removal, in eviction order.
    pub candidates: Vec<String>,
    /// Songs actually removed (zero for dry runs).
    pub items_deleted: usize,
    /// Bytes reclaimed (zero for dry runs).
    pub bytes_freed: u64,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Result of an advisory platform-quota check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaStatus {
    /// Bytes currently stored in the backend.
    pub usage: u64,
    /// The platform budget in bytes, if the backend knows one.
    pub quota: Option<u64>,
    /// Usage as a percentage of the budget.
    pub percent_used: Option<f64>,
    /// Whether usage crossed the warning threshold.
    pub warning: bool,
}

/// Keeps the song store within its configured bounds.
pub struct QuotaManager {
    config: QuotaConfig,
    store: Arc<SongStore>,
    bus: Arc<EventBus>,
    clock: Arc<MonotonicClock>,
}

impl QuotaManager {
    /// Creates a manager over the given store.
    pub fn new(
        config: QuotaConfig,
        store: Arc<SongStore>,
        bus: Arc<EventBus>,
        clock: Arc<MonotonicClock>,
    ) -> Self {
        Self {
            config,
            store,
            bus,
            clock,
        }
    }

    /// Checks thresholds after a write and evicts if a hard limit was
    /// exceeded.
    ///
    /// Returns the eviction report when a pass ran. Crossing a soft
    /// threshold (80%) only emits a `QuotaWarning`.
    pub fn enforce_after_write(&self) -> CacheResult<Option<CleanupReport>> {
        let meta = self.store.metadata()?;

        self.warn_if_soft_crossed(meta.total_songs, self.config.max_songs);
        self.warn_if_soft_crossed(meta.total_size_bytes, self.config.max_size_bytes);

        if meta.total_songs <= self.config.max_songs
            && meta.total_size_bytes <= self.config.max_size_bytes
        {
            return Ok(None);
        }

        self.bus.emit(&StorageEvent::CleanupStarted);
        let candidates = self.eviction_candidates(&self.store.load_all()?);
        let now = self.clock.now_millis();
        let (items_deleted, bytes_freed) = self.store.remove_for_cleanup(&candidates, now)?;

        tracing::info!(items_deleted, bytes_freed, "eviction pass completed");
        self.bus.emit(&StorageEvent::CleanupCompleted {
            items_deleted,
            bytes_freed,
        });

        Ok(Some(CleanupReport {
            candidates,
            items_deleted,
            bytes_freed,
            dry_run: false,
        }))
    }

    /// Runs a manual cleanup pass.
    ///
    /// Age-expired songs are removed regardless of size pressure; the
    /// normal hard-limit drain applies on top. With `dry_run` the combined
    /// candidate set is computed and reported without deleting.
    pub fn cleanup(&self, options: CleanupOptions) -> CacheResult<CleanupReport> {
        let now = self.clock.now_millis();
        let songs = self.store.load_all()?;

        let mut candidates: Vec<String> = Vec::new();
        let mut remaining: Vec<CachedSong> = Vec::new();

        let cutoff = options
            .max_age
            .map(|age| now.saturating_sub(age.as_millis() as u64));
        for song in songs {
            match cutoff {
                Some(cutoff) if song.last_accessed < cutoff => candidates.push(song.id.clone()),
                _ => remaining.push(song),
            }
        }
        candidates.extend(self.eviction_candidates(&remaining));

        if options.dry_run {
            return Ok(CleanupReport {
                candidates,
                items_deleted: 0,
                bytes_freed: 0,
                dry_run: true,
            });
        }

        self.bus.emit(&StorageEvent::CleanupStarted);
        let (items_deleted, bytes_freed) = self.store.remove_for_cleanup(&candidates, now)?;
        self.bus.emit(&StorageEvent::CleanupCompleted {
            items_deleted,
            bytes_freed,
        });

        Ok(CleanupReport {
            candidates,
            items_deleted,
            bytes_freed,
            dry_run: false,
        })
    }

    /// Compares backend usage against the platform budget.
    ///
    /// Advisory only: emits `QuotaWarning` at or above 90% but never
    /// deletes data.
    pub fn check_storage_quota(&self) -> CacheResult<QuotaStatus> {
        let usage = self.store.backend().usage()?;
        let quota = self.store.backend().capacity()?;

        let percent_used = quota
            .filter(|q| *q > 0)
            .map(|q| usage as f64 / q as f64 * 100.0);
        let warning =
            percent_used.is_some_and(|p| p >= PLATFORM_WARNING_THRESHOLD * 100.0);

        if warning {
            let quota = quota.unwrap_or(0);
            tracing::warn!(usage, quota, "platform storage budget nearly exhausted");
            self.bus.emit(&StorageEvent::QuotaWarning {
                usage,
                quota,
                percent_used: percent_used.unwrap_or(100.0),
            });
        }

        Ok(QuotaStatus {
            usage,
            quota,
            percent_used,
            warning,
        })
    }

    /// Selects eviction victims: least-recently-accessed first, ties by
    /// insertion order, until both metrics are at or below their 80%
    /// targets.
    fn eviction_candidates(&self, songs: &[CachedSong]) -> Vec<String> {
        let mut by_age: Vec<&CachedSong> = songs.iter().collect();
        by_age.sort_by(|a, b| {
            a.last_accessed
                .cmp(&b.last_accessed)
                .then_with(|| a.cached_at.cmp(&b.cached_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut count = songs.len() as u64;
        let mut size: u64 = songs.iter().map(|s| s.size_bytes).sum();
        if count <= self.config.max_songs && size <= self.config.max_size_bytes {
            return Vec::new();
        }

        let target_songs = self.config.target_songs();
        let target_size = self.config.target_size_bytes();

        let mut victims = Vec::new();
        for song in by_age {
            if count <= target_songs && size <= target_size {
                break;
            }
            victims.push(song.id.clone());
            count -= 1;
            size = size.saturating_sub(song.size_bytes);
        }
        victims
    }

    fn warn_if_soft_crossed(&self, usage: u64, limit: u64) {
        if limit == 0 {
            return;
        }
        let percent_used = usage as f64 / limit as f64 * 100.0;
        if percent_used >= SOFT_THRESHOLD * 100.0 {
            self.bus.emit(&StorageEvent::QuotaWarning {
                usage,
                quota: limit,
                percent_used,
            });
        }
    }
}

impl std::fmt::Debug for QuotaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
