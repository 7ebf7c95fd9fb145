//! Durable client-side cache for songs and user preferences.
//!
//! The cache stores song documents and a single preference document in a
//! pluggable [`songvault_storage`] backend, keeps the cache within
//! configurable count and size quotas by evicting least-recently-used
//! songs, and reports every state change through an event bus. All
//! operations return structured [`OperationResult`]s with timing and
//! retry bookkeeping.
//!
//! ```no_run
//! use songvault_core::{CacheConfig, CachedSong, SongCache};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = SongCache::open("/tmp/songvault", CacheConfig::default())?;
//! cache.initialize().into_data();
//!
//! let song = CachedSong::new("hymn-001", "Amazing Grace")
//!     .with_artist("John Newton")
//!     .with_lyrics("Amazing grace, how sweet the sound");
//! cache.save_song(&song);
//!
//! let hits = cache.search_songs("grace").into_data().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod clock;
mod config;
mod error;
mod events;
mod executor;
mod metadata;
mod prefs;
mod quota;
mod result;
mod retry;
mod song;
mod store;
mod sync;

pub use cache::{CacheStats, MemoryUsage, RecoveryReport, SongCache, LAYOUT_VERSION};
pub use clock::MonotonicClock;
pub use config::{CacheConfig, QuotaConfig, PLATFORM_WARNING_THRESHOLD, SOFT_THRESHOLD};
pub use error::{CacheError, CacheResult};
pub use events::{ChangeOp, EventBus, EventKind, ListenerHandle, StorageEvent};
pub use executor::OperationExecutor;
pub use metadata::CacheMetadata;
pub use prefs::{
    CacheSettings, CacheSettingsPatch, DisplaySettings, DisplaySettingsPatch, PrefPath, PrefValue,
    PreferenceStore, PreferencesPatch, Theme, UserPreferences, PREFS_SCHEMA_VERSION,
};
pub use quota::{CleanupOptions, CleanupReport, QuotaManager, QuotaStatus};
pub use result::{OperationMetadata, OperationResult};
pub use retry::{RetryPolicy, RetryState};
pub use song::CachedSong;
pub use store::{BatchReport, SongStore};
pub use sync::{MockTransport, RemoteSong, SyncCoordinator, SyncReport, SyncTransport};
