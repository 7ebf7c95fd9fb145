//! Aggregate cache metadata.

use crate::error::CacheResult;
use crate::song::CachedSong;
use serde::{Deserialize, Serialize};

/// Derived aggregate over the live song set.
///
/// Not independently authoritative: it is recomputed from the stored songs
/// after every mutating batch and persisted for fast reads. Between a write
/// and its recompute it may lag the truth by at most that one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Number of live songs.
    pub total_songs: u64,
    /// Sum of `size_bytes` over live songs.
    pub total_size_bytes: u64,
    /// Epoch milliseconds of the most recent cleanup pass, if any.
    pub last_cleanup_at: Option<u64>,
}

impl CacheMetadata {
    /// Recomputes the aggregate from a snapshot of the live song set,
    /// carrying over the last cleanup timestamp.
    #[must_use]
    pub fn recompute<'a>(
        songs: impl IntoIterator<Item = &'a CachedSong>,
        last_cleanup_at: Option<u64>,
    ) -> Self {
        let mut total_songs = 0;
        let mut total_size_bytes = 0;
        for song in songs {
            total_songs += 1;
            total_size_bytes += song.size_bytes;
        }
        Self {
            total_songs,
            total_size_bytes,
            last_cleanup_at,
        }
    }

    /// Encodes the metadata document as CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }

    /// Decodes a metadata document from CBOR.
    ///
    /// # Errors
    ///
    /// Returns `CorruptedData` if the bytes do not decode.
    pub fn decode(bytes: &[u8]) -> CacheResult<Self> {
        Ok(ciborium::from_reader(bytes)?)
    }
}
