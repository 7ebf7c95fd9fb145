//! Cached song records.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};

/// A cached domain record: a song plus cache bookkeeping fields.
///
/// Songs are keyed by a caller-supplied stable `id`. Updates have
/// full-replace semantics - a later save overwrites the whole record,
/// no field-level merge.
///
/// # Invariants
///
/// - `id` and `title` are non-empty
/// - `cached_at` is set on first insert and preserved on update
/// - `last_accessed` is refreshed on every read and write, and is never
///   less than `cached_at`
/// - `size_bytes` is the length of the encoded payload, recomputed on
///   every overwrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSong {
    /// Unique, stable record id.
    pub id: String,
    /// Primary display field.
    pub title: String,
    /// Performing or composing artist.
    pub artist: Option<String>,
    /// Searchable lyric/chord text.
    pub lyrics: String,
    /// Musical key, e.g. "C" or "F#m".
    pub key: Option<String>,
    /// Free-form tags, searched alongside the text fields.
    pub tags: Vec<String>,
    /// Epoch milliseconds of first insert.
    pub cached_at: u64,
    /// Epoch milliseconds of the most recent read or write.
    pub last_accessed: u64,
    /// Size of the encoded payload in bytes.
    pub size_bytes: u64,
}

impl CachedSong {
    /// Creates a song with the given id and title and empty domain fields.
    ///
    /// Cache bookkeeping fields start at zero; the store fills them in
    /// at save time.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            lyrics: String::new(),
            key: None,
            tags: Vec::new(),
            cached_at: 0,
            last_accessed: 0,
            size_bytes: 0,
        }
    }

    /// Sets the artist.
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Sets the lyrics.
    #[must_use]
    pub fn with_lyrics(mut self, lyrics: impl Into<String>) -> Self {
        self.lyrics = lyrics.into();
        self
    }

    /// Sets the musical key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Validates caller-supplied fields.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the id or title is empty.
    pub fn validate(&self) -> CacheResult<()> {
        if self.id.trim().is_empty() {
            return Err(CacheError::validation("song id must not be empty"));
        }
        if self.title.trim().is_empty() {
            return Err(CacheError::validation("song title must not be empty"));
        }
        Ok(())
    }

    /// Checks that a decoded record satisfies the stored shape.
    ///
    /// # Errors
    ///
    /// Returns `CorruptedData` for records that decoded structurally but
    /// violate record invariants (empty required fields, impossible
    /// timestamps).
    pub fn check_shape(&self) -> CacheResult<()> {
        if self.id.trim().is_empty() {
            return Err(CacheError::corrupted("stored song has an empty id"));
        }
        if self.title.trim().is_empty() {
            return Err(CacheError::corrupted(format!(
                "stored song {} is missing its title",
                self.id
            )));
        }
        if self.last_accessed < self.cached_at {
            return Err(CacheError::corrupted(format!(
                "stored song {} has last_accessed before cached_at",
                self.id
            )));
        }
        Ok(())
    }

    /// Encodes the record as CBOR.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if encoding fails.
    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }

    /// Returns the size charged against the cache budget: the encoded
    /// length of the domain payload, with bookkeeping fields zeroed so the
    /// value is stable across reads.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if encoding fails.
    pub fn encoded_payload_size(&self) -> CacheResult<u64> {
        let mut stripped = self.clone();
        stripped.cached_at = 0;
        stripped.last_accessed = 0;
        stripped.size_bytes = 0;
        Ok(stripped.encode()?.len() as u64)
    }

    /// Decodes a record from CBOR and checks its shape.
    ///
    /// # Errors
    ///
    /// Returns `CorruptedData` if the bytes do not decode to a valid
    /// record.
    pub fn decode(bytes: &[u8]) -> CacheResult<Self> {
        let song: Self = ciborium::from_reader(bytes)?;
        song.check_shape()?;
        Ok(song)
    }

    /// Returns whether the song matches a case-insensitive substring
    /// query over title, artist, lyrics, and tags.
    ///
    /// The caller passes the query already lowercased so a scan over many
    /// records lowercases it once.
    #[must_use]
    pub fn matches_query(&self, query_lower: &str) -> bool {
        if query_lower.is_empty() {
            return true;
        }
        if self.title.to_lowercase().contains(query_lower) {
            return true;
        }
        if let Some(artist) = &self.artist {
            if artist.to_lowercase().contains(query_lower) {
                return true;
            }
        }
        if self.lyrics.to_lowercase().contains(query_lower) {
            return true;
        }
        self.tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(query_lower))
    }
}
