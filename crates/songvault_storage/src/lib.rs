//! # SongVault Storage
//!
//! Storage backend trait and implementations for SongVault.
//!
//! This crate provides the lowest-level persistence abstraction for the
//! cache. Backends are **opaque keyed blob stores** - they do not interpret
//! the documents they hold.
//!
//! ## Design Principles
//!
//! - Backends map string keys to byte blobs (get, put, delete, list)
//! - No knowledge of song records, preferences, or CBOR framing
//! - Must be `Send + Sync` for concurrent access
//! - The core crate owns all document interpretation
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - For testing and ephemeral caches
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use songvault_storage::{StorageBackend, MemoryBackend};
//!
//! let backend = MemoryBackend::new();
//! backend.put("song/1", b"payload").unwrap();
//! let data = backend.get("song/1").unwrap();
//! assert_eq!(data.as_deref(), Some(&b"payload"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
