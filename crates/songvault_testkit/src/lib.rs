//! # SongVault Testkit
//!
//! Test utilities for SongVault.
//!
//! This crate provides:
//! - Cache fixtures with automatic cleanup
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use songvault_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_cache() {
//!     with_temp_cache(|cache| {
//!         cache.save_song(&sample_song("hymn-001"));
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
