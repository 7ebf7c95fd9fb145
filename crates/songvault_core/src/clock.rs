//! Monotonic wall-clock timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A wall clock that never repeats or goes backwards.
///
/// Cache bookkeeping (`cached_at`, `last_accessed`) orders records by
/// timestamp, so two operations in the same millisecond must still get
/// distinct values. The clock returns the wall time in epoch milliseconds,
/// bumped past the previously issued value when necessary.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicU64,
}

impl MonotonicClock {
    /// Creates a new clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current time in epoch milliseconds, strictly greater
    /// than any previously returned value.
    pub fn now_millis(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(observed) => prev = observed,
            }
        }
    }
}
