//! Cache configuration.

use crate::retry::RetryPolicy;
use std::time::Duration;

/// Fraction of a limit that triggers a quota warning, and the level
/// eviction drains back down to (hysteresis against boundary thrashing).
pub const SOFT_THRESHOLD: f64 = 0.8;

/// Fraction of the platform budget that makes `check_storage_quota`
/// advisory warnings fire.
pub const PLATFORM_WARNING_THRESHOLD: f64 = 0.9;

/// Bounds on the cached song set.
///
/// Two symmetric limits apply: a maximum record count and a maximum
/// aggregate payload size. Crossing 80% of either emits a warning;
/// crossing 100% triggers eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    /// Maximum number of cached songs.
    pub max_songs: u64,
    /// Maximum aggregate `size_bytes` across cached songs.
    pub max_size_bytes: u64,
}

impl QuotaConfig {
    /// Creates a quota configuration.
    #[must_use]
    pub const fn new(max_songs: u64, max_size_bytes: u64) -> Self {
        Self {
            max_songs,
            max_size_bytes,
        }
    }

    /// The song count eviction drains down to.
    #[must_use]
    pub fn target_songs(&self) -> u64 {
        (self.max_songs as f64 * SOFT_THRESHOLD).floor() as u64
    }

    /// The aggregate size eviction drains down to.
    #[must_use]
    pub fn target_size_bytes(&self) -> u64 {
        (self.max_size_bytes as f64 * SOFT_THRESHOLD).floor() as u64
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_songs: 500,
            max_size_bytes: 50 * 1024 * 1024, // 50 MB
        }
    }
}

/// Configuration for opening a cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Bounds on the cached song set.
    pub quota: QuotaConfig,
    /// Retry schedule for mutating operations.
    pub retry: RetryPolicy,
    /// Operations at or above this duration emit `SlowOperation`.
    pub slow_op_threshold: Duration,
}

impl CacheConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quota limits.
    #[must_use]
    pub fn with_quota(mut self, quota: QuotaConfig) -> Self {
        self.quota = quota;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the slow-operation threshold.
    #[must_use]
    pub fn with_slow_op_threshold(mut self, threshold: Duration) -> Self {
        self.slow_op_threshold = threshold;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            quota: QuotaConfig::default(),
            retry: RetryPolicy::default(),
            slow_op_threshold: Duration::from_millis(500),
        }
    }
}
