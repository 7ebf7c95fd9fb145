//! Operation executor: retry, timing, and structured results.

use crate::error::CacheError;
use crate::events::{EventBus, StorageEvent};
use crate::result::{OperationMetadata, OperationResult};
use crate::retry::{run_with_retry, RetryPolicy};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wraps cache operations with bounded retry, wall-clock timing, and
/// structured result reporting.
///
/// Every invocation:
/// - retries transient failures up to the policy's attempt budget with
///   exponential backoff, short-circuiting on the first success
/// - records the total duration; crossing the slow-operation threshold
///   emits `SlowOperation` regardless of outcome
/// - emits `Error` for failures and wraps everything as an
///   [`OperationResult`], so callers never need exception-style control
///   flow
pub struct OperationExecutor {
    policy: RetryPolicy,
    slow_threshold: Duration,
    bus: Arc<EventBus>,
}

impl OperationExecutor {
    /// Creates an executor.
    pub fn new(policy: RetryPolicy, slow_threshold: Duration, bus: Arc<EventBus>) -> Self {
        Self {
            policy,
            slow_threshold,
            bus,
        }
    }

    /// Runs `op` under the retry policy and wraps the outcome.
    pub fn execute<T, F>(&self, operation: &str, op: F) -> OperationResult<T>
    where
        F: FnMut() -> Result<T, CacheError>,
    {
        let started = Instant::now();
        let (outcome, retries) = run_with_retry(&self.policy, op);
        let duration = started.elapsed();

        if duration >= self.slow_threshold {
            tracing::warn!(operation, ?duration, "slow operation");
            self.bus.emit(&StorageEvent::SlowOperation {
                operation: operation.to_string(),
                duration,
            });
        }

        let metadata = OperationMetadata { duration, retries };
        match outcome {
            Ok(data) => OperationResult::ok(data, metadata),
            Err(e) => {
                self.bus.emit(&StorageEvent::Error {
                    operation: operation.to_string(),
                    message: e.to_string(),
                });
                OperationResult::fail(&e, Some(metadata))
            }
        }
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl std::fmt::Debug for OperationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationExecutor")
            .field("policy", &self.policy)
            .field("slow_threshold", &self.slow_threshold)
            .finish_non_exhaustive()
    }
}
