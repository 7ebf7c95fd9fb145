//! Bounded retry with exponential backoff.
//!
//! The retry schedule is an explicit finite-state policy, independent of
//! the operation being wrapped:
//!
//! ```text
//! Attempting(n) ── success ──▶ Succeeded { attempts }
//!      │
//!      ├─ transient failure, n < max ──▶ Attempting(n + 1)   (after backoff)
//!      ├─ transient failure, n = max ──▶ Exhausted { attempts }
//!      └─ permanent failure ──────────▶ Exhausted { attempts }
//! ```

use crate::error::CacheError;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay between consecutive retries.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the backoff delay before the given retry (1-indexed;
    /// attempt 0 is the initial try and has no delay).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4)
    }
}

/// The state of one retryable invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// An attempt is in flight (0-indexed).
    Attempting {
        /// The attempt number, starting at zero.
        attempt: u32,
    },
    /// The operation succeeded.
    Succeeded {
        /// Total attempts made.
        attempts: u32,
    },
    /// The budget is exhausted or the failure was permanent.
    Exhausted {
        /// Total attempts made.
        attempts: u32,
    },
}

impl RetryState {
    /// The starting state.
    #[must_use]
    pub fn start() -> Self {
        Self::Attempting { attempt: 0 }
    }

    /// Advances the state after an attempt's outcome.
    ///
    /// Permanent failures and exhausted budgets both transition to
    /// `Exhausted`; the caller distinguishes them by the error in hand.
    #[must_use]
    pub fn advance(self, outcome: &Result<(), &CacheError>, policy: &RetryPolicy) -> Self {
        let Self::Attempting { attempt } = self else {
            return self;
        };
        match outcome {
            Ok(()) => Self::Succeeded {
                attempts: attempt + 1,
            },
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                Self::Attempting {
                    attempt: attempt + 1,
                }
            }
            Err(_) => Self::Exhausted {
                attempts: attempt + 1,
            },
        }
    }
}

/// Runs `op` under the policy, sleeping between attempts.
///
/// Returns the final value (or final error, mapped to `MaxRetriesExceeded`
/// when the budget ran out on a transient failure) along with the number
/// of retries that preceded it.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut op: F) -> (Result<T, CacheError>, u32)
where
    F: FnMut() -> Result<T, CacheError>,
{
    let mut state = RetryState::start();
    loop {
        let RetryState::Attempting { attempt } = state else {
            unreachable!("loop exits before terminal states are re-entered");
        };

        if attempt > 0 {
            std::thread::sleep(policy.delay_for_attempt(attempt));
        }

        match op() {
            Ok(value) => return (Ok(value), attempt),
            Err(e) => {
                state = RetryState::Attempting { attempt }.advance(&Err(&e), policy);
                match state {
                    RetryState::Attempting { .. } => {
                        tracing::debug!(attempt, error = %e, "retrying after transient failure");
                    }
                    RetryState::Exhausted { attempts } => {
                        let err = if e.is_retryable() {
                            CacheError::MaxRetriesExceeded {
                                attempts,
                                last_error: e.to_string(),
                            }
                        } else {
                            e
                        };
                        return (Err(err), attempt);
                    }
                    RetryState::Succeeded { .. } => unreachable!("errors never succeed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
    }

    #[test]
    fn delay_grows_exponentially_up_to_max() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350))
            .with_backoff_multiplier(2.0);

        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(350));
    }

    #[test]
    fn state_machine_transitions() {
        let policy = fast_policy(3);
        let transient = CacheError::transient("io");
        let permanent = CacheError::validation("bad");

        let state = RetryState::start();
        let state = state.advance(&Err(&transient), &policy);
        assert_eq!(state, RetryState::Attempting { attempt: 1 });

        let state = state.advance(&Ok(()), &policy);
        assert_eq!(state, RetryState::Succeeded { attempts: 2 });

        let state = RetryState::start().advance(&Err(&permanent), &policy);
        assert_eq!(state, RetryState::Exhausted { attempts: 1 });

        // Terminal states are absorbing.
        assert_eq!(
            state.clone().advance(&Err(&transient), &policy),
            state
        );
    }

    #[test]
    fn first_success_short_circuits() {
        let mut calls = 0;
        let (result, retries) = run_with_retry(&fast_policy(5), || {
            calls += 1;
            Ok::<_, CacheError>(7)
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(retries, 0);
        assert_eq!(calls, 1);
    }

    #[test]
    fn transient_failures_then_success() {
        let mut calls = 0;
        let (result, retries) = run_with_retry(&fast_policy(5), || {
            calls += 1;
            if calls <= 3 {
                Err(CacheError::transient("flaky"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 4);
        assert_eq!(retries, 3);
    }

    #[test]
    fn budget_exhaustion_maps_to_max_retries() {
        let mut calls = 0;
        let (result, _) = run_with_retry(&fast_policy(3), || -> Result<(), CacheError> {
            calls += 1;
            Err(CacheError::transient("down"))
        });
        assert_eq!(calls, 3);
        match result.unwrap_err() {
            CacheError::MaxRetriesExceeded { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let mut calls = 0;
        let (result, retries) = run_with_retry(&fast_policy(5), || -> Result<(), CacheError> {
            calls += 1;
            Err(CacheError::validation("empty id"))
        });
        assert_eq!(calls, 1);
        assert_eq!(retries, 0);
        assert!(matches!(
            result.unwrap_err(),
            CacheError::Validation { .. }
        ));
    }

    #[test]
    fn lock_conflicts_surface_immediately() {
        let mut calls = 0;
        let (result, _) = run_with_retry(&fast_policy(5), || -> Result<(), CacheError> {
            calls += 1;
            Err(CacheError::LockConflict)
        });
        assert_eq!(calls, 1);
        assert!(matches!(result.unwrap_err(), CacheError::LockConflict));
    }
}
