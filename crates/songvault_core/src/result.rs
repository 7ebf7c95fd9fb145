//! Structured operation results.
//!
//! Every public cache operation returns an [`OperationResult`] instead of
//! raising: failures are data the caller can inspect, log, or surface.

use crate::error::CacheError;
use std::time::Duration;

/// Performance metadata attached to an operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationMetadata {
    /// Wall-clock duration of the whole invocation, retries included.
    pub duration: Duration,
    /// Number of retry attempts that preceded the final outcome.
    ///
    /// Zero for first-attempt successes and for non-retryable failures.
    pub retries: u32,
}

/// The outcome of a cache operation.
///
/// Callers own the returned value: each read hands back a snapshot, so a
/// caller mutating `data` cannot corrupt stored state.
#[derive(Debug, Clone)]
pub struct OperationResult<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The produced value, present on success.
    pub data: Option<T>,
    /// A descriptive error message, present on failure.
    pub error: Option<String>,
    /// Performance timing. Executed operations always carry it, failures
    /// included; only results built outside the executor leave it unset.
    pub metadata: Option<OperationMetadata>,
}

impl<T> OperationResult<T> {
    /// Creates a successful result.
    pub fn ok(data: T, metadata: OperationMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: Some(metadata),
        }
    }

    /// Creates a failed result from an error.
    pub fn fail(error: &CacheError, metadata: Option<OperationMetadata>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            metadata,
        }
    }

    /// Creates a failed result from a plain message.
    pub fn fail_with_message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            metadata: None,
        }
    }

    /// Consumes the result, returning the data if successful.
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the number of retries recorded, zero if no metadata.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.metadata.map(|m| m.retries).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_result_carries_data() {
        let result = OperationResult::ok(42, OperationMetadata::default());
        assert!(result.success);
        assert_eq!(result.into_data(), Some(42));
    }

    #[test]
    fn failed_result_carries_message() {
        let err = CacheError::not_found("abc");
        let result: OperationResult<()> = OperationResult::fail(&err, None);
        assert!(!result.success);
        assert!(result.error_message().unwrap().contains("abc"));
        assert!(result.metadata.is_none());
    }

    #[test]
    fn retries_default_to_zero() {
        let result: OperationResult<()> = OperationResult::fail_with_message("nope");
        assert_eq!(result.retries(), 0);
    }
}
