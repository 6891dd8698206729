//! Error types for flowgate wrappers.

use thiserror::Error;

/// Main error type for flowgate operations.
///
/// Synchronous wrappers (debounce, throttle, memoization) never produce
/// these: failures in the wrapped function propagate to the caller
/// directly. The variants here cover the asynchronous wrappers, where a
/// result is delivered through a deferred channel and the delivery
/// itself can be suppressed or lost.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowgateError {
    /// The operation was canceled before its result was delivered.
    ///
    /// Distinct from a failure of the underlying operation: a canceled
    /// task's settled value (success or failure) is discarded and the
    /// caller sees this variant instead.
    #[error("operation canceled")]
    Canceled,

    /// The executor running a queued invocation went away before the
    /// result could be delivered, e.g. because the runtime shut down.
    #[error("invocation interrupted before a result was produced")]
    Interrupted,
}

/// Result type alias for flowgate operations.
pub type Result<T> = std::result::Result<T, FlowgateError>;
