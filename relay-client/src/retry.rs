//! Retry predicate shared by every gateway call

use std::fmt;
use std::sync::Arc;

use crate::error::ClientError;

/// Decides whether a failed gateway call should be sent again
///
/// The same predicate is handed to the [`GatewayClient`](crate::GatewayClient)
/// and to every job worker built on top of it. Retries happen immediately;
/// the caller bounds them with the per-call timeout.
#[derive(Clone)]
pub struct RetryPredicate {
    inner: Arc<dyn Fn(&ClientError) -> bool + Send + Sync>,
}

impl RetryPredicate {
    /// Wraps an arbitrary decision function
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ClientError) -> bool + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Never retries
    pub fn never() -> Self {
        Self::from_fn(|_| false)
    }

    /// Retries errors classified as [`ClientError::is_transient`]
    pub fn transient() -> Self {
        Self::from_fn(ClientError::is_transient)
    }

    /// Evaluates the predicate for `error`
    pub fn should_retry(&self, error: &ClientError) -> bool {
        (self.inner)(error)
    }
}

impl Default for RetryPredicate {
    fn default() -> Self {
        Self::never()
    }
}

impl fmt::Debug for RetryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPredicate").finish_non_exhaustive()
    }
}
