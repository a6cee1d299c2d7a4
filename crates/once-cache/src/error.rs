use std::io;

use thiserror::Error;

/// An error produced while computing or waiting for a cached value.
///
/// The outcome of a computation is fanned out to every caller waiting on the
/// same key, so this type is cheap to clone and carries owned payloads only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The computation claimed for this key failed.
    ///
    /// The attached string contains the failure description. The key is
    /// evicted along with the failure, so a later lookup starts a fresh
    /// computation instead of observing a poisoned entry.
    #[error("computation failed: {0}")]
    Computation(String),
    /// The computation claimed for this key was abandoned before it resolved.
    ///
    /// Waiters observe this when the claim winner goes away mid-computation,
    /// for example because its task was cancelled.
    #[error("computation was interrupted")]
    Interrupted,
    /// An unexpected error in the cache itself.
    ///
    /// This variant carries no details; those go to the log where the error
    /// is converted.
    #[error("internal error")]
    InternalError,
}

impl From<io::Error> for CacheError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        Self::from_std_error(err)
    }
}

impl CacheError {
    /// Creates a [`CacheError::Computation`] from any displayable failure.
    pub fn computation(err: impl std::fmt::Display) -> Self {
        Self::Computation(err.to_string())
    }

    /// Funnels an arbitrary error into an opaque [`CacheError::InternalError`].
    #[track_caller]
    pub fn from_std_error<E: std::error::Error + 'static>(e: E) -> Self {
        let dynerr: &dyn std::error::Error = &e; // tracing expects a `&dyn Error`
        tracing::error!(error = dynerr);
        Self::InternalError
    }
}

/// The outcome of a cached computation, either `Ok(T)` or the error
/// explaining why no value is available.
pub type CacheEntry<T = ()> = Result<T, CacheError>;
