//! A concurrent memoizing cache with a compute-once guarantee.
//!
//! [`OnceCache`] is a keyed store that collapses concurrent requests for an
//! absent key into a single computation: no matter how many callers ask for
//! the same key at the same time, the supplied computation runs at most
//! once, and every caller observes the identical outcome, value or failure.
//!
//! ## How coalescing works
//!
//! Each key maps to a slot: a write-once cell that is either still being
//! computed or holds the terminal outcome. The first caller to install a
//! slot for its key — the claim winner — runs the computation inline and
//! resolves the slot; everyone else finds the existing slot and waits on it.
//! The insert-if-absent race on the backing map is the only point of mutual
//! exclusion, so callers for different keys never contend beyond map
//! bookkeeping.
//!
//! Failures are not sticky: a computation that fails (or is abandoned
//! mid-flight) resolves its waiters with the error and evicts the key, so
//! the next lookup starts a fresh computation.
//!
//! There is deliberately no eviction policy, expiry, or size bound here;
//! this is a coordination layer, not a memory-pressure cache.

#![warn(missing_docs)]

mod cache;
mod error;
mod slot;
mod utils;

pub use cache::OnceCache;
pub use error::{CacheEntry, CacheError};

#[cfg(test)]
pub(crate) mod testutils {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt::fmt;

    /// Sets up the test environment, capturing logs into the test runner.
    pub(crate) fn setup() {
        fmt()
            .with_env_filter(EnvFilter::new("once_cache=trace"))
            .with_target(false)
            .pretty()
            .with_test_writer()
            .try_init()
            .ok();
    }
}
