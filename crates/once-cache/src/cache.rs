use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::CacheEntry;
use crate::slot::{Slot, SlotWriter};
use crate::utils::CallOnDrop;

/// The map of live slots, shared between all handles of one cache.
type SlotMap<K, V> = Arc<Mutex<HashMap<K, Slot<V>>>>;

/// A concurrent memoizing cache with a compute-once guarantee.
///
/// For any key, at most one computation is ever in flight: the first caller
/// to claim an absent key runs the computation, and all concurrent callers
/// for that key wait on the same slot and receive the identical outcome,
/// value or failure. Callers for different keys never wait on each other.
///
/// Failures are not sticky. A computation that fails (or is abandoned before
/// resolving) hands the error to every waiter and evicts the key, so the
/// next lookup computes from scratch.
///
/// Cloning is cheap and produces another handle to the same cache.
pub struct OnceCache<K, V> {
    slots: SlotMap<K, V>,
}

impl<K, V> OnceCache<K, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        OnceCache {
            slots: Default::default(),
        }
    }
}

impl<K, V> Default for OnceCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for OnceCache<K, V> {
    fn clone(&self) -> Self {
        // https://github.com/rust-lang/rust/issues/26925
        OnceCache {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<K, V> fmt::Debug for OnceCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceCache")
            .field("entries", &self.slots.lock().len())
            .finish()
    }
}

/// The role a caller ends up with after the insert-if-absent race.
enum Claim<V> {
    /// A slot already exists, resolved or still in flight; reuse it.
    Existing(Slot<V>),
    /// The caller installed a fresh pending slot and owns its resolution.
    Won(Slot<V>, SlotWriter<V>),
}

impl<K, V> OnceCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Runs the insert-if-absent race for `key`.
    fn claim(&self, key: K) -> Claim<V> {
        match self.slots.lock().entry(key) {
            Entry::Occupied(entry) => Claim::Existing(entry.get().clone()),
            Entry::Vacant(entry) => {
                let (slot, writer) = Slot::new();
                entry.insert(slot.clone());
                Claim::Won(slot, writer)
            }
        }
    }

    /// Removes `key` only if it still maps to the exact `slot`.
    ///
    /// Cleanup can race with a retry that has already installed a fresh slot
    /// under the same key; that slot must survive.
    fn evict(&self, key: &K, slot: &Slot<V>) {
        let mut slots = self.slots.lock();
        if slots.get(key).is_some_and(|current| current.is_same(slot)) {
            slots.remove(key);
            tracing::debug!("evicted a slot that did not resolve to a value");
        }
    }

    /// Runs the claimed computation and publishes its outcome.
    ///
    /// The returned slot is resolved by the time this returns. If the caller
    /// is dropped mid-computation, or `compute` panics, the pending slot is
    /// evicted so waiters observe an interrupted computation instead of
    /// hanging on it.
    async fn run_claimed<F, Fut>(
        &self,
        key: &K,
        slot: Slot<V>,
        writer: SlotWriter<V>,
        compute: F,
    ) -> Slot<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheEntry<V>>,
    {
        let eviction_token = CallOnDrop::new(|| {
            if !matches!(slot.peek(), Some(Ok(_))) {
                self.evict(key, &slot);
            }
        });

        let outcome = compute().await;
        match outcome {
            Ok(value) => writer.resolve(value),
            Err(err) => writer.resolve_err(err),
        }
        // The token runs after the slot is resolved: it keeps successful
        // results and evicts everything else.
        drop(eviction_token);

        slot
    }

    /// Returns the value for `key`, computing it if no slot exists yet.
    ///
    /// The first caller to observe `key` as absent claims it and runs
    /// `compute` within its own call; everyone else, including callers that
    /// arrive while the computation is in flight, waits on the claimed slot.
    /// `compute` runs at most once per claim, and every caller receives the
    /// identical resolved value or identical failure.
    ///
    /// A failed computation is handed to all waiters and the key is evicted,
    /// so a subsequent call retries from scratch. If `compute` panics, the
    /// panic propagates to the claiming caller and the pending entry is
    /// discarded; concurrent waiters observe
    /// [`Interrupted`](crate::CacheError::Interrupted).
    ///
    /// `compute` must not look up its own key on the same cache; it would
    /// wait on itself.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> CacheEntry<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheEntry<V>>,
    {
        let slot = match self.claim(key.clone()) {
            Claim::Existing(slot) => {
                // A concurrent lookup was coalesced. This does not imply the
                // value is resolved yet.
                tracing::trace!("coalescing onto an existing slot");
                slot
            }
            Claim::Won(slot, writer) => {
                tracing::trace!("claimed the computation");
                self.run_claimed(&key, slot, writer, compute).await
            }
        };

        let outcome = slot.wait().await;
        if outcome.is_err() {
            self.evict(&key, &slot);
        }
        outcome
    }

    /// Returns the value for `key` if a slot is present, without ever
    /// triggering a computation.
    ///
    /// A key whose computation is still in flight waits for it to resolve,
    /// exactly like [`get_or_compute`](OnceCache::get_or_compute). An absent
    /// key returns `Ok(None)` and leaves the cache untouched.
    pub async fn get(&self, key: &K) -> CacheEntry<Option<V>> {
        let Some(slot) = self.slots.lock().get(key).cloned() else {
            return Ok(None);
        };

        match slot.wait().await {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.evict(key, &slot);
                Err(err)
            }
        }
    }

    /// Seeds `key` with an already-computed value.
    ///
    /// This goes through the same insert-if-absent claim as
    /// [`get_or_compute`](OnceCache::get_or_compute): if any slot for `key`
    /// exists, resolved or still in flight, that slot wins and `value` is
    /// discarded. `put` is a best-effort seed, not a force-overwrite.
    pub fn put(&self, key: K, value: V) {
        if let Claim::Won(_, writer) = self.claim(key) {
            writer.resolve(value);
        }
    }

    /// Removes the mapping for `key` and returns its value.
    ///
    /// A still-pending computation is waited for first, so its result is
    /// handed to the remover. A computation that failed or was abandoned is
    /// logged and reported as `None` rather than propagated; this is the one
    /// place where failures are deliberately swallowed.
    pub async fn remove(&self, key: &K) -> Option<V> {
        let slot = self.slots.lock().remove(key)?;

        match slot.wait().await {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!(
                    error = &err as &dyn std::error::Error,
                    "removed a slot that did not resolve to a value",
                );
                None
            }
        }
    }

    /// Removes the mapping for `key` only if its resolved value equals
    /// `expected`, and returns whether a removal happened.
    ///
    /// A pending slot cannot equal any value, so in-flight computations are
    /// left alone; failed slots never match either. This never waits.
    pub fn remove_if_matches(&self, key: &K, expected: &V) -> bool
    where
        V: PartialEq,
    {
        let mut slots = self.slots.lock();
        let matches = slots
            .get(key)
            .and_then(Slot::peek)
            .is_some_and(|entry| entry.as_ref() == Ok(expected));
        if matches {
            slots.remove(key);
        }
        matches
    }
}
