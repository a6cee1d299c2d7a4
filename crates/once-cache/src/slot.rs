use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::Shared;

use crate::{CacheEntry, CacheError};

/// The result cell for one key: a computation that is either still in flight
/// or has reached its terminal outcome.
///
/// A slot is resolved exactly once, through its [`SlotWriter`], and never
/// transitions out of a terminal state. Any number of readers may hold a
/// clone and [`wait`](Slot::wait) on it; resolution wakes them all with the
/// identical outcome.
pub struct Slot<V> {
    channel: Shared<oneshot::Receiver<CacheEntry<V>>>,
}

impl<V> Clone for Slot<V> {
    fn clone(&self) -> Self {
        Slot {
            channel: self.channel.clone(),
        }
    }
}

impl<V: Clone> Slot<V> {
    /// Creates a pending slot together with the writer that will resolve it.
    pub(crate) fn new() -> (Slot<V>, SlotWriter<V>) {
        let (sender, receiver) = oneshot::channel();
        let slot = Slot {
            channel: receiver.shared(),
        };
        (slot, SlotWriter { sender })
    }

    /// Waits until the slot reaches a terminal state and returns the outcome.
    ///
    /// Returns immediately if the slot is already resolved. A slot whose
    /// writer went away without resolving yields [`CacheError::Interrupted`].
    pub(crate) async fn wait(&self) -> CacheEntry<V> {
        match self.channel.clone().await {
            Ok(entry) => entry,
            Err(oneshot::Canceled) => Err(CacheError::Interrupted),
        }
    }

    /// Returns the terminal outcome without waiting, or `None` while the
    /// computation is still in flight.
    pub(crate) fn peek(&self) -> Option<CacheEntry<V>> {
        self.channel
            .clone()
            .now_or_never()
            .map(|outcome| outcome.unwrap_or(Err(CacheError::Interrupted)))
    }

    /// Whether `self` and `other` are handles to the same underlying cell.
    pub(crate) fn is_same(&self, other: &Slot<V>) -> bool {
        self.channel.ptr_eq(&other.channel)
    }
}

/// The resolving half of a [`Slot`].
///
/// There is exactly one writer per slot, and resolving consumes it: the
/// transition into a terminal state can only happen once.
pub(crate) struct SlotWriter<V> {
    sender: oneshot::Sender<CacheEntry<V>>,
}

impl<V> SlotWriter<V> {
    /// Resolves the slot with a successfully computed value.
    pub(crate) fn resolve(self, value: V) {
        self.send(Ok(value));
    }

    /// Resolves the slot with the failure of its computation.
    pub(crate) fn resolve_err(self, err: CacheError) {
        self.send(Err(err));
    }

    fn send(self, entry: CacheEntry<V>) {
        // Sending only fails when every reader is already gone, in which
        // case nobody is left to observe the outcome.
        self.sender.send(entry).ok();
    }
}

#[cfg(test)]
mod tests {
    use crate::testutils;

    use super::*;

    #[tokio::test]
    async fn all_waiters_observe_the_resolution() {
        testutils::setup();

        let (slot, writer) = Slot::new();
        let early = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.wait().await })
        };
        // let the early waiter park on the pending slot
        tokio::task::yield_now().await;

        writer.resolve(42);

        assert_eq!(early.await.unwrap(), Ok(42));
        assert_eq!(slot.wait().await, Ok(42));
        assert_eq!(slot.peek(), Some(Ok(42)));
    }

    #[tokio::test]
    async fn a_failure_reaches_every_waiter() {
        testutils::setup();

        let (slot, writer) = Slot::<u32>::new();
        writer.resolve_err(CacheError::computation("boom"));

        assert_eq!(slot.wait().await, Err(CacheError::Computation("boom".into())));
        assert_eq!(
            slot.clone().wait().await,
            Err(CacheError::Computation("boom".into()))
        );
    }

    #[test]
    fn peek_does_not_wait() {
        let (slot, writer) = Slot::<u32>::new();
        assert_eq!(slot.peek(), None);

        writer.resolve(1);
        assert_eq!(slot.peek(), Some(Ok(1)));
    }

    #[tokio::test]
    async fn a_dropped_writer_interrupts_waiters() {
        testutils::setup();

        let (slot, writer) = Slot::<u32>::new();
        drop(writer);

        assert_eq!(slot.wait().await, Err(CacheError::Interrupted));
        assert_eq!(slot.peek(), Some(Err(CacheError::Interrupted)));
    }

    #[test]
    fn identity_tracks_the_cell_not_the_contents() {
        let (a, _writer_a) = Slot::<u32>::new();
        let (b, _writer_b) = Slot::<u32>::new();

        assert!(a.is_same(&a.clone()));
        assert!(!a.is_same(&b));
    }
}
