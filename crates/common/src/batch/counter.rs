//! Completion counting
//!
//! The counting core shared by both aggregators. The counter owns the result
//! store while operations are outstanding and moves it into the
//! [`Completion`] the moment the pending count reaches zero, so a completed
//! batch cannot be written to again.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use tracing::trace;

use super::outcomes::Outcomes;

/// Counts outstanding operations and signals completion exactly once
///
/// Accounting mistakes are programming errors, not runtime faults: settling
/// more operations than were registered, or touching a counter after it has
/// completed, panics.
pub struct CompletionCounter<S> {
    /// Operations registered but not yet settled
    pending: usize,
    /// Total operations ever registered
    registered: usize,
    /// Result store, present until completion
    store: Option<S>,
    /// Terminal signal, consumed on completion
    signal: Option<oneshot::Sender<S>>,
}

impl<S> CompletionCounter<S> {
    /// Create a counter around an empty result store
    ///
    /// Returns the counter together with the [`Completion`] that resolves to
    /// the store once every registered operation has settled.
    pub fn new(store: S) -> (Self, Completion<S>) {
        let (tx, rx) = oneshot::channel();
        let counter = Self {
            pending: 0,
            registered: 0,
            store: Some(store),
            signal: Some(tx),
        };
        (counter, Completion { rx })
    }

    /// Register `n` more outstanding operations
    ///
    /// # Panics
    ///
    /// Panics if the counter has already completed.
    pub fn register(&mut self, n: usize) {
        if self.is_complete() {
            panic!("register({n}) on a completed batch counter");
        }
        self.pending += n;
        self.registered += n;
        trace!(
            added = n,
            pending = self.pending,
            registered = self.registered,
            "Registered batch operations"
        );
    }

    /// Mark `n` outstanding operations as settled
    ///
    /// Fires the completion when the pending count transitions to zero.
    /// `settle(0)` is a no-op.
    ///
    /// # Panics
    ///
    /// Panics on double settlement (more settled than registered) and on a
    /// counter that has already completed.
    pub fn settle(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        if self.is_complete() {
            panic!("settle({n}) on a completed batch counter");
        }
        self.pending = match self.pending.checked_sub(n) {
            Some(pending) => pending,
            None => panic!(
                "batch counter underflow: settling {n} with only {} pending",
                self.pending
            ),
        };
        trace!(settled = n, pending = self.pending, "Settled batch operations");

        if self.pending == 0 {
            self.fire();
        }
    }

    /// Record one operation's outcome in the store and settle it
    pub fn settle_with(&mut self, key: S::Key, outcome: Result<S::Value, S::Error>)
    where
        S: Outcomes,
    {
        match self.store.as_mut() {
            Some(store) => store.record(key, outcome),
            None => panic!("outcome recorded on a completed batch counter"),
        }
        self.settle(1);
    }

    /// Operations still outstanding
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Operations registered over the counter's lifetime
    pub fn registered(&self) -> usize {
        self.registered
    }

    /// Whether the completion has fired
    pub fn is_complete(&self) -> bool {
        self.signal.is_none()
    }

    fn fire(&mut self) {
        let (Some(signal), Some(store)) = (self.signal.take(), self.store.take()) else {
            return;
        };
        trace!(registered = self.registered, "Batch complete");
        if signal.send(store).is_err() {
            trace!("Batch completion dropped before it was awaited");
        }
    }
}

impl<S> std::fmt::Debug for CompletionCounter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCounter")
            .field("pending", &self.pending)
            .field("registered", &self.registered)
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Resolves to the result store when its counter completes
///
/// A counter dropped while operations are still pending is broken
/// accounting; awaiting its completion panics rather than waiting forever.
#[derive(Debug)]
pub struct Completion<S> {
    rx: oneshot::Receiver<S>,
}

impl<S> Completion<S> {
    /// Take the results if the counter has already completed
    pub fn try_take(&mut self) -> Option<S> {
        self.rx.try_recv().ok().flatten()
    }
}

impl<S> Future for Completion<S> {
    type Output = S;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<S> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(store)) => Poll::Ready(store),
            Poll::Ready(Err(_)) => panic!("batch counter dropped with operations still pending"),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ListResults;
    use proptest::prelude::*;

    type Results = ListResults<u32, String>;

    #[test]
    fn test_fires_when_pending_reaches_zero() {
        let (mut counter, mut completion) = CompletionCounter::new(Results::default());

        counter.register(2);
        counter.settle_with((), Ok(1));
        assert!(!counter.is_complete());
        assert!(completion.try_take().is_none());

        counter.settle_with((), Err("boom".to_string()));
        assert!(counter.is_complete());

        let results = completion.try_take().unwrap();
        assert_eq!(results.values, vec![1]);
        assert_eq!(results.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn test_register_without_settle_never_fires() {
        let (mut counter, mut completion) = CompletionCounter::new(Results::default());
        counter.register(0);
        counter.settle(0);
        assert!(!counter.is_complete());
        assert!(completion.try_take().is_none());
    }

    #[test]
    fn test_bulk_register_and_settle() {
        let (mut counter, mut completion) = CompletionCounter::new(Results::default());
        counter.register(3);
        counter.register(2);
        counter.settle(4);
        assert_eq!(counter.pending(), 1);
        counter.settle(1);
        assert_eq!(counter.registered(), 5);
        assert!(completion.try_take().is_some());
    }

    #[test]
    #[should_panic(expected = "batch counter underflow")]
    fn test_double_settlement_panics() {
        let (mut counter, _completion) = CompletionCounter::new(Results::default());
        counter.register(1);
        counter.settle(2);
    }

    #[test]
    #[should_panic(expected = "on a completed batch counter")]
    fn test_settle_after_completion_panics() {
        let (mut counter, _completion) = CompletionCounter::new(Results::default());
        counter.register(1);
        counter.settle(1);
        counter.settle(1);
    }

    #[test]
    #[should_panic(expected = "register(1) on a completed batch counter")]
    fn test_register_after_completion_panics() {
        let (mut counter, _completion) = CompletionCounter::new(Results::default());
        counter.register(1);
        counter.settle(1);
        counter.register(1);
    }

    #[tokio::test]
    async fn test_completion_resolves_as_future() {
        let (mut counter, completion) = CompletionCounter::new(Results::default());
        counter.register(1);
        counter.settle_with((), Ok(7));
        let results = completion.await;
        assert_eq!(results.values, vec![7]);
    }

    #[tokio::test]
    #[should_panic(expected = "dropped with operations still pending")]
    async fn test_dropped_counter_panics_completion() {
        let (mut counter, completion) = CompletionCounter::new(Results::default());
        counter.register(1);
        drop(counter);
        completion.await;
    }

    proptest! {
        #[test]
        fn prop_fires_exactly_after_last_settlement(n in 1usize..64) {
            let (mut counter, mut completion) = CompletionCounter::new(Results::default());
            counter.register(n);

            for settled in 1..=n {
                prop_assert!(completion.try_take().is_none());
                counter.settle_with((), Ok(settled as u32));
                prop_assert_eq!(counter.is_complete(), settled == n);
            }

            let results = completion.try_take();
            prop_assert!(results.is_some());
            prop_assert_eq!(results.map(|r| r.values.len()), Some(n));
            prop_assert!(completion.try_take().is_none());
        }

        #[test]
        fn prop_settlement_order_does_not_change_membership(
            outcomes in proptest::collection::vec(any::<bool>(), 1..32),
            seed in any::<u64>(),
        ) {
            // Deterministic shuffle of settlement order
            let mut order: Vec<usize> = (0..outcomes.len()).collect();
            let mut state = seed | 1;
            for i in (1..order.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                order.swap(i, (state % (i as u64 + 1)) as usize);
            }

            let (mut counter, mut completion) = CompletionCounter::new(Results::default());
            counter.register(outcomes.len());
            for &i in &order {
                let outcome = if outcomes[i] { Ok(i as u32) } else { Err(i.to_string()) };
                counter.settle_with((), outcome);
            }

            let results = completion.try_take().unwrap();
            let mut values = results.values.clone();
            values.sort_unstable();
            let expected: Vec<u32> = (0..outcomes.len())
                .filter(|&i| outcomes[i])
                .map(|i| i as u32)
                .collect();
            prop_assert_eq!(values, expected);
            prop_assert_eq!(
                results.errors.len(),
                outcomes.iter().filter(|ok| !**ok).count()
            );
        }
    }
}
