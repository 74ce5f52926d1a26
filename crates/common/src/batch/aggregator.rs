//! List-indexed and key-indexed aggregation over the completion counter.

use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;

use futures::future::{self, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

use super::counter::CompletionCounter;
use super::outcomes::{BatchFailure, KeyResults, ListResults, Outcomes};

/// A submitted operation, already mapped into the batch error type
pub(crate) type Op<'a, T, E> = LocalBoxFuture<'a, Result<T, BatchFailure<E>>>;

pub(crate) fn boxed<'a, T, E, F>(op: F) -> Op<'a, T, E>
where
    F: Future<Output = Result<T, E>> + 'a,
{
    op.map(|outcome| outcome.map_err(BatchFailure::Failed))
        .boxed_local()
}

pub(crate) fn failed<'a, T: 'a, E: 'a>(failure: BatchFailure<E>) -> Op<'a, T, E> {
    future::ready(Err(failure)).boxed_local()
}

/// Register `ops` on the counter and poll them all until each has settled
///
/// Operations are started in submission order and settle in whatever order
/// they finish. A panic inside an operation settles it as
/// [`BatchFailure::Panicked`].
pub(crate) async fn drive<'a, S, T, E>(
    counter: &mut CompletionCounter<S>,
    ops: Vec<(S::Key, Op<'a, T, E>)>,
) where
    S: Outcomes<Value = T, Error = BatchFailure<E>>,
{
    counter.register(ops.len());

    let mut in_flight: FuturesUnordered<_> = ops
        .into_iter()
        .map(|(key, op)| async move {
            let outcome = match AssertUnwindSafe(op).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Err(BatchFailure::from_panic(&*payload)),
            };
            (key, outcome)
        })
        .collect();

    while let Some((key, outcome)) = in_flight.next().await {
        counter.settle_with(key, outcome);
    }
}

/// Runs a set of operations and collects outcomes in settlement order
///
/// # Example
///
/// ```ignore
/// let mut batch = ListAggregator::new();
/// for path in paths {
///     batch.add(tokio::fs::read(path));
/// }
/// let results = batch.finish().await;
/// ```
pub struct ListAggregator<'a, T, E> {
    ops: Vec<((), Op<'a, T, E>)>,
}

impl<'a, T: 'a, E: 'a> ListAggregator<'a, T, E> {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Submit an operation
    ///
    /// Nothing runs until [`finish`](Self::finish) is awaited.
    pub fn add<F>(&mut self, op: F)
    where
        F: Future<Output = Result<T, E>> + 'a,
    {
        self.ops.push(((), boxed(op)));
    }

    /// Number of submitted operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing was submitted
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Run every submitted operation and wait for all of them to settle
    ///
    /// Resolves immediately with empty results when nothing was submitted.
    pub async fn finish(self) -> ListResults<T, BatchFailure<E>> {
        let (mut counter, completion) = CompletionCounter::new(ListResults::default());

        // The finish call itself holds one unit so an empty batch still completes
        counter.register(1);
        drive(&mut counter, self.ops).await;
        counter.settle(1);

        completion.await
    }
}

impl<'a, T: 'a, E: 'a> Default for ListAggregator<'a, T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for ListAggregator<'_, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListAggregator")
            .field("submitted", &self.ops.len())
            .finish()
    }
}

/// Runs a small set of named operations and collects outcomes by name
///
/// Used where a caller must know *which* sub-operation failed, e.g. reading
/// the request and the certificate belonging to one record.
pub struct KeyAggregator<'a, K, T, E> {
    ops: Vec<(K, Op<'a, T, E>)>,
}

impl<'a, K, T: 'a, E: 'a> KeyAggregator<'a, K, T, E>
where
    K: Eq + Hash,
{
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Submit an operation under `key`
    ///
    /// # Panics
    ///
    /// Panics if `key` was already submitted; each key must settle exactly
    /// once.
    pub fn add<F>(&mut self, key: K, op: F)
    where
        F: Future<Output = Result<T, E>> + 'a,
    {
        if self.ops.iter().any(|(existing, _)| *existing == key) {
            panic!("duplicate key submitted to KeyAggregator");
        }
        self.ops.push((key, boxed(op)));
    }

    /// Number of submitted operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing was submitted
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Run every submitted operation and wait for all of them to settle
    pub async fn finish(self) -> KeyResults<K, T, BatchFailure<E>> {
        let (mut counter, completion) = CompletionCounter::new(KeyResults::default());

        counter.register(1);
        drive(&mut counter, self.ops).await;
        counter.settle(1);

        completion.await
    }
}

impl<'a, K: Eq + Hash, T: 'a, E: 'a> Default for KeyAggregator<'a, K, T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, E> std::fmt::Debug for KeyAggregator<'_, K, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyAggregator")
            .field("submitted", &self.ops.len())
            .finish()
    }
}
