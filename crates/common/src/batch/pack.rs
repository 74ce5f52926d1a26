//! Packing: bounded-concurrency execution in sequential groups.

use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use super::aggregator::{boxed, drive, failed, Op};
use super::counter::CompletionCounter;
use super::outcomes::{BatchFailure, ListResults};

/// Outcome of a [`pack`] run
#[derive(Debug)]
pub struct Packed<T, E> {
    /// Collected outcomes, in settlement order
    pub results: ListResults<T, BatchFailure<E>>,
    /// Size of each group, in the order the groups ran
    pub groups: Vec<usize>,
}

/// Sizes of the groups `pack` will form for `len` items
///
/// Consecutive groups of `limit` items, the last one holding the remainder.
pub fn plan_groups(len: usize, limit: NonZeroUsize) -> Vec<usize> {
    let limit = limit.get();
    let mut groups = vec![limit; len / limit];
    if len % limit != 0 {
        groups.push(len % limit);
    }
    groups
}

/// Run `op` over every item with at most `limit` operations in flight
///
/// Items are split into consecutive groups of up to `limit`, in input order.
/// Groups run strictly one after another: group `k + 1` does not start until
/// every item of group `k` has settled. Within a group all items run
/// concurrently on the calling task.
///
/// Failures never escape. An `Err` from an item, or a panic while building or
/// polling its operation, is recorded in `results.errors` and the batch
/// carries on. An empty input resolves immediately with empty results.
pub async fn pack<'a, I, T, E, F, Fut>(items: I, limit: NonZeroUsize, mut op: F) -> Packed<T, E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>> + 'a,
    T: 'a,
    E: 'a,
{
    let (mut counter, completion) = CompletionCounter::new(ListResults::default());
    let mut groups = Vec::new();

    // The packing chain holds one unit until the last group has settled
    counter.register(1);

    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        let ops: Vec<((), Op<'a, T, E>)> = items
            .by_ref()
            .take(limit.get())
            .map(|item| ((), start(&mut op, item)))
            .collect();

        groups.push(ops.len());
        debug!(
            group = groups.len(),
            size = ops.len(),
            limit = limit.get(),
            "Running batch group"
        );

        drive(&mut counter, ops).await;
    }

    counter.settle(1);
    let results = completion.await;

    debug!(
        groups = groups.len(),
        succeeded = results.values.len(),
        failed = results.errors.len(),
        "Batch finished"
    );

    Packed { results, groups }
}

/// Build one item's operation, folding a construction panic into its outcome
fn start<'a, Item, T, E, F, Fut>(op: &mut F, item: Item) -> Op<'a, T, E>
where
    F: FnMut(Item) -> Fut,
    Fut: Future<Output = Result<T, E>> + 'a,
    T: 'a,
    E: 'a,
{
    match panic::catch_unwind(AssertUnwindSafe(|| op(item))) {
        Ok(fut) => boxed(fut),
        Err(payload) => failed(BatchFailure::from_panic(&*payload)),
    }
}
