//! Batch execution with partial-failure aggregation
//!
//! Every multi-item operation in the agent (reading many request files,
//! renewing many certificates) goes through this module.
//!
//! # Architecture
//!
//! - [`CompletionCounter`] - counts outstanding operations and hands the
//!   collected results to its [`Completion`] exactly once, when the count
//!   drops to zero
//! - [`Outcomes`] - result storage policy; [`ListResults`] appends in
//!   settlement order, [`KeyResults`] writes by caller-supplied key
//! - [`ListAggregator`] / [`KeyAggregator`] - submit operations, then drive
//!   them all to settlement on the calling task
//! - [`pack`] - runs a per-item operation over a collection in sequential
//!   groups of at most `N` concurrent items
//!
//! # Scheduling
//!
//! Nothing here spawns. All in-flight operations of a group are polled from
//! the task that awaits the aggregator, so "concurrent" means outstanding at
//! once, interleaved at I/O suspension points. The counters therefore need
//! no locking, and a counter must never be shared between two batch runs.
//!
//! # Example
//!
//! ```ignore
//! let packed = pack(records, NonZeroUsize::new(5).unwrap(), |record| renew(record)).await;
//! info!(
//!     renewed = packed.results.values.len(),
//!     failed = packed.results.errors.len(),
//!     "Batch finished"
//! );
//! ```

mod aggregator;
mod counter;
mod outcomes;
mod pack;

pub use aggregator::{KeyAggregator, ListAggregator};
pub use counter::{Completion, CompletionCounter};
pub use outcomes::{BatchFailure, KeyResults, ListResults, Outcomes};
pub use pack::{pack, plan_groups, Packed};
