//! Reissue Common Library
//!
//! Shared building blocks for the reissue certificate renewal agent.
//!
//! The main export is the [`batch`] module: a completion-counting executor
//! that drives many asynchronous operations with a bounded level of
//! concurrency and collects every outcome, success or failure, without
//! letting one failed item abort the rest of the batch.

pub mod batch;

pub use batch::{
    pack, plan_groups, BatchFailure, Completion, CompletionCounter, KeyAggregator, KeyResults,
    ListAggregator, ListResults, Outcomes, Packed,
};
