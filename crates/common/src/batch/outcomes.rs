//! Result storage policies for the completion counter.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;

use thiserror::Error;

/// Where a settled operation's outcome is stored
pub trait Outcomes {
    /// Identifies an operation within the batch
    type Key;
    /// Successful outcome
    type Value;
    /// Failed outcome
    type Error;

    /// Store the outcome of the operation identified by `key`
    fn record(&mut self, key: Self::Key, outcome: Result<Self::Value, Self::Error>);
}

/// Why a batched operation produced no value
#[derive(Debug, Error)]
pub enum BatchFailure<E> {
    /// The operation completed with an error
    #[error("{0}")]
    Failed(E),

    /// The operation panicked while being built or polled
    #[error("operation panicked: {0}")]
    Panicked(String),
}

impl<E> BatchFailure<E> {
    /// The operation's own error, if it did not panic
    pub fn as_failed(&self) -> Option<&E> {
        match self {
            BatchFailure::Failed(err) => Some(err),
            BatchFailure::Panicked(_) => None,
        }
    }

    /// Consume the failure, returning the operation's own error
    pub fn into_failed(self) -> Option<E> {
        match self {
            BatchFailure::Failed(err) => Some(err),
            BatchFailure::Panicked(_) => None,
        }
    }

    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "non-string panic payload".to_string()
        };
        BatchFailure::Panicked(message)
    }
}

/// Outcomes appended in settlement order
///
/// `values` reflects the order operations *finished*, not the order they
/// were submitted.
#[derive(Debug)]
pub struct ListResults<T, E> {
    /// Successful outcomes
    pub values: Vec<T>,
    /// Failed outcomes
    pub errors: Vec<E>,
}

impl<T, E> ListResults<T, E> {
    /// Total settled operations
    pub fn len(&self) -> usize {
        self.values.len() + self.errors.len()
    }

    /// Whether nothing settled
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.errors.is_empty()
    }

    /// Whether every settled operation succeeded
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<T, E> Default for ListResults<T, E> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T, E> Outcomes for ListResults<T, E> {
    type Key = ();
    type Value = T;
    type Error = E;

    fn record(&mut self, _key: (), outcome: Result<T, E>) {
        match outcome {
            Ok(value) => self.values.push(value),
            Err(err) => self.errors.push(err),
        }
    }
}

/// Outcomes written by key
///
/// Every key recorded lands in exactly one of `keyset` or `errset`.
#[derive(Debug)]
pub struct KeyResults<K, T, E> {
    /// Successful outcomes by key
    pub keyset: HashMap<K, T>,
    /// Failed outcomes by key
    pub errset: HashMap<K, E>,
}

impl<K: Eq + Hash, T, E> KeyResults<K, T, E> {
    /// Whether every keyed operation succeeded
    pub fn is_clean(&self) -> bool {
        self.errset.is_empty()
    }

    /// Remove and return the outcome for `key`
    pub fn take(&mut self, key: &K) -> Option<Result<T, E>> {
        if let Some(value) = self.keyset.remove(key) {
            return Some(Ok(value));
        }
        self.errset.remove(key).map(Err)
    }
}

impl<K, T, E> Default for KeyResults<K, T, E> {
    fn default() -> Self {
        Self {
            keyset: HashMap::new(),
            errset: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, T, E> Outcomes for KeyResults<K, T, E> {
    type Key = K;
    type Value = T;
    type Error = E;

    fn record(&mut self, key: K, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => {
                self.errset.remove(&key);
                self.keyset.insert(key, value);
            }
            Err(err) => {
                self.keyset.remove(&key);
                self.errset.insert(key, err);
            }
        }
    }
}
