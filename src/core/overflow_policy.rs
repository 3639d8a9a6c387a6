//! Overflow policy for the bounded ingestion queue
//!
//! When the queue is at capacity, the policy decides whether a new record is
//! dropped or whether the producer synchronously drains the queue first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy for handling queue overflow
///
/// # Example
///
/// ```
/// use rust_log_pipeline::OverflowPolicy;
///
/// // Default behavior: drop and count
/// assert_eq!(OverflowPolicy::default(), OverflowPolicy::Drop);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Drop the new record and count it
    ///
    /// Producers never block. Use this on threads with latency budgets.
    #[default]
    Drop,

    /// Drain the queue on the producer thread, then retry once
    ///
    /// The producer blocks for at most one drain (bounded by the flush lock
    /// timeout plus the drain's own cost). If the queue is still full after
    /// the drain the record is dropped.
    ForceFlush,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Drop => write!(f, "Drop"),
            OverflowPolicy::ForceFlush => write!(f, "ForceFlush"),
        }
    }
}
