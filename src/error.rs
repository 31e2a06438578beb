//! Error types
//!
//! Lookups and mutations that a caller can get wrong return [`TreeError`].
//! Broken internal invariants (re-registering a live node, copying into a
//! populated subtree) are bugs and panic instead.
//!
//! Author: ALICE contributors

use thiserror::Error;

use crate::node::NodeId;

/// Recoverable tree errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// No live node matched the identity or value
    #[error("no node found for {0}")]
    NotFound(String),

    /// A single-result lookup matched several clones
    #[error("{query} has {count} occurrences; use find_all() or find_first() to resolve this")]
    AmbiguousMatch { query: String, count: usize },

    /// A move would detach the node into its own subtree
    #[error("cannot move node {node} below {target}")]
    InvalidMove { node: NodeId, target: NodeId },
}

impl TreeError {
    pub(crate) fn missing(id: NodeId) -> Self {
        TreeError::NotFound(format!("node {id}"))
    }
}

/// Change recorder errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecorderError {
    /// The diff is only available after [`ChangeRecorder::finish`](crate::ChangeRecorder::finish)
    #[error("change recorder has not finished; call finish() first")]
    NotFinished,
}
