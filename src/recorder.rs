//! Change recording
//!
//! Snapshot a tree, let the caller mutate the live tree, then diff the
//! snapshot against it. Two phases:
//!
//! ```
//! use alice_tree::{ChangeRecorder, Tree};
//!
//! let mut tree: Tree<String> = Tree::named("live");
//! let root = tree.root_id();
//! tree.add_child(root, "A".into()).unwrap();
//!
//! let mut rec = ChangeRecorder::begin(&tree);
//! tree.add_child(root, "B".into()).unwrap();
//! rec.finish(&tree);
//!
//! assert_eq!(rec.patch().unwrap().count(), 1);
//! ```
//!
//! [`Tree::record`] wraps both phases around a closure so the diff is computed
//! on every exit path of the body, including early error returns.
//!
//! Only the snapshot is taken under the tree's guard. Mutating the live tree
//! from another thread between `begin` and `finish` is the caller's problem.
//!
//! Author: ALICE contributors

use crate::diff::{diff_tree, DiffOptions, DiffSummary};
use crate::error::RecorderError;
use crate::patch::{extract_patch, Patch};
use crate::tree::Tree;

/// Snapshot/diff session over one tree
#[derive(Debug)]
pub struct ChangeRecorder<T> {
    baseline: Tree<T>,
    diff: Option<Tree<T>>,
}

impl<T> ChangeRecorder<T> {
    /// Snapshot `tree` as the baseline
    pub fn begin(tree: &Tree<T>) -> Self {
        let _guard = tree.lock();
        let baseline = tree.copy_named(&format!("{} (baseline)", tree.name()));
        tracing::debug!(tree = tree.name(), nodes = baseline.count(), "recording started");
        Self {
            baseline,
            diff: None,
        }
    }

    /// Diff the baseline against the live tree and keep the result.
    ///
    /// Calling it again recomputes against the current live state.
    pub fn finish(&mut self, live: &Tree<T>) -> &Tree<T> {
        let options = DiffOptions::default()
            .reduce(true)
            .include_reference_info(true);
        let diff = diff_tree(&self.baseline, live, options);
        let summary = DiffSummary::of(&diff);
        tracing::debug!(
            tree = live.name(),
            changes = summary.total(),
            "recording finished"
        );
        self.diff.insert(diff)
    }

    pub fn is_finished(&self) -> bool {
        self.diff.is_some()
    }

    /// The untouched snapshot
    pub fn baseline(&self) -> &Tree<T> {
        &self.baseline
    }

    /// Reduced, classified diff of baseline against live
    pub fn diff_tree(&self) -> Result<&Tree<T>, RecorderError> {
        self.diff.as_ref().ok_or(RecorderError::NotFinished)
    }

    pub fn into_diff_tree(self) -> Result<Tree<T>, RecorderError> {
        self.diff.ok_or(RecorderError::NotFinished)
    }

    /// Replayable records of the recorded changes
    pub fn patch(&self) -> Result<Patch<'_, T>, RecorderError> {
        self.diff_tree().map(extract_patch)
    }
}

impl<T> Tree<T> {
    /// Record the changes `body` makes to this tree.
    ///
    /// The recorder is finished when `body` returns, whatever it returns.
    pub fn record<R, F>(&mut self, body: F) -> (ChangeRecorder<T>, R)
    where
        F: FnOnce(&mut Tree<T>) -> R,
    {
        let mut recorder = ChangeRecorder::begin(self);
        let result = body(self);
        recorder.finish(self);
        (recorder, result)
    }
}
