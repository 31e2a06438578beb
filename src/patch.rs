//! Patch extraction
//!
//! Walks a classified diff tree in pre-order and yields replayable
//! add/remove records, one per changed subtree. Extraction is lazy: records are
//! produced as the consumer pulls them.
//!
//! | Classification | Record |
//! |----------------|--------|
//! | `Added`, `MovedHere` | `{"type": "add", "node_id", "node"}` |
//! | `Removed`, `MovedTo` | `{"type": "remove", "parent_id", "data_id"}` |
//! | `Shifted`, none | skipped |
//!
//! A node whose parent carries the same tag is covered by the parent's record
//! and is not emitted. Emission order follows the tree, not a valid replay
//! order: the remove half of a move may come before or after its add.
//!
//! Author: ALICE contributors

use std::iter::FusedIterator;
use std::sync::Arc;

use serde::Serialize;

use crate::diff::{DiffClassification, META_REF_DATA, META_REF_NODE, META_REF_PARENT};
use crate::node::{DataId, MetaValue, NodeId};
use crate::tree::Tree;

/// One replayable change
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PatchRecord<T> {
    /// Insert `node`; `node_id` is the matching node of the other tree, if known
    Add {
        #[serde(skip_serializing_if = "Option::is_none")]
        node_id: Option<NodeId>,
        node: Arc<T>,
    },
    /// Remove the node holding `data_id` below `parent_id` of the other tree
    Remove {
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<NodeId>,
        data_id: DataId,
    },
}

impl<T> PatchRecord<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            PatchRecord::Add { .. } => "add",
            PatchRecord::Remove { .. } => "remove",
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, PatchRecord::Add { .. })
    }
}

impl<T> Clone for PatchRecord<T> {
    fn clone(&self) -> Self {
        match self {
            PatchRecord::Add { node_id, node } => PatchRecord::Add {
                node_id: *node_id,
                node: Arc::clone(node),
            },
            PatchRecord::Remove { parent_id, data_id } => PatchRecord::Remove {
                parent_id: *parent_id,
                data_id: *data_id,
            },
        }
    }
}

/// Lazy patch over a classified diff tree
pub struct Patch<'a, T> {
    tree: &'a Tree<T>,
    stack: Vec<NodeId>,
}

/// Extract the patch of a classified diff tree
pub fn extract_patch<T>(diff_tree: &Tree<T>) -> Patch<'_, T> {
    Patch {
        tree: diff_tree,
        stack: diff_tree.top_nodes().iter().rev().copied().collect(),
    }
}

impl<'a, T> Patch<'a, T> {
    fn node_ref(&self, id: NodeId, key: &str) -> Option<NodeId> {
        match self.tree.get_meta(id, key) {
            Some(MetaValue::Node(n)) => Some(*n),
            _ => None,
        }
    }

    fn record_for(&self, id: NodeId) -> Option<PatchRecord<T>> {
        let node = self.tree.node(id)?;
        let tag = self.tree.classification(id)?;
        if self.tree.classification(node.parent()) == Some(tag) {
            return None;
        }
        match tag {
            DiffClassification::Added | DiffClassification::MovedHere => Some(PatchRecord::Add {
                node_id: self.node_ref(id, META_REF_NODE),
                node: Arc::clone(node.data_arc()),
            }),
            DiffClassification::Removed | DiffClassification::MovedTo => {
                let data_id = match self.tree.get_meta(id, META_REF_DATA) {
                    Some(MetaValue::Data(d)) => *d,
                    _ => node.data_id(),
                };
                Some(PatchRecord::Remove {
                    parent_id: self.node_ref(id, META_REF_PARENT),
                    data_id,
                })
            }
            DiffClassification::Shifted { .. } => None,
        }
    }
}

impl<'a, T> Iterator for Patch<'a, T> {
    type Item = PatchRecord<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            self.stack
                .extend(self.tree.children(id).iter().rev().copied());
            if let Some(record) = self.record_for(id) {
                tracing::trace!(node = %id, kind = record.kind(), "patch record");
                return Some(record);
            }
        }
        None
    }
}

impl<'a, T> FusedIterator for Patch<'a, T> {}
