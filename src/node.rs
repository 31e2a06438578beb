//! Positioned tree nodes
//!
//! A node is one position in a tree. It references (never copies) an external
//! data value through an `Arc`, and carries two identities:
//!
//! - [`NodeId`]: unique per node, assigned at creation, never reused.
//! - [`DataId`]: derived from the data value; shared by all clones of it.
//!
//! Children and parent are stored as identities into the owning tree's
//! [`CloneIndex`](crate::CloneIndex), never as owning links.
//!
//! Author: ALICE contributors

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diff::DiffClassification;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique node identifier, process-wide and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh identity
    pub(crate) fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value (lookups only; never allocates)
    pub fn from_raw(raw: u64) -> Self {
        NodeId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Data identity: groups nodes referencing equal data values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataId(u64);

impl DataId {
    pub fn new(raw: u64) -> Self {
        DataId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Value stored in a node's metadata map
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    /// Flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// String value
    Text(String),
    /// Reference to a node (possibly in another tree)
    Node(NodeId),
    /// Reference to a data identity
    Data(DataId),
    /// Diff classification tag
    Change(DiffClassification),
}

impl MetaValue {
    /// Truthiness used by flag lookups
    pub fn is_truthy(&self) -> bool {
        match self {
            MetaValue::Bool(b) => *b,
            MetaValue::Int(i) => *i != 0,
            MetaValue::Text(s) => !s.is_empty(),
            MetaValue::Node(_) | MetaValue::Data(_) | MetaValue::Change(_) => true,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(String::from(v))
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

impl From<NodeId> for MetaValue {
    fn from(v: NodeId) -> Self {
        MetaValue::Node(v)
    }
}

impl From<DataId> for MetaValue {
    fn from(v: DataId) -> Self {
        MetaValue::Data(v)
    }
}

impl From<DiffClassification> for MetaValue {
    fn from(v: DiffClassification) -> Self {
        MetaValue::Change(v)
    }
}

/// Lazily created per-node metadata
pub type Meta = HashMap<String, MetaValue>;

/// Tree node
#[derive(Debug)]
pub struct Node<T> {
    pub(crate) id: NodeId,
    pub(crate) data_id: DataId,
    pub(crate) data: Arc<T>,
    pub(crate) parent: NodeId,
    /// `None` when childless; never `Some(vec![])`
    pub(crate) children: Option<Vec<NodeId>>,
    pub(crate) meta: Option<Meta>,
}

impl<T> Node<T> {
    pub(crate) fn new(data: Arc<T>, data_id: DataId, parent: NodeId) -> Self {
        Self {
            id: NodeId::next(),
            data_id,
            data,
            parent,
            children: None,
            meta: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn data_id(&self) -> DataId {
        self.data_id
    }

    /// Referenced data value
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Shared handle to the data value
    pub fn data_arc(&self) -> &Arc<T> {
        &self.data
    }

    /// Parent identity; toplevel nodes point at the tree's root
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// Child identities in order (empty slice for leaves)
    pub fn children(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    pub fn get_meta(&self, key: &str) -> Option<&MetaValue> {
        self.meta.as_ref().and_then(|m| m.get(key))
    }

    /// True if the data values are the same allocation
    pub fn shares_data_with(&self, other: &Node<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

// ── Child list helpers ────────────────────────────────────────────────

/// Insert into an optional child list, creating it on first use
pub(crate) fn attach_child(children: &mut Option<Vec<NodeId>>, index: Option<usize>, id: NodeId) {
    let list = children.get_or_insert_with(Vec::new);
    match index {
        Some(i) if i < list.len() => list.insert(i, id),
        _ => list.push(id),
    }
}

/// Remove from an optional child list, collapsing it to `None` when emptied.
/// Returns the former position.
pub(crate) fn detach_child(children: &mut Option<Vec<NodeId>>, id: NodeId) -> Option<usize> {
    let list = children.as_mut()?;
    let pos = list.iter().position(|&c| c == id)?;
    list.remove(pos);
    if list.is_empty() {
        *children = None;
    }
    Some(pos)
}

/// Set a metadata entry, creating the map on first use
pub(crate) fn set_meta_entry(meta: &mut Option<Meta>, key: &str, value: MetaValue) {
    meta.get_or_insert_with(HashMap::new)
        .insert(String::from(key), value);
}

/// Remove a metadata entry, dropping the map when emptied
pub(crate) fn remove_meta_entry(meta: &mut Option<Meta>, key: &str) -> Option<MetaValue> {
    let map = meta.as_mut()?;
    let old = map.remove(key);
    if map.is_empty() {
        *meta = None;
    }
    old
}
