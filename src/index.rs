//! Clone index
//!
//! Two mappings kept in lockstep:
//!
//! 1. node identity → [`Node`] (exactly one entry per live node; owns the arena),
//! 2. data identity → node identities in registration order.
//!
//! Every node in (1) appears in exactly one list of (2), keyed by its data
//! identity, and vice versa. Lists never linger empty.
//!
//! Author: ALICE contributors

use std::collections::HashMap;

use crate::node::{DataId, Node, NodeId};

/// Node arena plus data-identity multimap
#[derive(Debug)]
pub struct CloneIndex<T> {
    by_node: HashMap<NodeId, Node<T>>,
    by_data: HashMap<DataId, Vec<NodeId>>,
}

impl<T> Default for CloneIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CloneIndex<T> {
    pub fn new() -> Self {
        Self {
            by_node: HashMap::new(),
            by_data: HashMap::new(),
        }
    }

    /// Register a node under both mappings.
    ///
    /// # Panics
    ///
    /// If the node identity is already registered.
    pub fn register(&mut self, node: Node<T>) {
        let id = node.id;
        let data_id = node.data_id;
        assert!(
            !self.by_node.contains_key(&id),
            "node {id} is already registered"
        );
        tracing::trace!(node = %id, data = %data_id, "register");
        self.by_node.insert(id, node);
        self.by_data.entry(data_id).or_default().push(id);
    }

    /// Remove a node from both mappings and hand it back.
    ///
    /// Clones are removed by identity, never by value.
    ///
    /// # Panics
    ///
    /// If the node identity is not registered.
    pub fn unregister(&mut self, id: NodeId) -> Node<T> {
        let node = match self.by_node.remove(&id) {
            Some(n) => n,
            None => panic!("node {id} is not registered"),
        };
        if let Some(clones) = self.by_data.get_mut(&node.data_id) {
            if let Some(pos) = clones.iter().position(|&c| c == id) {
                clones.remove(pos);
            }
            if clones.is_empty() {
                self.by_data.remove(&node.data_id);
            }
        }
        tracing::trace!(node = %id, data = %node.data_id, "unregister");
        node
    }

    pub fn lookup_by_node_id(&self, id: NodeId) -> Option<&Node<T>> {
        self.by_node.get(&id)
    }

    pub(crate) fn lookup_by_node_id_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.by_node.get_mut(&id)
    }

    /// All nodes sharing `data_id`, in registration order (possibly empty)
    pub fn lookup_by_data_id(&self, data_id: DataId) -> &[NodeId] {
        self.by_data.get(&data_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes sharing `id`'s data identity, in registration order
    pub fn clones_of(&self, id: NodeId, include_self: bool) -> Vec<NodeId> {
        match self.by_node.get(&id) {
            Some(node) => self
                .lookup_by_data_id(node.data_id)
                .iter()
                .copied()
                .filter(|&c| include_self || c != id)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.by_node.contains_key(&id)
    }

    /// Live node count
    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    /// Distinct data identities
    pub fn unique_len(&self) -> usize {
        self.by_data.len()
    }

    /// Nodes in arbitrary order
    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.by_node.values()
    }

    /// Data-identity lists in arbitrary order
    pub fn clone_groups(&self) -> impl Iterator<Item = (DataId, &[NodeId])> {
        self.by_data.iter().map(|(&k, v)| (k, v.as_slice()))
    }
}
