//! Clone-aware tree
//!
//! A [`Tree`] owns one invisible root node whose children are the toplevel
//! nodes, plus the [`CloneIndex`] that every mutation keeps in sync. The same
//! data value may appear at many positions ("clones"); each position is a
//! separate [`Node`] with its own [`NodeId`] but a shared [`DataId`].
//!
//! Author: ALICE contributors

use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::TreeError;
use crate::identity::{content_hash, DataIdFn};
use crate::index::CloneIndex;
use crate::node::{
    attach_child, detach_child, remove_meta_entry, set_meta_entry, DataId, Meta, MetaValue, Node,
    NodeId,
};

/// Invisible system root
#[derive(Debug)]
struct RootNode {
    id: NodeId,
    children: Option<Vec<NodeId>>,
    meta: Option<Meta>,
}

/// Traversal control returned by [`Tree::visit`] callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Descend into children
    Continue,
    /// Do not descend below this node
    SkipBranch,
    /// Abort the whole traversal
    Stop,
}

/// Tree of positioned nodes over shared data values
pub struct Tree<T> {
    name: String,
    root: RootNode,
    index: CloneIndex<T>,
    data_id_fn: DataIdFn<T>,
    lock: ReentrantMutex<()>,
}

impl<T: Hash + 'static> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + 'static> Tree<T> {
    /// Empty tree using the process-seeded content hash as data identity
    pub fn new() -> Self {
        Self::named("Tree")
    }

    pub fn named(name: &str) -> Self {
        Self::with_hook(name, Arc::new(|data: &T| content_hash(data)))
    }
}

impl<T> Tree<T> {
    /// Empty tree with a custom data identity function.
    ///
    /// The function must be pure and deterministic within the process.
    pub fn with_data_id_fn<F>(name: &str, f: F) -> Self
    where
        F: Fn(&T) -> DataId + Send + Sync + 'static,
    {
        Self::with_hook(name, Arc::new(f))
    }

    pub(crate) fn with_hook(name: &str, data_id_fn: DataIdFn<T>) -> Self {
        Self {
            name: String::from(name),
            root: RootNode {
                id: NodeId::next(),
                children: None,
                meta: None,
            },
            index: CloneIndex::new(),
            data_id_fn,
            lock: ReentrantMutex::new(()),
        }
    }

    /// Replace the data identity function.
    ///
    /// Already registered nodes keep their data identity.
    pub fn set_data_id_fn<F>(&mut self, f: F)
    where
        F: Fn(&T) -> DataId + Send + Sync + 'static,
    {
        self.data_id_fn = Arc::new(f);
    }

    pub(crate) fn data_id_hook(&self) -> DataIdFn<T> {
        Arc::clone(&self.data_id_fn)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the invisible root; pass it as `parent` to add toplevel nodes
    pub fn root_id(&self) -> NodeId {
        self.root.id
    }

    /// Number of nodes, root excluded
    pub fn count(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct data identities
    pub fn count_unique(&self) -> usize {
        self.index.unique_len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn clone_index(&self) -> &CloneIndex<T> {
        &self.index
    }

    /// Data identity this tree assigns to `data`
    pub fn data_id_of(&self, data: &T) -> DataId {
        (self.data_id_fn)(data)
    }

    /// Acquire the tree's reentrant guard.
    ///
    /// Holding it gives a cooperating thread a consistent view across several
    /// reads. It does not protect against mutation through other handles.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    // ── Node access ───────────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.index.lookup_by_node_id(id)
    }

    fn require(&self, id: NodeId) -> Result<&Node<T>, TreeError> {
        self.node(id).ok_or_else(|| TreeError::missing(id))
    }

    /// True for the root and every live node
    pub fn contains_node(&self, id: NodeId) -> bool {
        id == self.root.id || self.index.contains(id)
    }

    /// Children of a node or of the root (empty for leaves and unknown ids)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        if id == self.root.id {
            return self.root.children.as_deref().unwrap_or(&[]);
        }
        self.node(id).map(Node::children).unwrap_or(&[])
    }

    /// Toplevel nodes
    pub fn top_nodes(&self) -> &[NodeId] {
        self.children(self.root.id)
    }

    /// Visible parent; `None` for toplevel nodes, the root and unknown ids
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .map(Node::parent)
            .filter(|&p| p != self.root.id)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    /// Toplevel nodes have depth 1, the root 0
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        if id == self.root.id {
            return Some(0);
        }
        let mut depth = 0;
        let mut cur = self.node(id)?;
        loop {
            depth += 1;
            match self.node(cur.parent) {
                Some(p) => cur = p,
                None => return Some(depth),
            }
        }
    }

    /// Maximum depth over all nodes
    pub fn calc_height(&self) -> usize {
        let mut height = 0;
        let mut stack: Vec<(NodeId, usize)> = self.top_nodes().iter().map(|&c| (c, 1)).collect();
        while let Some((id, depth)) = stack.pop() {
            height = height.max(depth);
            stack.extend(self.children(id).iter().map(|&c| (c, depth + 1)));
        }
        height
    }

    fn child_slot_mut(&mut self, id: NodeId) -> Option<&mut Option<Vec<NodeId>>> {
        if id == self.root.id {
            return Some(&mut self.root.children);
        }
        self.index.lookup_by_node_id_mut(id).map(|n| &mut n.children)
    }

    fn meta_slot(&self, id: NodeId) -> Option<&Option<Meta>> {
        if id == self.root.id {
            return Some(&self.root.meta);
        }
        self.node(id).map(|n| &n.meta)
    }

    fn meta_slot_mut(&mut self, id: NodeId) -> Option<&mut Option<Meta>> {
        if id == self.root.id {
            return Some(&mut self.root.meta);
        }
        self.index.lookup_by_node_id_mut(id).map(|n| &mut n.meta)
    }

    // ── Metadata ──────────────────────────────────────────────────────

    pub fn get_meta(&self, id: NodeId, key: &str) -> Option<&MetaValue> {
        self.meta_slot(id)?.as_ref()?.get(key)
    }

    pub fn set_meta(
        &mut self,
        id: NodeId,
        key: &str,
        value: impl Into<MetaValue>,
    ) -> Result<(), TreeError> {
        let slot = self.meta_slot_mut(id).ok_or_else(|| TreeError::missing(id))?;
        set_meta_entry(slot, key, value.into());
        Ok(())
    }

    pub fn remove_meta(&mut self, id: NodeId, key: &str) -> Result<Option<MetaValue>, TreeError> {
        let slot = self.meta_slot_mut(id).ok_or_else(|| TreeError::missing(id))?;
        Ok(remove_meta_entry(slot, key))
    }

    // ── Mutation ──────────────────────────────────────────────────────

    /// Create a node under `parent` with an explicit data identity.
    ///
    /// `index` of `None` (or past the end) appends.
    pub fn insert_with_data_id(
        &mut self,
        parent: NodeId,
        index: Option<usize>,
        data: Arc<T>,
        data_id: DataId,
    ) -> Result<NodeId, TreeError> {
        if !self.contains_node(parent) {
            return Err(TreeError::missing(parent));
        }
        let node = Node::new(data, data_id, parent);
        let id = node.id;
        self.index.register(node);
        if let Some(slot) = self.child_slot_mut(parent) {
            attach_child(slot, index, id);
        }
        Ok(id)
    }

    /// Append a new data value under `parent`
    pub fn add_child(&mut self, parent: NodeId, data: T) -> Result<NodeId, TreeError> {
        self.add_child_shared(parent, Arc::new(data))
    }

    /// Append an existing data reference under `parent`
    pub fn add_child_shared(&mut self, parent: NodeId, data: Arc<T>) -> Result<NodeId, TreeError> {
        let data_id = self.data_id_of(&data);
        self.insert_with_data_id(parent, None, data, data_id)
    }

    /// Append under `parent`, keeping a data identity computed elsewhere
    pub fn add_child_with_data_id(
        &mut self,
        parent: NodeId,
        data: Arc<T>,
        data_id: DataId,
    ) -> Result<NodeId, TreeError> {
        self.insert_with_data_id(parent, None, data, data_id)
    }

    /// Insert a new data value at position `index` of `parent`'s children
    pub fn insert_child(&mut self, parent: NodeId, index: usize, data: T) -> Result<NodeId, TreeError> {
        let data = Arc::new(data);
        let data_id = self.data_id_of(&data);
        self.insert_with_data_id(parent, Some(index), data, data_id)
    }

    /// Append a clone of `source` (same data reference and identity) under `parent`
    pub fn add_clone(&mut self, parent: NodeId, source: NodeId) -> Result<NodeId, TreeError> {
        let src = self.require(source)?;
        let (data, data_id) = (Arc::clone(&src.data), src.data_id);
        self.insert_with_data_id(parent, None, data, data_id)
    }

    /// Remove a node and its whole subtree; returns the number of removed nodes.
    ///
    /// Removed identities are never handed out again.
    pub fn remove(&mut self, id: NodeId) -> Result<usize, TreeError> {
        let parent = self.require(id)?.parent;
        let mut doomed = Vec::new();
        self.collect_post_order(id, &mut doomed);
        if let Some(slot) = self.child_slot_mut(parent) {
            detach_child(slot, id);
        }
        // Children go first so no list ever references a dead parent
        for &nid in &doomed {
            self.index.unregister(nid);
        }
        Ok(doomed.len())
    }

    /// Remove all toplevel nodes
    pub fn clear(&mut self) {
        let top: Vec<NodeId> = self.top_nodes().to_vec();
        for id in top {
            if let Err(e) = self.remove(id) {
                tracing::warn!(tree = %self.name, error = %e, "clear skipped a node");
            }
        }
    }

    fn collect_post_order(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.children(id) {
            self.collect_post_order(child, out);
        }
        out.push(id);
    }

    /// Move a node (with its subtree) under `new_parent`, keeping its identity.
    ///
    /// `before` is the position among `new_parent`'s children after the node
    /// has been detached; `None` appends.
    pub fn move_node(
        &mut self,
        id: NodeId,
        new_parent: NodeId,
        before: Option<usize>,
    ) -> Result<(), TreeError> {
        let old_parent = self.require(id)?.parent;
        if !self.contains_node(new_parent) {
            return Err(TreeError::missing(new_parent));
        }
        if new_parent == id || self.is_ancestor(id, new_parent) {
            return Err(TreeError::InvalidMove {
                node: id,
                target: new_parent,
            });
        }
        if let Some(slot) = self.child_slot_mut(old_parent) {
            detach_child(slot, id);
        }
        if let Some(slot) = self.child_slot_mut(new_parent) {
            attach_child(slot, before, id);
        }
        if let Some(node) = self.index.lookup_by_node_id_mut(id) {
            node.parent = new_parent;
        }
        Ok(())
    }

    /// True if `ancestor` lies on the parent chain of `id`
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = self.node(id).map(Node::parent);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.node(p).map(Node::parent);
        }
        false
    }

    /// Stable sort of `parent`'s children by a key over their data
    pub fn sort_children<K, F>(&mut self, parent: NodeId, mut key: F, deep: bool) -> Result<(), TreeError>
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        if !self.contains_node(parent) {
            return Err(TreeError::missing(parent));
        }
        self.sort_children_with(parent, &mut key, deep);
        Ok(())
    }

    fn sort_children_with<K: Ord, F: FnMut(&T) -> K>(&mut self, parent: NodeId, key: &mut F, deep: bool) {
        let mut keyed: Vec<(K, NodeId)> = self
            .children(parent)
            .iter()
            .filter_map(|&c| self.node(c).map(|n| (key(n.data()), c)))
            .collect();
        if keyed.is_empty() {
            return;
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        let sorted: Vec<NodeId> = keyed.into_iter().map(|(_, c)| c).collect();
        if let Some(slot) = self.child_slot_mut(parent) {
            *slot = Some(sorted.clone());
        }
        if deep {
            for c in sorted {
                self.sort_children_with(c, key, deep);
            }
        }
    }

    // ── Lookup ────────────────────────────────────────────────────────

    /// All nodes whose data identity matches `data`, in registration order
    pub fn find_all(&self, data: &T) -> &[NodeId] {
        self.index.lookup_by_data_id(self.data_id_of(data))
    }

    pub fn find_first(&self, data: &T) -> Option<NodeId> {
        self.find_all(data).first().copied()
    }

    pub fn find_by_data_id(&self, data_id: DataId) -> &[NodeId] {
        self.index.lookup_by_data_id(data_id)
    }

    pub fn contains(&self, data: &T) -> bool {
        !self.find_all(data).is_empty()
    }

    /// The single node holding `data`.
    ///
    /// Fails with [`TreeError::NotFound`] or [`TreeError::AmbiguousMatch`].
    pub fn get(&self, data: &T) -> Result<NodeId, TreeError>
    where
        T: fmt::Debug,
    {
        match self.find_all(data) {
            [] => Err(TreeError::NotFound(format!("{data:?}"))),
            [only] => Ok(*only),
            many => Err(TreeError::AmbiguousMatch {
                query: format!("{data:?}"),
                count: many.len(),
            }),
        }
    }

    /// First node in pre-order satisfying `pred`
    pub fn find_first_match<F>(&self, mut pred: F) -> Option<NodeId>
    where
        F: FnMut(&Node<T>) -> bool,
    {
        self.iter().find(|n| pred(n)).map(Node::id)
    }

    /// All nodes in pre-order satisfying `pred`
    pub fn find_all_match<F>(&self, mut pred: F) -> Vec<NodeId>
    where
        F: FnMut(&Node<T>) -> bool,
    {
        self.iter().filter(|n| pred(n)).map(Node::id).collect()
    }

    pub fn clones_of(&self, id: NodeId, include_self: bool) -> Vec<NodeId> {
        self.index.clones_of(id, include_self)
    }

    /// True if another node shares this node's data identity
    pub fn is_clone(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| self.index.lookup_by_data_id(n.data_id).len() > 1)
            .unwrap_or(false)
    }

    // ── Traversal ─────────────────────────────────────────────────────

    /// Pre-order iterator over all nodes, root excluded
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self, self.root.id, IterMethod::PreOrder)
    }

    /// Iterator over all nodes in the given order, root excluded
    pub fn iter_with(&self, method: IterMethod) -> Iter<'_, T> {
        Iter::new(self, self.root.id, method)
    }

    /// Pre-order iterator over the descendants of `id` (excluding `id`)
    pub fn descendants(&self, id: NodeId) -> Iter<'_, T> {
        Iter::new(self, id, IterMethod::PreOrder)
    }

    pub fn descendants_with(&self, id: NodeId, method: IterMethod) -> Iter<'_, T> {
        Iter::new(self, id, method)
    }

    /// Pre-order walk with branch skipping and early stop.
    ///
    /// Returns `false` if the callback stopped the walk.
    pub fn visit<F>(&self, callback: F) -> bool
    where
        F: FnMut(&Node<T>) -> Visit,
    {
        self.visit_with(IterMethod::PreOrder, callback)
    }

    /// Walk in the given order. [`Visit::SkipBranch`] only prunes pre-order
    /// and level-order walks; elsewhere children are already decided.
    pub fn visit_with<F>(&self, method: IterMethod, mut callback: F) -> bool
    where
        F: FnMut(&Node<T>) -> Visit,
    {
        let mut walk = Iter::new(self, self.root.id, method);
        while let Some(id) = walk.pop_id() {
            let Some(node) = self.node(id) else { continue };
            match callback(node) {
                Visit::Continue => walk.expand(id),
                Visit::SkipBranch => {}
                Visit::Stop => return false,
            }
        }
        true
    }

    // ── Copy & filter ─────────────────────────────────────────────────

    /// Structural copy: new identities, shared data references, same data
    /// identities and identity function
    pub fn copy(&self) -> Tree<T> {
        self.copy_named(&format!("Copy of {}", self.name))
    }

    pub fn copy_named(&self, name: &str) -> Tree<T> {
        let _guard = self.lock();
        let mut dest = Tree::with_hook(name, self.data_id_hook());
        let dest_root = dest.root_id();
        self.copy_children_into(self.root.id, &mut dest, dest_root, &mut |_, _, _| {});
        dest
    }

    /// Copy keeping only nodes that satisfy `pred` or have a kept descendant
    pub fn copy_filtered<F>(&self, pred: F) -> Tree<T>
    where
        F: FnMut(&Node<T>) -> bool,
    {
        let mut dest = self.copy();
        dest.filter(pred);
        dest
    }

    /// Copy `source` and its subtree from this tree under `dest_parent` in
    /// `dest`; returns the new top node
    pub fn copy_subtree_to(
        &self,
        source: NodeId,
        dest: &mut Tree<T>,
        dest_parent: NodeId,
    ) -> Result<NodeId, TreeError> {
        let src = self.require(source)?;
        let top = dest.add_child_with_data_id(dest_parent, Arc::clone(&src.data), src.data_id)?;
        if src.has_children() {
            self.copy_children_into(source, dest, top, &mut |_, _, _| {});
        }
        Ok(top)
    }

    /// Deep-copy the children of `src_parent` under `dest_parent`.
    ///
    /// `on_copy(dest, new_id, source_id)` runs for every created node, parents
    /// before children.
    ///
    /// # Panics
    ///
    /// If `dest_parent` already has children or does not exist.
    pub(crate) fn copy_children_into<F>(
        &self,
        src_parent: NodeId,
        dest: &mut Tree<T>,
        dest_parent: NodeId,
        on_copy: &mut F,
    ) where
        F: FnMut(&mut Tree<T>, NodeId, NodeId),
    {
        assert!(
            dest.children(dest_parent).is_empty(),
            "copy target {dest_parent} already has children"
        );
        for &child in self.children(src_parent) {
            let Some(src) = self.node(child) else { continue };
            let new_id = match dest.add_child_with_data_id(dest_parent, Arc::clone(&src.data), src.data_id) {
                Ok(id) => id,
                Err(e) => panic!("copy target vanished: {e}"),
            };
            on_copy(dest, new_id, child);
            if src.has_children() {
                self.copy_children_into(child, dest, new_id, on_copy);
            }
        }
    }

    /// In-place removal of nodes that neither satisfy `pred` nor have a
    /// descendant that does. Returns the number of removed nodes.
    pub fn filter<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&Node<T>) -> bool,
    {
        let mut doomed = Vec::new();
        for &top in self.top_nodes() {
            self.mark_unkept(top, &mut pred, &mut doomed);
        }
        let mut removed = 0;
        // Post-order: descendants precede their ancestors
        for id in doomed {
            if self.index.contains(id) {
                removed += self.remove(id).unwrap_or(0);
            }
        }
        removed
    }

    fn mark_unkept<F>(&self, id: NodeId, pred: &mut F, doomed: &mut Vec<NodeId>) -> bool
    where
        F: FnMut(&Node<T>) -> bool,
    {
        let mut keep_child = false;
        for &child in self.children(id) {
            keep_child |= self.mark_unkept(child, pred, doomed);
        }
        let keep = match self.node(id) {
            Some(node) => keep_child || pred(node),
            None => false,
        };
        if !keep {
            doomed.push(id);
        }
        keep
    }

    /// Assert every index and link invariant. Slow; debugging aid.
    pub fn self_check(&self) -> bool {
        let mut seen = 0;
        for node in self.iter() {
            seen += 1;
            assert!(
                node.children.as_ref().map_or(true, |c| !c.is_empty()),
                "{} holds an empty child list",
                node.id
            );
            let siblings = self.children(node.parent);
            assert_eq!(
                siblings.iter().filter(|&&c| c == node.id).count(),
                1,
                "{} must appear exactly once below its parent",
                node.id
            );
            assert!(
                self.index.lookup_by_data_id(node.data_id).contains(&node.id),
                "{} missing from its clone list",
                node.id
            );
        }
        assert_eq!(seen, self.index.len(), "unreachable nodes in index");

        let mut listed = 0;
        for (data_id, ids) in self.index.clone_groups() {
            assert!(!ids.is_empty(), "empty clone list for {data_id}");
            listed += ids.len();
            for id in ids {
                let node = self.node(*id);
                assert!(node.is_some(), "clone list references dead node {id}");
                assert_eq!(node.map(Node::data_id), Some(data_id));
            }
        }
        assert_eq!(listed, self.index.len(), "clone lists out of sync");
        true
    }
}

impl<T> fmt::Debug for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("name", &self.name)
            .field("count", &self.count())
            .field("unique", &self.count_unique())
            .finish()
    }
}

impl<T> fmt::Display for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree<{:?}>", self.name)
    }
}

/// Traversal order for [`Tree::iter_with`] and [`Tree::visit_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IterMethod {
    /// Parent first, then its children in order
    #[default]
    PreOrder,
    /// Children first, then their parent
    PostOrder,
    /// Breadth first, one level after the other
    LevelOrder,
    /// Every node once, in no particular order
    Unordered,
}

/// Node iterator; pre-order and level-order walks are lazy
pub struct Iter<'a, T> {
    tree: &'a Tree<T>,
    method: IterMethod,
    pending: VecDeque<NodeId>,
}

impl<'a, T> Iter<'a, T> {
    fn new(tree: &'a Tree<T>, start: NodeId, method: IterMethod) -> Self {
        let children = tree.children(start);
        let pending: VecDeque<NodeId> = match method {
            IterMethod::PreOrder => children.iter().rev().copied().collect(),
            IterMethod::LevelOrder => children.iter().copied().collect(),
            IterMethod::PostOrder => {
                let mut ids = Vec::new();
                for &child in children {
                    tree.collect_post_order(child, &mut ids);
                }
                ids.into()
            }
            IterMethod::Unordered if start == tree.root.id => {
                tree.index.nodes().map(Node::id).collect()
            }
            IterMethod::Unordered => Iter::new(tree, start, IterMethod::PreOrder)
                .map(Node::id)
                .collect(),
        };
        Self {
            tree,
            method,
            pending,
        }
    }

    fn pop_id(&mut self) -> Option<NodeId> {
        match self.method {
            IterMethod::PreOrder => self.pending.pop_back(),
            _ => self.pending.pop_front(),
        }
    }

    /// Queue the children of a yielded node (lazy orders only)
    fn expand(&mut self, id: NodeId) {
        let children = self.tree.children(id);
        match self.method {
            IterMethod::PreOrder => self.pending.extend(children.iter().rev()),
            IterMethod::LevelOrder => self.pending.extend(children),
            IterMethod::PostOrder | IterMethod::Unordered => {}
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a Node<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.pop_id() {
            if let Some(node) = self.tree.node(id) {
                self.expand(id);
                return Some(node);
            }
        }
        None
    }
}

impl<'a, T> IntoIterator for &'a Tree<T> {
    type Item = &'a Node<T>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A{a1{a11,a12}, a2}, B{b1{b11}}
    fn fixture() -> Tree<String> {
        let mut tree = Tree::named("fixture");
        let root = tree.root_id();
        let a = tree.add_child(root, "A".into()).unwrap();
        let a1 = tree.add_child(a, "a1".into()).unwrap();
        tree.add_child(a1, "a11".into()).unwrap();
        tree.add_child(a1, "a12".into()).unwrap();
        tree.add_child(a, "a2".into()).unwrap();
        let b = tree.add_child(root, "B".into()).unwrap();
        let b1 = tree.add_child(b, "b1".into()).unwrap();
        tree.add_child(b1, "b11".into()).unwrap();
        tree
    }

    fn id_of(tree: &Tree<String>, label: &str) -> NodeId {
        tree.get(&String::from(label)).unwrap()
    }

    fn labels(tree: &Tree<String>) -> Vec<String> {
        tree.iter().map(|n| n.data().clone()).collect()
    }

    #[test]
    fn test_tree_construction() {
        let tree = fixture();
        assert_eq!(tree.count(), 8);
        assert_eq!(tree.count_unique(), 8);
        assert_eq!(
            labels(&tree),
            vec!["A", "a1", "a11", "a12", "a2", "B", "b1", "b11"]
        );
        assert!(tree.self_check());
    }

    #[test]
    fn test_new_tree_is_empty() {
        let tree: Tree<String> = Tree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.count(), 0);
        assert!(tree.top_nodes().is_empty());
        assert_eq!(tree.to_string(), "Tree<\"Tree\">");
    }

    #[test]
    fn test_parent_lookup_hides_root() {
        let tree = fixture();
        let a = id_of(&tree, "A");
        let a1 = id_of(&tree, "a1");
        assert_eq!(tree.parent(a1), Some(a));
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.node(a).map(Node::parent), Some(tree.root_id()));
    }

    #[test]
    fn test_depth_and_height() {
        let tree = fixture();
        assert_eq!(tree.depth(tree.root_id()), Some(0));
        assert_eq!(tree.depth(id_of(&tree, "A")), Some(1));
        assert_eq!(tree.depth(id_of(&tree, "a11")), Some(3));
        assert_eq!(tree.calc_height(), 3);
    }

    #[test]
    fn test_add_to_unknown_parent_fails() {
        let mut tree: Tree<String> = Tree::new();
        let err = tree.add_child(NodeId::from_raw(u64::MAX), "x".into());
        assert!(matches!(err, Err(TreeError::NotFound(_))));
    }

    #[test]
    fn test_insert_child_at_position() {
        let mut tree = fixture();
        let a = id_of(&tree, "A");
        let a0 = tree.insert_child(a, 0, "a0".into()).unwrap();
        assert_eq!(tree.first_child(a), Some(a0));
        assert_eq!(tree.children(a).len(), 3);
    }

    #[test]
    fn test_clones_share_data_and_identity() {
        let mut tree = fixture();
        let a1 = id_of(&tree, "a1");
        let b = id_of(&tree, "B");
        let clone = tree.add_clone(b, a1).unwrap();

        assert_eq!(tree.count(), 9);
        assert_eq!(tree.count_unique(), 8);
        assert!(tree.is_clone(a1));
        assert!(tree.is_clone(clone));
        assert!(!tree.is_clone(id_of(&tree, "a2")));
        assert_eq!(tree.find_all(&"a1".into()), &[a1, clone]);
        assert_eq!(tree.clones_of(clone, false), vec![a1]);
        let (n1, n2) = (tree.node(a1).unwrap(), tree.node(clone).unwrap());
        assert!(n1.shares_data_with(n2));
        assert!(tree.self_check());
    }

    #[test]
    fn test_get_reports_ambiguity_and_absence() {
        let mut tree = fixture();
        let b = id_of(&tree, "B");
        tree.add_child(b, "a1".into()).unwrap();

        assert!(matches!(
            tree.get(&"a1".into()),
            Err(TreeError::AmbiguousMatch { count: 2, .. })
        ));
        assert!(matches!(
            tree.get(&"not_existing".into()),
            Err(TreeError::NotFound(_))
        ));
        assert!(tree.find_first(&"a1".into()).is_some());
        assert!(tree.find_first(&"not_existing".into()).is_none());
        assert!(tree.find_all(&"not_existing".into()).is_empty());
    }

    #[test]
    fn test_remove_subtree_unregisters_all() {
        let mut tree = fixture();
        let a1 = id_of(&tree, "a1");
        let a11 = id_of(&tree, "a11");
        assert_eq!(tree.remove(a1).unwrap(), 3);
        assert_eq!(tree.count(), 5);
        assert!(tree.node(a1).is_none());
        assert!(tree.node(a11).is_none());
        assert!(!tree.contains(&"a12".into()));
        assert!(tree.self_check());
    }

    #[test]
    fn test_remove_last_child_collapses_list() {
        let mut tree = fixture();
        let b1 = id_of(&tree, "b1");
        let b11 = id_of(&tree, "b11");
        tree.remove(b11).unwrap();
        let node = tree.node(b1).unwrap();
        assert!(node.is_leaf());
        assert!(node.children.is_none());
        assert!(tree.self_check());
    }

    #[test]
    fn test_removed_identity_is_dead_and_not_reused() {
        let mut tree = fixture();
        let a2 = id_of(&tree, "a2");
        tree.remove(a2).unwrap();
        assert!(matches!(tree.remove(a2), Err(TreeError::NotFound(_))));
        let again = tree.add_child(tree.root_id(), "a2".into()).unwrap();
        assert_ne!(again, a2);
    }

    #[test]
    fn test_clear_empties_tree() {
        let mut tree = fixture();
        let root = tree.root_id();
        let b1 = id_of(&tree, "b1");
        tree.add_clone(root, b1).unwrap();
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.count_unique(), 0);
        assert!(tree.top_nodes().is_empty());
        assert!(tree.self_check());

        tree.clear();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_move_keeps_identity() {
        let mut tree = fixture();
        let root = tree.root_id();
        let c = tree.add_child(root, "C".into()).unwrap();
        let b1 = id_of(&tree, "b1");
        tree.move_node(b1, c, None).unwrap();

        assert_eq!(tree.parent(b1), Some(c));
        assert_eq!(tree.children(c), &[b1]);
        assert!(tree.node(id_of(&tree, "B")).unwrap().is_leaf());
        assert_eq!(tree.children(b1).len(), 1);
        assert!(tree.self_check());
    }

    #[test]
    fn test_move_before_position() {
        let mut tree = fixture();
        let a = id_of(&tree, "A");
        let a2 = id_of(&tree, "a2");
        tree.move_node(a2, a, Some(0)).unwrap();
        assert_eq!(tree.first_child(a), Some(a2));
    }

    #[test]
    fn test_move_into_own_subtree_rejected() {
        let mut tree = fixture();
        let a = id_of(&tree, "A");
        let a11 = id_of(&tree, "a11");
        assert!(matches!(
            tree.move_node(a, a11, None),
            Err(TreeError::InvalidMove { .. })
        ));
        assert!(matches!(
            tree.move_node(a, a, None),
            Err(TreeError::InvalidMove { .. })
        ));
        assert!(tree.self_check());
    }

    #[test]
    fn test_meta_on_nodes_and_root() {
        let mut tree = fixture();
        let a = id_of(&tree, "A");
        let root = tree.root_id();
        assert!(tree.get_meta(a, "k").is_none());
        tree.set_meta(a, "k", 3i64).unwrap();
        tree.set_meta(root, "flag", true).unwrap();
        assert_eq!(tree.get_meta(a, "k"), Some(&MetaValue::Int(3)));
        assert_eq!(tree.get_meta(root, "flag"), Some(&MetaValue::Bool(true)));
        assert_eq!(tree.remove_meta(a, "k").unwrap(), Some(MetaValue::Int(3)));
        assert!(tree.node(a).unwrap().meta().is_none());
    }

    #[test]
    fn test_copy_has_new_identities_and_shared_data() {
        let tree = fixture();
        let copy = tree.copy();
        assert_eq!(copy.name(), "Copy of fixture");
        assert_eq!(labels(&copy), labels(&tree));
        for (a, b) in tree.iter().zip(copy.iter()) {
            assert_ne!(a.id(), b.id());
            assert_eq!(a.data_id(), b.data_id());
            assert!(a.shares_data_with(b));
        }
        assert!(copy.self_check());
    }

    #[test]
    fn test_copy_keeps_custom_data_id_fn() {
        let mut tree: Tree<String> =
            Tree::with_data_id_fn("keyed", |s: &String| DataId::new(s.len() as u64));
        let root = tree.root_id();
        tree.add_child(root, "ab".into()).unwrap();
        let copy = tree.copy();
        assert_eq!(copy.data_id_of(&"xy".into()), DataId::new(2));
        assert_eq!(copy.find_all(&"zz".into()).len(), 1);
    }

    #[test]
    fn test_override_does_not_migrate_existing_nodes() {
        let mut tree = fixture();
        let a = id_of(&tree, "A");
        let old = tree.node(a).unwrap().data_id();
        tree.set_data_id_fn(|_: &String| DataId::new(0));
        assert_eq!(tree.node(a).unwrap().data_id(), old);
        assert!(tree.find_all(&"A".into()).is_empty());
        assert_eq!(tree.find_by_data_id(old), &[a]);
    }

    #[test]
    fn test_copy_subtree_to_other_tree() {
        let tree = fixture();
        let mut other: Tree<String> = Tree::named("other");
        let root = other.root_id();
        let top = tree.copy_subtree_to(id_of(&tree, "a1"), &mut other, root).unwrap();
        assert_eq!(other.count(), 3);
        assert_eq!(other.children(top).len(), 2);
        assert!(other.self_check());
    }

    #[test]
    #[should_panic(expected = "already has children")]
    fn test_copy_into_populated_node_panics() {
        let tree = fixture();
        let mut other = fixture();
        let a = id_of(&other, "A");
        tree.copy_children_into(tree.root_id(), &mut other, a, &mut |_, _, _| {});
    }

    #[test]
    fn test_filter_keeps_ancestors_of_matches() {
        let mut tree = fixture();
        let removed = tree.filter(|n| n.data() == "a12");
        assert_eq!(removed, 5);
        assert_eq!(labels(&tree), vec!["A", "a1", "a12"]);
        assert!(tree.self_check());
    }

    #[test]
    fn test_filter_drops_unmatched_descendants() {
        let mut tree = fixture();
        tree.filter(|n| n.data() == "B");
        assert_eq!(labels(&tree), vec!["B"]);
    }

    #[test]
    fn test_copy_filtered_leaves_source_intact() {
        let tree = fixture();
        let filtered = tree.copy_filtered(|n| n.data().starts_with('b'));
        assert_eq!(labels(&filtered), vec!["B", "b1", "b11"]);
        assert_eq!(tree.count(), 8);
    }

    #[test]
    fn test_visit_skip_and_stop() {
        let tree = fixture();
        let mut seen = Vec::new();
        let finished = tree.visit(|n| {
            seen.push(n.data().clone());
            match n.data().as_str() {
                "a1" => Visit::SkipBranch,
                "b1" => Visit::Stop,
                _ => Visit::Continue,
            }
        });
        assert!(!finished);
        assert_eq!(seen, vec!["A", "a1", "a2", "B", "b1"]);
    }

    fn walk(tree: &Tree<String>, method: IterMethod) -> Vec<&str> {
        tree.iter_with(method).map(|n| n.data().as_str()).collect()
    }

    #[test]
    fn test_iter_methods() {
        let tree = fixture();
        assert_eq!(walk(&tree, IterMethod::PreOrder), labels(&tree));
        assert_eq!(
            walk(&tree, IterMethod::PostOrder),
            vec!["a11", "a12", "a1", "a2", "A", "b11", "b1", "B"]
        );
        assert_eq!(
            walk(&tree, IterMethod::LevelOrder),
            vec!["A", "B", "a1", "a2", "b1", "a11", "a12", "b11"]
        );
        let mut any = walk(&tree, IterMethod::Unordered);
        any.sort_unstable();
        let mut all = walk(&tree, IterMethod::PreOrder);
        all.sort_unstable();
        assert_eq!(any, all);
    }

    #[test]
    fn test_descendants_with_method() {
        let tree = fixture();
        let a = id_of(&tree, "A");
        let post: Vec<&str> = tree
            .descendants_with(a, IterMethod::PostOrder)
            .map(|n| n.data().as_str())
            .collect();
        assert_eq!(post, vec!["a11", "a12", "a1", "a2"]);

        let mut any: Vec<&str> = tree
            .descendants_with(a, IterMethod::Unordered)
            .map(|n| n.data().as_str())
            .collect();
        any.sort_unstable();
        assert_eq!(any, vec!["a1", "a11", "a12", "a2"]);
        assert_eq!(tree.descendants_with(id_of(&tree, "a2"), IterMethod::LevelOrder).count(), 0);
    }

    #[test]
    fn test_visit_level_order_skips_branch() {
        let tree = fixture();
        let mut seen = Vec::new();
        let finished = tree.visit_with(IterMethod::LevelOrder, |n| {
            seen.push(n.data().clone());
            if n.data() == "a1" {
                Visit::SkipBranch
            } else {
                Visit::Continue
            }
        });
        assert!(finished);
        assert_eq!(seen, vec!["A", "B", "a1", "a2", "b1", "b11"]);
    }

    #[test]
    fn test_visit_post_order_stops() {
        let tree = fixture();
        let mut seen = Vec::new();
        let finished = tree.visit_with(IterMethod::PostOrder, |n| {
            seen.push(n.data().clone());
            match n.data().as_str() {
                "A" => Visit::Stop,
                "a1" => Visit::SkipBranch,
                _ => Visit::Continue,
            }
        });
        assert!(!finished);
        assert_eq!(seen, vec!["a11", "a12", "a1", "a2", "A"]);
    }

    #[test]
    fn test_descendants_and_matches() {
        let tree = fixture();
        let a = id_of(&tree, "A");
        let below: Vec<&str> = tree.descendants(a).map(|n| n.data().as_str()).collect();
        assert_eq!(below, vec!["a1", "a11", "a12", "a2"]);
        assert_eq!(
            tree.find_first_match(|n| n.data().ends_with('2')),
            Some(id_of(&tree, "a12"))
        );
        assert_eq!(tree.find_all_match(|n| n.data().len() == 3).len(), 3);
    }

    #[test]
    fn test_sort_children_deep() {
        let mut tree = fixture();
        let root = tree.root_id();
        tree.sort_children(root, |s: &String| std::cmp::Reverse(s.clone()), true)
            .unwrap();
        assert_eq!(
            labels(&tree),
            vec!["B", "b1", "b11", "A", "a2", "a1", "a12", "a11"]
        );
        assert!(tree.self_check());
    }

    #[test]
    fn test_lock_is_reentrant() {
        let tree = fixture();
        let _outer = tree.lock();
        let copy = tree.copy();
        assert_eq!(copy.count(), 8);
    }
}
