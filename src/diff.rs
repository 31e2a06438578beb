//! Structural tree diff
//!
//! Compares a base tree against another tree and builds a third, merged tree
//! containing the union of both. Every changed node carries a `dc` metadata
//! entry ([`DiffClassification`]) describing the change from the base tree's
//! perspective:
//!
//! 1. Children are matched level by level on data identity. Each base child
//!    takes the first other-side child of equal identity that no earlier
//!    sibling claimed.
//! 2. Unmatched base children are `Removed`; unmatched other children are
//!    `Added`. One-sided subtrees are deep-copied with the same tag.
//! 3. A second pass pairs every `Added` node with its `Removed` clones anywhere
//!    in the output and retags them `MovedHere` / `MovedTo`.
//! 4. Optionally the output is reduced to changed nodes and their ancestors.
//!
//! Inputs are never mutated. The output shares data references with them.
//!
//! Author: ALICE contributors

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::{DataId, MetaValue, Node, NodeId};
use crate::tree::Tree;

/// Classification key
pub const META_DC: &str = "dc";
/// Set on a parent whose children were reordered
pub const META_REORDERED: &str = "dc_reordered";
/// Set on a node whose children all disappeared in the other tree
pub const META_CLEARED: &str = "dc_cleared";
/// Other-side parent identity of a removed node
pub const META_REF_PARENT: &str = "dc_ref_parent";
/// Data identity of a removed or added node
pub const META_REF_DATA: &str = "dc_ref_data";
/// Other-side node identity of an added node
pub const META_REF_NODE: &str = "dc_ref_node";

/// How a node of the merged tree differs from the base tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffClassification {
    /// Only present in the other tree
    Added,
    /// Only present in the base tree
    Removed,
    /// Added here, removed elsewhere
    MovedHere,
    /// Removed here, added elsewhere
    MovedTo,
    /// Same parent, different child position
    Shifted { old_index: usize, new_index: usize },
}

impl DiffClassification {
    /// Short display label
    pub fn label(&self) -> String {
        match self {
            DiffClassification::Added => String::from("Added"),
            DiffClassification::Removed => String::from("Removed"),
            DiffClassification::MovedHere => String::from("Moved here"),
            DiffClassification::MovedTo => String::from("Moved away"),
            DiffClassification::Shifted {
                old_index,
                new_index,
            } => format!("Order {:+}", *new_index as i64 - *old_index as i64),
        }
    }
}

impl fmt::Display for DiffClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Diff engine configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Treat a changed child position as a change
    pub ordered: bool,
    /// Prune unchanged nodes that have no changed descendant
    pub reduce: bool,
    /// Record other-side identities needed for patch extraction
    pub include_reference_info: bool,
}

impl DiffOptions {
    pub fn ordered(mut self, on: bool) -> Self {
        self.ordered = on;
        self
    }

    pub fn reduce(mut self, on: bool) -> Self {
        self.reduce = on;
        self
    }

    pub fn include_reference_info(mut self, on: bool) -> Self {
        self.include_reference_info = on;
        self
    }
}

/// Classification counts of a merged tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub moved_here: usize,
    pub moved_to: usize,
    pub shifted: usize,
}

impl DiffSummary {
    pub fn of<T>(tree: &Tree<T>) -> Self {
        let mut s = Self::default();
        for node in tree {
            match tree.classification(node.id()) {
                Some(DiffClassification::Added) => s.added += 1,
                Some(DiffClassification::Removed) => s.removed += 1,
                Some(DiffClassification::MovedHere) => s.moved_here += 1,
                Some(DiffClassification::MovedTo) => s.moved_to += 1,
                Some(DiffClassification::Shifted { .. }) => s.shifted += 1,
                None => {}
            }
        }
        s
    }

    /// Number of classified nodes
    pub fn total(&self) -> usize {
        self.added + self.removed + self.moved_here + self.moved_to + self.shifted
    }

    pub fn is_unchanged(&self) -> bool {
        self.total() == 0
    }
}

impl<T> Tree<T> {
    /// The `dc` tag of a node, if any
    pub fn classification(&self, id: NodeId) -> Option<DiffClassification> {
        match self.get_meta(id, META_DC) {
            Some(MetaValue::Change(c)) => Some(*c),
            _ => None,
        }
    }

    /// True if a boolean diff flag such as [`META_REORDERED`] is set
    pub fn diff_flag(&self, id: NodeId, key: &str) -> bool {
        self.get_meta(id, key).is_some_and(MetaValue::is_truthy)
    }

    /// Compare this tree against `other`; see [`diff_tree`]
    pub fn diff(&self, other: &Tree<T>, options: DiffOptions) -> Tree<T> {
        diff_tree(self, other, options)
    }
}

/// Compare `base` against `other` and return the merged, classified tree.
///
/// The caller must keep both inputs unchanged for the duration of the call.
pub fn diff_tree<T>(base: &Tree<T>, other: &Tree<T>, options: DiffOptions) -> Tree<T> {
    tracing::debug!(
        base = base.name(),
        other = other.name(),
        base_count = base.count(),
        other_count = other.count(),
        ?options,
        "diff start"
    );

    let name = format!("diff({:?}, {:?})", base.name(), other.name());
    let mut run = DiffRun {
        base,
        other,
        out: Tree::with_hook(&name, base.data_id_hook()),
        options,
        added: Vec::new(),
        removed: Vec::new(),
    };
    let out_root = run.out.root_id();
    run.compare(base.root_id(), other.root_id(), out_root);
    let moves = run.pair_moves();

    let mut out = run.out;
    if options.reduce {
        let pruned = out.filter(|n| matches!(n.get_meta(META_DC), Some(MetaValue::Change(_))));
        tracing::debug!(pruned, "diff reduced");
    }

    let summary = DiffSummary::of(&out);
    tracing::debug!(
        count = out.count(),
        added = summary.added,
        removed = summary.removed,
        moved = moves,
        shifted = summary.shifted,
        "diff finished"
    );
    out
}

/// Set a metadata entry on a node the engine itself created
fn classify<T>(out: &mut Tree<T>, id: NodeId, key: &str, value: impl Into<MetaValue>) {
    if let Err(e) = out.set_meta(id, key, value) {
        panic!("diff output lost its own node: {e}");
    }
}

struct DiffRun<'a, T> {
    base: &'a Tree<T>,
    other: &'a Tree<T>,
    out: Tree<T>,
    options: DiffOptions,
    /// Output nodes tagged `Added`, in creation order
    added: Vec<NodeId>,
    /// Output nodes tagged `Removed`, in creation order
    removed: Vec<NodeId>,
}

impl<'a, T> DiffRun<'a, T> {
    fn append(&mut self, parent: NodeId, source: &Node<T>) -> NodeId {
        match self
            .out
            .add_child_with_data_id(parent, std::sync::Arc::clone(source.data_arc()), source.data_id())
        {
            Ok(id) => id,
            Err(e) => panic!("diff output lost its own node: {e}"),
        }
    }

    /// Recursive pairwise descent over `p0` (base), `p1` (other), `p2` (output)
    fn compare(&mut self, p0: NodeId, p1: NodeId, p2: NodeId) {
        let (base, other) = (self.base, self.other);
        let other_children = other.children(p1);
        let mut claimed = vec![false; other_children.len()];

        for (i0, &c0) in base.children(p0).iter().enumerate() {
            let Some(n0) = base.node(c0) else { continue };
            // First unclaimed clone wins, so sibling clones pair up in order
            let i1 = other_children.iter().enumerate().position(|(i, &c)| {
                !claimed[i] && other.node(c).map(Node::data_id) == Some(n0.data_id())
            });
            let c2 = self.append(p2, n0);

            let Some(i1) = i1 else {
                tracing::trace!(node = %c0, "removed");
                self.mark_removed(c2);
                if self.options.include_reference_info {
                    classify(&mut self.out, c2, META_REF_PARENT, p1);
                    classify(&mut self.out, c2, META_REF_DATA, n0.data_id());
                }
                if n0.has_children() {
                    self.copy_removed(c0, c2);
                }
                continue;
            };

            if i0 != i1 && self.options.ordered {
                tracing::trace!(node = %c0, i0, i1, "shifted");
                classify(
                    &mut self.out,
                    c2,
                    META_DC,
                    DiffClassification::Shifted {
                        old_index: i0,
                        new_index: i1,
                    },
                );
                classify(&mut self.out, p2, META_REORDERED, true);
            }

            claimed[i1] = true;
            let c1 = other_children[i1];
            let other_has_children = !other.children(c1).is_empty();
            if n0.has_children() && !other_has_children {
                classify(&mut self.out, c2, META_CLEARED, true);
            }
            if n0.has_children() || other_has_children {
                self.compare(c0, c1, c2);
            }
        }

        for (i1, &c1) in other_children.iter().enumerate() {
            if claimed[i1] {
                continue;
            }
            let Some(n1) = other.node(c1) else { continue };
            tracing::trace!(node = %c1, "added");
            let c2 = self.append(p2, n1);
            self.mark_added(c2, c1, n1.data_id());
            if n1.has_children() {
                self.copy_added(c1, c2);
            }
        }
    }

    fn mark_removed(&mut self, id: NodeId) {
        classify(&mut self.out, id, META_DC, DiffClassification::Removed);
        self.removed.push(id);
    }

    fn mark_added(&mut self, id: NodeId, source: NodeId, data_id: DataId) {
        classify(&mut self.out, id, META_DC, DiffClassification::Added);
        if self.options.include_reference_info {
            classify(&mut self.out, id, META_REF_NODE, source);
            classify(&mut self.out, id, META_REF_DATA, data_id);
        }
        self.added.push(id);
    }

    /// Deep-copy a base-only subtree below `dest`, tagging every node `Removed`
    fn copy_removed(&mut self, source: NodeId, dest: NodeId) {
        let base = self.base;
        let removed = &mut self.removed;
        base.copy_children_into(source, &mut self.out, dest, &mut |out, new_id, _| {
            classify(out, new_id, META_DC, DiffClassification::Removed);
            removed.push(new_id);
        });
    }

    /// Deep-copy an other-only subtree below `dest`, tagging every node `Added`
    fn copy_added(&mut self, source: NodeId, dest: NodeId) {
        let other = self.other;
        let with_refs = self.options.include_reference_info;
        let added = &mut self.added;
        other.copy_children_into(source, &mut self.out, dest, &mut |out, new_id, src_id| {
            classify(out, new_id, META_DC, DiffClassification::Added);
            if with_refs {
                if let Some(data_id) = out.node(new_id).map(Node::data_id) {
                    classify(out, new_id, META_REF_DATA, data_id);
                }
                classify(out, new_id, META_REF_NODE, src_id);
            }
            added.push(new_id);
        });
    }

    /// Retag `Added` nodes that have `Removed` clones as moves.
    ///
    /// Global over the whole output; the first added clone claims every
    /// removed clone present at that moment.
    fn pair_moves(&mut self) -> usize {
        let mut moves = 0;
        for &id in &self.added {
            let Some(data_id) = self.out.node(id).map(Node::data_id) else { continue };
            let gone: Vec<NodeId> = self
                .out
                .find_by_data_id(data_id)
                .iter()
                .copied()
                .filter(|&c| self.out.classification(c) == Some(DiffClassification::Removed))
                .collect();
            if gone.is_empty() {
                continue;
            }
            classify(&mut self.out, id, META_DC, DiffClassification::MovedHere);
            for c in gone {
                classify(&mut self.out, c, META_DC, DiffClassification::MovedTo);
            }
            moves += 1;
        }
        tracing::trace!(removed = self.removed.len(), moves, "moves paired");
        moves
    }
}

/// Render a merged-tree node as `"<data> - [Label], [Flag]"`
pub fn format_diff_node<T: fmt::Display>(tree: &Tree<T>, id: NodeId) -> String {
    let Some(node) = tree.node(id) else {
        return String::new();
    };
    let mut out = node.data().to_string();
    let mut flags = Vec::new();
    if let Some(c) = tree.classification(id) {
        flags.push(c.label());
    }
    if tree.diff_flag(id, META_REORDERED) {
        flags.push(String::from("Renumbered"));
    }
    if tree.diff_flag(id, META_CLEARED) {
        flags.push(String::from("Children cleared"));
    }
    if !flags.is_empty() {
        out.push_str(" - [");
        out.push_str(&flags.join("], ["));
        out.push(']');
    }
    out
}
