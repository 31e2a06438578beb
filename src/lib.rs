//! ALICE-Tree — Clone-aware trees with structural diff
//!
//! One data value, many positions.
//!
//! In-memory trees where the same data value may appear at several positions
//! ("clones"), plus a diff engine that merges two trees into an annotated
//! third one:
//! - Clone index: O(1) lookup by node identity, ordered clone lists by data identity
//! - Structural diff with Added / Removed / Moved / Shifted classification
//! - Global move detection by pairing added and removed clones
//! - Change recorder: snapshot, mutate, diff
//! - Lazy, replayable add/remove patches
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`node`] | Nodes, node and data identities, metadata values |
//! | [`identity`] | Default (process-seeded) and stable data identity hashing |
//! | [`index`] | Clone index: node arena plus data-identity multimap |
//! | [`tree`] | Tree mutation, lookup, traversal, copy, filter |
//! | [`diff`] | Diff engine, classifications, options, formatter |
//! | [`recorder`] | Two-phase snapshot/diff change recorder |
//! | [`patch`] | Patch records and lazy extraction |
//! | [`error`] | Error types |
//!
//! # Quick Start
//!
//! ```
//! use alice_tree::{diff_tree, DiffClassification, DiffOptions, Tree};
//!
//! let mut old: Tree<String> = Tree::named("old");
//! let root = old.root_id();
//! let group = old.add_child(root, "group".into()).unwrap();
//! old.add_child(group, "sphere".into()).unwrap();
//!
//! // Same content, sphere moved to the toplevel
//! let mut new = old.copy();
//! let sphere = new.find_first(&"sphere".into()).unwrap();
//! let new_root = new.root_id();
//! new.move_node(sphere, new_root, None).unwrap();
//!
//! let diff = diff_tree(&old, &new, DiffOptions::default().reduce(true));
//! let tags: Vec<_> = diff.iter().filter_map(|n| diff.classification(n.id())).collect();
//! assert_eq!(tags, vec![DiffClassification::MovedTo, DiffClassification::MovedHere]);
//! ```
//!
//! Data identities come from a content hash seeded per process: they are
//! stable within one run only. Install a stable hook with
//! [`Tree::with_data_id_fn`] when diffs must be compared across runs.
//!
//! Author: ALICE contributors

pub mod diff;
pub mod error;
pub mod identity;
pub mod index;
pub mod node;
pub mod patch;
pub mod recorder;
pub mod tree;

pub use diff::{
    diff_tree, format_diff_node, DiffClassification, DiffOptions, DiffSummary, META_CLEARED,
    META_DC, META_REF_DATA, META_REF_NODE, META_REF_PARENT, META_REORDERED,
};
pub use error::{RecorderError, TreeError};
pub use identity::{content_hash, stable_hash, DataIdFn};
pub use index::CloneIndex;
pub use node::{DataId, Meta, MetaValue, Node, NodeId};
pub use patch::{extract_patch, Patch, PatchRecord};
pub use recorder::ChangeRecorder;
pub use tree::{Iter, IterMethod, Tree, Visit};
