//! Data identity
//!
//! Nodes referencing equal data values share a [`DataId`]. By default it is a
//! content hash of the value, keyed with a per-process random seed: stable for
//! the life of the process, *not* reproducible across runs. Trees whose diffs
//! must compare across processes should install a hook returning a stable key
//! (see [`Tree::with_data_id_fn`](crate::Tree::with_data_id_fn)).
//!
//! Author: ALICE contributors

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::{Arc, OnceLock};

use crate::node::DataId;

/// Pluggable data identity function
pub type DataIdFn<T> = Arc<dyn Fn(&T) -> DataId + Send + Sync>;

fn process_seed() -> &'static RandomState {
    static SEED: OnceLock<RandomState> = OnceLock::new();
    SEED.get_or_init(RandomState::new)
}

/// Default data identity: process-seeded content hash
pub fn content_hash<T: Hash + ?Sized>(data: &T) -> DataId {
    DataId::new(process_seed().hash_one(data))
}

/// FNV-1a over raw bytes; stable across processes
pub fn stable_hash(bytes: &[u8]) -> DataId {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    DataId::new(h)
}
