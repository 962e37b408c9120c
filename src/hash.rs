//! Deterministic hashing for the crate's ordered tables.
//!
//! Keys here are listener ids and caller-chosen map keys, never untrusted
//! input; foldhash runs with one process-wide seed.

use std::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};
use indexmap::IndexMap;

// Golden-ratio constant; any fixed value works.
const SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Hasher factory for listener tables and map storage.
///
/// Carries no state, so every table built with it hashes a key identically.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableHasher;

impl BuildHasher for TableHasher {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(SEED).build_hasher()
    }
}

/// Insertion-ordered map hashed with [`TableHasher`].
pub(crate) type FastIndexMap<K, V> = IndexMap<K, V, TableHasher>;

pub(crate) fn new_index_map<K, V>() -> FastIndexMap<K, V> {
    IndexMap::with_hasher(TableHasher)
}
