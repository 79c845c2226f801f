//! Assignment of term ids to splits.

use crate::term::TermId;

/// Maps a term id to one of `num_splits` splits.
///
/// `split_of` must be a pure function of the id and `num_splits`, so that every
/// shard and every run agree on where a term goes.
pub trait Partitioner: Send + Sync + std::fmt::Debug {
    /// Returns the split of `id`, in `0..num_splits`. `num_splits` is never zero.
    fn split_of(&self, id: &TermId, num_splits: usize) -> usize;
}

/// Splits by `xxh3_64(id) mod num_splits`, hashing the little-endian bytes of
/// int ids and the raw bytes of string ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HashPartitioner {
    seed: u64,
}

impl HashPartitioner {
    pub fn new() -> HashPartitioner {
        Default::default()
    }

    pub fn with_seed(seed: u64) -> HashPartitioner {
        HashPartitioner { seed }
    }
}

impl Partitioner for HashPartitioner {
    fn split_of(&self, id: &TermId, num_splits: usize) -> usize {
        (id.stable_hash(self.seed) % num_splits as u64) as usize
    }
}

/// Splits int ids by `id mod num_splits` (Euclidean, so negative ids land in
/// range too). String ids fall back to the hash partitioner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModuloPartitioner;

impl Partitioner for ModuloPartitioner {
    fn split_of(&self, id: &TermId, num_splits: usize) -> usize {
        match id {
            TermId::Int(id) => id.rem_euclid(num_splits as i64) as usize,
            TermId::Bytes(_) => HashPartitioner::new().split_of(id, num_splits),
        }
    }
}
