//! Shard access and term merging for FTGS execution.
//!
//! A [`Shard`](shard::Shard) exposes per-field term iterators over its mapped
//! term files. A [`TermProvider`](term_provider::TermProvider) combines the
//! iterators of every shard for one field and partitions the merged term
//! space into splits, each read through a
//! [`MergeIterator`](merge_iterator::MergeIterator).

pub mod field_stats;
pub mod map_cache;
pub mod merge_iterator;
pub mod packed_table;
pub mod partition;
pub mod shard;
pub mod term;
pub mod term_desc;
pub mod term_iterator;
pub mod term_provider;

#[cfg(test)]
mod tests;
