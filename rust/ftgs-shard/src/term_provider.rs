use std::sync::Arc;

use ftgs_common::{Result, error::Error, verify_arg};
use ftgs_format::TermKind;

use crate::{
    merge_iterator::{MergeIterator, SplitTerms},
    partition::{HashPartitioner, Partitioner},
    shard::Shard,
    term_iterator::TermIterator,
};

/// The term sources of one field across all shards of a run, partitioned
/// into `num_splits` disjoint splits.
///
/// Every split re-reads each shard's term file from the start and keeps the
/// terms the partitioner assigns to it. `merge_iter` hands out independent
/// iterators, so the splits can be processed concurrently.
#[derive(Clone, Debug)]
pub struct TermProvider {
    sources: Vec<(Shard, TermIterator)>,
    field: String,
    kind: TermKind,
    num_splits: usize,
    partitioner: Arc<dyn Partitioner>,
}

impl TermProvider {
    /// Creates a provider using the default [`HashPartitioner`].
    pub fn new(shards: &[Shard], field: &str, num_splits: usize) -> Result<TermProvider> {
        Self::with_partitioner(shards, field, num_splits, Arc::new(HashPartitioner::new()))
    }

    pub fn with_partitioner(
        shards: &[Shard],
        field: &str,
        num_splits: usize,
        partitioner: Arc<dyn Partitioner>,
    ) -> Result<TermProvider> {
        verify_arg!(num_splits, num_splits > 0);
        verify_arg!(shards, !shards.is_empty());
        verify_arg!(shards, shards.len() <= u32::MAX as usize);
        let kind = shards[0].field(field)?.kind;
        let sources = shards
            .iter()
            .map(|shard| {
                let files = shard.field(field)?;
                if files.kind != kind {
                    return Err(Error::invalid_arg(
                        "field",
                        format!(
                            "'{field}' is a {} field in shard {} but a {kind} field in shard {}",
                            files.kind,
                            shard.directory().display(),
                            shards[0].directory().display()
                        ),
                    ));
                }
                Ok((shard.clone(), shard.term_iter(field)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TermProvider {
            sources,
            field: field.to_string(),
            kind,
            num_splits,
            partitioner,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> TermKind {
        self.kind
    }

    pub fn num_splits(&self) -> usize {
        self.num_splits
    }

    pub fn partitioner(&self) -> &Arc<dyn Partitioner> {
        &self.partitioner
    }

    pub fn shard_count(&self) -> usize {
        self.sources.len()
    }

    /// Returns the shard whose postings are tagged with source index `index`.
    pub fn shard(&self, index: u32) -> Option<&Shard> {
        self.sources.get(index as usize).map(|(shard, _)| shard)
    }

    /// Returns a fresh merge over the terms of `split`.
    pub fn merge_iter(&self, split: usize) -> Result<MergeIterator> {
        if split >= self.num_splits {
            return Err(Error::invalid_arg(
                "split",
                format!("{split} is out of range (num_splits {})", self.num_splits),
            ));
        }
        Ok(MergeIterator::new(self.sources.iter().enumerate().map(
            |(index, (_, terms))| {
                let terms = if self.num_splits == 1 {
                    SplitTerms::all(terms.clone())
                } else {
                    SplitTerms::filtered(
                        terms.clone(),
                        self.partitioner.clone(),
                        split,
                        self.num_splits,
                    )
                };
                (index as u32, terms)
            },
        )))
    }

    /// Returns a fresh merge over all terms of the field, ignoring splits.
    pub fn merge_all(&self) -> MergeIterator {
        MergeIterator::new(
            self.sources
                .iter()
                .enumerate()
                .map(|(index, (_, terms))| (index as u32, SplitTerms::all(terms.clone()))),
        )
    }
}
