use std::sync::Arc;

use ftgs_common::Result;

use crate::{
    partition::Partitioner,
    term::Term,
    term_desc::{TermDesc, TermDescIter},
    term_iterator::TermIterator,
};

/// The terms of one shard that fall into one split.
#[derive(Clone, Debug)]
pub struct SplitTerms {
    terms: TermIterator,
    filter: Option<SplitFilter>,
}

#[derive(Clone, Debug)]
struct SplitFilter {
    partitioner: Arc<dyn Partitioner>,
    split: usize,
    num_splits: usize,
}

impl SplitTerms {
    /// All terms of `terms`, unfiltered.
    pub fn all(terms: TermIterator) -> SplitTerms {
        SplitTerms {
            terms,
            filter: None,
        }
    }

    /// The terms of `terms` whose id `partitioner` assigns to `split`.
    pub fn filtered(
        terms: TermIterator,
        partitioner: Arc<dyn Partitioner>,
        split: usize,
        num_splits: usize,
    ) -> SplitTerms {
        SplitTerms {
            terms,
            filter: Some(SplitFilter {
                partitioner,
                split,
                num_splits,
            }),
        }
    }

    pub fn terms(&self) -> &TermIterator {
        &self.terms
    }
}

impl Iterator for SplitTerms {
    type Item = Result<Term>;

    fn next(&mut self) -> Option<Result<Term>> {
        loop {
            let term = match self.terms.next()? {
                Ok(term) => term,
                Err(e) => return Some(Err(e)),
            };
            match &self.filter {
                Some(f) if f.partitioner.split_of(term.id(), f.num_splits) != f.split => continue,
                _ => return Some(Ok(term)),
            }
        }
    }
}

#[derive(Clone, Debug)]
struct MergeSource {
    descs: TermDescIter<SplitTerms>,
    head: Option<TermDesc>,
    exhausted: bool,
}

impl MergeSource {
    /// Makes sure the head holds the next descriptor of the source, unless the
    /// source is exhausted.
    fn fill(&mut self) -> Result<()> {
        if self.head.is_none() && !self.exhausted {
            match self.descs.next() {
                Some(Ok(desc)) => self.head = Some(desc),
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Err(e);
                }
                None => self.exhausted = true,
            }
        }
        Ok(())
    }
}

/// K-way merge of the term sources of one field into a single ascending
/// sequence of [`TermDesc`]s.
///
/// Each step yields the descriptor of the smallest id among the sources,
/// holding the postings of every source that contains the id, in source
/// order. The first source error is yielded once and ends the merge.
///
/// Two merge iterators are equal when their source iterators are equal; in
/// particular all finished merges are equal, and equal to
/// `MergeIterator::default()`.
#[derive(Clone, Debug)]
pub struct MergeIterator {
    sources: Vec<MergeSource>,
    current: TermDesc,
    done: bool,
}

impl MergeIterator {
    /// Creates a merge over `(source index, terms)` pairs. Postings are tagged
    /// with their source index, normally the index of the shard.
    pub fn new(sources: impl IntoIterator<Item = (u32, SplitTerms)>) -> MergeIterator {
        let sources = sources
            .into_iter()
            .map(|(index, terms)| MergeSource {
                descs: TermDescIter::new(terms, index),
                head: None,
                exhausted: false,
            })
            .collect::<Vec<_>>();
        MergeIterator {
            done: sources.is_empty(),
            sources,
            current: TermDesc::default(),
        }
    }

    /// The descriptor most recently yielded; empty when the merge is done.
    pub fn current(&self) -> &TermDesc {
        &self.current
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn advance(&mut self) -> Result<Option<TermDesc>> {
        for source in &mut self.sources {
            source.fill()?;
        }
        let Some(min_id) = self
            .sources
            .iter()
            .filter_map(|s| s.head.as_ref().map(|h| h.id()))
            .min()
            .cloned()
        else {
            return Ok(None);
        };
        let mut desc = TermDesc::new(min_id);
        for source in &mut self.sources {
            if let Some(head) = source.head.take_if(|h| h.id() == desc.id()) {
                desc.extend_from(&head)?;
            }
        }
        Ok(Some(desc))
    }

    fn finish(&mut self) {
        self.done = true;
        self.current = TermDesc::default();
        for source in &mut self.sources {
            source.head = None;
        }
    }
}

impl Default for MergeIterator {
    fn default() -> Self {
        MergeIterator::new(std::iter::empty())
    }
}

impl Iterator for MergeIterator {
    type Item = Result<TermDesc>;

    fn next(&mut self) -> Option<Result<TermDesc>> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(desc)) => {
                self.current = desc.clone();
                Some(Ok(desc))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl PartialEq for MergeIterator {
    fn eq(&self, other: &Self) -> bool {
        if self.done || other.done {
            return self.done == other.done;
        }
        self.sources.len() == other.sources.len()
            && self
                .sources
                .iter()
                .zip(&other.sources)
                .all(|(a, b)| a.descs.inner().terms() == b.descs.inner().terms())
    }
}
