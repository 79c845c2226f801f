use std::fmt;

use ftgs_common::{Result, error::Error, verify_data};

use crate::term::{Term, TermId};

/// All postings of one term id: the docid addresses and doc-freqs of every
/// occurrence of the id, with the index of the source shard each came from.
///
/// The three arrays always have the same length.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TermDesc {
    id: TermId,
    docid_addresses: Vec<i64>,
    doc_freqs: Vec<i32>,
    sources: Vec<u32>,
}

impl TermDesc {
    pub fn new(id: TermId) -> TermDesc {
        TermDesc {
            id,
            ..Default::default()
        }
    }

    pub fn id(&self) -> &TermId {
        &self.id
    }

    pub fn docid_addresses(&self) -> &[i64] {
        &self.docid_addresses
    }

    pub fn doc_freqs(&self) -> &[i32] {
        &self.doc_freqs
    }

    pub fn sources(&self) -> &[u32] {
        &self.sources
    }

    /// Clears the postings and re-seeds the descriptor with `id`.
    pub fn reset(&mut self, id: TermId) {
        self.id = id;
        self.docid_addresses.clear();
        self.doc_freqs.clear();
        self.sources.clear();
    }

    /// Appends the posting of `term`, read from source `source`.
    pub fn push(&mut self, term: &Term, source: u32) -> Result<()> {
        if *term.id() != self.id {
            return Err(Error::invalid_format(
                "term descriptor",
                format!("term {} appended to descriptor of {}", term.id(), self.id),
            ));
        }
        self.docid_addresses.push(term.doc_offset());
        self.doc_freqs.push(term.doc_freq());
        self.sources.push(source);
        Ok(())
    }

    /// Appends all postings of `other`, which must describe the same id.
    pub fn extend_from(&mut self, other: &TermDesc) -> Result<()> {
        if other.id != self.id {
            return Err(Error::invalid_format(
                "term descriptor",
                format!("descriptor of {} merged into {}", other.id, self.id),
            ));
        }
        other.check_invariant()?;
        self.docid_addresses.extend_from_slice(&other.docid_addresses);
        self.doc_freqs.extend_from_slice(&other.doc_freqs);
        self.sources.extend_from_slice(&other.sources);
        Ok(())
    }

    pub fn check_invariant(&self) -> Result<()> {
        verify_data!(doc_freqs, self.doc_freqs.len() == self.docid_addresses.len());
        verify_data!(sources, self.sources.len() == self.doc_freqs.len());
        Ok(())
    }

    /// Number of postings.
    pub fn count(&self) -> usize {
        self.docid_addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Total number of documents containing the term, across all postings.
    pub fn total_doc_freq(&self) -> i64 {
        self.doc_freqs.iter().map(|&f| f as i64).sum()
    }

    /// Iterates `(docid_address, doc_freq, source)` triples.
    pub fn postings(&self) -> impl Iterator<Item = (i64, i32, u32)> + '_ {
        self.docid_addresses
            .iter()
            .zip(&self.doc_freqs)
            .zip(&self.sources)
            .map(|((&addr, &freq), &source)| (addr, freq, source))
    }
}

impl fmt::Display for TermDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.id)?;
        for (i, (addr, freq)) in self.docid_addresses.iter().zip(&self.doc_freqs).enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            write!(f, "( {addr}, {freq} )")?;
        }
        f.write_str("}")
    }
}

/// Groups the consecutive same-id terms of one ascending term source into
/// [`TermDesc`]s.
///
/// Postings are tagged with the index of the source. The first error of the
/// underlying iterator is yielded and ends the iteration.
#[derive(Clone, Debug)]
pub struct TermDescIter<I> {
    inner: I,
    source: u32,
    lookahead: Option<Term>,
    done: bool,
}

impl<I> TermDescIter<I>
where
    I: Iterator<Item = Result<Term>>,
{
    pub fn new(inner: I, source: u32) -> TermDescIter<I> {
        TermDescIter {
            inner,
            source,
            lookahead: None,
            done: false,
        }
    }

    pub fn source(&self) -> u32 {
        self.source
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    fn pull(&mut self) -> Option<Result<Term>> {
        match self.lookahead.take() {
            Some(term) => Some(Ok(term)),
            None => self.inner.next(),
        }
    }

    fn fail(&mut self, e: Error) -> Option<Result<TermDesc>> {
        self.done = true;
        self.lookahead = None;
        Some(Err(e))
    }
}

impl<I> Iterator for TermDescIter<I>
where
    I: Iterator<Item = Result<Term>>,
{
    type Item = Result<TermDesc>;

    fn next(&mut self) -> Option<Result<TermDesc>> {
        if self.done {
            return None;
        }
        let first = match self.pull() {
            Some(Ok(term)) => term,
            Some(Err(e)) => return self.fail(e),
            None => {
                self.done = true;
                return None;
            }
        };
        let mut desc = TermDesc::new(first.id().clone());
        if let Err(e) = desc.push(&first, self.source) {
            return self.fail(e);
        }
        loop {
            match self.inner.next() {
                Some(Ok(term)) if term.id() == desc.id() => {
                    if let Err(e) = desc.push(&term, self.source) {
                        return self.fail(e);
                    }
                }
                Some(Ok(term)) => {
                    self.lookahead = Some(term);
                    break;
                }
                Some(Err(e)) => return self.fail(e),
                None => break,
            }
        }
        Some(Ok(desc))
    }
}
