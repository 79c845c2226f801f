use std::{path::PathBuf, sync::Arc};

use ftgs_common::{Result, error::Error};
use ftgs_format::{
    TermKind,
    field_files::{EntryDeltas, decode_int_entry, decode_string_entry},
};

use crate::{
    map_cache::Mapping,
    shard::{FieldFiles, Shard},
    term::{Term, TermId},
};

/// Ascending iterator over the terms of one (shard, field).
///
/// Terms are decoded lazily from the shard's mapped term file and checked
/// against the ordering contract: doc-freqs are positive and `(id,
/// doc_offset)` strictly increases. A violation or a truncated entry yields
/// a single malformed-data error naming the shard directory and field, after
/// which the iterator is exhausted.
///
/// `TermIterator::default()` is the end sentinel and compares equal to any
/// exhausted iterator.
#[derive(Clone, Default)]
pub struct TermIterator {
    source: Option<Arc<TermSource>>,
    pos: usize,
    bytes: Vec<u8>,
    current: Term,
    started: bool,
    exhausted: bool,
}

struct TermSource {
    directory: PathBuf,
    field: String,
    kind: TermKind,
    terms: Arc<Mapping>,
}

impl TermIterator {
    pub(crate) fn new(shard: &Shard, field: &str, files: &FieldFiles) -> TermIterator {
        TermIterator {
            source: Some(Arc::new(TermSource {
                directory: shard.directory().to_path_buf(),
                field: field.to_string(),
                kind: files.kind,
                terms: files.terms.clone(),
            })),
            pos: 0,
            bytes: Vec::new(),
            current: Term::default(),
            started: false,
            exhausted: false,
        }
    }

    /// The term most recently yielded, or the empty term before the first
    /// step and after exhaustion.
    pub fn current(&self) -> &Term {
        &self.current
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted || self.source.is_none()
    }

    pub fn kind(&self) -> Option<TermKind> {
        self.source.as_ref().map(|s| s.kind)
    }

    fn advance(&mut self, source: &TermSource) -> Result<Option<Term>> {
        let data: &[u8] = &source.terms;
        let decoded = match source.kind {
            TermKind::Int => decode_int_entry(data, &mut self.pos),
            TermKind::String => decode_string_entry(data, &mut self.pos, &mut self.bytes),
        };
        let Some(entry) = decoded.map_err(|e| source.malformed(e.to_string()))? else {
            return Ok(None);
        };
        let term = self.accumulate(source, entry)?;
        self.started = true;
        Ok(Some(term))
    }

    fn accumulate(&self, source: &TermSource, entry: EntryDeltas) -> Result<Term> {
        if entry.doc_freq <= 0 || entry.doc_freq > i32::MAX as i64 {
            return Err(source.malformed(format!(
                "doc_freq {} of term {} at offset {}",
                entry.doc_freq,
                self.current_or_next_id(source, &entry),
                self.pos
            )));
        }
        if entry.offset_delta < 0 {
            return Err(source.malformed(format!(
                "negative doc offset delta {} after {}",
                entry.offset_delta, self.current
            )));
        }
        let doc_offset = self
            .current
            .doc_offset()
            .checked_add(entry.offset_delta)
            .ok_or_else(|| source.malformed("doc offset overflow"))?;

        let id = match source.kind {
            TermKind::Int => {
                let prev = self.current.id().as_int().unwrap_or(0);
                if !self.started {
                    TermId::Int(prev.wrapping_add(entry.id_delta))
                } else if entry.id_delta < 0 {
                    return Err(source.malformed(format!(
                        "negative id delta {} after {}",
                        entry.id_delta, self.current
                    )));
                } else {
                    TermId::Int(
                        prev.checked_add(entry.id_delta)
                            .ok_or_else(|| source.malformed("term id overflow"))?,
                    )
                }
            }
            TermKind::String => {
                if self.started {
                    let prev = self.current.id().as_bytes().unwrap_or_default();
                    if self.bytes.as_slice() < prev {
                        return Err(source.malformed(format!(
                            "term '{}' follows '{}'",
                            String::from_utf8_lossy(&self.bytes),
                            String::from_utf8_lossy(prev)
                        )));
                    }
                }
                TermId::Bytes(self.bytes.clone())
            }
        };

        if self.started && id == *self.current.id() && entry.offset_delta == 0 {
            return Err(source.malformed(format!("duplicate term {}", self.current)));
        }
        Ok(Term::new(id, doc_offset, entry.doc_freq as i32))
    }

    fn current_or_next_id(&self, source: &TermSource, entry: &EntryDeltas) -> String {
        match source.kind {
            TermKind::Int => self
                .current
                .id()
                .as_int()
                .unwrap_or(0)
                .wrapping_add(entry.id_delta)
                .to_string(),
            TermKind::String => String::from_utf8_lossy(&self.bytes).into_owned(),
        }
    }
}

impl TermSource {
    fn malformed(&self, message: impl Into<String>) -> Error {
        Error::invalid_format(
            format!("shard {} field {}", self.directory.display(), self.field),
            message,
        )
    }
}

impl Iterator for TermIterator {
    type Item = Result<Term>;

    fn next(&mut self) -> Option<Result<Term>> {
        if self.is_exhausted() {
            return None;
        }
        let source = self.source.clone()?;
        match self.advance(&source) {
            Ok(Some(term)) => {
                self.current = term.clone();
                Some(Ok(term))
            }
            Ok(None) => {
                self.exhausted = true;
                self.current = Term::default();
                None
            }
            Err(e) => {
                self.exhausted = true;
                self.current = Term::default();
                Some(Err(e))
            }
        }
    }
}

impl PartialEq for TermIterator {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_exhausted(), other.is_exhausted()) {
            (true, true) => true,
            (false, false) => match (&self.source, &other.source) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b) && self.pos == other.pos,
                _ => false,
            },
            _ => false,
        }
    }
}

impl std::fmt::Debug for TermIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("TermIterator");
        if let Some(source) = &self.source {
            s.field("directory", &source.directory)
                .field("field", &source.field);
        }
        s.field("pos", &self.pos)
            .field("current", &self.current)
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}
