//! Encoder for the per-field term and doc-id files described in
//! [`field_files`](crate::field_files).

use std::path::Path;

use ftgs_common::{Result, error::Error, verify_arg};

use crate::{
    field_files::{TermKind, docid_file_path, term_file_path},
    varint::write_u64,
};

/// Builds the term file and doc-id file of one field in memory.
///
/// Terms must be pushed in ascending order. The `push_*_term` methods write the
/// posting list and the term entry together; the `*_entry` methods write a
/// term entry with an explicit location and leave the doc-id file alone, which
/// lets tests describe term files exactly (including malformed ones).
pub struct FieldFileWriter {
    kind: TermKind,
    terms: Vec<u8>,
    docs: Vec<u8>,
    prev_id: i64,
    prev_bytes: Vec<u8>,
    prev_offset: i64,
    count: usize,
}

impl FieldFileWriter {
    pub fn new(kind: TermKind) -> FieldFileWriter {
        FieldFileWriter {
            kind,
            terms: Vec::new(),
            docs: Vec::new(),
            prev_id: 0,
            prev_bytes: Vec::new(),
            prev_offset: 0,
            count: 0,
        }
    }

    pub fn kind(&self) -> TermKind {
        self.kind
    }

    /// Number of term entries written so far.
    pub fn term_count(&self) -> usize {
        self.count
    }

    /// Appends a posting list to the doc-id file and returns its offset.
    pub fn push_docs(&mut self, doc_ids: &[i64]) -> Result<i64> {
        verify_arg!(doc_ids, doc_ids.windows(2).all(|w| w[0] < w[1]));
        verify_arg!(doc_ids, doc_ids.first().is_none_or(|&d| d >= 0));
        let offset = self.docs.len() as i64;
        let mut prev = 0;
        for &doc_id in doc_ids {
            write_u64(&mut self.docs, (doc_id - prev) as u64);
            prev = doc_id;
        }
        Ok(offset)
    }

    /// Writes an int term together with its posting list.
    pub fn push_int_term(&mut self, id: i64, doc_ids: &[i64]) -> Result<()> {
        verify_arg!(doc_ids, !doc_ids.is_empty());
        if self.count > 0 && id <= self.prev_id {
            return Err(Error::invalid_arg(
                "id",
                format!("{id} does not follow {}", self.prev_id),
            ));
        }
        let offset = self.push_docs(doc_ids)?;
        self.push_int_entry(id, offset, doc_ids.len() as i64)
    }

    /// Writes a string term together with its posting list.
    pub fn push_string_term(&mut self, term: &[u8], doc_ids: &[i64]) -> Result<()> {
        verify_arg!(doc_ids, !doc_ids.is_empty());
        if self.count > 0 && term <= self.prev_bytes.as_slice() {
            return Err(Error::invalid_arg(
                "term",
                format!(
                    "{} does not follow {}",
                    String::from_utf8_lossy(term),
                    String::from_utf8_lossy(&self.prev_bytes)
                ),
            ));
        }
        let offset = self.push_docs(doc_ids)?;
        self.push_string_entry(term, offset, doc_ids.len() as i64)
    }

    /// Writes the term entry `(id, doc_offset, doc_freq)` as deltas against the
    /// previous entry, without validating anything.
    pub fn push_int_entry(&mut self, id: i64, doc_offset: i64, doc_freq: i64) -> Result<()> {
        verify_arg!(kind, self.kind == TermKind::Int);
        write_u64(&mut self.terms, id.wrapping_sub(self.prev_id) as u64);
        write_u64(
            &mut self.terms,
            doc_offset.wrapping_sub(self.prev_offset) as u64,
        );
        write_u64(&mut self.terms, doc_freq as u64);
        self.prev_id = id;
        self.prev_offset = doc_offset;
        self.count += 1;
        Ok(())
    }

    /// Writes the string term entry `(term, doc_offset, doc_freq)`, prefix-compressed
    /// against the previous term, without validating anything.
    pub fn push_string_entry(&mut self, term: &[u8], doc_offset: i64, doc_freq: i64) -> Result<()> {
        verify_arg!(kind, self.kind == TermKind::String);
        let shared = common_prefix_len(&self.prev_bytes, term);
        write_u64(&mut self.terms, (self.prev_bytes.len() - shared) as u64);
        write_u64(&mut self.terms, (term.len() - shared) as u64);
        self.terms.extend_from_slice(&term[shared..]);
        write_u64(
            &mut self.terms,
            doc_offset.wrapping_sub(self.prev_offset) as u64,
        );
        write_u64(&mut self.terms, doc_freq as u64);
        self.prev_bytes.clear();
        self.prev_bytes.extend_from_slice(term);
        self.prev_offset = doc_offset;
        self.count += 1;
        Ok(())
    }

    pub fn term_bytes(&self) -> &[u8] {
        &self.terms
    }

    pub fn doc_bytes(&self) -> &[u8] {
        &self.docs
    }

    /// Returns the encoded `(term file, doc-id file)` contents.
    pub fn finish(self) -> (Vec<u8>, Vec<u8>) {
        (self.terms, self.docs)
    }

    /// Writes both files for `field` into `shard_dir`.
    pub fn write_to(&self, shard_dir: &Path, field: &str) -> Result<()> {
        let terms_path = term_file_path(shard_dir, field, self.kind);
        std::fs::write(&terms_path, &self.terms)
            .map_err(|e| Error::io(terms_path.display().to_string(), e))?;
        let docs_path = docid_file_path(shard_dir, field, self.kind);
        std::fs::write(&docs_path, &self.docs)
            .map_err(|e| Error::io(docs_path.display().to_string(), e))?;
        Ok(())
    }
}

pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
