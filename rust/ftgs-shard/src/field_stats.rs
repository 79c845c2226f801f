//! Summary statistics of one field of one shard.

use ftgs_common::Result;
use ftgs_format::field_files::DocIdIter;

use crate::{shard::Shard, term::TermId};

/// Summary of a field's term and doc-id files, gathered by decoding both in
/// full.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldStats {
    pub term_count: usize,
    pub min_id: Option<TermId>,
    pub max_id: Option<TermId>,
    pub max_doc_freq: i32,
    pub total_doc_freq: i64,
    pub min_doc_id: Option<i64>,
    pub max_doc_id: Option<i64>,
}

/// Scans every term of `field` in `shard` and every posting it points to.
///
/// Fails on the first malformed term or posting list.
pub fn scan_field(shard: &Shard, field: &str) -> Result<FieldStats> {
    let docs = shard.field(field)?.docs.clone();
    let mut stats = FieldStats::default();
    for term in shard.term_iter(field)? {
        let term = term?;
        stats.term_count += 1;
        if stats.min_id.is_none() {
            stats.min_id = Some(term.id().clone());
        }
        stats.max_id = Some(term.id().clone());
        stats.max_doc_freq = stats.max_doc_freq.max(term.doc_freq());
        stats.total_doc_freq += term.doc_freq() as i64;
        for doc_id in DocIdIter::new(&docs, term.doc_offset(), term.doc_freq())? {
            let doc_id = doc_id?;
            stats.min_doc_id = Some(stats.min_doc_id.map_or(doc_id, |d| d.min(doc_id)));
            stats.max_doc_id = Some(stats.max_doc_id.map_or(doc_id, |d| d.max(doc_id)));
        }
    }
    Ok(stats)
}
