//! Per-field shard files, format version 1.
//!
//! Every field of a shard is stored as two files in the shard directory:
//!
//! | kind   | term file              | doc-id file           |
//! |--------|------------------------|-----------------------|
//! | int    | `fld-<name>.intterms`  | `fld-<name>.intdocs`  |
//! | string | `fld-<name>.strterms`  | `fld-<name>.strdocs`  |
//!
//! An int term file is a sequence of `(id_delta, offset_delta, doc_freq)`
//! varint triples. Ids and offsets are accumulated from zero; the first id
//! delta carries the (possibly negative) first id as a two's-complement `u64`.
//!
//! A string term file is a sequence of
//! `(remove_len, add_len, add_bytes, offset_delta, doc_freq)`, where the term is
//! the previous term with its last `remove_len` bytes dropped and `add_bytes`
//! appended.
//!
//! A doc-id file holds, at each offset recorded in the term file, `doc_freq`
//! varint deltas of ascending document ids starting from zero.
//!
//! The decoders in this module check only the structure of the files (complete
//! varints, in-range lengths). Ordering and positivity are checked by the term
//! iterator, which knows the shard and field it is reading.

use std::path::{Path, PathBuf};

use ftgs_common::{Result, error::Error};

use crate::varint::VarIntReader;

pub const FORMAT_VERSION: u32 = 1;

/// The kind of term ids stored in a field.
///
/// The discriminant is the term-type tag written to the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TermKind {
    String = 0,
    Int = 1,
}

impl TermKind {
    pub fn term_file_extension(self) -> &'static str {
        match self {
            TermKind::Int => "intterms",
            TermKind::String => "strterms",
        }
    }

    pub fn docid_file_extension(self) -> &'static str {
        match self {
            TermKind::Int => "intdocs",
            TermKind::String => "strdocs",
        }
    }

    pub fn wire_tag(self) -> u8 {
        self as u8
    }

    pub fn from_wire_tag(tag: u8) -> Option<TermKind> {
        match tag {
            0 => Some(TermKind::String),
            1 => Some(TermKind::Int),
            _ => None,
        }
    }
}

impl std::fmt::Display for TermKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TermKind::Int => f.write_str("int"),
            TermKind::String => f.write_str("string"),
        }
    }
}

pub fn term_file_path(shard_dir: &Path, field: &str, kind: TermKind) -> PathBuf {
    shard_dir.join(format!("fld-{field}.{}", kind.term_file_extension()))
}

pub fn docid_file_path(shard_dir: &Path, field: &str, kind: TermKind) -> PathBuf {
    shard_dir.join(format!("fld-{field}.{}", kind.docid_file_extension()))
}

/// One decoded term file entry: the deltas as stored, before accumulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryDeltas {
    pub id_delta: i64,
    pub offset_delta: i64,
    pub doc_freq: i64,
}

/// Decodes the int term entry at `*pos`, advancing `*pos` past it.
///
/// Returns `None` when `*pos` is at the end of `data`.
pub fn decode_int_entry(data: &[u8], pos: &mut usize) -> Result<Option<EntryDeltas>> {
    let mut reader = VarIntReader::at(data, *pos, "int term file")?;
    if reader.is_empty() {
        return Ok(None);
    }
    let id_delta = reader.read_i64()?;
    let offset_delta = reader.read_i64()?;
    let doc_freq = reader.read_i64()?;
    *pos = reader.position();
    Ok(Some(EntryDeltas {
        id_delta,
        offset_delta,
        doc_freq,
    }))
}

/// Decodes the string term entry at `*pos`, rebuilding the term in `term` from
/// the previous term it holds. `id_delta` of the result is always zero.
pub fn decode_string_entry(
    data: &[u8],
    pos: &mut usize,
    term: &mut Vec<u8>,
) -> Result<Option<EntryDeltas>> {
    let mut reader = VarIntReader::at(data, *pos, "string term file")?;
    if reader.is_empty() {
        return Ok(None);
    }
    let remove_len = reader.read_u64()?;
    let add_len = reader.read_u64()?;
    if remove_len > term.len() as u64 {
        return Err(Error::invalid_format(
            "string term file",
            format!(
                "prefix removal of {remove_len} bytes from a {} byte term at offset {}",
                term.len(),
                *pos
            ),
        ));
    }
    let suffix = reader.read_bytes(usize::try_from(add_len).unwrap_or(usize::MAX))?;
    let offset_delta = reader.read_i64()?;
    let doc_freq = reader.read_i64()?;
    term.truncate(term.len() - remove_len as usize);
    term.extend_from_slice(suffix);
    *pos = reader.position();
    Ok(Some(EntryDeltas {
        id_delta: 0,
        offset_delta,
        doc_freq,
    }))
}

/// Decoder of an int term file.
#[derive(Clone, Debug)]
pub struct IntTermDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> IntTermDecoder<'a> {
    pub fn new(data: &'a [u8]) -> IntTermDecoder<'a> {
        IntTermDecoder { data, pos: 0 }
    }

    /// Byte position of the next entry.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Decodes the next entry, or `None` at the end of the file.
    pub fn next_entry(&mut self) -> Result<Option<EntryDeltas>> {
        decode_int_entry(self.data, &mut self.pos)
    }
}

/// Decoder of a prefix-compressed string term file.
///
/// The decoder owns the bytes of the current term, which are rebuilt in place
/// from each entry's prefix removal and suffix.
#[derive(Clone, Debug)]
pub struct StringTermDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    term: Vec<u8>,
}

impl<'a> StringTermDecoder<'a> {
    pub fn new(data: &'a [u8]) -> StringTermDecoder<'a> {
        StringTermDecoder {
            data,
            pos: 0,
            term: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// The bytes of the most recently decoded term.
    pub fn term(&self) -> &[u8] {
        &self.term
    }

    pub fn next_entry(&mut self) -> Result<Option<EntryDeltas>> {
        decode_string_entry(self.data, &mut self.pos, &mut self.term)
    }
}

/// Iterator over the document ids of one posting list.
#[derive(Clone, Debug)]
pub struct DocIdIter<'a> {
    reader: VarIntReader<'a>,
    remaining: usize,
    doc_id: i64,
    first: bool,
}

impl<'a> DocIdIter<'a> {
    /// Positions a decoder at `offset` of the doc-id file `data` for a posting
    /// list of `doc_freq` entries.
    pub fn new(data: &'a [u8], offset: i64, doc_freq: i32) -> Result<DocIdIter<'a>> {
        if offset < 0 || doc_freq < 0 {
            return Err(Error::invalid_format(
                "doc-id file",
                format!("invalid posting location (offset {offset}, doc_freq {doc_freq})"),
            ));
        }
        Ok(DocIdIter {
            reader: VarIntReader::at(data, offset as usize, "doc-id file")?,
            remaining: doc_freq as usize,
            doc_id: 0,
            first: true,
        })
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Iterator for DocIdIter<'_> {
    type Item = Result<i64>;

    fn next(&mut self) -> Option<Result<i64>> {
        if self.remaining == 0 {
            return None;
        }
        let delta = ftgs_common::try_or_ret_some_err!(self.reader.read_i64().inspect_err(|_| {
            self.remaining = 0;
        }));
        self.remaining -= 1;
        // Doc ids start at zero and strictly ascend within a posting list.
        let min_delta = if self.first { 0 } else { 1 };
        self.first = false;
        match self.doc_id.checked_add(delta) {
            Some(doc_id) if delta >= min_delta => {
                self.doc_id = doc_id;
                Some(Ok(doc_id))
            }
            _ => {
                self.remaining = 0;
                Some(Err(Error::invalid_format(
                    "doc-id file",
                    format!("doc id delta {delta} after doc {}", self.doc_id),
                )))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::write_u64;

    #[test]
    fn test_file_names() {
        let dir = Path::new("/data/shard1");
        assert_eq!(
            term_file_path(dir, "country", TermKind::String),
            Path::new("/data/shard1/fld-country.strterms")
        );
        assert_eq!(
            docid_file_path(dir, "price", TermKind::Int),
            Path::new("/data/shard1/fld-price.intdocs")
        );
    }

    #[test]
    fn test_wire_tags() {
        assert_eq!(TermKind::String.wire_tag(), 0);
        assert_eq!(TermKind::Int.wire_tag(), 1);
        assert_eq!(TermKind::from_wire_tag(1), Some(TermKind::Int));
        assert_eq!(TermKind::from_wire_tag(7), None);
    }

    #[test]
    fn test_int_decoder() {
        let mut data = Vec::new();
        for v in [5u64, 0, 2, 3, 10, 1] {
            write_u64(&mut data, v);
        }
        let mut decoder = IntTermDecoder::new(&data);
        assert_eq!(
            decoder.next_entry().unwrap(),
            Some(EntryDeltas {
                id_delta: 5,
                offset_delta: 0,
                doc_freq: 2
            })
        );
        assert_eq!(
            decoder.next_entry().unwrap(),
            Some(EntryDeltas {
                id_delta: 3,
                offset_delta: 10,
                doc_freq: 1
            })
        );
        assert_eq!(decoder.next_entry().unwrap(), None);
    }

    #[test]
    fn test_int_decoder_truncated_entry() {
        let mut data = Vec::new();
        write_u64(&mut data, 5);
        write_u64(&mut data, 0);
        let mut decoder = IntTermDecoder::new(&data);
        assert!(decoder.next_entry().is_err());
    }

    #[test]
    fn test_string_decoder() {
        let mut data = Vec::new();
        // "apple"
        write_u64(&mut data, 0);
        write_u64(&mut data, 5);
        data.extend_from_slice(b"apple");
        write_u64(&mut data, 0);
        write_u64(&mut data, 1);
        // "apricot": drop "ple", add "ricot"
        write_u64(&mut data, 3);
        write_u64(&mut data, 5);
        data.extend_from_slice(b"ricot");
        write_u64(&mut data, 4);
        write_u64(&mut data, 2);

        let mut decoder = StringTermDecoder::new(&data);
        decoder.next_entry().unwrap().unwrap();
        assert_eq!(decoder.term(), b"apple");
        let entry = decoder.next_entry().unwrap().unwrap();
        assert_eq!(decoder.term(), b"apricot");
        assert_eq!(entry.offset_delta, 4);
        assert_eq!(entry.doc_freq, 2);
        assert!(decoder.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_string_decoder_bad_removal() {
        let mut data = Vec::new();
        write_u64(&mut data, 2);
        write_u64(&mut data, 1);
        data.push(b'a');
        write_u64(&mut data, 0);
        write_u64(&mut data, 1);
        let mut decoder = StringTermDecoder::new(&data);
        let err = decoder.next_entry().unwrap_err();
        assert!(err.is_invalid_format());
    }

    #[test]
    fn test_doc_ids() {
        let mut data = vec![0xaa, 0xbb];
        for v in [3u64, 1, 4] {
            write_u64(&mut data, v);
        }
        let docs = DocIdIter::new(&data, 2, 3)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(docs, vec![3, 4, 8]);

        let docs = DocIdIter::new(&data, 2, 2)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(docs, vec![3, 4]);
    }

    #[test]
    fn test_doc_ids_out_of_range() {
        let data = [1u8, 1];
        assert!(DocIdIter::new(&data, 3, 1).is_err());
        assert!(DocIdIter::new(&data, -1, 1).is_err());
        let mut it = DocIdIter::new(&data, 1, 2).unwrap();
        assert_eq!(it.next().unwrap().unwrap(), 1);
        assert!(it.next().unwrap().is_err());
        assert!(it.next().is_none());
    }

    #[test]
    fn test_doc_ids_negative_delta() {
        let mut data = Vec::new();
        write_u64(&mut data, 4);
        write_u64(&mut data, -1i64 as u64);
        let mut it = DocIdIter::new(&data, 0, 2).unwrap();
        assert_eq!(it.next().unwrap().unwrap(), 4);
        assert!(it.next().unwrap().is_err());
        assert!(it.next().is_none());
    }

    #[test]
    fn test_doc_ids_repeated_doc() {
        let mut data = Vec::new();
        for v in [0u64, 0] {
            write_u64(&mut data, v);
        }
        let mut it = DocIdIter::new(&data, 0, 2).unwrap();
        assert_eq!(it.next().unwrap().unwrap(), 0);
        let err = it.next().unwrap().unwrap_err();
        assert!(err.is_invalid_format());
        assert!(it.next().is_none());
    }
}
