//! Synthetic shard directories.

use std::path::Path;

use ftgs_format::{TermKind, field_writer::FieldFileWriter};

/// A raw int term file entry, written exactly as given.
///
/// Used to describe term files the regular writer refuses to produce, such as
/// zero doc-freqs or out-of-order ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntTerm {
    pub id: i64,
    pub doc_offset: i64,
    pub doc_freq: i64,
}

impl IntTerm {
    pub fn new(id: i64, doc_offset: i64, doc_freq: i64) -> IntTerm {
        IntTerm {
            id,
            doc_offset,
            doc_freq,
        }
    }
}

/// A shard directory in a temporary location, removed on drop.
pub struct ShardDir {
    dir: tempfile::TempDir,
}

impl ShardDir {
    pub fn new() -> anyhow::Result<ShardDir> {
        Ok(ShardDir {
            dir: tempfile::Builder::new().prefix("ftgs-shard").tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes an int field from ascending `(id, doc_ids)` pairs.
    pub fn write_int_field(&self, field: &str, terms: &[(i64, Vec<i64>)]) -> anyhow::Result<()> {
        let mut writer = FieldFileWriter::new(TermKind::Int);
        for (id, docs) in terms {
            writer.push_int_term(*id, docs)?;
        }
        writer.write_to(self.path(), field)?;
        Ok(())
    }

    /// Writes a string field from ascending `(term, doc_ids)` pairs.
    pub fn write_string_field<T: AsRef<[u8]>>(
        &self,
        field: &str,
        terms: &[(T, Vec<i64>)],
    ) -> anyhow::Result<()> {
        let mut writer = FieldFileWriter::new(TermKind::String);
        for (term, docs) in terms {
            writer.push_string_term(term.as_ref(), docs)?;
        }
        writer.write_to(self.path(), field)?;
        Ok(())
    }

    /// Writes an int term file from raw entries, with an empty doc-id file.
    pub fn write_int_entries(&self, field: &str, entries: &[IntTerm]) -> anyhow::Result<()> {
        self.write_int_entries_with_docs(field, entries, &[])
    }

    /// Writes an int term file from raw entries, followed by a doc-id file
    /// holding the given posting lists back to back.
    ///
    /// The caller is responsible for making the entries' offsets agree with
    /// the posting lists (see [`posting_offsets`]).
    pub fn write_int_entries_with_docs(
        &self,
        field: &str,
        entries: &[IntTerm],
        postings: &[Vec<i64>],
    ) -> anyhow::Result<()> {
        let mut writer = FieldFileWriter::new(TermKind::Int);
        for docs in postings {
            writer.push_docs(docs)?;
        }
        for entry in entries {
            writer.push_int_entry(entry.id, entry.doc_offset, entry.doc_freq)?;
        }
        writer.write_to(self.path(), field)?;
        Ok(())
    }

    /// Writes arbitrary bytes as the term file of `field`, with an empty doc-id
    /// file.
    pub fn write_raw_term_file(
        &self,
        field: &str,
        kind: TermKind,
        bytes: &[u8],
    ) -> anyhow::Result<()> {
        std::fs::write(
            ftgs_format::field_files::term_file_path(self.path(), field, kind),
            bytes,
        )?;
        std::fs::write(
            ftgs_format::field_files::docid_file_path(self.path(), field, kind),
            [],
        )?;
        Ok(())
    }
}

/// Offsets at which `postings` start when written back to back into a doc-id
/// file.
pub fn posting_offsets(postings: &[Vec<i64>]) -> anyhow::Result<Vec<i64>> {
    let mut writer = FieldFileWriter::new(TermKind::Int);
    postings
        .iter()
        .map(|docs| Ok(writer.push_docs(docs)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftgs_format::field_files::{IntTermDecoder, term_file_path};

    #[test]
    fn test_write_int_field() {
        let dir = ShardDir::new().unwrap();
        dir.write_int_field("f", &[(1, vec![0, 1]), (5, vec![2])])
            .unwrap();
        let data = std::fs::read(term_file_path(dir.path(), "f", TermKind::Int)).unwrap();
        let mut decoder = IntTermDecoder::new(&data);
        assert_eq!(decoder.next_entry().unwrap().unwrap().id_delta, 1);
        assert_eq!(decoder.next_entry().unwrap().unwrap().id_delta, 4);
        assert!(decoder.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_posting_offsets() {
        let offsets = posting_offsets(&[vec![1, 2], vec![300]]).unwrap();
        assert_eq!(offsets, vec![0, 2]);
    }
}
