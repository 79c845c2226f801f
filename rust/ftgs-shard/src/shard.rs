use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ahash::AHashMap;
use ftgs_common::{Result, error::Error};
use ftgs_format::{
    TermKind,
    field_files::{docid_file_path, term_file_path},
};

use crate::{
    map_cache::{MapCache, Mapping},
    packed_table::{MemoryTable, PackedTable},
    term_iterator::TermIterator,
};

/// Represents a single on-disk data shard.
///
/// A shard is a directory holding a term file and a doc-id file per field,
/// plus a packed table with the group and stat columns of its documents.
/// All field files are mapped through the shared [`MapCache`] when the shard
/// is opened.
///
/// `Shard` uses an `Arc` internally, so cloning it is cheap.
#[derive(Clone)]
pub struct Shard(Arc<ShardContext>);

struct ShardContext {
    directory: PathBuf,
    int_fields: Vec<String>,
    string_fields: Vec<String>,
    fields: AHashMap<String, FieldFiles>,
    table: Arc<dyn PackedTable>,
    map_cache: Arc<MapCache>,
}

/// The mapped files of one field of a shard.
#[derive(Clone, Debug)]
pub struct FieldFiles {
    pub kind: TermKind,
    pub terms: Arc<Mapping>,
    pub docs: Arc<Mapping>,
}

impl Shard {
    /// Returns the shard directory.
    pub fn directory(&self) -> &Path {
        &self.0.directory
    }

    pub fn int_fields(&self) -> &[String] {
        &self.0.int_fields
    }

    pub fn string_fields(&self) -> &[String] {
        &self.0.string_fields
    }

    /// Returns the packed table of this shard's documents.
    pub fn table(&self) -> &Arc<dyn PackedTable> {
        &self.0.table
    }

    pub fn map_cache(&self) -> &Arc<MapCache> {
        &self.0.map_cache
    }

    /// Returns the mapped files of `name`.
    pub fn field(&self, name: &str) -> Result<&FieldFiles> {
        self.0.fields.get(name).ok_or_else(|| {
            Error::invalid_arg(
                "field",
                format!("'{name}' is not a field of shard {}", self.directory().display()),
            )
        })
    }

    /// Opens a fresh iterator over the terms of `field`.
    pub fn term_iter(&self, field: &str) -> Result<TermIterator> {
        Ok(TermIterator::new(self, field, self.field(field)?))
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("directory", &self.0.directory)
            .field("int_fields", &self.0.int_fields)
            .field("string_fields", &self.0.string_fields)
            .finish_non_exhaustive()
    }
}

/// Options for opening a [`Shard`].
pub struct ShardOptions {
    map_cache: Arc<MapCache>,
    int_fields: Vec<String>,
    string_fields: Vec<String>,
    table: Option<Arc<dyn PackedTable>>,
}

impl ShardOptions {
    pub fn new(map_cache: Arc<MapCache>) -> ShardOptions {
        ShardOptions {
            map_cache,
            int_fields: Vec::new(),
            string_fields: Vec::new(),
            table: None,
        }
    }

    pub fn int_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.int_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn string_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.string_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the packed table of the shard. Without one the shard gets an
    /// empty table (no rows, no columns).
    pub fn table(mut self, table: Arc<dyn PackedTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// Opens the shard in `directory`, mapping the term and doc-id files of
    /// every configured field.
    ///
    /// A missing or unreadable field file fails the open with an I/O error.
    pub fn open(self, directory: impl Into<PathBuf>) -> Result<Shard> {
        let directory = directory.into();
        let mut fields = AHashMap::with_capacity(self.int_fields.len() + self.string_fields.len());
        let typed = self
            .int_fields
            .iter()
            .map(|f| (f, TermKind::Int))
            .chain(self.string_fields.iter().map(|f| (f, TermKind::String)));
        for (name, kind) in typed {
            if fields.contains_key(name.as_str()) {
                return Err(Error::invalid_arg(
                    "fields",
                    format!("field '{name}' is listed more than once"),
                ));
            }
            let terms = self
                .map_cache
                .get_or_map(&term_file_path(&directory, name, kind))?;
            let docs = self
                .map_cache
                .get_or_map(&docid_file_path(&directory, name, kind))?;
            fields.insert(name.clone(), FieldFiles { kind, terms, docs });
        }
        let table = self
            .table
            .unwrap_or_else(|| Arc::new(MemoryTable::new(0, 0)));
        Ok(Shard(Arc::new(ShardContext {
            directory,
            int_fields: self.int_fields,
            string_fields: self.string_fields,
            fields,
            table,
            map_cache: self.map_cache,
        })))
    }
}
