use std::fmt;

use ftgs_format::{TermKind, wire::WireTerm};

/// Identifier of a term: a 64-bit integer for int fields, a byte string for
/// string fields.
///
/// Ids of the same kind order numerically or lexicographically by byte; a
/// field never mixes the two kinds.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TermId {
    Int(i64),
    Bytes(Vec<u8>),
}

impl TermId {
    /// The default id of the given kind, used by the empty term.
    pub fn default_for(kind: TermKind) -> TermId {
        match kind {
            TermKind::Int => TermId::Int(0),
            TermKind::String => TermId::Bytes(Vec::new()),
        }
    }

    pub fn kind(&self) -> TermKind {
        match self {
            TermId::Int(_) => TermKind::Int,
            TermId::Bytes(_) => TermKind::String,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TermId::Int(id) => Some(*id),
            TermId::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TermId::Int(_) => None,
            TermId::Bytes(bytes) => Some(bytes),
        }
    }

    /// Seeded xxh3 hash of the id, stable across runs and platforms.
    ///
    /// Int ids hash their little-endian bytes, byte ids their raw bytes.
    pub fn stable_hash(&self, seed: u64) -> u64 {
        match self {
            TermId::Int(id) => xxhash_rust::xxh3::xxh3_64_with_seed(&id.to_le_bytes(), seed),
            TermId::Bytes(bytes) => xxhash_rust::xxh3::xxh3_64_with_seed(bytes, seed),
        }
    }

    pub fn as_wire(&self) -> WireTerm<'_> {
        match self {
            TermId::Int(id) => WireTerm::Int(*id),
            TermId::Bytes(bytes) => WireTerm::Bytes(bytes),
        }
    }
}

impl Default for TermId {
    fn default() -> Self {
        TermId::Int(0)
    }
}

impl From<i64> for TermId {
    fn from(id: i64) -> Self {
        TermId::Int(id)
    }
}

impl From<&[u8]> for TermId {
    fn from(bytes: &[u8]) -> Self {
        TermId::Bytes(bytes.to_vec())
    }
}

impl From<&str> for TermId {
    fn from(s: &str) -> Self {
        TermId::Bytes(s.as_bytes().to_vec())
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermId::Int(id) => write!(f, "{id}"),
            TermId::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

/// A term of one shard's field: its id and the location and length of its
/// posting list in the field's doc-id file.
///
/// Terms order by `(id, doc_offset)`. The default term (doc_freq 0) is the
/// empty sentinel; every term decoded from a valid file has `doc_freq > 0`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Term {
    id: TermId,
    doc_offset: i64,
    doc_freq: i32,
}

impl Term {
    pub fn new(id: TermId, doc_offset: i64, doc_freq: i32) -> Term {
        Term {
            id,
            doc_offset,
            doc_freq,
        }
    }

    pub fn int(id: i64, doc_offset: i64, doc_freq: i32) -> Term {
        Term::new(TermId::Int(id), doc_offset, doc_freq)
    }

    pub fn bytes(id: impl AsRef<[u8]>, doc_offset: i64, doc_freq: i32) -> Term {
        Term::new(TermId::Bytes(id.as_ref().to_vec()), doc_offset, doc_freq)
    }

    pub fn id(&self) -> &TermId {
        &self.id
    }

    pub fn doc_offset(&self) -> i64 {
        self.doc_offset
    }

    pub fn doc_freq(&self) -> i32 {
        self.doc_freq
    }

    pub fn is_empty(&self) -> bool {
        self.doc_freq == 0
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id
            .cmp(&other.id)
            .then(self.doc_offset.cmp(&other.doc_offset))
            .then(self.doc_freq.cmp(&other.doc_freq))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id: {} doc_offset: {} doc_freq: {}",
            self.id, self.doc_offset, self.doc_freq
        )
    }
}
