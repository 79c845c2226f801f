//! Byte-level formats of the FTGS core.
//!
//! - [`varint`]: LEB128 varints and zigzag-encoded signed varints, the primitive
//!   codec of both the on-disk field files and the wire protocol.
//! - [`field_files`]: naming and decoding of the per-field term and doc-id files
//!   (format version [`field_files::FORMAT_VERSION`]).
//! - [`field_writer`]: encoder for the same files, used to produce shards for tests
//!   and tools.
//! - [`wire`]: record layout of the FTGS output stream and a decoder for it.

pub mod field_files;
pub mod field_writer;
pub mod varint;
pub mod wire;

pub use field_files::TermKind;
