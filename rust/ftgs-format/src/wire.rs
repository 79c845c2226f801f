//! FTGS output stream layout, wire version 1.
//!
//! An output stream has the grammar `(field_start term* field_end)* stream_end`;
//! the runner writes one field per stream, holding the results of one
//! (field, split) pair. Records start with a
//! one-byte [`RecordTag`]; integers are LEB128 varints (`varint`) or zigzag
//! varints (`svarint`), see [`varint`](crate::varint).
//!
//! ```text
//! field_start := 0x01 term_type:u8 name_len:varint name:bytes num_stats:varint
//! term        := 0x02 term_key doc_freq:varint group_count:varint group*
//! term_key    := id_delta:svarint                                  (int field)
//!              | shared_len:varint suffix_len:varint suffix:bytes   (string field)
//! group       := group_delta:varint stat:svarint{num_stats}
//! field_end   := 0x03
//! stream_end  := 0x04
//! ```
//!
//! `term_type` is 0 for string fields and 1 for int fields. Int ids are
//! delta-encoded against the previous term of the field (starting at 0);
//! string terms share a prefix with the previous term of the field (starting
//! empty). Groups within a term are strictly ascending and delta-encoded
//! against the previous group of the term (starting at 0).

use ftgs_common::{Result, error::Error};

use crate::{
    field_files::TermKind,
    field_writer::common_prefix_len,
    varint::{VarIntReader, write_i64_zigzag, write_u64},
};

pub const WIRE_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordTag {
    FieldStart = 0x01,
    Term = 0x02,
    FieldEnd = 0x03,
    StreamEnd = 0x04,
}

impl RecordTag {
    pub fn from_u8(tag: u8) -> Option<RecordTag> {
        match tag {
            0x01 => Some(RecordTag::FieldStart),
            0x02 => Some(RecordTag::Term),
            0x03 => Some(RecordTag::FieldEnd),
            0x04 => Some(RecordTag::StreamEnd),
            _ => None,
        }
    }
}

/// Borrowed term key handed to [`RecordEncoder::encode_term`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireTerm<'a> {
    Int(i64),
    Bytes(&'a [u8]),
}

/// Stateful record encoder for one stream.
///
/// The encoder keeps the delta state of the current field; it does not check
/// the record grammar, which is the job of the stream writer that owns it.
#[derive(Debug, Default)]
pub struct RecordEncoder {
    num_stats: usize,
    prev_int: i64,
    prev_bytes: Vec<u8>,
}

impl RecordEncoder {
    pub fn new() -> RecordEncoder {
        Default::default()
    }

    pub fn encode_field_start(
        &mut self,
        out: &mut Vec<u8>,
        field_name: &str,
        kind: TermKind,
        num_stats: usize,
    ) {
        self.num_stats = num_stats;
        self.prev_int = 0;
        self.prev_bytes.clear();
        out.push(RecordTag::FieldStart as u8);
        out.push(kind.wire_tag());
        write_u64(out, field_name.len() as u64);
        out.extend_from_slice(field_name.as_bytes());
        write_u64(out, num_stats as u64);
    }

    /// Encodes a term record. `stats` holds `num_stats` values per entry of
    /// `groups`, group-major; `groups` must be strictly ascending.
    pub fn encode_term(
        &mut self,
        out: &mut Vec<u8>,
        term: WireTerm<'_>,
        doc_freq: u64,
        groups: &[u32],
        stats: &[i64],
    ) -> Result<()> {
        if stats.len() != groups.len() * self.num_stats {
            return Err(Error::invalid_arg(
                "stats",
                format!(
                    "{} values for {} groups of {} stats",
                    stats.len(),
                    groups.len(),
                    self.num_stats
                ),
            ));
        }
        if groups.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::invalid_arg("groups", "groups must be strictly ascending"));
        }
        out.push(RecordTag::Term as u8);
        match term {
            WireTerm::Int(id) => {
                write_i64_zigzag(out, id.wrapping_sub(self.prev_int));
                self.prev_int = id;
            }
            WireTerm::Bytes(bytes) => {
                let shared = common_prefix_len(&self.prev_bytes, bytes);
                write_u64(out, shared as u64);
                write_u64(out, (bytes.len() - shared) as u64);
                out.extend_from_slice(&bytes[shared..]);
                self.prev_bytes.truncate(shared);
                self.prev_bytes.extend_from_slice(&bytes[shared..]);
            }
        }
        write_u64(out, doc_freq);
        write_u64(out, groups.len() as u64);
        let mut prev_group = 0u32;
        for (i, &group) in groups.iter().enumerate() {
            write_u64(out, (group - prev_group) as u64);
            prev_group = group;
            for &stat in &stats[i * self.num_stats..(i + 1) * self.num_stats] {
                write_i64_zigzag(out, stat);
            }
        }
        Ok(())
    }

    pub fn encode_field_end(&mut self, out: &mut Vec<u8>) {
        out.push(RecordTag::FieldEnd as u8);
    }

    pub fn encode_stream_end(&mut self, out: &mut Vec<u8>) {
        out.push(RecordTag::StreamEnd as u8);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedTerm {
    Int(i64),
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupStatsRecord {
    pub group: u32,
    pub stats: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermRecord {
    pub term: DecodedTerm,
    pub doc_freq: u64,
    pub groups: Vec<GroupStatsRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    FieldStart {
        name: String,
        kind: TermKind,
        num_stats: usize,
    },
    Term(TermRecord),
    FieldEnd,
    StreamEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReaderState {
    OutsideField,
    InField(TermKind),
    Ended,
}

/// Decoder of an output stream that also enforces the record grammar.
///
/// Yields one [`StreamEvent`] per record. Any grammar violation, unknown tag
/// or truncated record is returned as `InvalidFormat`, after which the reader
/// is exhausted. A stream that simply stops before its `stream_end` yields no
/// error; check [`is_complete`](Self::is_complete) afterwards.
pub struct StreamReader<'a> {
    reader: VarIntReader<'a>,
    state: ReaderState,
    failed: bool,
    num_stats: usize,
    prev_int: i64,
    prev_bytes: Vec<u8>,
}

impl<'a> StreamReader<'a> {
    pub fn new(data: &'a [u8]) -> StreamReader<'a> {
        StreamReader {
            reader: VarIntReader::new(data, "ftgs stream"),
            state: ReaderState::OutsideField,
            failed: false,
            num_stats: 0,
            prev_int: 0,
            prev_bytes: Vec::new(),
        }
    }

    /// Whether a `stream_end` record has been decoded.
    pub fn is_complete(&self) -> bool {
        self.state == ReaderState::Ended
    }

    fn violation(&self, message: impl Into<String>) -> Error {
        Error::invalid_format("ftgs stream", message)
    }

    fn read_event(&mut self) -> Result<StreamEvent> {
        let tag = self.reader.read_u8()?;
        let tag = RecordTag::from_u8(tag)
            .ok_or_else(|| self.violation(format!("unknown record tag {tag:#04x}")))?;
        match (tag, self.state) {
            (RecordTag::FieldStart, ReaderState::OutsideField) => {
                let type_tag = self.reader.read_u8()?;
                let kind = TermKind::from_wire_tag(type_tag)
                    .ok_or_else(|| self.violation(format!("unknown term type {type_tag}")))?;
                let len = self.reader.read_u64()? as usize;
                let name = String::from_utf8(self.reader.read_bytes(len)?.to_vec())
                    .map_err(|_| self.violation("field name is not utf-8"))?;
                self.num_stats = self.reader.read_u64()? as usize;
                self.prev_int = 0;
                self.prev_bytes.clear();
                self.state = ReaderState::InField(kind);
                Ok(StreamEvent::FieldStart {
                    name,
                    kind,
                    num_stats: self.num_stats,
                })
            }
            (RecordTag::Term, ReaderState::InField(kind)) => {
                self.read_term(kind).map(StreamEvent::Term)
            }
            (RecordTag::FieldEnd, ReaderState::InField(_)) => {
                self.state = ReaderState::OutsideField;
                Ok(StreamEvent::FieldEnd)
            }
            (RecordTag::StreamEnd, ReaderState::OutsideField) => {
                self.state = ReaderState::Ended;
                Ok(StreamEvent::StreamEnd)
            }
            (tag, state) => Err(self.violation(format!("{tag:?} record in state {state:?}"))),
        }
    }

    fn read_term(&mut self, kind: TermKind) -> Result<TermRecord> {
        let term = match kind {
            TermKind::Int => {
                let delta = self.reader.read_i64_zigzag()?;
                self.prev_int = self.prev_int.wrapping_add(delta);
                DecodedTerm::Int(self.prev_int)
            }
            TermKind::String => {
                let shared = self.reader.read_u64()? as usize;
                let suffix_len = self.reader.read_u64()? as usize;
                if shared > self.prev_bytes.len() {
                    return Err(self.violation("shared prefix longer than previous term"));
                }
                let suffix = self.reader.read_bytes(suffix_len)?;
                self.prev_bytes.truncate(shared);
                self.prev_bytes.extend_from_slice(suffix);
                DecodedTerm::Bytes(self.prev_bytes.clone())
            }
        };
        let doc_freq = self.reader.read_u64()?;
        let group_count = self.reader.read_u64()? as usize;
        let mut groups = Vec::with_capacity(group_count.min(self.reader.remaining()));
        let mut group = 0u64;
        for _ in 0..group_count {
            group = group.saturating_add(self.reader.read_u64()?);
            let group = u32::try_from(group).map_err(|_| self.violation("group overflows u32"))?;
            let stats = (0..self.num_stats)
                .map(|_| self.reader.read_i64_zigzag())
                .collect::<Result<Vec<_>>>()?;
            groups.push(GroupStatsRecord { group, stats });
        }
        Ok(TermRecord {
            term,
            doc_freq,
            groups,
        })
    }
}

impl Iterator for StreamReader<'_> {
    type Item = Result<StreamEvent>;

    fn next(&mut self) -> Option<Result<StreamEvent>> {
        if self.failed || self.state == ReaderState::Ended || self.reader.is_empty() {
            return None;
        }
        let event = self.read_event();
        self.failed = event.is_err();
        Some(event)
    }
}

/// Decodes a complete stream, failing if it violates the grammar or lacks its
/// terminal `stream_end`.
pub fn decode_stream(data: &[u8]) -> Result<Vec<StreamEvent>> {
    let mut reader = StreamReader::new(data);
    let events = reader.by_ref().collect::<Result<Vec<_>>>()?;
    if !reader.is_complete() {
        return Err(Error::invalid_format("ftgs stream", "missing stream_end"));
    }
    if reader.reader.remaining() != 0 {
        return Err(Error::invalid_format("ftgs stream", "trailing bytes after stream_end"));
    }
    Ok(events)
}
