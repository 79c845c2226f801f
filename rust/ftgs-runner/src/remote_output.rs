//! Writer side of the FTGS output stream.
//!
//! See [`ftgs_format::wire`] for the record layout.

use std::io::Write;

use ftgs_common::{Result, error::Error};
use ftgs_format::{TermKind, wire::RecordEncoder};
use ftgs_shard::term::TermId;

use crate::config::DEFAULT_WRITER_BUFFER_SIZE;

/// A socket wrapper that collects output in a fixed-size buffer and writes
/// it to the socket only when the buffer fills up or on an explicit flush.
pub struct BufferedSocket<W> {
    inner: W,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W: Write> BufferedSocket<W> {
    pub fn new(inner: W) -> BufferedSocket<W> {
        Self::with_capacity(inner, DEFAULT_WRITER_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: W, capacity: usize) -> BufferedSocket<W> {
        let capacity = capacity.max(1);
        BufferedSocket {
            inner,
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `data`, flushing the buffer to the socket whenever it is full.
    pub fn write(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = (self.capacity - self.buf.len()).min(data.len());
            self.buf.extend_from_slice(&data[..n]);
            data = &data[n..];
            if self.buf.len() == self.capacity {
                self.flush_buffer()?;
            }
        }
        Ok(())
    }

    /// Writes all buffered bytes to the socket.
    pub fn flush_buffer(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.inner
                .write_all(&self.buf)
                .map_err(|e| Error::io("socket write", e))?;
            self.buf.clear();
        }
        self.inner.flush().map_err(|e| Error::io("socket flush", e))
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns the socket, discarding anything still buffered.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamState {
    Idle,
    InField,
    Ended,
    /// A contract violation or socket error occurred; every further call fails.
    Poisoned,
}

/// Writer of one FTGS output stream.
///
/// Enforces the record nesting `(field_start term* field_end)* stream_end`.
/// Calls out of order fail with `InvalidOperation`, and any failure poisons
/// the stream.
pub struct FtgsOutputStream<W> {
    socket: BufferedSocket<W>,
    encoder: RecordEncoder,
    scratch: Vec<u8>,
    state: StreamState,
    field_open: bool,
    end_written: bool,
}

impl<W: Write> FtgsOutputStream<W> {
    pub fn new(socket: BufferedSocket<W>) -> FtgsOutputStream<W> {
        FtgsOutputStream {
            socket,
            encoder: RecordEncoder::new(),
            scratch: Vec::new(),
            state: StreamState::Idle,
            field_open: false,
            end_written: false,
        }
    }

    pub fn write_field_start(
        &mut self,
        field_name: &str,
        kind: TermKind,
        num_stats: usize,
    ) -> Result<()> {
        self.expect_state(StreamState::Idle, "write_field_start")?;
        self.scratch.clear();
        self.encoder
            .encode_field_start(&mut self.scratch, field_name, kind, num_stats);
        self.emit()?;
        self.state = StreamState::InField;
        self.field_open = true;
        Ok(())
    }

    /// Writes the record of one term: its total doc-freq, and `num_stats`
    /// values (group-major) for each of the strictly ascending `groups`.
    pub fn write_term_group_stats(
        &mut self,
        term: &TermId,
        doc_freq: u64,
        groups: &[u32],
        stats: &[i64],
    ) -> Result<()> {
        self.expect_state(StreamState::InField, "write_term_group_stats")?;
        self.scratch.clear();
        if let Err(e) =
            self.encoder
                .encode_term(&mut self.scratch, term.as_wire(), doc_freq, groups, stats)
        {
            self.state = StreamState::Poisoned;
            return Err(e);
        }
        self.emit()
    }

    pub fn write_field_end(&mut self) -> Result<()> {
        self.expect_state(StreamState::InField, "write_field_end")?;
        self.scratch.clear();
        self.encoder.encode_field_end(&mut self.scratch);
        self.emit()?;
        self.state = StreamState::Idle;
        self.field_open = false;
        Ok(())
    }

    pub fn write_stream_end(&mut self) -> Result<()> {
        self.expect_state(StreamState::Idle, "write_stream_end")?;
        self.scratch.clear();
        self.encoder.encode_stream_end(&mut self.scratch);
        self.emit()?;
        self.state = StreamState::Ended;
        self.end_written = true;
        Ok(())
    }

    pub fn flush_buffer(&mut self) -> Result<()> {
        self.socket.flush_buffer().inspect_err(|_| {
            self.state = StreamState::Poisoned;
        })
    }

    pub fn is_ended(&self) -> bool {
        self.state == StreamState::Ended
    }

    pub fn is_poisoned(&self) -> bool {
        self.state == StreamState::Poisoned
    }

    /// Terminates the stream after a failure: writes whichever of the
    /// field-end and stream-end markers are still missing, ignoring the
    /// current state, and flushes.
    ///
    /// Used by failed tasks so that readers still see a well-formed stream end.
    pub fn close_after_failure(&mut self) -> Result<()> {
        self.state = StreamState::Poisoned;
        self.scratch.clear();
        if self.field_open {
            self.encoder.encode_field_end(&mut self.scratch);
        }
        if !self.end_written {
            self.encoder.encode_stream_end(&mut self.scratch);
        }
        self.socket.write(&self.scratch)?;
        self.field_open = false;
        self.end_written = true;
        self.socket.flush_buffer()?;
        self.state = StreamState::Ended;
        Ok(())
    }

    pub fn into_socket(self) -> BufferedSocket<W> {
        self.socket
    }

    fn expect_state(&mut self, expected: StreamState, operation: &str) -> Result<()> {
        if self.state != expected {
            let state = self.state;
            self.state = StreamState::Poisoned;
            return Err(Error::invalid_operation(format!(
                "{operation} in stream state {state:?}"
            )));
        }
        Ok(())
    }

    fn emit(&mut self) -> Result<()> {
        self.socket.write(&self.scratch).inspect_err(|_| {
            self.state = StreamState::Poisoned;
        })
    }
}

#[cfg(test)]
mod tests {
    use ftgs_common::error::ErrorKind;
    use ftgs_format::wire::{DecodedTerm, StreamEvent, decode_stream};

    use super::*;

    fn stream(capacity: usize) -> FtgsOutputStream<Vec<u8>> {
        FtgsOutputStream::new(BufferedSocket::with_capacity(Vec::new(), capacity))
    }

    #[test]
    fn test_well_formed_stream() {
        let mut out = stream(1024);
        out.write_field_start("price", TermKind::Int, 2).unwrap();
        out.write_term_group_stats(&TermId::Int(7), 3, &[1, 4], &[10, 20, -1, 2])
            .unwrap();
        out.write_term_group_stats(&TermId::Int(9), 1, &[2], &[5, 0])
            .unwrap();
        out.write_field_end().unwrap();
        out.write_stream_end().unwrap();
        assert!(out.is_ended());
        // Nothing reaches the socket before the flush.
        assert!(out.socket.get_ref().is_empty());
        out.flush_buffer().unwrap();

        let data = out.into_socket().into_inner();
        let events = decode_stream(&data).unwrap();
        assert_eq!(events.len(), 5);
        match &events[2] {
            StreamEvent::Term(record) => {
                assert_eq!(record.term, DecodedTerm::Int(9));
                assert_eq!(record.doc_freq, 1);
                assert_eq!(record.groups[0].group, 2);
                assert_eq!(record.groups[0].stats, vec![5, 0]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_buffer_flushes_when_full() {
        let mut out = stream(4);
        out.write_field_start("a_long_field_name", TermKind::String, 0)
            .unwrap();
        assert!(!out.socket.get_ref().is_empty());
        assert!(out.socket.buffered_len() < 4);
    }

    #[test]
    fn test_protocol_misuse_poisons() {
        let mut out = stream(64);
        let err = out
            .write_term_group_stats(&TermId::Int(1), 1, &[1], &[])
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
        assert!(out.is_poisoned());
        assert!(out.write_field_start("f", TermKind::Int, 0).is_err());

        let mut out = stream(64);
        out.write_field_start("f", TermKind::Int, 0).unwrap();
        assert!(out.write_stream_end().is_err());

        let mut out = stream(64);
        out.write_field_start("f", TermKind::Int, 1).unwrap();
        assert!(out.write_term_group_stats(&TermId::Int(1), 1, &[1], &[]).is_err());
        assert!(out.is_poisoned());
    }

    #[test]
    fn test_close_after_failure() {
        let mut out = stream(64);
        out.write_field_start("s", TermKind::String, 1).unwrap();
        out.write_term_group_stats(&TermId::from("x"), 1, &[1], &[3])
            .unwrap();
        assert!(out.write_stream_end().is_err());
        out.close_after_failure().unwrap();
        assert!(out.is_ended());
        let data = out.into_socket().into_inner();
        let events = decode_stream(&data).unwrap();
        assert_eq!(events.last(), Some(&StreamEvent::StreamEnd));
        assert_eq!(events[events.len() - 2], StreamEvent::FieldEnd);
    }

    #[test]
    fn test_multiple_fields() {
        let mut out = stream(64);
        for name in ["a", "b"] {
            out.write_field_start(name, TermKind::Int, 0).unwrap();
            out.write_field_end().unwrap();
        }
        out.write_stream_end().unwrap();
        out.flush_buffer().unwrap();
        let events = decode_stream(&out.into_socket().into_inner()).unwrap();
        assert_eq!(events.len(), 5);
    }
}
