use std::{
    io::{self, Write},
    sync::Arc,
};

use ftgs_common::Result;
use ftgs_format::wire::{StreamEvent, TermRecord, decode_stream};
use ftgs_shard::{
    map_cache::MapCache,
    packed_table::{MemoryTable, PackedTable},
};
use ftgs_testkit::shard_dir::ShardDir;

use crate::{FtgsConfig, FtgsRunner, RunContext};

/// An in-memory socket that can be told to fail once it has accepted a
/// given number of bytes.
#[derive(Default)]
pub struct TestSocket {
    data: Vec<u8>,
    fail_after: Option<usize>,
}

impl TestSocket {
    pub fn new() -> TestSocket {
        Default::default()
    }

    pub fn failing_after(limit: usize) -> TestSocket {
        TestSocket {
            data: Vec::new(),
            fail_after: Some(limit),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Write for TestSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self
            .fail_after
            .is_some_and(|limit| self.data.len() + buf.len() > limit)
        {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn table(cols: usize, rows: &[(u32, &[i64])]) -> Arc<dyn PackedTable> {
    Arc::new(MemoryTable::from_rows(cols, rows.iter().copied()))
}

/// A configuration over `dirs` with small defaults for tests.
pub fn config(dirs: &[ShardDir]) -> FtgsConfig {
    FtgsConfig::new()
        .with_shard_dirs(dirs.iter().map(|d| d.path().to_path_buf()))
        .with_num_workers(4)
}

/// Runs FTGS with one fresh socket per stream.
pub fn run_ftgs(
    config: FtgsConfig,
    tables: Vec<Arc<dyn PackedTable>>,
) -> (Result<()>, Vec<TestSocket>) {
    let sockets = (0..config.num_streams()).map(|_| TestSocket::new()).collect();
    run_with_sockets(config, tables, sockets)
}

pub fn run_with_sockets(
    config: FtgsConfig,
    tables: Vec<Arc<dyn PackedTable>>,
    sockets: Vec<TestSocket>,
) -> (Result<()>, Vec<TestSocket>) {
    let context = RunContext::new(config, tables, sockets, Arc::new(MapCache::new())).unwrap();
    let mut runner = FtgsRunner::new(context).unwrap();
    let result = runner.run();
    let sockets = runner
        .into_sockets()
        .into_iter()
        .map(|s| s.expect("socket returned"))
        .collect();
    (result, sockets)
}

/// Decodes a complete stream and returns its term records, checking that the
/// stream holds exactly one field named `field`.
pub fn term_records(socket: &TestSocket, field: &str) -> Vec<TermRecord> {
    let events = decode_stream(socket.data()).unwrap();
    match events.first() {
        Some(StreamEvent::FieldStart { name, .. }) => assert_eq!(name, field),
        other => panic!("stream starts with {other:?}"),
    }
    assert_eq!(
        &events[events.len() - 2..],
        &[StreamEvent::FieldEnd, StreamEvent::StreamEnd]
    );
    events
        .into_iter()
        .filter_map(|event| match event {
            StreamEvent::Term(record) => Some(record),
            _ => None,
        })
        .collect()
}
