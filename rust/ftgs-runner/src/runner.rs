use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use ftgs_common::{Result, error::Error};
use ftgs_format::field_files::DocIdIter;
use ftgs_shard::{shard::Shard, term_provider::TermProvider};
use ftgs_workflow::{ExecutorService, catch_panic};

use crate::{
    accumulator::GroupStats,
    config::{FtgsConfig, RunContext},
    remote_output::{BufferedSocket, FtgsOutputStream},
};

/// Executes an FTGS run: one task per (field, split), each merging the
/// split's terms across all shards, aggregating the stats of every term per
/// group, and streaming the records to the split's socket.
///
/// Sockets are borrowed for the duration of the run and returned by
/// [`into_sockets`](Self::into_sockets); the runner never closes them.
pub struct FtgsRunner<W> {
    config: FtgsConfig,
    shards: Vec<Shard>,
    sockets: Vec<Arc<Mutex<Option<W>>>>,
    executor: ExecutorService,
}

impl<W: Write + Send + 'static> FtgsRunner<W> {
    pub fn new(context: RunContext<W>) -> Result<FtgsRunner<W>> {
        let (config, shards, sockets) = context.into_parts();
        let executor = ExecutorService::new(config.num_workers)?;
        Ok(FtgsRunner {
            config,
            shards,
            sockets: sockets
                .into_iter()
                .map(|s| Arc::new(Mutex::new(Some(s))))
                .collect(),
            executor,
        })
    }

    pub fn config(&self) -> &FtgsConfig {
        &self.config
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Runs all tasks and waits for them.
    ///
    /// Every stream is terminated with its field-end and stream-end markers,
    /// including (as far as its socket allows) the streams of failed tasks.
    /// Returns the first task failure, in completion order.
    pub fn run(&mut self) -> Result<()> {
        let config = &self.config;
        log::info!(
            "ftgs run: {} shards, {} int fields, {} string fields, {} splits, {} workers",
            self.shards.len(),
            config.int_fields.len(),
            config.string_fields.len(),
            config.num_splits,
            self.executor.num_workers()
        );
        if let Some(dir) = &config.splits_dir {
            log::info!("ftgs run: splits dir {}", dir.display());
        }

        let partitioner = config.partitioner.create();
        let providers = config
            .fields()
            .into_iter()
            .map(|(field, _)| {
                TermProvider::with_partitioner(
                    &self.shards,
                    field,
                    config.num_splits,
                    partitioner.clone(),
                )
                .map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        for (field_index, provider) in providers.into_iter().enumerate() {
            for split in 0..config.num_splits {
                let socket = self.sockets[config.socket_index(field_index, split)].clone();
                let task = SplitTask {
                    provider: provider.clone(),
                    split,
                    num_groups: config.num_groups,
                    num_stats: config.num_stats,
                    binary: config.only_binary_metrics,
                    buffer_size: config.writer_buffer_size,
                };
                self.executor.enqueue(move || task.run(&socket));
            }
        }

        let result = self.executor.await_completion();
        match &result {
            Ok(()) => log::info!("ftgs run: completed {} streams", config.num_streams()),
            Err(e) => log::warn!("ftgs run: failed: {e}"),
        }
        result
    }

    /// Returns the sockets in stream order. A slot whose lock was poisoned
    /// still yields its socket; `None` means the socket never came back.
    pub fn into_sockets(self) -> Vec<Option<W>> {
        self.sockets
            .into_iter()
            .map(|slot| match slot.lock() {
                Ok(mut socket) => socket.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            })
            .collect()
    }
}

/// The work of one (field, split) pair.
struct SplitTask {
    provider: Arc<TermProvider>,
    split: usize,
    num_groups: usize,
    num_stats: usize,
    binary: bool,
    buffer_size: usize,
}

impl SplitTask {
    fn run<W: Write>(&self, slot: &Mutex<Option<W>>) -> Result<()> {
        let field = self.provider.field();
        let mut slot = slot.lock().expect("socket lock");
        let socket = slot.take().ok_or_else(|| {
            Error::task(field, self.split, Error::invalid_operation("socket in use"))
        })?;
        log::debug!("ftgs task: field {field} split {} started", self.split);

        let mut stream =
            FtgsOutputStream::new(BufferedSocket::with_capacity(socket, self.buffer_size));
        // A panicking table accessor must still leave a terminated stream
        // and the socket in its slot.
        let result = catch_panic(|| self.write_stream(&mut stream));
        if let Err(e) = &result {
            log::warn!("ftgs task: field {field} split {} failed: {e}", self.split);
            if let Err(close_err) = stream.close_after_failure() {
                log::warn!(
                    "ftgs task: cannot terminate stream of field {field} split {}: {close_err}",
                    self.split
                );
            }
        }
        *slot = Some(stream.into_socket().into_inner());

        let terms = result.map_err(|e| Error::task(field, self.split, e))?;
        log::debug!(
            "ftgs task: field {field} split {} wrote {terms} terms",
            self.split
        );
        Ok(())
    }

    /// Writes the complete stream of the split and returns the number of
    /// term records written.
    fn write_stream<W: Write>(&self, stream: &mut FtgsOutputStream<W>) -> Result<usize> {
        let provider = &self.provider;
        let field = provider.field();
        stream.write_field_start(field, provider.kind(), self.num_stats)?;

        let mut stats = GroupStats::new(self.num_groups, self.num_stats, self.binary);
        let mut terms = 0;
        for desc in provider.merge_iter(self.split)? {
            let desc = desc?;
            desc.check_invariant()?;
            stats.clear();
            for (address, doc_freq, source) in desc.postings() {
                let shard = provider.shard(source).ok_or_else(|| {
                    Error::invalid_format(
                        "term descriptor",
                        format!("posting of {} from unknown source {source}", desc.id()),
                    )
                })?;
                let element = || format!("shard {} field {field}", shard.directory().display());
                let malformed = |e: Error| Error::invalid_format(element(), e.to_string());
                let docs = &shard.field(field)?.docs;
                let table = shard.table().as_ref();
                for doc_id in DocIdIter::new(docs, address, doc_freq).map_err(malformed)? {
                    stats.add_row(table, doc_id.map_err(malformed)?, &element)?;
                }
            }
            if !stats.is_empty() {
                let (groups, values) = stats.sorted_stats();
                stream.write_term_group_stats(
                    desc.id(),
                    desc.total_doc_freq() as u64,
                    groups,
                    values,
                )?;
                terms += 1;
            }
        }

        stream.write_field_end()?;
        stream.write_stream_end()?;
        stream.flush_buffer()?;
        Ok(terms)
    }
}
