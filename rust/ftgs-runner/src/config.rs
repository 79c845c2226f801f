//! Run configuration.

use std::{collections::HashSet, path::PathBuf, sync::Arc};

use ftgs_common::{Result, error::Error, verify_arg};
use ftgs_format::TermKind;
use ftgs_shard::{
    map_cache::MapCache,
    packed_table::PackedTable,
    partition::{HashPartitioner, ModuloPartitioner, Partitioner},
    shard::{Shard, ShardOptions},
};
use serde::{Deserialize, Serialize};

/// Default size of the per-stream output buffer.
pub const DEFAULT_WRITER_BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound on `num_groups * max(num_stats, 1)`, the number of stat cells
/// every task allocates for its group accumulator (1 GiB of `i64`s).
pub const MAX_GROUP_STAT_CELLS: usize = 1 << 27;

/// How term ids are assigned to splits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionerKind {
    /// `xxh3_64(id) mod num_splits`.
    #[default]
    Hash,
    /// `id mod num_splits` for int ids; string ids are hashed.
    Modulo,
}

impl PartitionerKind {
    pub fn create(self) -> Arc<dyn Partitioner> {
        match self {
            PartitionerKind::Hash => Arc::new(HashPartitioner::new()),
            PartitionerKind::Modulo => Arc::new(ModuloPartitioner),
        }
    }
}

/// The scalar inputs of a run.
///
/// Built with the `with_*` setters or loaded from JSON with
/// [`from_json`](Self::from_json). Packed tables, host mappings and sockets
/// are not part of the configuration; they are handed to
/// [`RunContext::new`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtgsConfig {
    pub shard_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub int_fields: Vec<String>,
    #[serde(default)]
    pub string_fields: Vec<String>,
    /// Reserved; only logged.
    #[serde(default)]
    pub splits_dir: Option<PathBuf>,
    pub num_groups: usize,
    pub num_stats: usize,
    #[serde(default = "default_num_splits")]
    pub num_splits: usize,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default)]
    pub only_binary_metrics: bool,
    #[serde(default)]
    pub partitioner: PartitionerKind,
    #[serde(default = "default_writer_buffer_size")]
    pub writer_buffer_size: usize,
}

fn default_num_splits() -> usize {
    1
}

fn default_num_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}

fn default_writer_buffer_size() -> usize {
    DEFAULT_WRITER_BUFFER_SIZE
}

impl Default for FtgsConfig {
    fn default() -> Self {
        FtgsConfig {
            shard_dirs: Vec::new(),
            int_fields: Vec::new(),
            string_fields: Vec::new(),
            splits_dir: None,
            num_groups: 0,
            num_stats: 0,
            num_splits: default_num_splits(),
            num_workers: default_num_workers(),
            only_binary_metrics: false,
            partitioner: PartitionerKind::default(),
            writer_buffer_size: default_writer_buffer_size(),
        }
    }
}

impl FtgsConfig {
    pub fn new() -> FtgsConfig {
        Default::default()
    }

    pub fn from_json(json: &str) -> Result<FtgsConfig> {
        serde_json::from_str(json).map_err(|e| Error::invalid_arg("config", e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::invalid_arg("config", e.to_string()))
    }

    pub fn with_shard_dirs<P: Into<PathBuf>>(mut self, dirs: impl IntoIterator<Item = P>) -> Self {
        self.shard_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_int_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.int_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_string_fields<S: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        self.string_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_splits_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.splits_dir = Some(dir.into());
        self
    }

    pub fn with_num_groups(mut self, num_groups: usize) -> Self {
        self.num_groups = num_groups;
        self
    }

    pub fn with_num_stats(mut self, num_stats: usize) -> Self {
        self.num_stats = num_stats;
        self
    }

    pub fn with_num_splits(mut self, num_splits: usize) -> Self {
        self.num_splits = num_splits;
        self
    }

    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_only_binary_metrics(mut self, only_binary_metrics: bool) -> Self {
        self.only_binary_metrics = only_binary_metrics;
        self
    }

    pub fn with_partitioner(mut self, partitioner: PartitionerKind) -> Self {
        self.partitioner = partitioner;
        self
    }

    pub fn with_writer_buffer_size(mut self, size: usize) -> Self {
        self.writer_buffer_size = size;
        self
    }

    /// All fields of the run with their kinds: int fields first, then string
    /// fields, each in configured order. The position of a field in this list
    /// is its field index.
    pub fn fields(&self) -> Vec<(&str, TermKind)> {
        self.int_fields
            .iter()
            .map(|f| (f.as_str(), TermKind::Int))
            .chain(self.string_fields.iter().map(|f| (f.as_str(), TermKind::String)))
            .collect()
    }

    pub fn num_fields(&self) -> usize {
        self.int_fields.len() + self.string_fields.len()
    }

    /// Number of output streams, one per (field, split).
    pub fn num_streams(&self) -> usize {
        self.num_fields() * self.num_splits
    }

    /// Index of the output stream of `(field_index, split)`.
    pub fn socket_index(&self, field_index: usize, split: usize) -> usize {
        field_index * self.num_splits + split
    }

    /// Checks the scalar settings.
    pub fn validate(&self) -> Result<()> {
        verify_arg!(shard_dirs, !self.shard_dirs.is_empty());
        verify_arg!(num_splits, self.num_splits > 0);
        verify_arg!(num_workers, self.num_workers > 0);
        verify_arg!(num_groups, self.num_groups > 0);
        verify_arg!(num_groups, self.num_groups <= u32::MAX as usize);
        let cells = self.num_groups.checked_mul(self.num_stats.max(1));
        if !cells.is_some_and(|cells| cells <= MAX_GROUP_STAT_CELLS) {
            return Err(Error::invalid_arg(
                "num_groups",
                format!(
                    "{} groups x {} stats exceeds {MAX_GROUP_STAT_CELLS} accumulator cells",
                    self.num_groups, self.num_stats
                ),
            ));
        }
        verify_arg!(writer_buffer_size, self.writer_buffer_size > 0);
        let mut seen = HashSet::new();
        for (name, _) in self.fields() {
            if name.is_empty() {
                return Err(Error::invalid_arg("fields", "empty field name"));
            }
            if !seen.insert(name) {
                return Err(Error::invalid_arg(
                    "fields",
                    format!("field '{name}' is listed more than once"),
                ));
            }
        }
        Ok(())
    }
}

/// The validated inputs of one run: configuration, opened shards and one
/// output socket per stream.
///
/// Every check that does not need to read term data happens here, before any
/// task is dispatched: a `RunContext` that was built successfully never fails
/// on a configuration or I/O error later.
pub struct RunContext<W> {
    config: FtgsConfig,
    shards: Vec<Shard>,
    sockets: Vec<W>,
}

impl<W> RunContext<W> {
    /// Validates the inputs and opens every shard, mapping all field files
    /// through `map_cache`.
    ///
    /// `tables` holds one packed table per shard directory; `sockets` one
    /// socket per stream, in [`socket_index`](FtgsConfig::socket_index)
    /// order. Regions the host has already mapped should be registered in
    /// `map_cache` beforehand.
    pub fn new(
        config: FtgsConfig,
        tables: Vec<Arc<dyn PackedTable>>,
        sockets: Vec<W>,
        map_cache: Arc<MapCache>,
    ) -> Result<RunContext<W>> {
        config.validate()?;
        if tables.len() != config.shard_dirs.len() {
            return Err(Error::invalid_arg(
                "tables",
                format!(
                    "{} tables for {} shards",
                    tables.len(),
                    config.shard_dirs.len()
                ),
            ));
        }
        if sockets.len() != config.num_streams() {
            return Err(Error::invalid_arg(
                "sockets",
                format!(
                    "{} sockets for {} fields x {} splits",
                    sockets.len(),
                    config.num_fields(),
                    config.num_splits
                ),
            ));
        }
        for (dir, table) in config.shard_dirs.iter().zip(&tables) {
            if table.col_count() < config.num_stats {
                return Err(Error::invalid_arg(
                    "tables",
                    format!(
                        "table of shard {} has {} columns, {} stats requested",
                        dir.display(),
                        table.col_count(),
                        config.num_stats
                    ),
                ));
            }
        }
        let shards = config
            .shard_dirs
            .iter()
            .zip(tables)
            .map(|(dir, table)| {
                ShardOptions::new(map_cache.clone())
                    .int_fields(&config.int_fields)
                    .string_fields(&config.string_fields)
                    .table(table)
                    .open(dir)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RunContext {
            config,
            shards,
            sockets,
        })
    }

    pub fn config(&self) -> &FtgsConfig {
        &self.config
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub(crate) fn into_parts(self) -> (FtgsConfig, Vec<Shard>, Vec<W>) {
        (self.config, self.shards, self.sockets)
    }
}

#[cfg(test)]
mod tests {
    use ftgs_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_from_json_defaults() {
        let config = FtgsConfig::from_json(
            r#"{
                "shard_dirs": ["/data/s1", "/data/s2"],
                "int_fields": ["price"],
                "string_fields": ["country"],
                "num_groups": 10,
                "num_stats": 2
            }"#,
        )
        .unwrap();
        assert_eq!(config.num_splits, 1);
        assert!(config.num_workers > 0);
        assert_eq!(config.writer_buffer_size, DEFAULT_WRITER_BUFFER_SIZE);
        assert_eq!(config.partitioner, PartitionerKind::Hash);
        assert!(!config.only_binary_metrics);
        config.validate().unwrap();

        let round_trip = FtgsConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, config);
    }

    #[test]
    fn test_bad_json() {
        assert!(FtgsConfig::from_json("{").is_err());
        assert!(FtgsConfig::from_json(r#"{"shard_dirs": []}"#).is_err());
        assert!(
            FtgsConfig::from_json(
                r#"{"shard_dirs": ["a"], "num_groups": 1, "num_stats": 0, "partitioner": "random"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_field_order_and_socket_index() {
        let config = FtgsConfig::new()
            .with_int_fields(["a", "b"])
            .with_string_fields(["s"])
            .with_num_splits(3);
        assert_eq!(
            config.fields(),
            vec![
                ("a", TermKind::Int),
                ("b", TermKind::Int),
                ("s", TermKind::String)
            ]
        );
        assert_eq!(config.num_streams(), 9);
        assert_eq!(config.socket_index(0, 2), 2);
        assert_eq!(config.socket_index(2, 1), 7);
    }

    #[test]
    fn test_validate() {
        let good = FtgsConfig::new()
            .with_shard_dirs(["/s1"])
            .with_int_fields(["a"])
            .with_num_groups(4)
            .with_num_stats(1)
            .with_num_workers(2);
        good.validate().unwrap();

        assert!(good.clone().with_num_splits(0).validate().is_err());
        assert!(good.clone().with_num_workers(0).validate().is_err());
        assert!(good.clone().with_num_groups(0).validate().is_err());

        good.clone()
            .with_num_groups(MAX_GROUP_STAT_CELLS)
            .validate()
            .unwrap();
        let err = good
            .clone()
            .with_num_groups(MAX_GROUP_STAT_CELLS + 1)
            .validate()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
        let err = good
            .clone()
            .with_num_groups(1 << 20)
            .with_num_stats(1 << 10)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("accumulator cells"), "{err}");
        let err = good
            .clone()
            .with_num_groups(2)
            .with_num_stats(usize::MAX)
            .validate()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
        assert!(good.clone().with_shard_dirs(Vec::<PathBuf>::new()).validate().is_err());
        assert!(good.clone().with_string_fields(["a"]).validate().is_err());
        assert!(good.clone().with_int_fields([""]).validate().is_err());
    }
}
