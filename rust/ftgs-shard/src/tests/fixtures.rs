use std::sync::Arc;

use ftgs_testkit::shard_dir::ShardDir;

use crate::{map_cache::MapCache, shard::{Shard, ShardOptions}, term_desc::TermDesc};

/// Opens `dirs` as shards sharing one map cache, with `field` as an int field.
pub fn open_int_shards(dirs: &[ShardDir], field: &str) -> Vec<Shard> {
    let cache = Arc::new(MapCache::new());
    dirs.iter()
        .map(|dir| {
            ShardOptions::new(cache.clone())
                .int_fields([field])
                .open(dir.path())
                .unwrap()
        })
        .collect()
}

pub fn open_string_shards(dirs: &[ShardDir], field: &str) -> Vec<Shard> {
    let cache = Arc::new(MapCache::new());
    dirs.iter()
        .map(|dir| {
            ShardOptions::new(cache.clone())
                .string_fields([field])
                .open(dir.path())
                .unwrap()
        })
        .collect()
}

pub fn collect(it: impl Iterator<Item = ftgs_common::Result<TermDesc>>) -> Vec<TermDesc> {
    it.collect::<ftgs_common::Result<Vec<_>>>().unwrap()
}
