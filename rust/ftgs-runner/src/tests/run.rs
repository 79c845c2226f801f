use std::collections::BTreeMap;

use ftgs_format::{
    TermKind,
    wire::{DecodedTerm, GroupStatsRecord, StreamEvent, decode_stream},
};
use ftgs_testkit::{data_gen::random_int_terms, shard_dir::ShardDir};

use super::fixtures::{config, run_ftgs, table, term_records};
use crate::config::PartitionerKind;

fn stats(group: u32, stats: &[i64]) -> GroupStatsRecord {
    GroupStatsRecord {
        group,
        stats: stats.to_vec(),
    }
}

#[test]
fn test_group_stats_across_shards() {
    let dirs = [ShardDir::new().unwrap(), ShardDir::new().unwrap()];
    dirs[0]
        .write_int_field("x", &[(1, vec![0, 1]), (3, vec![2])])
        .unwrap();
    dirs[1]
        .write_int_field("x", &[(2, vec![0]), (3, vec![1, 2])])
        .unwrap();
    let tables = vec![
        table(2, &[(1, &[10, 1][..]), (2, &[20, 2][..]), (1, &[30, 3][..])]),
        table(2, &[(2, &[5, 0][..]), (0, &[100, 100][..]), (1, &[7, 7][..])]),
    ];
    let config = config(&dirs)
        .with_int_fields(["x"])
        .with_num_groups(3)
        .with_num_stats(2);

    let (result, sockets) = run_ftgs(config, tables);
    result.unwrap();
    assert_eq!(sockets.len(), 1);

    let events = decode_stream(sockets[0].data()).unwrap();
    assert_eq!(
        events[0],
        StreamEvent::FieldStart {
            name: "x".to_string(),
            kind: TermKind::Int,
            num_stats: 2
        }
    );
    let records = term_records(&sockets[0], "x");
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].term, DecodedTerm::Int(1));
    assert_eq!(records[0].doc_freq, 2);
    assert_eq!(records[0].groups, vec![stats(1, &[10, 1]), stats(2, &[20, 2])]);

    assert_eq!(records[1].term, DecodedTerm::Int(2));
    assert_eq!(records[1].doc_freq, 1);
    assert_eq!(records[1].groups, vec![stats(2, &[5, 0])]);

    // Doc 1 of the second shard is filtered out (group 0) but still counts
    // towards the doc-freq.
    assert_eq!(records[2].term, DecodedTerm::Int(3));
    assert_eq!(records[2].doc_freq, 3);
    assert_eq!(records[2].groups, vec![stats(1, &[37, 10])]);
}

#[test]
fn test_one_stream_per_field_and_split() {
    let dir = ShardDir::new().unwrap();
    dir.write_int_field("a", &[(1, vec![0]), (2, vec![1]), (3, vec![0, 1])])
        .unwrap();
    dir.write_string_field("s", &[("de", vec![0]), ("fr", vec![1]), ("us", vec![1])])
        .unwrap();
    let tables = vec![table(1, &[(1, &[1][..]), (2, &[2][..])])];
    let config = config(std::slice::from_ref(&dir))
        .with_int_fields(["a"])
        .with_string_fields(["s"])
        .with_num_splits(2)
        .with_num_groups(3)
        .with_num_stats(1);

    let (result, sockets) = run_ftgs(config.clone(), tables);
    result.unwrap();
    assert_eq!(sockets.len(), 4);

    let mut int_ids = Vec::new();
    let mut string_ids = Vec::new();
    for split in 0..2 {
        let socket = &sockets[config.socket_index(0, split)];
        for record in term_records(socket, "a") {
            match record.term {
                DecodedTerm::Int(id) => int_ids.push(id),
                other => panic!("unexpected term {other:?}"),
            }
        }
        let socket = &sockets[config.socket_index(1, split)];
        for record in term_records(socket, "s") {
            match record.term {
                DecodedTerm::Bytes(term) => string_ids.push(term),
                other => panic!("unexpected term {other:?}"),
            }
        }
    }
    int_ids.sort();
    string_ids.sort();
    assert_eq!(int_ids, vec![1, 2, 3]);
    assert_eq!(
        string_ids,
        vec![b"de".to_vec(), b"fr".to_vec(), b"us".to_vec()]
    );
}

#[test]
fn test_empty_splits_are_terminated() {
    let dir = ShardDir::new().unwrap();
    // Both ids land in split 0; id 3 only has a filtered-out doc.
    dir.write_int_field("x", &[(0, vec![0]), (3, vec![1])])
        .unwrap();
    let tables = vec![table(1, &[(1, &[4][..]), (0, &[9][..])])];
    let config = config(std::slice::from_ref(&dir))
        .with_int_fields(["x"])
        .with_num_splits(3)
        .with_partitioner(PartitionerKind::Modulo)
        .with_num_groups(2)
        .with_num_stats(1);

    let (result, sockets) = run_ftgs(config, tables);
    result.unwrap();

    let records = term_records(&sockets[0], "x");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].term, DecodedTerm::Int(0));
    assert_eq!(records[0].groups, vec![stats(1, &[4])]);
    for socket in &sockets[1..] {
        assert!(term_records(socket, "x").is_empty());
        assert_eq!(decode_stream(socket.data()).unwrap().len(), 3);
    }
}

#[test]
fn test_binary_metrics() {
    let dir = ShardDir::new().unwrap();
    dir.write_int_field("x", &[(7, vec![0, 1, 2])]).unwrap();
    let tables = vec![table(2, &[(1, &[5, 0][..]), (1, &[0, -3][..]), (1, &[2, 2][..])])];
    let config = config(std::slice::from_ref(&dir))
        .with_int_fields(["x"])
        .with_num_groups(2)
        .with_num_stats(2)
        .with_only_binary_metrics(true);

    let (result, sockets) = run_ftgs(config, tables);
    result.unwrap();
    let records = term_records(&sockets[0], "x");
    assert_eq!(records[0].groups, vec![stats(1, &[2, 2])]);
}

#[test]
fn test_no_stats() {
    let dir = ShardDir::new().unwrap();
    dir.write_string_field("s", &[("a", vec![0]), ("b", vec![1])])
        .unwrap();
    let tables = vec![table(0, &[(1, &[][..]), (2, &[][..])])];
    let config = config(std::slice::from_ref(&dir))
        .with_string_fields(["s"])
        .with_num_groups(3)
        .with_num_stats(0);

    let (result, sockets) = run_ftgs(config, tables);
    result.unwrap();
    let records = term_records(&sockets[0], "s");
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].term, DecodedTerm::Bytes(b"b".to_vec()));
    assert_eq!(records[1].groups, vec![stats(2, &[])]);
}

#[test]
fn test_random_shards_match_direct_aggregation() {
    const NUM_DOCS: i64 = 40;
    const NUM_GROUPS: u32 = 5;

    let mut rng = fastrand::Rng::with_seed(2024);
    let dirs = (0..3).map(|_| ShardDir::new().unwrap()).collect::<Vec<_>>();
    let mut tables = Vec::new();
    let mut expected = BTreeMap::<i64, (u64, BTreeMap<u32, Vec<i64>>)>::new();
    for dir in &dirs {
        let rows = (0..NUM_DOCS)
            .map(|_| (rng.u32(0..NUM_GROUPS), vec![rng.i64(-50..50), rng.i64(0..3)]))
            .collect::<Vec<_>>();
        let terms = random_int_terms(&mut rng, 60, -30..30, NUM_DOCS);
        dir.write_int_field("x", &terms).unwrap();

        for (id, docs) in &terms {
            let entry = expected.entry(*id).or_default();
            entry.0 += docs.len() as u64;
            for &doc in docs {
                let (group, cells) = &rows[doc as usize];
                if *group == 0 {
                    continue;
                }
                let sums = entry.1.entry(*group).or_insert_with(|| vec![0, 0]);
                sums[0] += cells[0];
                sums[1] += cells[1];
            }
        }
        let rows = rows
            .iter()
            .map(|(group, cells)| (*group, cells.as_slice()))
            .collect::<Vec<_>>();
        tables.push(table(2, &rows));
    }
    expected.retain(|_, (_, groups)| !groups.is_empty());

    let config = config(&dirs)
        .with_int_fields(["x"])
        .with_num_splits(4)
        .with_num_groups(NUM_GROUPS as usize)
        .with_num_stats(2);
    let (result, sockets) = run_ftgs(config, tables);
    result.unwrap();

    let mut actual = BTreeMap::new();
    for socket in &sockets {
        let records = term_records(socket, "x");
        let ids = records
            .iter()
            .map(|r| match r.term {
                DecodedTerm::Int(id) => id,
                ref other => panic!("unexpected term {other:?}"),
            })
            .collect::<Vec<_>>();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        for (id, record) in ids.into_iter().zip(records) {
            let groups = record
                .groups
                .into_iter()
                .map(|g| (g.group, g.stats))
                .collect::<BTreeMap<_, _>>();
            assert!(actual.insert(id, (record.doc_freq, groups)).is_none());
        }
    }
    assert_eq!(actual, expected);
}
