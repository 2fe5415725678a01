//! Purge: totality, statistics, teardown-by-drop.

use crate::common::*;
use latticedb::prelude::*;

#[test]
fn purge_empties_the_tree() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
    assert_eq!(t.db.size_estimate(), 3);

    t.db.tree().unsafe_purge(false);
    assert_eq!(t.db.size_estimate(), 0);
}

#[test]
fn purge_stats_cover_every_record() {
    let t = TestDb::with_options(TreeOptions::default().with_value_size_hint(4096));
    let n = 100usize;
    t.db
        .run(|tree, txn| {
            for i in 0..n {
                tree.put(txn, format!("k{:04}", i).as_bytes(), &vec![b'v'; 1 + i % 7])?;
            }
            Ok(())
        })
        .unwrap();

    let stats = t.db.tree().unsafe_purge(true).expect("first purge reports");
    assert_eq!(stats.records, n);
    assert_eq!(stats.live_records, n);
    assert!(stats.nodes > 1, "tiny leaves should produce several nodes");
    assert_eq!(stats.keys_per_node.iter().map(|&c| c as usize).sum::<usize>(), n);
    assert_eq!(stats.record_size_counts.values().sum::<usize>(), n);
    // Seven distinct value lengths were written.
    assert_eq!(stats.record_size_counts.len(), 7);
}

#[test]
fn purge_counts_tombstoned_slots() {
    // A record that was claimed but never published does not exist; a
    // committed delete releases its slot. Purge therefore only ever sees
    // live slots here.
    let t = TestDb::new();
    t.seed(&[(b"a", b"1"), (b"b", b"2")]);
    t.db
        .run(|tree, txn| {
            tree.remove(txn, b"a");
            Ok(())
        })
        .unwrap();

    let stats = t.db.tree().unsafe_purge(true).unwrap();
    assert_eq!(stats.records, 1);
    assert_eq!(stats.live_records, 1);
}

#[test]
fn second_purge_is_a_noop() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1")]);
    assert!(t.db.tree().unsafe_purge(true).is_some());
    assert!(t.db.tree().unsafe_purge(true).is_none());
}

#[test]
fn destroy_consumes_the_database() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1"), (b"b", b"2")]);
    let TestDb { db } = t;
    let stats = db.destroy(true).expect("stats requested");
    assert_eq!(stats.records, 2);
}

#[test]
fn drop_purges_implicitly() {
    // No assertion beyond "does not hang or double-free": dropping an
    // unpurged tree runs the purge walker.
    let t = TestDb::new();
    t.seed(&[(b"a", b"1")]);
    drop(t);
}
