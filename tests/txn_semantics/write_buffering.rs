//! Write buffering: deferred mutation, overwrite collapse, hints, aborts.

use crate::common::*;
use latticedb::prelude::*;

// ============================================================================
// Deferral
// ============================================================================

#[test]
fn writes_do_not_touch_index_before_commit() {
    let t = TestDb::new();
    let mut txn = t.db.begin();
    for i in 0..50u32 {
        t.db.tree()
            .put(&mut txn, format!("k{}", i).as_bytes(), b"v")
            .unwrap();
    }
    assert_eq!(t.db.size_estimate(), 0);
    t.db.commit(&mut txn).unwrap();
    assert_eq!(t.db.size_estimate(), 50);
}

#[test]
fn abort_discards_everything() {
    let t = TestDb::new();
    t.seed(&[(b"keep", b"v")]);
    let mut txn = t.db.begin();
    t.db.tree().put(&mut txn, b"new", b"v").unwrap();
    t.db.tree().remove(&mut txn, b"keep");
    t.db.abort(&mut txn, "caller changed its mind");

    assert_eq!(t.db.size_estimate(), 1);
    assert_eq!(t.get(b"keep"), Some(b"v".to_vec()));
    assert_eq!(t.get(b"new"), None);
}

#[test]
fn failed_validation_leaves_index_untouched() {
    let t = TestDb::new();
    // Loser reads a key, then the winner changes it.
    let mut loser = t.db.begin();
    assert_eq!(t.db.tree().search(&mut loser, b"k").unwrap(), None);
    t.db.tree().put(&mut loser, b"loser-key", b"v").unwrap();

    t.seed(&[(b"k", b"winner")]);

    let err = t.db.commit(&mut loser).unwrap_err();
    assert!(err.is_conflict());
    // The loser's buffered insert never became visible.
    assert_eq!(t.get(b"loser-key"), None);
    assert_eq!(t.db.size_estimate(), 1);
}

// ============================================================================
// Write-set collapse
// ============================================================================

#[test]
fn repeated_writes_collapse_to_last() {
    let t = TestDb::new();
    let mut txn = t.db.begin();
    let tree = t.db.tree();
    tree.put(&mut txn, b"k", b"v1").unwrap();
    tree.insert(&mut txn, b"k", b"v2").unwrap();
    tree.remove(&mut txn, b"k");
    tree.put(&mut txn, b"k", b"v3").unwrap();
    assert_eq!(txn.write_count(), 1);
    t.db.commit(&mut txn).unwrap();
    assert_eq!(t.get(b"k"), Some(b"v3".to_vec()));
}

#[test]
fn put_then_remove_commits_absence() {
    let t = TestDb::new();
    let mut txn = t.db.begin();
    t.db.tree().put(&mut txn, b"k", b"v").unwrap();
    t.db.tree().remove(&mut txn, b"k");
    t.db.commit(&mut txn).unwrap();
    assert_eq!(t.get(b"k"), None);
    assert_eq!(t.db.size_estimate(), 0);
}

// ============================================================================
// The expect_new hint never changes outcomes
// ============================================================================

#[test]
fn insert_hint_wrong_still_upserts() {
    let t = TestDb::new();
    t.seed(&[(b"k", b"old")]);
    // insert() expects the key to be new; it is not. The commit must still
    // overwrite.
    t.db
        .run(|tree, txn| tree.insert(txn, b"k", b"new"))
        .unwrap();
    assert_eq!(t.get(b"k"), Some(b"new".to_vec()));
    assert_eq!(t.db.size_estimate(), 1);
}

#[test]
fn put_on_fresh_key_still_creates() {
    let t = TestDb::new();
    // put() carries no new-key expectation; the key is new anyway.
    t.db.run(|tree, txn| tree.put(txn, b"k", b"v")).unwrap();
    assert_eq!(t.get(b"k"), Some(b"v".to_vec()));
}
