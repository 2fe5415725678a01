//! Point operation tests: search, put, insert, remove, typed helpers.

use crate::common::*;
use latticedb::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// Basic lifecycle
// ============================================================================

#[test]
fn search_missing_returns_none() {
    let t = TestDb::new();
    assert_eq!(t.get(b"nope"), None);
}

#[test]
fn put_commit_search() {
    let t = TestDb::new();
    t.seed(&[(b"k", b"v")]);
    assert_eq!(t.get(b"k"), Some(b"v".to_vec()));
}

#[test]
fn put_overwrites_on_commit() {
    let t = TestDb::new();
    t.seed(&[(b"k", b"v1")]);
    t.seed(&[(b"k", b"v2")]);
    assert_eq!(t.get(b"k"), Some(b"v2".to_vec()));
    assert_eq!(t.db.size_estimate(), 1);
}

#[test]
fn remove_commits_absence() {
    let t = TestDb::new();
    t.seed(&[(b"k", b"v")]);
    t.db
        .run(|tree, txn| {
            tree.remove(txn, b"k");
            Ok(())
        })
        .unwrap();
    assert_eq!(t.get(b"k"), None);
    assert_eq!(t.db.size_estimate(), 0);
}

#[test]
fn remove_of_missing_key_commits() {
    let t = TestDb::new();
    t.db
        .run(|tree, txn| {
            tree.remove(txn, b"ghost");
            Ok(())
        })
        .unwrap();
    assert_eq!(t.db.size_estimate(), 0);
}

// ============================================================================
// Self-visibility
// ============================================================================

#[test]
fn own_write_read_back_before_commit() {
    let t = TestDb::new();
    let mut txn = t.db.begin();
    t.db.tree().put(&mut txn, b"k", b"mine").unwrap();
    assert_eq!(
        t.db.tree().search(&mut txn, b"k").unwrap(),
        Some(b"mine".to_vec())
    );
    t.db.commit(&mut txn).unwrap();
}

#[test]
fn own_delete_read_back_before_commit() {
    let t = TestDb::new();
    t.seed(&[(b"k", b"v")]);
    let mut txn = t.db.begin();
    t.db.tree().remove(&mut txn, b"k");
    assert_eq!(t.db.tree().search(&mut txn, b"k").unwrap(), None);
    t.db.commit(&mut txn).unwrap();
}

#[test]
fn no_dirty_read_between_transactions() {
    let t = TestDb::new();
    let mut writer = t.db.begin();
    t.db.tree().put(&mut writer, b"k", b"uncommitted").unwrap();

    // A concurrent reader sees nothing until the writer commits.
    let mut reader = t.db.begin();
    assert_eq!(t.db.tree().search(&mut reader, b"k").unwrap(), None);
    t.db.abort(&mut reader, "done looking");

    t.db.commit(&mut writer).unwrap();
    assert_eq!(t.get(b"k"), Some(b"uncommitted".to_vec()));
}

// ============================================================================
// Empty-value invariant
// ============================================================================

#[test]
fn empty_value_rejected_everywhere() {
    let t = TestDb::new();
    let mut txn = t.db.begin();
    assert!(matches!(
        t.db.tree().put(&mut txn, b"k", b""),
        Err(Error::EmptyValue)
    ));
    assert!(matches!(
        t.db.tree().insert(&mut txn, b"k", b""),
        Err(Error::EmptyValue)
    ));
    t.db.abort(&mut txn, "invariant test");
    assert_eq!(t.db.size_estimate(), 0);
}

#[test]
fn empty_value_error_is_not_retryable() {
    assert!(!Error::EmptyValue.is_retryable());
}

// ============================================================================
// Bounded reads
// ============================================================================

#[test]
fn bounded_search_truncates_committed_value() {
    let t = TestDb::new();
    t.seed(&[(b"k", b"hello world")]);
    let mut txn = t.db.begin();
    let got = t.db.tree().search_bounded(&mut txn, b"k", 5).unwrap();
    assert_eq!(got, Some(b"hello".to_vec()));
    t.db.commit(&mut txn).unwrap();
}

#[test]
fn bounded_search_truncates_pending_value() {
    let t = TestDb::new();
    let mut txn = t.db.begin();
    t.db.tree().put(&mut txn, b"k", b"hello world").unwrap();
    let got = t.db.tree().search_bounded(&mut txn, b"k", 5).unwrap();
    assert_eq!(got, Some(b"hello".to_vec()));
    t.db.abort(&mut txn, "done");
}

// ============================================================================
// Typed helpers
// ============================================================================

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Account {
    owner: String,
    balance: i64,
}

#[test]
fn typed_roundtrip() {
    let t = TestDb::new();
    let account = Account {
        owner: "alice".into(),
        balance: 42,
    };
    t.db
        .run(|tree, txn| tree.put_obj(txn, b"acct:1", &account))
        .unwrap();
    let got: Option<Account> = t
        .db
        .run(|tree, txn| tree.search_obj(txn, b"acct:1"))
        .unwrap();
    assert_eq!(got, Some(account));
}

#[test]
fn typed_unit_encoding_rejected() {
    // The unit type encodes to zero bytes, which collides with the absence
    // sentinel and must be refused.
    let t = TestDb::new();
    let mut txn = t.db.begin();
    assert!(matches!(
        t.db.tree().put_obj(&mut txn, b"k", &()),
        Err(Error::EmptyValue)
    ));
    t.db.abort(&mut txn, "done");
}
