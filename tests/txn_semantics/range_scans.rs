//! Range scans: ordering, bounds, write-set merge, early stop, allocator.

use crate::common::*;
use latticedb::prelude::*;

// ============================================================================
// Bounds and ordering
// ============================================================================

#[test]
fn scan_is_ordered_and_half_open() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1"), (b"c", b"3"), (b"b", b"2"), (b"d", b"4")]);
    assert_eq!(
        t.scan(b"a", Some(b"d")),
        rows(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")])
    );
}

#[test]
fn scan_unbounded_reaches_the_end() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1"), (b"z", b"26")]);
    assert_eq!(t.scan(b"b", None), rows(&[(b"z", b"26")]));
}

#[test]
fn scan_of_empty_range_is_empty() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1")]);
    assert!(t.scan(b"m", Some(b"q")).is_empty());
}

#[test]
fn scan_across_many_leaves() {
    // Tiny leaves force the walk across node boundaries.
    let t = TestDb::with_options(TreeOptions::default().with_value_size_hint(4096));
    let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0..300u32)
        .map(|i| (format!("k{:05}", i).into_bytes(), b"v".to_vec()))
        .collect();
    t.db
        .run(|tree, txn| {
            for (k, v) in &pairs {
                tree.put(txn, k, v)?;
            }
            Ok(())
        })
        .unwrap();

    let all = t.scan(b"", None);
    assert_eq!(all.len(), 300);
    assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
}

// ============================================================================
// Write-set merge
// ============================================================================

#[test]
fn scan_sees_own_pending_writes() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1"), (b"c", b"3")]);

    let mut txn = t.db.begin();
    let tree = t.db.tree();
    tree.put(&mut txn, b"b", b"2").unwrap(); // pending insert between rows
    tree.put(&mut txn, b"a", b"1'").unwrap(); // pending overwrite
    tree.remove(&mut txn, b"c"); // pending delete

    let got = tree.search_range(&mut txn, b"a", Some(b"z")).unwrap();
    assert_eq!(got, rows(&[(b"a", b"1'"), (b"b", b"2")]));
    t.db.commit(&mut txn).unwrap();

    // After commit the merge result is the committed state.
    assert_eq!(t.scan(b"a", Some(b"z")), rows(&[(b"a", b"1'"), (b"b", b"2")]));
}

#[test]
fn scan_sees_pending_write_past_last_physical_row() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1")]);
    let mut txn = t.db.begin();
    t.db.tree().put(&mut txn, b"m", b"13").unwrap();
    let got = t.db.tree().search_range(&mut txn, b"a", None).unwrap();
    assert_eq!(got, rows(&[(b"a", b"1"), (b"m", b"13")]));
    t.db.abort(&mut txn, "done");
}

#[test]
fn scan_on_empty_tree_sees_only_pending() {
    let t = TestDb::new();
    let mut txn = t.db.begin();
    t.db.tree().put(&mut txn, b"x", b"v").unwrap();
    let got = t.db.tree().search_range(&mut txn, b"a", None).unwrap();
    assert_eq!(got, rows(&[(b"x", b"v")]));
    t.db.abort(&mut txn, "done");
}

// ============================================================================
// Early stop
// ============================================================================

#[test]
fn visitor_stop_ends_the_scan() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);

    let mut txn = t.db.begin();
    let mut seen = Vec::new();
    let mut visitor = |key: &[u8], value: Value| {
        seen.push((key.to_vec(), value));
        seen.len() < 2
    };
    let mut alloc = latticedb::DefaultAlloc::new(16);
    t.db.tree()
        .search_range_call(&mut txn, b"a", None, &mut visitor, &mut alloc)
        .unwrap();
    assert_eq!(seen, rows(&[(b"a", b"1"), (b"b", b"2")]));
    t.db.commit(&mut txn).unwrap();
}

// ============================================================================
// Read recording
// ============================================================================

#[test]
fn scanned_rows_land_in_the_read_set() {
    let t = TestDb::new();
    t.seed(&[(b"a", b"1"), (b"b", b"2")]);
    let mut txn = t.db.begin();
    t.db.tree().search_range(&mut txn, b"a", Some(b"z")).unwrap();
    assert_eq!(txn.read_count(), 2);
    assert!(!txn.absent_ranges().is_empty());
    t.db.commit(&mut txn).unwrap();
}

#[test]
fn pending_keys_are_not_double_recorded() {
    // A key served from the write-set during a scan must not also appear
    // as a recorded read.
    let t = TestDb::new();
    t.seed(&[(b"a", b"1")]);
    let mut txn = t.db.begin();
    t.db.tree().put(&mut txn, b"a", b"mine").unwrap();
    t.db.tree().search_range(&mut txn, b"a", Some(b"z")).unwrap();
    assert_eq!(txn.read_count(), 0);
    t.db.commit(&mut txn).unwrap();
}
