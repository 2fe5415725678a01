//! Multi-threaded races: dirty-read freedom, conflict serialization,
//! disjoint-commit throughput, contended-counter stress.

use crate::common::*;
use latticedb::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::{Arc, Barrier};
use std::thread;

fn shared_db() -> Arc<TestDb> {
    Arc::new(TestDb::new())
}

#[test]
fn uncommitted_write_invisible_across_threads() {
    let t = shared_db();
    let gate = Arc::new(Barrier::new(2));

    let writer = {
        let t = Arc::clone(&t);
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            let mut txn = t.db.begin();
            t.db.tree().put(&mut txn, b"k", b"dirty").unwrap();
            gate.wait(); // writes buffered, not committed
            gate.wait(); // reader has looked
            t.db.commit(&mut txn).unwrap();
        })
    };

    let reader = {
        let t = Arc::clone(&t);
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            gate.wait();
            let mut txn = t.db.begin();
            let seen = t.db.tree().search(&mut txn, b"k").unwrap();
            t.db.abort(&mut txn, "observer");
            gate.wait();
            assert_eq!(seen, None, "dirty read observed");
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(t.get(b"k"), Some(b"dirty".to_vec()));
}

#[test]
fn disjoint_writers_all_commit() {
    let t = shared_db();
    let threads = 8;
    let per_thread = 100u32;
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|w| {
            let t = Arc::clone(&t);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for i in 0..per_thread {
                    let key = format!("w{}-{:04}", w, i).into_bytes();
                    t.db.run(|tree, txn| tree.put(txn, &key, b"v")).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(t.db.size_estimate(), threads * per_thread as usize);
}

#[test]
fn contended_counter_loses_no_increments() {
    let t = shared_db();
    t.seed(&[(b"counter", b"0")]);

    let threads = 4;
    let per_thread = 25u64;
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let t = Arc::clone(&t);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..per_thread {
                    // Retry until the read-modify-write wins its race.
                    loop {
                        let outcome = t.db.run(|tree, txn| {
                            let raw = tree
                                .search(txn, b"counter")?
                                .expect("counter must exist");
                            let current: u64 =
                                String::from_utf8_lossy(&raw).parse().expect("numeric");
                            tree.put(txn, b"counter", (current + 1).to_string().as_bytes())
                        });
                        match outcome {
                            Ok(()) => break,
                            Err(err) if err.is_retryable() => continue,
                            Err(err) => panic!("unexpected error: {err}"),
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let expected = (threads as u64 * per_thread).to_string().into_bytes();
    assert_eq!(t.get(b"counter"), Some(expected));
}

#[test]
fn scanners_race_structural_churn() {
    // Scans stay ordered and duplicate-free while writers split and drain
    // leaves underneath them.
    let t = Arc::new(TestDb::with_options(
        TreeOptions::default().with_value_size_hint(4096),
    ));
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let writer = {
        let t = Arc::clone(&t);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut keys: Vec<u32> = (0..500).collect();
            keys.shuffle(&mut rng);
            for i in keys {
                let key = format!("k{:05}", i).into_bytes();
                if rng.gen_bool(0.8) {
                    t.db.run(|tree, txn| tree.put(txn, &key, b"v")).unwrap();
                } else {
                    t.db.run(|tree, txn| {
                        tree.remove(txn, &key);
                        Ok(())
                    })
                    .unwrap();
                }
            }
            stop.store(true, std::sync::atomic::Ordering::Release);
        })
    };

    let scanner = {
        let t = Arc::clone(&t);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(std::sync::atomic::Ordering::Acquire) {
                let mut txn = t.db.begin();
                match t.db.tree().search_range(&mut txn, b"", None) {
                    Ok(rows) => {
                        assert!(
                            rows.windows(2).all(|w| w[0].0 < w[1].0),
                            "scan out of order"
                        );
                    }
                    Err(err) => assert!(err.is_retryable(), "unexpected error: {err}"),
                }
                // Reads only; the commit outcome is irrelevant here.
                t.db.abort(&mut txn, "observer");
            }
        })
    };

    writer.join().unwrap();
    scanner.join().unwrap();
}

#[test]
fn racing_inserts_to_one_key_serialize() {
    let t = shared_db();
    let threads = 4;
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads as u32)
        .map(|w| {
            let t = Arc::clone(&t);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let value = format!("writer-{}", w);
                t.db.run(|tree, txn| tree.insert(txn, b"slot", value.as_bytes()))
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // Exactly one slot exists and it holds one of the racers' values.
    assert_eq!(t.db.size_estimate(), 1);
    let value = t.get(b"slot").unwrap();
    assert!(value.starts_with(b"writer-"));
}
