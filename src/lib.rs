//! # LatticeDB
//!
//! In-memory OLTP ordered index with serializable optimistic transactions.
//!
//! LatticeDB layers a multi-version transactional overlay on a physically
//! concurrent ordered index: reads never block, writes are buffered until
//! commit, and commit-time validation (point-read re-checks plus
//! absent-range re-scans) makes the result serializable and phantom-free.
//!
//! ## Quick Start
//!
//! ```
//! use latticedb::prelude::*;
//!
//! let db = Lattice::new();
//!
//! // Closed transaction with automatic conflict retry
//! db.run(|tree, txn| {
//!     tree.put(txn, b"user:1", b"alice")?;
//!     tree.put(txn, b"user:2", b"bob")?;
//!     Ok(())
//! })?;
//!
//! // Explicit transaction lifecycle
//! let mut txn = db.begin();
//! let name = db.tree().search(&mut txn, b"user:1")?;
//! assert_eq!(name, Some(b"alice".to_vec()));
//! let rows = db.tree().search_range(&mut txn, b"user:", Some(b"user;"))?;
//! assert_eq!(rows.len(), 2);
//! db.commit(&mut txn)?;
//! # Ok::<(), latticedb::Error>(())
//! ```
//!
//! ## Semantics
//!
//! - **No dirty reads**: uncommitted writes are invisible to every other
//!   transaction.
//! - **Self-visibility**: a transaction reads its own buffered writes.
//! - **Phantom prevention**: ranges observed empty are re-checked at
//!   commit; a new row inside one fails the commit.
//! - **First-committer-wins**: of two conflicting transactions, the one
//!   validating second aborts with a retryable [`Error::Conflict`].

#![warn(missing_docs)]

mod database;

pub mod prelude;

// Re-export main entry points
pub use database::Lattice;
pub use lattice_core::{Error, Result};

// Re-export the transactional surface
pub use lattice_occ::{
    CommitManager, EpochStats, TransactionContext, TransactionStatus, TxnState,
};
pub use lattice_tree::{
    DefaultAlloc, PurgeStats, ScanAlloc, ScanVisitor, TreeOptions, TxnTree,
};

// Re-export core types
pub use lattice_core::{Key, NodeId, NodeRef, Observation, Tid, TreeId, Value};
