//! Convenient imports for LatticeDB.
//!
//! ```
//! use latticedb::prelude::*;
//!
//! let db = Lattice::new();
//! db.run(|tree, txn| tree.put(txn, b"key", b"value"))?;
//! # Ok::<(), latticedb::Error>(())
//! ```

// Main entry point
pub use crate::database::Lattice;

// Error handling
pub use crate::{Error, Result};

// Transaction surface
pub use lattice_occ::{TransactionContext, TransactionStatus, TxnState};
pub use lattice_tree::{ScanVisitor, TreeOptions, TxnTree};

// Core types
pub use lattice_core::{Key, Tid, Value};
