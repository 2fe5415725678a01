//! Transactional overlay for Lattice
//!
//! This crate is the serializable, multi-version face of the ordered index:
//! - [`TxnTree`]: point ops and range scans scoped to a transaction, with
//!   all writes buffered until commit
//! - Range-scan coordination with absent-range (gap) recording for phantom
//!   prevention
//! - Commit-time validation and application (the crate implements
//!   `lattice_occ::CommitTarget`)
//! - Whole-tree purge with optional statistics

#![warn(missing_docs)]
#![warn(clippy::all)]

mod apply;
pub mod options;
pub mod purge;
pub mod scan;
pub mod tree;
mod validate;

pub use options::TreeOptions;
pub use purge::PurgeStats;
pub use scan::{DefaultAlloc, ScanAlloc, ScanVisitor};
pub use tree::TxnTree;
