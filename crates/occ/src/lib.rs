//! Optimistic concurrency control engine for Lattice
//!
//! This crate implements the transaction side of the overlay:
//! - [`TransactionContext`]: read-set, write-set, and absent-range tracking
//! - [`TxnState`]: the capability trait the overlay programs against
//! - [`CommitManager`]: serialized validate-then-apply commits
//!   (first-committer-wins) and commit-tid allocation
//! - [`EpochManager`]: epoch-based reclamation of superseded versions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod epoch;
pub mod manager;

pub use context::{
    AbsentRange, PendingWrite, TransactionContext, TransactionStatus, TxnState,
};
pub use epoch::{EpochManager, EpochStats, Retired};
pub use manager::{CommitError, CommitManager, CommitTarget, TxnBackend};
