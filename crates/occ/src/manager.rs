//! Commit manager: transaction lifecycle and atomic commit.
//!
//! The manager serializes commits behind a single lock, which is what makes
//! first-committer-wins real: between one transaction's validation and its
//! application to the index, no other transaction can commit. Reads and
//! scans never take this lock.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. begin_validation()      - Active → Validating
//! 2. allocate commit tid
//! 3. target.validate_and_apply()
//!      - re-check every point read and every recorded gap
//!      - IF stale/phantom: leave the index untouched, abort
//!      - ELSE: publish buffered writes stamped with the tid
//! 4. mark committed, unpin the reclamation epoch
//! ```
//!
//! Tid gaps are possible: a tid allocated for a transaction that then fails
//! validation is never reused. Consumers must not assume tids are
//! contiguous.

use crate::context::TxnState;
use crate::epoch::EpochManager;
use lattice_core::{Tid, TreeId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Commit-time failures.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A recorded observation no longer holds: a point read went stale or a
    /// phantom appeared in an observed-empty range. Retry the whole
    /// transaction.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The transaction was not in a committable state.
    #[error("transaction is not active: {0}")]
    InvalidState(String),
}

impl From<CommitError> for lattice_core::Error {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::Validation(reason) => lattice_core::Error::Conflict(reason),
            CommitError::InvalidState(state) => lattice_core::Error::Internal(state),
        }
    }
}

/// Something a transaction commits against.
///
/// The overlay implements this: validation re-checks the transaction's
/// observations against the physical index, application publishes the
/// buffered writes. An `Err` return must leave the physical index exactly
/// as it was.
pub trait CommitTarget<T: TxnState> {
    /// Validate `txn`'s observations and, on success, apply its buffered
    /// writes stamped with `tid`. Displaced versions go to `epochs`.
    fn validate_and_apply(&self, txn: &T, tid: Tid, epochs: &EpochManager)
        -> Result<(), CommitError>;
}

/// Lifecycle hooks an OCC backend may use to observe tree attachment.
///
/// Both hooks default to no-ops; backends that maintain per-tree state
/// (background tasks, statistics) override them.
pub trait TxnBackend {
    /// A tree bound itself to this backend.
    fn on_attach(&self, _tree: TreeId) {}

    /// A bound tree is going away.
    fn on_detach(&self, _tree: TreeId) {}
}

/// Manages transaction lifecycle and atomic commits.
#[derive(Debug)]
pub struct CommitManager {
    /// Commit tid counter. Allocated tids define the serialization order.
    next_tid: AtomicU64,

    /// Backend-local transaction id counter (diagnostics and epoch pins).
    next_txn_id: AtomicU64,

    /// Commit serialization lock.
    ///
    /// Held across validate-and-apply so no transaction can commit between
    /// another's validation and application.
    commit_lock: Mutex<()>,

    epochs: EpochManager,
}

impl CommitManager {
    /// Create a manager starting tids at 1.
    pub fn new() -> Self {
        CommitManager {
            next_tid: AtomicU64::new(0),
            next_txn_id: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            epochs: EpochManager::new(),
        }
    }

    /// The reclamation epoch machinery.
    pub fn epochs(&self) -> &EpochManager {
        &self.epochs
    }

    /// Highest commit tid allocated so far.
    pub fn last_tid(&self) -> Tid {
        Tid::new(self.next_tid.load(Ordering::SeqCst))
    }

    fn allocate_tid(&self) -> Tid {
        Tid::new(self.next_tid.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Start a transaction: assign an id and pin the reclamation epoch.
    ///
    /// Every begun transaction must reach `commit` or `abort`; a context
    /// that is silently dropped keeps its epoch pinned and stalls
    /// reclamation.
    pub fn begin(&self) -> crate::context::TransactionContext {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.epochs.sync_epoch();
        self.epochs.pin(txn_id);
        tracing::trace!(txn = txn_id, "transaction begin");
        crate::context::TransactionContext::new(txn_id)
    }

    /// Commit a transaction atomically.
    ///
    /// On `Ok`, the buffered writes are visible under the returned tid. On
    /// `Err`, the physical index is untouched and the transaction is
    /// aborted; retryability is decided by the error.
    pub fn commit<T, C>(&self, txn: &mut T, target: &C) -> Result<Tid, CommitError>
    where
        T: TxnState,
        C: CommitTarget<T>,
    {
        let _commit_guard = self.commit_lock.lock();

        txn.begin_validation()?;
        let tid = self.allocate_tid();

        match target.validate_and_apply(txn, tid, &self.epochs) {
            Ok(()) => {
                txn.mark_committed(tid);
                self.epochs.finish_epoch(txn.txn_id());
                tracing::debug!(txn = txn.txn_id(), tid = tid.as_u64(), "committed");
                Ok(tid)
            }
            Err(err) => {
                txn.mark_aborted(err.to_string());
                self.epochs.finish_epoch(txn.txn_id());
                tracing::debug!(txn = txn.txn_id(), error = %err, "aborted at commit");
                Err(err)
            }
        }
    }

    /// Explicitly abort a transaction.
    ///
    /// Discards all buffered effects; nothing was applied, so there is no
    /// compensating work. Idempotent for already-finished transactions.
    pub fn abort<T: TxnState>(&self, txn: &mut T, reason: impl Into<String>) {
        if txn.is_active() {
            txn.mark_aborted(reason.into());
            self.epochs.finish_epoch(txn.txn_id());
        }
    }
}

impl Default for CommitManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TxnBackend for CommitManager {}
