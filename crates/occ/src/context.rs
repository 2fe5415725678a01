//! Per-transaction state: read-set, write-set, and absent-range set.
//!
//! A [`TransactionContext`] is owned by one worker thread for the lifetime
//! of one transaction. The overlay never names the concrete context type;
//! it works against the [`TxnState`] capability trait so alternative OCC
//! backends can plug in their own context representation.

use crate::manager::CommitError;
use lattice_core::{Key, NodeRef, Observation, Tid, Value};
use rustc_hash::FxHashMap;

/// A buffered write: the pending value (or delete marker) for one key.
///
/// A key appears in at most one entry; repeated writes overwrite the prior
/// pending value and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Pending value; `None` is the delete marker.
    pub value: Option<Value>,
    /// Uniqueness expectation from `insert`. A performance hint only: it
    /// lets commit application skip an existence probe, never changes the
    /// outcome.
    pub expect_new: bool,
}

impl PendingWrite {
    /// A pending upsert.
    pub fn upsert(value: Value) -> Self {
        PendingWrite {
            value: Some(value),
            expect_new: false,
        }
    }

    /// A pending insert with a uniqueness expectation.
    pub fn insert(value: Value) -> Self {
        PendingWrite {
            value: Some(value),
            expect_new: true,
        }
    }

    /// A pending delete.
    pub fn delete() -> Self {
        PendingWrite {
            value: None,
            expect_new: false,
        }
    }

    /// True if this entry is a delete marker.
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}

/// A key interval a range scan observed to contain no visible rows.
///
/// Recorded during the scan, re-checked at commit: any key that became
/// visible inside the interval is a phantom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsentRange {
    /// Lower bound of the interval.
    pub lower: Key,
    /// Whether `lower` itself belongs to the interval. The leading gap of a
    /// scan includes its inclusive lower bound; gaps between physical rows
    /// exclude the bounding row (it is protected by its own read entry).
    pub lower_inclusive: bool,
    /// Exclusive upper bound; `None` means unbounded.
    pub upper: Option<Key>,
    /// The index node (with its version stamp) that backed the observation.
    pub node: NodeRef,
    /// True when the whole interval provably lay inside `node` when it was
    /// recorded. Only then does an unchanged stamp at validation time prove
    /// the gap intact; otherwise the validator must re-scan physically.
    pub single_node: bool,
}

/// Transaction lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Buffering reads and writes.
    Active,
    /// Commit in progress, observations being re-checked.
    Validating,
    /// Validation passed, writes applied.
    Committed {
        /// The assigned commit tid.
        tid: Tid,
    },
    /// Discarded; the physical index was never touched.
    Aborted {
        /// Why the transaction aborted.
        reason: String,
    },
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Validating => write!(f, "validating"),
            TransactionStatus::Committed { tid } => write!(f, "committed({})", tid),
            TransactionStatus::Aborted { reason } => write!(f, "aborted({})", reason),
        }
    }
}

/// Capability set the overlay requires from a transaction backend.
///
/// Everything the transactional tree does to per-transaction state goes
/// through this trait; concrete contexts stay interchangeable.
pub trait TxnState {
    /// Backend-local transaction identifier (not the commit tid).
    fn txn_id(&self) -> u64;

    /// Current lifecycle status.
    fn status(&self) -> &TransactionStatus;

    /// True while the transaction accepts reads and writes.
    fn is_active(&self) -> bool {
        matches!(self.status(), TransactionStatus::Active)
    }

    /// Transition Active → Validating.
    fn begin_validation(&mut self) -> Result<(), CommitError>;

    /// Transition Validating → Committed.
    fn mark_committed(&mut self, tid: Tid);

    /// Transition to Aborted with a reason.
    fn mark_aborted(&mut self, reason: String);

    /// Record a point observation. The first observation of a key wins;
    /// later reads of the same key validate against the original.
    fn record_read(&mut self, key: &[u8], obs: Observation);

    /// The recorded observation for a key, if any.
    fn observed_read(&self, key: &[u8]) -> Option<Observation>;

    /// The pending write for a key, if any.
    fn pending_write(&self, key: &[u8]) -> Option<&PendingWrite>;

    /// Buffer a write, overwriting any prior pending write for the key.
    fn buffer_write(&mut self, key: Key, write: PendingWrite);

    /// Append a gap to the absent-range ledger.
    fn record_absent_range(&mut self, range: AbsentRange);

    /// All recorded point observations.
    fn read_set(&self) -> &FxHashMap<Key, Observation>;

    /// All buffered writes.
    fn write_set(&self) -> &FxHashMap<Key, PendingWrite>;

    /// All recorded gaps, in scan order.
    fn absent_ranges(&self) -> &[AbsentRange];
}

/// Default transaction context.
///
/// Plain per-thread state: two hash maps and an ordered gap ledger. No
/// locking anywhere; sharing is the commit manager's problem.
#[derive(Debug)]
pub struct TransactionContext {
    txn_id: u64,
    status: TransactionStatus,
    read_set: FxHashMap<Key, Observation>,
    write_set: FxHashMap<Key, PendingWrite>,
    absent_ranges: Vec<AbsentRange>,
}

impl TransactionContext {
    /// Create a fresh context. Normally called through the commit manager's
    /// `begin`, which also pins the reclamation epoch.
    pub fn new(txn_id: u64) -> Self {
        TransactionContext {
            txn_id,
            status: TransactionStatus::Active,
            read_set: FxHashMap::default(),
            write_set: FxHashMap::default(),
            absent_ranges: Vec::new(),
        }
    }

    /// Reset for reuse under a new transaction id, keeping map capacity.
    pub fn reset(&mut self, txn_id: u64) {
        self.txn_id = txn_id;
        self.status = TransactionStatus::Active;
        self.read_set.clear();
        self.write_set.clear();
        self.absent_ranges.clear();
    }

    /// Number of buffered writes.
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// Number of recorded point observations.
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }
}

impl TxnState for TransactionContext {
    fn txn_id(&self) -> u64 {
        self.txn_id
    }

    fn status(&self) -> &TransactionStatus {
        &self.status
    }

    fn begin_validation(&mut self) -> Result<(), CommitError> {
        match self.status {
            TransactionStatus::Active => {
                self.status = TransactionStatus::Validating;
                Ok(())
            }
            ref other => Err(CommitError::InvalidState(other.to_string())),
        }
    }

    fn mark_committed(&mut self, tid: Tid) {
        debug_assert!(matches!(self.status, TransactionStatus::Validating));
        self.status = TransactionStatus::Committed { tid };
    }

    fn mark_aborted(&mut self, reason: String) {
        self.status = TransactionStatus::Aborted { reason };
    }

    fn record_read(&mut self, key: &[u8], obs: Observation) {
        if !self.read_set.contains_key(key) {
            self.read_set.insert(key.to_vec(), obs);
        }
    }

    fn observed_read(&self, key: &[u8]) -> Option<Observation> {
        self.read_set.get(key).copied()
    }

    fn pending_write(&self, key: &[u8]) -> Option<&PendingWrite> {
        self.write_set.get(key)
    }

    fn buffer_write(&mut self, key: Key, write: PendingWrite) {
        self.write_set.insert(key, write);
    }

    fn record_absent_range(&mut self, range: AbsentRange) {
        self.absent_ranges.push(range);
    }

    fn read_set(&self) -> &FxHashMap<Key, Observation> {
        &self.read_set
    }

    fn write_set(&self) -> &FxHashMap<Key, PendingWrite> {
        &self.write_set
    }

    fn absent_ranges(&self) -> &[AbsentRange] {
        &self.absent_ranges
    }
}
