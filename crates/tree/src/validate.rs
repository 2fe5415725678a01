//! Commit-time validation: stale point reads and phantom detection.
//!
//! Re-checks every recorded observation against the physical index while
//! the commit lock is held. Point reads are compared by committed (tid,
//! absence); gaps are re-scanned unless their single-node stamp proves them
//! intact. Validation short-circuits on the first failure and reports it as
//! an abort condition; nothing here mutates shared state.

use crate::tree::TxnTree;
use lattice_core::{key_successor, Key, NodeRef, OrderedIndex, RangeSink, RecordHandle};
use lattice_occ::{AbsentRange, CommitError, TxnState};

/// Re-scan callback for one absent range.
///
/// Any key found inside the range whose record is visible is a phantom. A
/// key the validating transaction itself wrote is judged through the latest
/// chain — its own claim is authoritative and a claimed-but-unpublished
/// slot is still absent; every other key is judged through the stable
/// (committed) chain.
struct GapCheck<'a, T> {
    txn: &'a T,
    phantom: Option<Key>,
}

impl<T: TxnState> RangeSink for GapCheck<'_, T> {
    fn on_node(&mut self, _node: NodeRef) {}

    fn on_entry(&mut self, key: &[u8], record: &RecordHandle, _node: NodeRef) -> bool {
        let did_write = self.txn.pending_write(key).is_some();
        let absent = if did_write {
            record.latest_is_absent()
        } else {
            record.stable_latest_is_absent()
        };
        if !absent {
            self.phantom = Some(key.to_vec());
            return false;
        }
        true
    }
}

/// Validate every recorded observation of `txn` against the index.
///
/// Returns the first failure as a validation abort. Must run under the
/// commit lock so no concurrent commit can move the ground truth mid-check.
pub(crate) fn validate<I, T>(tree: &TxnTree<I>, txn: &T) -> Result<(), CommitError>
where
    I: OrderedIndex,
    T: TxnState,
{
    validate_point_reads(tree, txn)?;
    validate_absent_ranges(tree, txn)
}

fn validate_point_reads<I, T>(tree: &TxnTree<I>, txn: &T) -> Result<(), CommitError>
where
    I: OrderedIndex,
    T: TxnState,
{
    for (key, observed) in txn.read_set() {
        let current = match tree.index().search(key) {
            Some(record) => record.observation(),
            None => lattice_core::Observation::MISSING,
        };
        // Same value (by writer tid) or same absence. Two absences are
        // interchangeable even when their tids differ: a tombstone and a
        // missing slot describe the same visible state. Committed state is
        // never perturbed by this transaction's own unpublished claims, so
        // the comparison holds for keys it wrote too.
        let consistent = if observed.absent {
            current.absent
        } else {
            current == *observed
        };
        if !consistent {
            tracing::debug!(
                txn = txn.txn_id(),
                key = ?KeyBytes(key),
                ?observed,
                ?current,
                "stale point read"
            );
            return Err(CommitError::Validation(format!(
                "stale read of key {}",
                KeyBytes(key)
            )));
        }
    }
    Ok(())
}

fn validate_absent_ranges<I, T>(tree: &TxnTree<I>, txn: &T) -> Result<(), CommitError>
where
    I: OrderedIndex,
    T: TxnState,
{
    for gap in txn.absent_ranges() {
        if gap.single_node
            && tree.index().node_version(gap.node.id) == Some(gap.node.version)
        {
            // The interval lies in one node and that node has not changed
            // since the scan observed it empty.
            continue;
        }
        if let Some(phantom) = rescan_gap(tree, txn, gap) {
            tracing::debug!(
                txn = txn.txn_id(),
                key = ?KeyBytes(&phantom),
                lower = ?KeyBytes(&gap.lower),
                "phantom inside observed-empty range"
            );
            return Err(CommitError::Validation(format!(
                "phantom key {} appeared in an observed-empty range",
                KeyBytes(&phantom)
            )));
        }
    }
    Ok(())
}

/// Physically re-scan one gap. Returns the first phantom key, if any.
fn rescan_gap<I, T>(tree: &TxnTree<I>, txn: &T, gap: &AbsentRange) -> Option<Key>
where
    I: OrderedIndex,
    T: TxnState,
{
    let start: Key = if gap.lower_inclusive {
        gap.lower.clone()
    } else {
        key_successor(&gap.lower)
    };
    let mut check = GapCheck { txn, phantom: None };
    tree.index()
        .walk_range(&start, gap.upper.as_deref(), &mut check);
    check.phantom
}

/// Hex-ish display wrapper for keys in diagnostics.
struct KeyBytes<'a>(&'a [u8]);

impl std::fmt::Debug for KeyBytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::fmt::Display for KeyBytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(self.0) {
            Ok(s) if s.chars().all(|c| !c.is_control()) => write!(f, "{:?}", s),
            _ => {
                write!(f, "0x")?;
                for byte in self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}
