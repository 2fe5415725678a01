//! Commit application: claim, validate, publish.
//!
//! The only place the physical index is ever mutated on behalf of a
//! transaction. Runs under the commit manager's lock:
//!
//! 1. **Claim**: every write-set key gets a physical slot. Keys without one
//!    receive an uncommitted placeholder record — absent to every observer,
//!    including this transaction's own gap re-scans.
//! 2. **Validate**: re-check the read-set and the absent-range ledger
//!    (`validate` module). On failure the fresh placeholders are removed
//!    and the index is exactly as it was.
//! 3. **Publish**: install each pending value or delete marker stamped with
//!    the commit tid; displaced versions and removed slots are retired to
//!    the epoch queue.

use crate::tree::TxnTree;
use crate::validate;
use lattice_core::{Key, OrderedIndex, RecordHandle, Tid, Value, VersionRecord};
use lattice_occ::{CommitError, CommitTarget, EpochManager, Retired, TxnState};
use std::sync::Arc;

/// A write-set key bound to its physical slot for this commit.
struct Claim {
    key: Key,
    record: RecordHandle,
    /// The slot was created by this commit and must be removed on abort.
    fresh: bool,
    value: Option<Value>,
}

impl<I: OrderedIndex> TxnTree<I> {
    /// Find or create the slot for `key`. `expect_new` skips the initial
    /// probe; when the hint is wrong the slow path recovers.
    fn claim_slot(&self, key: &[u8], tid: Tid, expect_new: bool) -> (RecordHandle, bool) {
        if expect_new {
            let record: RecordHandle = Arc::new(VersionRecord::placeholder(tid));
            if self.index().insert(key, record.clone()) {
                return (record, true);
            }
        }
        loop {
            if let Some(existing) = self.index().search(key) {
                return (existing, false);
            }
            let record: RecordHandle = Arc::new(VersionRecord::placeholder(tid));
            if self.index().insert(key, record.clone()) {
                return (record, true);
            }
        }
    }
}

impl<I, T> CommitTarget<T> for TxnTree<I>
where
    I: OrderedIndex,
    T: TxnState,
{
    fn validate_and_apply(
        &self,
        txn: &T,
        tid: Tid,
        epochs: &EpochManager,
    ) -> Result<(), CommitError> {
        // Phase 1: claim a slot per buffered write.
        let mut claims: Vec<Claim> = Vec::with_capacity(txn.write_set().len());
        for (key, write) in txn.write_set() {
            let (record, fresh) = self.claim_slot(key, tid, write.expect_new);
            claims.push(Claim {
                key: key.clone(),
                record,
                fresh,
                value: write.value.clone(),
            });
        }

        // Phase 2: validate all recorded observations.
        if let Err(err) = validate::validate(self, txn) {
            for claim in &claims {
                if claim.fresh {
                    self.index().remove(&claim.key);
                }
            }
            return Err(err);
        }

        // Phase 3: publish.
        let mut deletes = 0usize;
        for claim in claims {
            let is_delete = claim.value.is_none();
            if let Some(displaced) = claim.record.publish(claim.value, tid) {
                epochs.retire(Retired::Version(displaced));
            }
            if is_delete {
                // A committed delete releases the physical slot; readers
                // still holding the record observe the delete marker.
                if let Some(handle) = self.index().remove(&claim.key) {
                    epochs.retire(Retired::Record(handle));
                }
                deletes += 1;
            }
        }
        tracing::trace!(
            txn = txn.txn_id(),
            tid = tid.as_u64(),
            writes = txn.write_set().len(),
            deletes,
            "writes published"
        );
        Ok(())
    }
}
