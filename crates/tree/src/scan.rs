//! Range-scan coordinator.
//!
//! Drives the index's low-level node-version-tracked walk, merges the
//! physical rows with the transaction's own buffered writes, and records
//! the key-gaps between physically-scanned rows into the absent-range
//! ledger for commit-time phantom validation.
//!
//! The walk is collected into a scan-local buffer first and the node stamps
//! are re-checked before anything is recorded or emitted: a caller-supplied
//! visitor must never be invoked twice for the same row, so an inconsistent
//! walk has to be detected before the merge phase starts. One drift forces
//! a silent re-walk; a second escalates to [`Error::ScanRace`].

use lattice_core::{
    Error, Key, NodeId, NodeRef, OrderedIndex, RangeSink, RecordHandle, Result, Value,
};
use lattice_occ::{AbsentRange, TxnState};
use smallvec::SmallVec;

/// Receiver for rows produced by a range scan.
///
/// `invoke` returns `false` to stop the scan. Phantom protection is scoped
/// to what was actually visited: once the visitor stops, the remainder of
/// the range is neither emitted nor protected.
pub trait ScanVisitor {
    /// One visible row, in ascending key order. Return `false` to stop.
    fn invoke(&mut self, key: &[u8], value: Value) -> bool;
}

impl<F> ScanVisitor for F
where
    F: FnMut(&[u8], Value) -> bool,
{
    fn invoke(&mut self, key: &[u8], value: Value) -> bool {
        self(key, value)
    }
}

/// Supplier of value buffers for emitted rows.
///
/// Lets drivers that stream large scans recycle buffers instead of
/// allocating one per row.
pub trait ScanAlloc {
    /// Produce an empty buffer for the next emitted value.
    fn alloc(&mut self) -> Value;
}

/// Default buffer supplier: a fresh allocation per row, pre-sized to the
/// tree's value-size hint.
#[derive(Debug, Clone, Copy)]
pub struct DefaultAlloc {
    hint: usize,
}

impl DefaultAlloc {
    /// Supplier handing out buffers of `hint` capacity.
    pub fn new(hint: usize) -> Self {
        DefaultAlloc { hint }
    }
}

impl ScanAlloc for DefaultAlloc {
    fn alloc(&mut self) -> Value {
        Value::with_capacity(self.hint)
    }
}

/// Stamp-checked snapshot of the physical rows in a range.
#[derive(Default)]
struct CollectSink {
    rows: Vec<(Key, RecordHandle, NodeRef)>,
    nodes: SmallVec<[NodeRef; 8]>,
}

impl RangeSink for CollectSink {
    fn on_node(&mut self, node: NodeRef) {
        self.nodes.push(node);
    }

    fn on_entry(&mut self, key: &[u8], record: &RecordHandle, node: NodeRef) -> bool {
        self.rows.push((key.to_vec(), record.clone(), node));
        true
    }
}

/// One range scan: the transient state tying a logical range query to the
/// physical nodes visited. Not persisted past the call.
pub(crate) struct RangeScanner<'a, I, T> {
    index: &'a I,
    txn: &'a mut T,
    lower: &'a [u8],
    upper: Option<&'a [u8]>,
}

impl<'a, I: OrderedIndex, T: TxnState> RangeScanner<'a, I, T> {
    pub(crate) fn new(
        index: &'a I,
        txn: &'a mut T,
        lower: &'a [u8],
        upper: Option<&'a [u8]>,
    ) -> Self {
        RangeScanner {
            index,
            txn,
            lower,
            upper,
        }
    }

    /// Walk the range until the node stamps check out.
    fn collect(&self) -> Result<CollectSink> {
        for attempt in 0..2 {
            let mut sink = CollectSink::default();
            self.index.walk_range(self.lower, self.upper, &mut sink);
            let consistent = sink
                .nodes
                .iter()
                .all(|n| self.index.node_version(n.id) == Some(n.version));
            if consistent {
                return Ok(sink);
            }
            tracing::debug!(attempt, "range walk drifted");
        }
        Err(Error::ScanRace)
    }

    /// The transaction's pending writes inside the scanned range, in key
    /// order. Values are moved out of the slots as they are emitted.
    fn pending_in_range(&self) -> Vec<(Key, Option<Value>)> {
        let mut writes: Vec<(Key, Option<Value>)> = self
            .txn
            .write_set()
            .iter()
            .filter(|(key, _)| {
                key.as_slice() >= self.lower
                    && self.upper.map_or(true, |upper| key.as_slice() < upper)
            })
            .map(|(key, write)| (key.clone(), write.value.clone()))
            .collect();
        writes.sort_by(|a, b| a.0.cmp(&b.0));
        writes
    }

    fn record_gap(
        &mut self,
        lower: &[u8],
        lower_inclusive: bool,
        upper: Option<&[u8]>,
        node: NodeRef,
        single_node: bool,
    ) {
        if let Some(upper) = upper {
            if lower >= upper {
                return;
            }
        }
        self.txn.record_absent_range(AbsentRange {
            lower: lower.to_vec(),
            lower_inclusive,
            upper: upper.map(<[u8]>::to_vec),
            node,
            single_node,
        });
    }

    /// Run the scan: collect, merge with the write-set, record reads and
    /// gaps, feed the visitor.
    pub(crate) fn run<V, A>(mut self, visitor: &mut V, alloc: &mut A) -> Result<()>
    where
        V: ScanVisitor + ?Sized,
        A: ScanAlloc + ?Sized,
    {
        let collected = self.collect()?;
        let mut pending = self.pending_in_range();
        let mut next_pending = 0usize;

        // The gap under construction: its lower bound, whether that bound is
        // inside the interval, and the node covering the bound.
        let mut gap_lower: Key = self.lower.to_vec();
        let mut gap_inclusive = true;
        let mut gap_node: Option<NodeId> = collected.nodes.first().map(|n| n.id);

        let mut stopped = false;

        for (key, record, node) in &collected.rows {
            // Emit buffered writes ordered before this physical key.
            while next_pending < pending.len() && pending[next_pending].0 < *key {
                if let Some(value) = pending[next_pending].1.take() {
                    if !visitor.invoke(&pending[next_pending].0, value) {
                        stopped = true;
                        break;
                    }
                }
                next_pending += 1;
            }
            if stopped {
                break;
            }

            // The physical key closes the open gap, whether or not the row
            // is ultimately emitted.
            let single_node = gap_node == Some(node.id);
            self.record_gap(&gap_lower, gap_inclusive, Some(key.as_slice()), *node, single_node);
            gap_lower.clear();
            gap_lower.extend_from_slice(key);
            gap_inclusive = false;
            gap_node = Some(node.id);

            let in_write_set =
                next_pending < pending.len() && pending[next_pending].0.as_slice() == key.as_slice();
            if in_write_set {
                // The pending write wins; the physical value is not observed
                // and must not enter the read-set.
                if let Some(value) = pending[next_pending].1.take() {
                    if !visitor.invoke(key, value) {
                        stopped = true;
                    }
                }
                next_pending += 1;
            } else {
                let mut buf = alloc.alloc();
                let obs = record.read_committed_into(&mut buf);
                self.txn.record_read(key, obs);
                if !obs.absent && !visitor.invoke(key, buf) {
                    stopped = true;
                }
            }
            if stopped {
                break;
            }
        }

        // Flush buffered writes past the last physical row.
        if !stopped {
            while next_pending < pending.len() {
                if let Some(value) = pending[next_pending].1.take() {
                    if !visitor.invoke(&pending[next_pending].0, value) {
                        stopped = true;
                        break;
                    }
                }
                next_pending += 1;
            }
        }

        // A completed walk protects the tail of the range as well.
        if !stopped {
            if let Some(last) = collected.nodes.last() {
                let single_node = gap_node == Some(last.id);
                self.record_gap(&gap_lower, gap_inclusive, self.upper, *last, single_node);
            }
        }

        Ok(())
    }
}
