//! The transactional tree overlay.
//!
//! Presents the interface of an ordered map, but every operation is scoped
//! to a transaction and serializable: reads are recorded for commit-time
//! validation, writes are buffered in the transaction's write-set and reach
//! the physical index only through validated commit application.
//!
//! Keys cannot map to empty values; the empty value is the absence
//! sentinel and `put`/`insert` reject it up front.

use crate::options::TreeOptions;
use crate::purge::{PurgeStats, PurgeWalker};
use crate::scan::{DefaultAlloc, RangeScanner, ScanAlloc, ScanVisitor};
use lattice_core::{Error, Key, Observation, OrderedIndex, Result, TreeId, Value};
use lattice_index::PagedIndex;
use lattice_occ::{PendingWrite, TxnBackend, TxnState};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A serializable, multi-version ordered map over a physically concurrent
/// index.
///
/// The tree owns its underlying index exclusively; per-transaction state is
/// a separate object passed into every operation by reference. The overlay
/// itself holds no locks: consistency comes from versioned records plus
/// commit-time validation.
pub struct TxnTree<I: OrderedIndex = PagedIndex> {
    id: TreeId,
    index: I,
    value_size_hint: AtomicUsize,
    mostly_append: AtomicBool,
    purged: AtomicBool,
}

impl TxnTree<PagedIndex> {
    /// Create a tree with default options over the built-in paged index.
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }

    /// Create a tree with explicit options over the built-in paged index.
    pub fn with_options(options: TreeOptions) -> Self {
        let index = PagedIndex::with_params(options.value_size_hint, options.mostly_append);
        Self::from_index(index, options)
    }
}

impl Default for TxnTree<PagedIndex> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: OrderedIndex> TxnTree<I> {
    /// Wrap an existing index instance. The tree takes exclusive ownership.
    pub fn from_index(index: I, options: TreeOptions) -> Self {
        TxnTree {
            id: TreeId::new(),
            index,
            value_size_hint: AtomicUsize::new(options.value_size_hint),
            mostly_append: AtomicBool::new(options.mostly_append),
            purged: AtomicBool::new(false),
        }
    }

    /// Diagnostics identity of this tree.
    pub fn id(&self) -> TreeId {
        self.id
    }

    pub(crate) fn index(&self) -> &I {
        &self.index
    }

    /// Expected value size used for scan buffer pre-sizing.
    pub fn value_size_hint(&self) -> usize {
        self.value_size_hint.load(Ordering::Relaxed)
    }

    /// Adjust the expected value size. Affects buffer sizing of future
    /// scans; the index's leaf sizing is fixed at construction.
    pub fn set_value_size_hint(&self, hint: usize) {
        self.value_size_hint.store(hint, Ordering::Relaxed);
    }

    /// Whether the workload was declared append-heavy.
    pub fn is_mostly_append(&self) -> bool {
        self.mostly_append.load(Ordering::Relaxed)
    }

    /// Update the append-heavy workload flag.
    pub fn set_mostly_append(&self, mostly_append: bool) {
        self.mostly_append.store(mostly_append, Ordering::Relaxed);
    }

    /// Announce this tree to an OCC backend.
    pub fn attach(&self, backend: &dyn TxnBackend) {
        backend.on_attach(self.id);
    }

    /// Announce teardown to an OCC backend.
    pub fn detach(&self, backend: &dyn TxnBackend) {
        backend.on_detach(self.id);
    }

    /// Operating on a purged tree is a caller contract violation; it is
    /// only caught in debug builds.
    fn assert_live(&self) {
        debug_assert!(
            !self.purged.load(Ordering::SeqCst),
            "transactional operation on a purged tree"
        );
    }

    // ========================================================================
    // Point operations
    // ========================================================================

    /// Transactional point lookup.
    ///
    /// The transaction's own pending write wins; otherwise the committed
    /// value is returned and the observation is recorded for validation.
    pub fn search<T: TxnState>(&self, txn: &mut T, key: &[u8]) -> Result<Option<Value>> {
        self.search_bounded(txn, key, usize::MAX)
    }

    /// Point lookup returning at most `max_bytes_read` bytes of the value.
    /// `max_bytes_read` must be positive: a zero-length result would be
    /// indistinguishable from the absence sentinel.
    pub fn search_bounded<T: TxnState>(
        &self,
        txn: &mut T,
        key: &[u8],
        max_bytes_read: usize,
    ) -> Result<Option<Value>> {
        self.assert_live();
        debug_assert!(max_bytes_read > 0, "max_bytes_read must be positive");
        if let Some(write) = txn.pending_write(key) {
            // Self-visibility: the pending write is authoritative, deletes
            // included. No observation is recorded for own writes.
            return Ok(write.value.clone().map(|mut value| {
                value.truncate(max_bytes_read);
                value
            }));
        }
        match self.index.search(key) {
            Some(record) => {
                let mut value = Value::new();
                let obs = record.read_committed_into(&mut value);
                txn.record_read(key, obs);
                if obs.absent {
                    Ok(None)
                } else {
                    value.truncate(max_bytes_read);
                    Ok(Some(value))
                }
            }
            None => {
                txn.record_read(key, Observation::MISSING);
                Ok(None)
            }
        }
    }

    /// Typed point lookup, decoding the stored bytes.
    pub fn search_obj<T: TxnState, V: DeserializeOwned>(
        &self,
        txn: &mut T,
        key: &[u8],
    ) -> Result<Option<V>> {
        match self.search(txn, key)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|err| Error::Serialization(err.to_string())),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Write buffering
    // ========================================================================

    /// Buffer an upsert. Never touches the physical index; fails only on
    /// the empty-value invariant.
    pub fn put<T: TxnState>(&self, txn: &mut T, key: &[u8], value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::EmptyValue);
        }
        self.do_tree_put(txn, key, Some(value.to_vec()), false);
        Ok(())
    }

    /// Buffer an insert with a uniqueness expectation.
    ///
    /// `insert` differs from `put` only by a commit-time performance hint;
    /// if the key turns out to exist, the commit still behaves like an
    /// upsert.
    pub fn insert<T: TxnState>(&self, txn: &mut T, key: &[u8], value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::EmptyValue);
        }
        self.do_tree_put(txn, key, Some(value.to_vec()), true);
        Ok(())
    }

    /// Buffer a delete.
    pub fn remove<T: TxnState>(&self, txn: &mut T, key: &[u8]) {
        self.do_tree_put(txn, key, None, false);
    }

    /// Buffer a typed upsert.
    pub fn put_obj<T: TxnState, V: Serialize>(
        &self,
        txn: &mut T,
        key: &[u8],
        value: &V,
    ) -> Result<()> {
        let bytes = self.encode(value)?;
        self.do_tree_put(txn, key, Some(bytes), false);
        Ok(())
    }

    /// Buffer a typed insert.
    pub fn insert_obj<T: TxnState, V: Serialize>(
        &self,
        txn: &mut T,
        key: &[u8],
        value: &V,
    ) -> Result<()> {
        let bytes = self.encode(value)?;
        self.do_tree_put(txn, key, Some(bytes), true);
        Ok(())
    }

    fn encode<V: Serialize>(&self, value: &V) -> Result<Value> {
        let bytes =
            bincode::serialize(value).map_err(|err| Error::Serialization(err.to_string()))?;
        if bytes.is_empty() {
            // Zero-length encodings collide with the absence sentinel.
            return Err(Error::EmptyValue);
        }
        Ok(bytes)
    }

    /// The single write-buffering primitive behind `put`, `insert`, and
    /// `remove`: overwrite the key's write-set entry. `value: None` is the
    /// delete marker; `expect_new` lets commit application skip an
    /// existence probe.
    fn do_tree_put<T: TxnState>(
        &self,
        txn: &mut T,
        key: &[u8],
        value: Option<Value>,
        expect_new: bool,
    ) {
        self.assert_live();
        txn.buffer_write(key.to_vec(), PendingWrite { value, expect_new });
    }

    // ========================================================================
    // Range scans
    // ========================================================================

    /// Transactional range scan over `[lower, upper)` (`upper: None` scans
    /// to the end), feeding visible rows to `visitor` in ascending key
    /// order. Buffers come from `alloc`.
    pub fn search_range_call<T, V, A>(
        &self,
        txn: &mut T,
        lower: &[u8],
        upper: Option<&[u8]>,
        visitor: &mut V,
        alloc: &mut A,
    ) -> Result<()>
    where
        T: TxnState,
        V: ScanVisitor + ?Sized,
        A: ScanAlloc + ?Sized,
    {
        self.assert_live();
        RangeScanner::new(&self.index, txn, lower, upper).run(visitor, alloc)
    }

    /// Value-returning scan convenience: collect all visible rows.
    pub fn search_range<T: TxnState>(
        &self,
        txn: &mut T,
        lower: &[u8],
        upper: Option<&[u8]>,
    ) -> Result<Vec<(Key, Value)>> {
        let mut rows = Vec::new();
        let mut visitor = |key: &[u8], value: Value| {
            rows.push((key.to_vec(), value));
            true
        };
        let mut alloc = DefaultAlloc::new(self.value_size_hint());
        self.search_range_call(txn, lower, upper, &mut visitor, &mut alloc)?;
        Ok(rows)
    }

    // ========================================================================
    // Cardinality and teardown
    // ========================================================================

    /// Approximate number of keys. Not transactionally consistent; counts
    /// physical slots, tombstones included. A hint only.
    pub fn size_estimate(&self) -> usize {
        self.index.len()
    }

    /// Destroy the tree's contents.
    ///
    /// Walks every node and record chain and releases them regardless of
    /// any transaction's visibility. Only call when no transaction, past or
    /// future, can observe this tree; afterwards the tree is invalidated
    /// and any further transactional operation is undefined.
    ///
    /// Returns a statistics report when `dump_stats` is set (also emitted
    /// as JSON through `tracing`). Subsequent calls are no-ops.
    pub fn unsafe_purge(&self, dump_stats: bool) -> Option<PurgeStats> {
        if self.purged.swap(true, Ordering::SeqCst) {
            return None;
        }
        let mut walker = PurgeWalker::new(self.id, dump_stats);
        self.index.walk_tree(&mut walker);
        self.index.clear();
        let stats = walker.finish();
        match &stats {
            Some(stats) => match serde_json::to_string(stats) {
                Ok(json) => tracing::info!(tree = %self.id, stats = %json, "purged"),
                Err(err) => {
                    tracing::warn!(tree = %self.id, error = %err, "purge stats encoding failed")
                }
            },
            None => tracing::debug!(tree = %self.id, "purged"),
        }
        stats
    }
}

impl<I: OrderedIndex> Drop for TxnTree<I> {
    fn drop(&mut self) {
        if !self.purged.load(Ordering::SeqCst) {
            self.unsafe_purge(false);
        }
    }
}

impl<I: OrderedIndex> std::fmt::Debug for TxnTree<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxnTree")
            .field("id", &self.id)
            .field("size_estimate", &self.size_estimate())
            .field("purged", &self.purged.load(Ordering::Relaxed))
            .finish()
    }
}
