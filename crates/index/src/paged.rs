//! Leaf-paged concurrent ordered index.
//!
//! A flat spine of leaf pages, each covering a half-open key range bounded
//! by its lower fence. Point operations take the spine read lock plus one
//! leaf lock; splits and leaf retirement take the spine write lock. Every
//! leaf mutation bumps the leaf's version stamp, which is what the
//! transactional layer uses to detect structural races and validate
//! observed-empty ranges.
//!
//! This is deliberately not a latch-free tree: the overlay above only
//! depends on the `OrderedIndex` contract (ordering, stamp discipline,
//! per-node read consistency), not on how the index achieves it.

use crate::leaf::Leaf;
use lattice_core::{Key, NodeId, NodeRef, OrderedIndex, RangeSink, RecordHandle, TreeWalker};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Target bytes per leaf when sizing from a value-size hint.
const TARGET_LEAF_BYTES: usize = 4096;

/// Assumed per-entry key/bookkeeping overhead for leaf sizing.
const KEY_OVERHEAD: usize = 32;

/// Smallest and largest permitted leaf fanout.
const MIN_LEAF_CAPACITY: usize = 8;
const MAX_LEAF_CAPACITY: usize = 256;

/// Leaf-paged ordered index.
///
/// The spine is a sorted vector of `(lower_fence, leaf)` pairs; the first
/// fence is empty and therefore covers negative infinity. The spine always
/// holds at least one leaf.
pub struct PagedIndex {
    spine: RwLock<Vec<(Key, Arc<Leaf>)>>,
    len: AtomicUsize,
    next_node: AtomicU64,
    leaf_capacity: usize,
    /// Numerator over 16 of the split point; 8 is an even split, higher
    /// values leave the left leaf fuller (append-biased workloads).
    split_num: usize,
}

impl PagedIndex {
    /// Create an index with default leaf sizing.
    pub fn new() -> Self {
        Self::with_params(128, false)
    }

    /// Create an index sized for an expected value size.
    ///
    /// `mostly_append` biases the split point so ascending-key ingest leaves
    /// leaves nearly full instead of half empty.
    pub fn with_params(value_size_hint: usize, mostly_append: bool) -> Self {
        let per_entry = value_size_hint.saturating_add(KEY_OVERHEAD).max(1);
        let capacity = (TARGET_LEAF_BYTES / per_entry).clamp(MIN_LEAF_CAPACITY, MAX_LEAF_CAPACITY);
        let index = PagedIndex {
            spine: RwLock::new(Vec::new()),
            len: AtomicUsize::new(0),
            next_node: AtomicU64::new(1),
            leaf_capacity: capacity,
            split_num: if mostly_append { 15 } else { 8 },
        };
        index.spine.write().push((Vec::new(), index.fresh_leaf()));
        index
    }

    /// Leaf fanout chosen at construction.
    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    fn fresh_leaf(&self) -> Arc<Leaf> {
        let id = NodeId::new(self.next_node.fetch_add(1, Ordering::Relaxed));
        Arc::new(Leaf::new(id))
    }

    /// Position of the leaf covering `key`: the last fence <= key.
    fn locate(spine: &[(Key, Arc<Leaf>)], key: &[u8]) -> usize {
        debug_assert!(!spine.is_empty());
        spine
            .partition_point(|(fence, _)| fence.as_slice() <= key)
            .saturating_sub(1)
    }

    /// Split the over-full leaf covering `key`, if it still is over-full.
    fn split_covering(&self, key: &[u8]) {
        let mut spine = self.spine.write();
        let pos = Self::locate(&spine, key);
        let leaf = spine[pos].1.clone();
        let mut entries = leaf.entries.write();
        if entries.len() < self.leaf_capacity {
            return; // someone else split first
        }
        let split_at = (entries.len() * self.split_num / 16).clamp(1, entries.len() - 1);
        let right_run: Vec<(Key, RecordHandle)> = entries.split_off(split_at);
        let fence = right_run[0].0.clone();
        leaf.bump();
        drop(entries);
        let right = Arc::new(Leaf::with_entries(
            NodeId::new(self.next_node.fetch_add(1, Ordering::Relaxed)),
            right_run,
        ));
        tracing::trace!(
            left = leaf.id().as_u64(),
            right = right.id().as_u64(),
            split_at,
            "leaf split"
        );
        spine.insert(pos + 1, (fence, right));
    }

    /// Retire the leaf covering `key` if it is empty and not the only leaf.
    fn retire_covering(&self, key: &[u8]) {
        let mut spine = self.spine.write();
        if spine.len() <= 1 {
            return;
        }
        let pos = Self::locate(&spine, key);
        let leaf = spine[pos].1.clone();
        {
            let mut entries = leaf.entries.write();
            if !entries.is_empty() {
                return;
            }
            entries.shrink_to_fit();
            leaf.bump();
        }
        tracing::trace!(leaf = leaf.id().as_u64(), "retiring empty leaf");
        spine.remove(pos);
        // The spine must keep covering negative infinity.
        if pos == 0 {
            spine[0].0 = Vec::new();
        }
    }
}

impl Default for PagedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PagedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedIndex")
            .field("leaves", &self.spine.read().len())
            .field("len", &self.len.load(Ordering::Relaxed))
            .field("leaf_capacity", &self.leaf_capacity)
            .finish()
    }
}

impl OrderedIndex for PagedIndex {
    fn search(&self, key: &[u8]) -> Option<RecordHandle> {
        let spine = self.spine.read();
        let (_, leaf) = &spine[Self::locate(&spine, key)];
        let entries = leaf.entries.read();
        entries
            .binary_search_by(|(k, _)| k.as_slice().cmp(key))
            .ok()
            .map(|i| entries[i].1.clone())
    }

    fn insert(&self, key: &[u8], record: RecordHandle) -> bool {
        loop {
            {
                let spine = self.spine.read();
                let (_, leaf) = &spine[Self::locate(&spine, key)];
                let mut entries = leaf.entries.write();
                match entries.binary_search_by(|(k, _)| k.as_slice().cmp(key)) {
                    Ok(_) => return false,
                    Err(i) => {
                        if entries.len() < self.leaf_capacity {
                            entries.insert(i, (key.to_vec(), record));
                            leaf.bump();
                            self.len.fetch_add(1, Ordering::Relaxed);
                            return true;
                        }
                    }
                }
            }
            // Leaf is full: split outside the read path and retry.
            self.split_covering(key);
        }
    }

    fn remove(&self, key: &[u8]) -> Option<RecordHandle> {
        let removed = {
            let spine = self.spine.read();
            let (_, leaf) = &spine[Self::locate(&spine, key)];
            let mut entries = leaf.entries.write();
            match entries.binary_search_by(|(k, _)| k.as_slice().cmp(key)) {
                Ok(i) => {
                    let (_, record) = entries.remove(i);
                    leaf.bump();
                    self.len.fetch_sub(1, Ordering::Relaxed);
                    Some((record, entries.is_empty()))
                }
                Err(_) => None,
            }
        };
        match removed {
            Some((record, emptied)) => {
                if emptied {
                    self.retire_covering(key);
                }
                Some(record)
            }
            None => None,
        }
    }

    fn node_version(&self, node: NodeId) -> Option<u64> {
        let spine = self.spine.read();
        spine
            .iter()
            .find(|(_, leaf)| leaf.id() == node)
            .map(|(_, leaf)| leaf.version())
    }

    fn walk_range(&self, lower: &[u8], upper: Option<&[u8]>, sink: &mut dyn RangeSink) {
        let spine = self.spine.read();
        let start = Self::locate(&spine, lower);
        for (fence, leaf) in &spine[start..] {
            if let Some(upper) = upper {
                if fence.as_slice() >= upper && !fence.is_empty() {
                    return;
                }
            }
            let entries = leaf.entries.read();
            let node = NodeRef::new(leaf.id(), leaf.version());
            sink.on_node(node);
            let from = entries.partition_point(|(k, _)| k.as_slice() < lower);
            for (key, record) in &entries[from..] {
                if let Some(upper) = upper {
                    if key.as_slice() >= upper {
                        return;
                    }
                }
                if !sink.on_entry(key, record, node) {
                    return;
                }
            }
        }
    }

    fn walk_tree(&self, walker: &mut dyn TreeWalker) {
        let spine = self.spine.read();
        for (_, leaf) in spine.iter() {
            let entries = leaf.entries.read();
            let node = NodeRef::new(leaf.id(), leaf.version());
            walker.on_node_begin(node, &entries);
            walker.on_node_success();
        }
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        let mut spine = self.spine.write();
        for (_, leaf) in spine.iter() {
            let mut entries = leaf.entries.write();
            entries.clear();
            leaf.bump();
        }
        spine.clear();
        spine.push((Vec::new(), self.fresh_leaf()));
        self.len.store(0, Ordering::Relaxed);
    }
}
