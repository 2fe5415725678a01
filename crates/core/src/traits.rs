//! Contracts consumed from the underlying concurrent ordered index.
//!
//! The transactional overlay never sees index internals (page layout,
//! latching, rebalancing). It talks to whatever implements [`OrderedIndex`]:
//! point operations over record handles, a low-level range walk that reports
//! a per-node version stamp before exposing the node's entries, and a
//! whole-tree walk used only for teardown.

use crate::record::VersionRecord;
use crate::types::{Key, NodeId, NodeRef};
use std::sync::Arc;

/// Shared handle to a versioned record stored in the index.
pub type RecordHandle = Arc<VersionRecord>;

/// Receiver for the low-level range walk.
///
/// The index calls [`on_node`](RangeSink::on_node) with the node's version
/// stamp *before* any entry of that node is delivered, and guarantees that
/// the entries delivered for a node are consistent with that stamp.
pub trait RangeSink {
    /// A node was entered. The stamp in `node` was taken before reading its
    /// contents.
    fn on_node(&mut self, node: NodeRef);

    /// An in-range entry was visited. Return `false` to stop the walk.
    fn on_entry(&mut self, key: &[u8], record: &RecordHandle, node: NodeRef) -> bool;
}

/// Receiver for the whole-tree walk used by purge.
///
/// Nodes are presented one at a time; `on_node_success` confirms the node's
/// entries were read consistently, `on_node_failure` asks the receiver to
/// discard whatever it staged for the node (reserved for optimistic index
/// implementations that may observe torn nodes).
pub trait TreeWalker {
    /// A node and its entries, staged for processing.
    fn on_node_begin(&mut self, node: NodeRef, entries: &[(Key, RecordHandle)]);

    /// The staged node was read consistently; commit the staged work.
    fn on_node_success(&mut self);

    /// The staged node was torn; discard the staged work.
    fn on_node_failure(&mut self);
}

/// The underlying physically-concurrent ordered index.
///
/// Keys are ordered by ascending lexicographic byte order. The overlay owns
/// its index instance exclusively; all sharing happens above this trait.
pub trait OrderedIndex: Send + Sync {
    /// Point lookup. Returns the record handle if the key has a physical
    /// slot (the record itself may still be logically absent).
    fn search(&self, key: &[u8]) -> Option<RecordHandle>;

    /// Insert a slot for `key`. Returns `false` (leaving the index
    /// unchanged) if the key already has a slot.
    fn insert(&self, key: &[u8], record: RecordHandle) -> bool;

    /// Remove the slot for `key`, returning its record handle.
    fn remove(&self, key: &[u8]) -> Option<RecordHandle>;

    /// Current version stamp of a node, `None` if the node no longer
    /// exists (e.g. it was merged away).
    fn node_version(&self, node: NodeId) -> Option<u64>;

    /// Low-level range walk over `[lower, upper)` (`upper: None` walks to
    /// the end). Reports node stamps and entries to `sink` in key order.
    fn walk_range(&self, lower: &[u8], upper: Option<&[u8]>, sink: &mut dyn RangeSink);

    /// Walk every node of the tree in key order. Teardown only.
    fn walk_tree(&self, walker: &mut dyn TreeWalker);

    /// Number of physical slots (including logically absent ones). This is
    /// an O(1) approximation, not transactionally consistent.
    fn len(&self) -> usize;

    /// True if the index holds no slots.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every slot and reset to a single empty node. Teardown only.
    fn clear(&self);
}
