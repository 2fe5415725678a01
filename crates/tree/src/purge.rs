//! Whole-tree teardown.
//!
//! The purge walker visits every node and every record chain unconditionally
//! and releases them, superseded versions included, regardless of any
//! transaction's visibility. The caller guarantees that no transaction, past
//! or future, can still observe the tree; this is a teardown primitive, not
//! a live-compaction pass.

use lattice_core::{Key, NodeRef, RecordHandle, TreeId, TreeWalker};
use serde::Serialize;
use std::collections::BTreeMap;

/// Report produced by a stats-collecting purge.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeStats {
    /// The purged tree.
    pub tree: TreeId,
    /// Nodes visited.
    pub nodes: usize,
    /// Record slots released (live and tombstoned).
    pub records: usize,
    /// Records whose committed state still carried a value.
    pub live_records: usize,
    /// Histogram: committed value size → count.
    pub record_size_counts: BTreeMap<usize, usize>,
    /// Histogram: allocated value capacity → count.
    pub alloc_size_counts: BTreeMap<usize, usize>,
    /// Entries per visited node, in walk order.
    pub keys_per_node: Vec<u16>,
    /// When the report was generated.
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

impl PurgeStats {
    fn new(tree: TreeId) -> Self {
        PurgeStats {
            tree,
            nodes: 0,
            records: 0,
            live_records: 0,
            record_size_counts: BTreeMap::new(),
            alloc_size_counts: BTreeMap::new(),
            keys_per_node: Vec::new(),
            generated_at: chrono::Utc::now(),
        }
    }
}

/// Tree walker that stages each node's records and releases them once the
/// node reads out consistently.
pub(crate) struct PurgeWalker {
    staged: Vec<RecordHandle>,
    nodes: usize,
    records: usize,
    stats: Option<PurgeStats>,
}

impl PurgeWalker {
    pub(crate) fn new(tree: TreeId, dump_stats: bool) -> Self {
        PurgeWalker {
            staged: Vec::new(),
            nodes: 0,
            records: 0,
            stats: dump_stats.then(|| PurgeStats::new(tree)),
        }
    }

    /// Final report, when stats collection was requested.
    pub(crate) fn finish(mut self) -> Option<PurgeStats> {
        if let Some(stats) = self.stats.as_mut() {
            stats.nodes = self.nodes;
            stats.records = self.records;
        }
        self.stats
    }
}

impl TreeWalker for PurgeWalker {
    fn on_node_begin(&mut self, _node: NodeRef, entries: &[(Key, RecordHandle)]) {
        debug_assert!(self.staged.is_empty());
        self.staged.extend(entries.iter().map(|(_, rec)| rec.clone()));
        if let Some(stats) = self.stats.as_mut() {
            stats.keys_per_node.push(entries.len().min(u16::MAX as usize) as u16);
        }
    }

    fn on_node_success(&mut self) {
        self.nodes += 1;
        self.records += self.staged.len();
        if let Some(stats) = self.stats.as_mut() {
            for record in &self.staged {
                if let Some(slot) = record.stable_slot() {
                    if slot.value.is_some() {
                        stats.live_records += 1;
                    }
                    *stats.record_size_counts.entry(slot.value_len()).or_insert(0) += 1;
                    *stats
                        .alloc_size_counts
                        .entry(slot.value_capacity())
                        .or_insert(0) += 1;
                }
            }
        }
        self.staged.clear();
    }

    fn on_node_failure(&mut self) {
        // Torn node read: drop whatever was staged, the walk re-presents it.
        self.staged.clear();
        if let Some(stats) = self.stats.as_mut() {
            stats.keys_per_node.pop();
        }
    }
}
