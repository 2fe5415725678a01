//! Epoch-based reclamation of superseded record versions.
//!
//! Committed overwrites and deletes displace record versions that concurrent
//! readers may still hold. Displaced garbage is retired under the epoch
//! current at retirement time and physically dropped only once every
//! transaction pinned at or before that epoch has finished.
//!
//! The overlay never calls into this module directly: `sync_epoch` and
//! `finish_epoch` are driven by the commit manager around the transaction
//! lifecycle.

use dashmap::DashMap;
use lattice_core::{RecordHandle, VersionSlot};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// A piece of garbage awaiting a safe epoch.
#[derive(Debug)]
pub enum Retired {
    /// A displaced committed version slot.
    Version(VersionSlot),
    /// A whole record whose physical slot was removed.
    Record(RecordHandle),
}

/// Point-in-time reclamation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EpochStats {
    /// Total garbage items retired so far.
    pub retired_total: u64,
    /// Total garbage items reclaimed so far.
    pub collected_total: u64,
    /// Items currently waiting for a safe epoch.
    pub pending: usize,
    /// Current global epoch.
    pub epoch: u64,
}

/// Tracks the global epoch, active transactions, and the retire queue.
#[derive(Debug)]
pub struct EpochManager {
    global: AtomicU64,
    /// txn id → epoch pinned at begin.
    active: DashMap<u64, u64>,
    retired: Mutex<VecDeque<(u64, Retired)>>,
    retired_total: AtomicU64,
    collected_total: AtomicU64,
}

impl EpochManager {
    /// Create a manager starting at epoch 1 with no active transactions.
    pub fn new() -> Self {
        EpochManager {
            global: AtomicU64::new(1),
            active: DashMap::new(),
            retired: Mutex::new(VecDeque::new()),
            retired_total: AtomicU64::new(0),
            collected_total: AtomicU64::new(0),
        }
    }

    /// Current global epoch.
    pub fn current(&self) -> u64 {
        self.global.load(Ordering::Acquire)
    }

    /// Advance the global epoch and opportunistically reclaim.
    pub fn sync_epoch(&self) -> u64 {
        let epoch = self.global.fetch_add(1, Ordering::AcqRel) + 1;
        self.collect();
        epoch
    }

    /// Pin a transaction to the current epoch. Garbage retired at or after
    /// this epoch outlives the transaction.
    pub fn pin(&self, txn_id: u64) -> u64 {
        let epoch = self.current();
        self.active.insert(txn_id, epoch);
        epoch
    }

    /// Unpin a finished transaction and reclaim whatever became safe.
    pub fn finish_epoch(&self, txn_id: u64) {
        self.active.remove(&txn_id);
        self.collect();
    }

    /// Retire garbage under the current epoch.
    pub fn retire(&self, garbage: Retired) {
        let epoch = self.current();
        self.retired.lock().push_back((epoch, garbage));
        self.retired_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Oldest epoch still pinned by an active transaction.
    fn min_active(&self) -> Option<u64> {
        self.active.iter().map(|entry| *entry.value()).min()
    }

    /// Drop every retired item whose epoch precedes all active pins.
    /// Returns the number of items reclaimed.
    pub fn collect(&self) -> usize {
        let horizon = self.min_active().unwrap_or(u64::MAX);
        let mut queue = self.retired.lock();
        let mut reclaimed = 0;
        while let Some((epoch, _)) = queue.front() {
            if *epoch >= horizon {
                break;
            }
            queue.pop_front();
            reclaimed += 1;
        }
        if reclaimed > 0 {
            self.collected_total
                .fetch_add(reclaimed as u64, Ordering::Relaxed);
            tracing::trace!(reclaimed, "epoch collection");
        }
        reclaimed
    }

    /// Snapshot of the reclamation counters.
    pub fn stats(&self) -> EpochStats {
        EpochStats {
            retired_total: self.retired_total.load(Ordering::Relaxed),
            collected_total: self.collected_total.load(Ordering::Relaxed),
            pending: self.retired.lock().len(),
            epoch: self.current(),
        }
    }
}

impl Default for EpochManager {
    fn default() -> Self {
        Self::new()
    }
}
