//! Leaf pages of the ordered index.
//!
//! A leaf owns a sorted run of `(key, record)` entries guarded by an RwLock,
//! plus a monotonically increasing version stamp. Every mutation of the
//! entry run bumps the stamp *while the write lock is held*, so a reader
//! that takes the read lock and then loads the stamp sees entries consistent
//! with that stamp.

use lattice_core::{Key, NodeId, RecordHandle};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// A single leaf page.
#[derive(Debug)]
pub struct Leaf {
    id: NodeId,
    version: AtomicU64,
    pub(crate) entries: RwLock<Vec<(Key, RecordHandle)>>,
}

impl Leaf {
    /// Create an empty leaf with a fresh node id.
    pub(crate) fn new(id: NodeId) -> Self {
        Leaf {
            id,
            version: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Create a leaf seeded with an already-sorted entry run.
    pub(crate) fn with_entries(id: NodeId, entries: Vec<(Key, RecordHandle)>) -> Self {
        Leaf {
            id,
            version: AtomicU64::new(1),
            entries: RwLock::new(entries),
        }
    }

    /// Node handle of this leaf.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current version stamp.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Bump the version stamp. Callers must hold the entries write lock.
    pub(crate) fn bump(&self) {
        self.version.fetch_add(1, Ordering::Release);
    }
}
