//! Versioned records: the per-key multi-version cell.
//!
//! Each key reachable from the physical index owns one [`VersionRecord`]. A
//! record holds a two-slot chain: the latest write (which may be an
//! uncommitted claim staged by a committing transaction) and the last
//! stably-committed write. Readers never block; consistency comes from
//! commit-time validation, not from holding the record lock across user
//! code.
//!
//! Absence is expressed by a delete marker inside the record (`value: None`),
//! never by prematurely removing the physical slot. Slot removal happens only
//! during validated commit application or purge.

use crate::types::{Tid, Value};
use parking_lot::RwLock;

/// One version of a record: a value (or delete marker) stamped with the
/// transaction that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSlot {
    /// The stored value; `None` is the delete marker.
    pub value: Option<Value>,
    /// Tid of the writing transaction.
    pub tid: Tid,
    /// Whether this version has committed. An uncommitted slot is a claim
    /// staged by an in-flight commit and is invisible to readers.
    pub committed: bool,
    /// Wall-clock seconds when this version was written (diagnostics only).
    pub at: i64,
}

impl VersionSlot {
    fn new(value: Option<Value>, tid: Tid, committed: bool) -> Self {
        VersionSlot {
            value,
            tid,
            committed,
            at: chrono::Utc::now().timestamp(),
        }
    }

    /// Logical size of the stored value, 0 for a delete marker.
    pub fn value_len(&self) -> usize {
        self.value.as_ref().map(Vec::len).unwrap_or(0)
    }

    /// Allocated capacity behind the stored value, 0 for a delete marker.
    pub fn value_capacity(&self) -> usize {
        self.value.as_ref().map(Vec::capacity).unwrap_or(0)
    }
}

/// The committed state of a record as observed by a point read.
///
/// Recorded into the read-set and compared at validation time. Two
/// observations are interchangeable iff both tid and absence match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Tid of the newest committed version, `None` if nothing ever
    /// committed to this key.
    pub tid: Option<Tid>,
    /// Whether the key is absent (deleted or never committed).
    pub absent: bool,
}

impl Observation {
    /// The observation made when a key has no physical slot at all.
    pub const MISSING: Observation = Observation {
        tid: None,
        absent: true,
    };
}

#[derive(Debug)]
struct Slots {
    /// Most recent write, committed or staged.
    latest: VersionSlot,
    /// Committed predecessor, kept while `latest` supersedes it.
    prev: Option<VersionSlot>,
}

impl Slots {
    /// The newest committed slot, ignoring an uncommitted claim.
    fn stable(&self) -> Option<&VersionSlot> {
        if self.latest.committed {
            Some(&self.latest)
        } else {
            self.prev.as_ref()
        }
    }
}

/// Per-key multi-version cell.
///
/// Mutated only by the transaction holding the write intent on the key
/// (commits are serialized, so there is at most one such writer); read by
/// any transaction performing a snapshot read or a validation pass.
#[derive(Debug)]
pub struct VersionRecord {
    slots: RwLock<Slots>,
}

impl VersionRecord {
    /// Create a record whose latest version is already committed.
    pub fn committed(value: Value, tid: Tid) -> Self {
        VersionRecord {
            slots: RwLock::new(Slots {
                latest: VersionSlot::new(Some(value), tid, true),
                prev: None,
            }),
        }
    }

    /// Create an uncommitted placeholder claim.
    ///
    /// Used when a committing transaction inserts a key that has no physical
    /// slot yet: the placeholder reserves the slot through validation while
    /// staying absent for every observer (including the claiming transaction's
    /// own gap checks).
    pub fn placeholder(tid: Tid) -> Self {
        VersionRecord {
            slots: RwLock::new(Slots {
                latest: VersionSlot::new(None, tid, false),
                prev: None,
            }),
        }
    }

    /// True if the most recent write, committed or not, is a delete marker
    /// (or an unpublished placeholder).
    pub fn latest_is_absent(&self) -> bool {
        self.slots.read().latest.value.is_none()
    }

    /// True if the last *committed* write is a delete marker, ignoring any
    /// in-flight claim. Also true when nothing has ever committed.
    pub fn stable_latest_is_absent(&self) -> bool {
        self.slots
            .read()
            .stable()
            .map(|s| s.value.is_none())
            .unwrap_or(true)
    }

    /// The committed value and its tid, `None` when the key is absent.
    pub fn committed_value(&self) -> Option<(Value, Tid)> {
        let slots = self.slots.read();
        slots
            .stable()
            .and_then(|s| s.value.as_ref().map(|v| (v.clone(), s.tid)))
    }

    /// Read the committed state in one lock acquisition: fill `buf` with the
    /// committed value (when present) and return the matching observation.
    ///
    /// The single acquisition matters: observation and value must describe
    /// the same version even while a commit is publishing.
    pub fn read_committed_into(&self, buf: &mut Value) -> Observation {
        let slots = self.slots.read();
        match slots.stable() {
            Some(s) => {
                if let Some(v) = &s.value {
                    buf.clear();
                    buf.extend_from_slice(v);
                }
                Observation {
                    tid: Some(s.tid),
                    absent: s.value.is_none(),
                }
            }
            None => Observation::MISSING,
        }
    }

    /// Committed state as a validation observation.
    pub fn observation(&self) -> Observation {
        let slots = self.slots.read();
        match slots.stable() {
            Some(s) => Observation {
                tid: Some(s.tid),
                absent: s.value.is_none(),
            },
            None => Observation::MISSING,
        }
    }

    /// Install a committed version, superseding whatever was current.
    ///
    /// `value: None` commits a delete marker. Returns the displaced
    /// committed predecessor, which the caller must hand to the epoch
    /// machinery for deferred reclamation (concurrent readers may still
    /// hold it).
    pub fn publish(&self, value: Option<Value>, tid: Tid) -> Option<VersionSlot> {
        let mut slots = self.slots.write();
        let old_latest = std::mem::replace(&mut slots.latest, VersionSlot::new(value, tid, true));
        if old_latest.committed {
            slots.prev.replace(old_latest)
        } else {
            // An unpublished placeholder carries no value; drop it silently.
            None
        }
    }

    /// Snapshot of the committed slot for purge statistics.
    pub fn stable_slot(&self) -> Option<VersionSlot> {
        self.slots.read().stable().cloned()
    }
}
