//! Core types for the transactional index
//!
//! This module defines the fundamental types used throughout the system:
//! - [`Key`] / [`Value`]: raw byte sequences stored in the index
//! - [`Tid`]: commit transaction identifier (the serialization order)
//! - [`TreeId`]: diagnostics identity for a tree instance
//! - [`NodeId`] / [`NodeRef`]: opaque index-node handles with version stamps

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical key: an arbitrary byte sequence, ordered lexicographically.
pub type Key = Vec<u8>;

/// Logical value: an arbitrary byte sequence.
///
/// A zero-length value is reserved as the absence sentinel; a live key never
/// maps to an empty value. `put`/`insert` enforce this at the API boundary.
pub type Value = Vec<u8>;

/// Commit transaction identifier.
///
/// Tids are allocated at commit time, strictly increasing, and define the
/// serialization order of committed transactions. A record version stamped
/// with a higher tid supersedes one stamped with a lower tid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tid(u64);

impl Tid {
    /// The zero tid, ordered before every allocated tid.
    pub const ZERO: Tid = Tid(0);

    /// Wrap a raw tid value.
    pub const fn new(raw: u64) -> Self {
        Tid(raw)
    }

    /// Raw numeric value of this tid.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Tid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tid:{}", self.0)
    }
}

/// Unique identifier for a tree instance
///
/// TreeId is carried in tracing spans and purge reports so that multiple
/// trees in one process can be told apart in diagnostics output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeId(Uuid);

impl TreeId {
    /// Create a new random TreeId using UUID v4
    pub fn new() -> Self {
        TreeId(Uuid::new_v4())
    }

    /// Create TreeId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        TreeId(Uuid::from_bytes(bytes))
    }

    /// Get raw bytes representation
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for TreeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TreeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle for a physical index node.
///
/// Handle identity says nothing about content stability; pair it with the
/// version stamp observed at read time (see [`NodeRef`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Wrap a raw node identifier.
    pub const fn new(raw: u64) -> Self {
        NodeId(raw)
    }

    /// Raw numeric value of this node id.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A node handle paired with the version stamp observed when it was entered.
///
/// The stamp is monotonically increasing per node; any structural or content
/// change to the node bumps it. Consumers must never assume the node is
/// unchanged without re-checking the stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// The node handle.
    pub id: NodeId,
    /// Version stamp observed when the node was entered.
    pub version: u64,
}

impl NodeRef {
    /// Pair a node handle with an observed version stamp.
    pub const fn new(id: NodeId, version: u64) -> Self {
        NodeRef { id, version }
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}@v{}", self.id.as_u64(), self.version)
    }
}

/// Immediate lexicographic successor of a byte-string key.
///
/// `s ++ 0x00` is the smallest key strictly greater than `s`, which turns an
/// exclusive lower bound into the inclusive one the index walk expects.
pub fn key_successor(key: &[u8]) -> Key {
    let mut succ = Vec::with_capacity(key.len() + 1);
    succ.extend_from_slice(key);
    succ.push(0);
    succ
}
