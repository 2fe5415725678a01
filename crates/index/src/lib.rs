//! Physical ordered index for Lattice
//!
//! This crate implements the underlying concurrent ordered index the
//! transactional overlay runs against:
//! - [`PagedIndex`]: leaf-paged ordered map with per-leaf version stamps
//! - Per-node read consistency: entries delivered by a walk are consistent
//!   with the node stamp reported just before them
//!
//! Only the `OrderedIndex` contract is load-bearing for the layers above;
//! the page layout and locking here are an implementation choice.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod leaf;
pub mod paged;

pub use leaf::Leaf;
pub use paged::PagedIndex;
