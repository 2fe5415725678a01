//! Core types for the Lattice transactional index
//!
//! This crate defines the vocabulary shared by every Lattice layer:
//! - Fundamental types: [`Key`], [`Value`], [`Tid`], [`TreeId`], [`NodeRef`]
//! - The unified [`Error`] enum and [`Result`] alias
//! - The versioned record ([`VersionRecord`]) with its two absence predicates
//! - The [`OrderedIndex`] trait family the overlay consumes from the
//!   underlying physical index

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use record::{Observation, VersionRecord, VersionSlot};
pub use traits::{OrderedIndex, RangeSink, RecordHandle, TreeWalker};
pub use types::{key_successor, Key, NodeId, NodeRef, Tid, TreeId, Value};
