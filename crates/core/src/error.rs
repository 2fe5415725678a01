//! Unified error types for Lattice.
//!
//! This module provides the canonical error type for all Lattice operations.
//! Transactional failures are split into retryable conditions (the caller
//! should restart the whole transaction with fresh reads) and programmer
//! errors (never retryable).

use thiserror::Error;

/// All Lattice errors.
///
/// This is the canonical error type for all Lattice operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A zero-length value was passed to `put` or `insert`.
    ///
    /// Empty values are reserved as the absence sentinel; storing one is a
    /// programmer error, not a retryable condition.
    #[error("empty value: a live key cannot map to a zero-length value")]
    EmptyValue,

    /// Commit-time validation failed: a read went stale or a phantom
    /// appeared inside an observed-empty range.
    ///
    /// The transaction must be retried in full; all of its reads are
    /// invalidated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A range scan observed structural changes twice in one call.
    ///
    /// The first node-version drift triggers a silent re-walk; a second
    /// drift escalates to this error, which aborts the transaction.
    #[error("scan race: index nodes changed repeatedly during range walk")]
    ScanRace,

    /// Serialization of a typed value failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for Lattice operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Retryable errors may succeed when the whole transaction is re-run
    /// against fresh data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::ScanRace)
    }

    /// Check if this is a commit-validation conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}
