//! Tree construction options.

use serde::{Deserialize, Serialize};

/// Tuning knobs for a transactional tree.
///
/// Both knobs are hints: they shape leaf sizing and split behavior of the
/// underlying index but never affect transactional semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeOptions {
    /// Expected size in bytes of stored values. Drives leaf fanout.
    pub value_size_hint: usize,
    /// Whether the workload inserts mostly ascending keys. Biases leaf
    /// splits so append-heavy ingest leaves pages nearly full.
    pub mostly_append: bool,
}

impl TreeOptions {
    /// Default value-size hint in bytes.
    pub const DEFAULT_VALUE_SIZE_HINT: usize = 128;

    /// Set the expected value size.
    pub fn with_value_size_hint(mut self, hint: usize) -> Self {
        self.value_size_hint = hint;
        self
    }

    /// Mark the workload as append-heavy.
    pub fn with_mostly_append(mut self, mostly_append: bool) -> Self {
        self.mostly_append = mostly_append;
        self
    }
}

impl Default for TreeOptions {
    fn default() -> Self {
        TreeOptions {
            value_size_hint: Self::DEFAULT_VALUE_SIZE_HINT,
            mostly_append: false,
        }
    }
}
