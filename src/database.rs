//! The `Lattice` handle: one tree wired to one OCC engine.

use lattice_core::{Error, Result, Tid};
use lattice_occ::{CommitManager, TransactionContext};
use lattice_tree::{PurgeStats, TreeOptions, TxnTree};

/// How many times [`Lattice::run`] restarts a transaction whose commit hit
/// a retryable conflict before giving up.
const MAX_COMMIT_RETRIES: usize = 8;

/// An in-memory transactional ordered index.
///
/// Couples a [`TxnTree`] with the [`CommitManager`] that serializes its
/// commits. Worker threads share the `Lattice` by reference; each drives at
/// most one transaction at a time.
#[derive(Debug)]
pub struct Lattice {
    tree: TxnTree,
    manager: CommitManager,
}

impl Lattice {
    /// Create a database with default tree options.
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }

    /// Create a database with explicit tree options.
    pub fn with_options(options: TreeOptions) -> Self {
        let tree = TxnTree::with_options(options);
        let manager = CommitManager::new();
        tree.attach(&manager);
        Lattice { tree, manager }
    }

    /// The transactional tree.
    pub fn tree(&self) -> &TxnTree {
        &self.tree
    }

    /// The commit manager (tid allocation, epochs).
    pub fn manager(&self) -> &CommitManager {
        &self.manager
    }

    /// Start a transaction.
    ///
    /// Every transaction must reach [`commit`](Self::commit) or
    /// [`abort`](Self::abort); see `CommitManager::begin` for the epoch
    /// implications of dropping one on the floor.
    pub fn begin(&self) -> TransactionContext {
        self.manager.begin()
    }

    /// Validate and commit. On `Err` the transaction is aborted and the
    /// index untouched; `Error::is_retryable` decides whether re-running
    /// the whole transaction makes sense.
    pub fn commit(&self, txn: &mut TransactionContext) -> Result<Tid> {
        self.manager.commit(txn, &self.tree).map_err(Error::from)
    }

    /// Abort and discard all buffered effects.
    pub fn abort(&self, txn: &mut TransactionContext, reason: impl Into<String>) {
        self.manager.abort(txn, reason);
    }

    /// Run a closed transaction: begin, execute `body`, commit; restart on
    /// retryable conflicts up to a bounded number of attempts.
    ///
    /// `body` errors abort without retry — only commit-time conflicts are
    /// worth re-running, and then only from a fresh read snapshot.
    pub fn run<F, R>(&self, mut body: F) -> Result<R>
    where
        F: FnMut(&TxnTree, &mut TransactionContext) -> Result<R>,
    {
        let mut attempt = 0;
        loop {
            let mut txn = self.begin();
            let result = match body(&self.tree, &mut txn) {
                Ok(result) => result,
                Err(err) => {
                    self.abort(&mut txn, err.to_string());
                    return Err(err);
                }
            };
            match self.commit(&mut txn) {
                Ok(_) => return Ok(result),
                Err(err) if err.is_retryable() && attempt + 1 < MAX_COMMIT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(attempt, "retrying conflicted transaction");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Approximate key count (physical slots, not transactionally
    /// consistent).
    pub fn size_estimate(&self) -> usize {
        self.tree.size_estimate()
    }

    /// Tear the database down, releasing all tree memory.
    ///
    /// The caller must guarantee no transaction is in flight and none will
    /// be started. Returns purge statistics when `dump_stats` is set.
    pub fn destroy(self, dump_stats: bool) -> Option<PurgeStats> {
        self.tree.detach(&self.manager);
        self.tree.unsafe_purge(dump_stats)
    }
}

impl Default for Lattice {
    fn default() -> Self {
        Self::new()
    }
}
