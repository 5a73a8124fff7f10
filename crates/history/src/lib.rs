//! Commit history and branch registry
//!
//! This crate provides:
//! - Commit records (ULID-based ids, bincode serialization)
//! - Append-only commit chain with lazy ancestry walks
//! - Branch registry with compare-and-set head advancement

pub mod branch;
pub mod chain;
pub mod commit;
pub mod error;

use std::path::Path;

// Re-exports
pub use branch::{BranchRegistry, DEFAULT_BRANCH};
pub use chain::{CommitChain, Walk};
pub use commit::Commit;
pub use error::{HistoryError, Result};

/// Durable commit + branch storage (`history.db`)
pub struct History {
    _db: sled::Db,
    commits: CommitChain,
    branches: BranchRegistry,
}

impl History {
    /// Open (or create) history storage under the given directory
    pub fn open(dir: &Path) -> Result<Self> {
        let db = sled::open(dir.join("history.db"))?;
        let commits = CommitChain::new(db.open_tree("commits")?);
        let branches = BranchRegistry::new(db.open_tree("branches")?);
        Ok(Self {
            _db: db,
            commits,
            branches,
        })
    }

    /// Access the commit chain
    pub fn commits(&self) -> &CommitChain {
        &self.commits
    }

    /// Access the branch registry
    pub fn branches(&self) -> &BranchRegistry {
        &self.branches
    }
}
