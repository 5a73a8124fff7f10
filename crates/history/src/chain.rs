//! Append-only commit chain

use arbor_core::Digest;
use ulid::Ulid;

use crate::commit::Commit;
use crate::error::{HistoryError, Result};

/// Append-only store of commit records, keyed by commit id
///
/// Commits are never mutated after `append`; each commit references at
/// most one parent, forming a singly-linked history per branch.
pub struct CommitChain {
    tree: sled::Tree,
}

impl CommitChain {
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    /// Append a new commit referencing `tree` with the given parent
    ///
    /// The parent must already exist; histories are built strictly
    /// root-first, so chains cannot cycle. Flushed before returning.
    pub fn append(
        &self,
        tree: Digest,
        parent: Option<Ulid>,
        author: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Commit> {
        if let Some(parent_id) = parent {
            if !self.tree.contains_key(parent_id.to_bytes())? {
                return Err(HistoryError::MissingParent(parent_id));
            }
        }

        let commit = Commit::new(tree, parent, author, message);
        self.tree.insert(commit.id.to_bytes(), commit.serialize()?)?;
        self.tree.flush()?;

        tracing::debug!(id = %commit.id, parent = ?commit.parent, "appended commit");
        Ok(commit)
    }

    /// Get a commit by id
    pub fn get(&self, id: Ulid) -> Result<Commit> {
        let bytes = self
            .tree
            .get(id.to_bytes())?
            .ok_or(HistoryError::CommitNotFound(id))?;
        Commit::deserialize(&bytes)
    }

    /// Check whether a commit id is present
    pub fn contains(&self, id: Ulid) -> Result<bool> {
        Ok(self.tree.contains_key(id.to_bytes())?)
    }

    /// Walk history from `from` back to the root commit
    ///
    /// Each call produces an independent lazy iterator; appends elsewhere
    /// in the chain never affect a walk in progress.
    pub fn walk(&self, from: Ulid) -> Walk<'_> {
        Walk {
            chain: self,
            next: Some(from),
        }
    }

    /// Total number of stored commits
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the chain holds no commits
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Lazy iterator over a commit's ancestry, ending at the root
pub struct Walk<'a> {
    chain: &'a CommitChain,
    next: Option<Ulid>,
}

impl Iterator for Walk<'_> {
    type Item = Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        match self.chain.get(id) {
            Ok(commit) => {
                self.next = commit.parent;
                Some(Ok(commit))
            }
            // A dangling parent reference ends the walk with the error
            Err(e) => Some(Err(e)),
        }
    }
}
