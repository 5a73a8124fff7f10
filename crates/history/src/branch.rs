//! Branch registry: the only mutable pointer in the system

use ulid::Ulid;

use crate::error::{HistoryError, Result};

/// Name of the branch every project starts with
pub const DEFAULT_BRANCH: &str = "master";

/// Mutable mapping from (project id, branch name) to head commit id
///
/// Head advancement goes through sled's compare-and-swap, so no writer
/// holds a lock: a reader sees either the old head or the new head, and
/// a lost race surfaces as a failed CAS rather than a block.
///
/// A registered branch with no commits yet is stored as an empty value;
/// key presence doubles as the branch-existence check.
pub struct BranchRegistry {
    tree: sled::Tree,
}

impl BranchRegistry {
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    // Branch names may contain '/', so the separator is a NUL byte,
    // which project ids (ULIDs) and names never contain
    fn key(project: &str, branch: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(project.len() + 1 + branch.len());
        key.extend_from_slice(project.as_bytes());
        key.push(0);
        key.extend_from_slice(branch.as_bytes());
        key
    }

    /// Register a branch with no commits; returns false if it already exists
    pub fn create(&self, project: &str, branch: &str) -> Result<bool> {
        let created = self
            .tree
            .compare_and_swap(Self::key(project, branch), None::<&[u8]>, Some(&[][..]))?
            .is_ok();
        if created {
            self.tree.flush()?;
            tracing::debug!(%project, %branch, "created branch");
        }
        Ok(created)
    }

    /// Check whether a branch is registered
    pub fn exists(&self, project: &str, branch: &str) -> Result<bool> {
        Ok(self.tree.contains_key(Self::key(project, branch))?)
    }

    /// Current head commit of a branch; `None` for a branch with no commits
    pub fn head(&self, project: &str, branch: &str) -> Result<Option<Ulid>> {
        let value = self
            .tree
            .get(Self::key(project, branch))?
            .ok_or_else(|| HistoryError::BranchNotFound {
                project: project.to_string(),
                branch: branch.to_string(),
            })?;
        decode_head(&value)
    }

    /// Atomically advance the head from `expected` to `new`
    ///
    /// Returns false (and changes nothing) if another writer advanced the
    /// head since `expected` was read. This is the optimistic-concurrency
    /// backbone of the commit protocol.
    pub fn compare_and_set_head(
        &self,
        project: &str,
        branch: &str,
        expected: Option<Ulid>,
        new: Ulid,
    ) -> Result<bool> {
        if !self.exists(project, branch)? {
            return Err(HistoryError::BranchNotFound {
                project: project.to_string(),
                branch: branch.to_string(),
            });
        }

        let old: Vec<u8> = match expected {
            Some(id) => id.to_bytes().to_vec(),
            None => Vec::new(),
        };
        let swapped = self
            .tree
            .compare_and_swap(
                Self::key(project, branch),
                Some(old),
                Some(new.to_bytes().to_vec()),
            )?
            .is_ok();
        if swapped {
            self.tree.flush()?;
        }
        Ok(swapped)
    }

    /// List branch names registered for a project
    pub fn branches(&self, project: &str) -> Result<Vec<String>> {
        let mut prefix = project.as_bytes().to_vec();
        prefix.push(0);

        let mut names = Vec::new();
        for item in self.tree.scan_prefix(&prefix) {
            let (key, _) = item?;
            let name = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| HistoryError::Codec(format!("branch key is not utf-8: {e}")))?;
            names.push(name.to_string());
        }
        Ok(names)
    }

    /// Drop every branch of a project (project deletion path)
    pub fn remove_project(&self, project: &str) -> Result<()> {
        let mut prefix = project.as_bytes().to_vec();
        prefix.push(0);

        let keys: Vec<_> = self
            .tree
            .scan_prefix(&prefix)
            .map(|item| item.map(|(key, _)| key))
            .collect::<std::result::Result<_, _>>()?;
        for key in keys {
            self.tree.remove(key)?;
        }
        self.tree.flush()?;
        Ok(())
    }
}

fn decode_head(value: &[u8]) -> Result<Option<Ulid>> {
    if value.is_empty() {
        return Ok(None);
    }
    let bytes: [u8; 16] = value
        .try_into()
        .map_err(|_| HistoryError::Codec(format!("bad head record length: {}", value.len())))?;
    Ok(Some(Ulid::from_bytes(bytes)))
}
