//! Code service: tree reads and the commit protocol
//!
//! The orchestrator over the object store, commit chain, and branch
//! registry. Writers never block readers: all tree and commit writes go
//! to unreferenced objects, and the branch head advances through a single
//! compare-and-set at the very end of a commit attempt.

use std::collections::BTreeMap;
use std::sync::Arc;

use arbor_core::{build_tree, Store, TreeEdit};
use arbor_core::tree::EntryKind;
use arbor_history::{Commit, History, HistoryError};
use ulid::Ulid;

use crate::error::{Result, ServiceError};

/// Retry budget for the head compare-and-set loop; exceeding it surfaces
/// as a contention error rather than retrying indefinitely
pub const MAX_COMMIT_RETRIES: u32 = 5;

/// A fully resolved tree entry, ready for external rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeView {
    /// File content bytes
    File(Vec<u8>),
    /// Expanded subdirectory
    Dir(TreeView),
}

/// A recursively expanded directory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeView {
    entries: BTreeMap<String, NodeView>,
}

impl TreeView {
    /// Look up a direct child by name
    pub fn get(&self, name: &str) -> Option<&NodeView> {
        self.entries.get(name)
    }

    /// Look up a file's content by slash-separated path
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        let mut view = self;
        let mut segments = path.split('/').peekable();
        while let Some(segment) = segments.next() {
            match view.get(segment)? {
                NodeView::File(content) if segments.peek().is_none() => {
                    return Some(content);
                }
                NodeView::Dir(child) => view = child,
                NodeView::File(_) => return None,
            }
        }
        None
    }

    /// Iterate direct children in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeView)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory has no children
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Orchestrator exposing branch tree reads and the commit protocol
pub struct CodeService {
    store: Arc<Store>,
    history: Arc<History>,
}

impl CodeService {
    pub fn new(store: Arc<Store>, history: Arc<History>) -> Self {
        Self { store, history }
    }

    /// Resolved tree at a branch's latest commit
    ///
    /// A registered branch with no commits yet resolves to the empty view;
    /// a missing branch is `NotFound`.
    pub fn tree(&self, project_id: &str, branch: &str) -> Result<TreeView> {
        match self.history.branches().head(project_id, branch)? {
            Some(head) => {
                let commit = self.history.commits().get(head)?;
                self.resolve(commit.tree)
            }
            None => Ok(TreeView::default()),
        }
    }

    /// Resolved tree at a historical commit
    pub fn tree_at(&self, commit_id: Ulid) -> Result<TreeView> {
        let commit = match self.history.commits().get(commit_id) {
            // The caller named this id, so a miss is their miss
            Err(HistoryError::CommitNotFound(id)) => {
                return Err(ServiceError::NotFound(format!("commit not found: {id}")))
            }
            other => other?,
        };
        self.resolve(commit.tree)
    }

    /// Commit history from a branch's head, newest first
    pub fn log(&self, project_id: &str, branch: &str) -> Result<Vec<Commit>> {
        match self.history.branches().head(project_id, branch)? {
            Some(head) => {
                let mut commits = Vec::new();
                for commit in self.history.commits().walk(head) {
                    commits.push(commit?);
                }
                Ok(commits)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Commit an edit list to a branch
    ///
    /// One attempt is: read head, build the new tree against the head's
    /// tree, append a commit, then compare-and-set the head pointer. A
    /// lost CAS re-reads the head and rebuilds against the new base, up
    /// to [`MAX_COMMIT_RETRIES`] attempts. Objects written by abandoned
    /// attempts stay unreferenced; nothing partial is ever observable as
    /// a branch head.
    ///
    /// An edit list that reproduces the current tree exactly returns the
    /// existing head commit without creating a new one.
    pub fn commit(
        &self,
        project_id: &str,
        branch: &str,
        author: &str,
        message: &str,
        edits: &[TreeEdit],
    ) -> Result<Commit> {
        for attempt in 0..MAX_COMMIT_RETRIES {
            let head = self.history.branches().head(project_id, branch)?;
            let head_commit = match head {
                Some(id) => Some(self.history.commits().get(id)?),
                None => None,
            };
            let base = head_commit.as_ref().map(|c| c.tree);

            let new_tree = build_tree(&self.store, base, edits)?;
            if let Some(head_commit) = &head_commit {
                if head_commit.tree == new_tree {
                    return Ok(head_commit.clone());
                }
            }

            let commit = self
                .history
                .commits()
                .append(new_tree, head, author, message)?;
            if self
                .history
                .branches()
                .compare_and_set_head(project_id, branch, head, commit.id)?
            {
                return Ok(commit);
            }

            tracing::debug!(
                %project_id, %branch, attempt,
                "head moved during commit, rebuilding against new base"
            );
        }

        Err(ServiceError::Conflict {
            retries: MAX_COMMIT_RETRIES,
        })
    }

    /// Recursively expand a tree digest into a rendered view
    fn resolve(&self, digest: arbor_core::Digest) -> Result<TreeView> {
        let tree = self.store.read_tree(digest)?;
        let mut entries = BTreeMap::new();
        for (name, entry) in tree.iter() {
            let node = match entry.kind {
                EntryKind::File => NodeView::File(self.store.blobs().get(entry.digest)?),
                EntryKind::Dir => NodeView::Dir(self.resolve(entry.digest)?),
            };
            entries.insert(name.to_string(), node);
        }
        Ok(TreeView { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_view_file_lookup() {
        let mut inner = TreeView::default();
        inner
            .entries
            .insert("b.txt".into(), NodeView::File(b"world".to_vec()));
        let mut root = TreeView::default();
        root.entries
            .insert("a.txt".into(), NodeView::File(b"hello".to_vec()));
        root.entries.insert("dir".into(), NodeView::Dir(inner));

        assert_eq!(root.file("a.txt"), Some(&b"hello"[..]));
        assert_eq!(root.file("dir/b.txt"), Some(&b"world"[..]));
        assert_eq!(root.file("dir"), None);
        assert_eq!(root.file("a.txt/extra"), None);
        assert_eq!(root.file("missing"), None);
    }
}
