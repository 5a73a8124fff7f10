//! Recursive tree construction from path edits
//!
//! Given a base tree digest and an ordered edit list, produces a new
//! immutable tree that reflects the edits. Entries untouched by any edit
//! are carried over by digest, so unchanged subtrees are shared with the
//! base rather than rewritten.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::hash::Digest;
use crate::store::Store;
use crate::tree::{EntryKind, Tree, TreeEntry};

/// What an edit does to its path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    /// Write the file with the given content
    Put(Vec<u8>),
    /// Remove the file; removing a path that does not exist is a no-op
    Delete,
}

/// A single path edit in a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEdit {
    /// Slash-separated path relative to the tree root
    pub path: String,
    pub action: EditAction,
}

impl TreeEdit {
    pub fn put(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            action: EditAction::Put(content.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            action: EditAction::Delete,
        }
    }
}

/// Build a new tree from `base` plus an ordered edit list
///
/// Later edits win over earlier edits on the same path. Subdirectories
/// left empty by deletions are removed from their parent. The resulting
/// tree (and any new blobs/subtrees) is written to the store and its
/// digest returned; with no effective edits the digest equals the base's.
pub fn build_tree(store: &Store, base: Option<Digest>, edits: &[TreeEdit]) -> Result<Digest> {
    let base_tree = match base {
        Some(digest) => (*store.read_tree(digest)?).clone(),
        None => Tree::new(),
    };

    let mut parsed = Vec::with_capacity(edits.len());
    for edit in edits {
        parsed.push((split_path(&edit.path)?, &edit.action));
    }

    let segmented: Vec<(&[String], &EditAction)> = parsed
        .iter()
        .map(|(segments, action)| (segments.as_slice(), *action))
        .collect();

    let tree = apply_edits(store, base_tree, &segmented)?;
    store.write_tree(&tree)
}

/// Split an edit path into segments, rejecting paths that cannot name an entry
fn split_path(path: &str) -> Result<Vec<String>> {
    let invalid = |reason: &str| CoreError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    if path.starts_with('/') {
        return Err(invalid("absolute paths are not allowed"));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative segments are not allowed")),
            _ if segment.len() > Tree::MAX_NAME_LEN => {
                return Err(invalid("path segment exceeds maximum entry name length"))
            }
            _ => segments.push(segment.to_string()),
        }
    }
    Ok(segments)
}

/// Apply edits to one directory level, recursing into affected children
fn apply_edits(store: &Store, base: Tree, edits: &[(&[String], &EditAction)]) -> Result<Tree> {
    // Partition edits by their first segment, keeping per-name edit order
    let mut groups: BTreeMap<&str, Vec<(&[String], &EditAction)>> = BTreeMap::new();
    for &(segments, action) in edits {
        groups
            .entry(segments[0].as_str())
            .or_default()
            .push((&segments[1..], action));
    }

    // Untouched entries ride along unchanged from the base
    let mut tree = base;

    for (name, group) in groups {
        let mut entry = tree.get(name).copied();
        // Deeper edits are batched into one recursive call per run so that
        // a leaf edit interleaved between them still applies in order
        let mut pending_deep: Vec<(&[String], &EditAction)> = Vec::new();

        for (rest, action) in group {
            if rest.is_empty() {
                entry = flush_deep(store, entry, &mut pending_deep)?;
                entry = match action {
                    EditAction::Put(content) => {
                        Some(TreeEntry::file(store.blobs().put(content)?))
                    }
                    EditAction::Delete => None,
                };
            } else {
                pending_deep.push((rest, action));
            }
        }
        entry = flush_deep(store, entry, &mut pending_deep)?;

        match entry {
            Some(e) => tree.insert(name, e),
            None => {
                tree.remove(name);
            }
        }
    }

    Ok(tree)
}

/// Recurse into a child directory with the buffered deeper edits
///
/// Returns the child's replacement entry: `None` when the edits leave the
/// subdirectory empty, which removes it from the parent entirely.
fn flush_deep(
    store: &Store,
    current: Option<TreeEntry>,
    pending: &mut Vec<(&[String], &EditAction)>,
) -> Result<Option<TreeEntry>> {
    if pending.is_empty() {
        return Ok(current);
    }

    // Resolve the existing child tree. A file entry or a missing entry
    // only starts a fresh child when a put will populate it; deletes
    // under a path with no directory have nothing to remove
    let child_base = match current {
        Some(TreeEntry {
            kind: EntryKind::Dir,
            digest,
        }) => (*store.read_tree(digest)?).clone(),
        _ => {
            let has_put = pending
                .iter()
                .any(|(_, action)| matches!(action, EditAction::Put(_)));
            if !has_put {
                pending.clear();
                return Ok(current);
            }
            Tree::new()
        }
    };

    let child = apply_edits(store, child_base, pending.as_slice())?;
    pending.clear();

    if child.is_empty() {
        return Ok(None);
    }
    let digest = store.write_tree(&child)?;
    Ok(Some(TreeEntry::dir(digest)))
}
