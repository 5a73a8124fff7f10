//! Durable object store for blobs and trees

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;

use crate::blob::BlobStore;
use crate::error::{CoreError, ObjectKind, Result};
use crate::hash::Digest;
use crate::tree::Tree;

/// Object store holding blob content and tree snapshots
///
/// Backed by a single sled database (`objects.db`) with one keyspace per
/// object kind. Trees are cached in memory by digest; immutability makes
/// the cache trivially coherent.
pub struct Store {
    _db: sled::Db,
    blobs: BlobStore,
    trees: sled::Tree,
    tree_cache: DashMap<Digest, Arc<Tree>>,
}

impl Store {
    /// Open (or create) the object store under the given directory
    pub fn open(dir: &Path) -> Result<Self> {
        let db = sled::open(dir.join("objects.db"))?;
        let blobs = BlobStore::new(db.open_tree("blobs")?);
        let trees = db.open_tree("trees")?;
        Ok(Self {
            _db: db,
            blobs,
            trees,
            tree_cache: DashMap::new(),
        })
    }

    /// Access blob storage
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Write a tree, returning its digest
    ///
    /// Content-addressed like blobs: an identical tree is stored once.
    /// Flushed before the digest is returned.
    pub fn write_tree(&self, tree: &Tree) -> Result<Digest> {
        let bytes = tree.serialize();
        let digest = crate::hash::hash_bytes(&bytes);

        if !self.trees.contains_key(digest.as_bytes())? {
            self.trees.insert(digest.as_bytes(), bytes)?;
            self.trees.flush()?;
            tracing::debug!(digest = %digest, entries = tree.len(), "stored tree");
        }

        self.tree_cache
            .entry(digest)
            .or_insert_with(|| Arc::new(tree.clone()));
        Ok(digest)
    }

    /// Read a tree by digest, consulting the cache first
    pub fn read_tree(&self, digest: Digest) -> Result<Arc<Tree>> {
        if let Some(cached) = self.tree_cache.get(&digest) {
            return Ok(Arc::clone(&cached));
        }

        let bytes = self
            .trees
            .get(digest.as_bytes())?
            .ok_or(CoreError::NotFound {
                kind: ObjectKind::Tree,
                digest,
            })?;

        let tree = Tree::deserialize(&bytes).map_err(|detail| {
            tracing::warn!(digest = %digest, %detail, "tree record failed to decode");
            CoreError::Corrupt {
                kind: ObjectKind::Tree,
                digest,
                detail,
            }
        })?;

        let tree = Arc::new(tree);
        self.tree_cache.insert(digest, Arc::clone(&tree));
        Ok(tree)
    }

    /// Check whether a tree digest is present
    pub fn contains_tree(&self, digest: Digest) -> Result<bool> {
        if self.tree_cache.contains_key(&digest) {
            return Ok(true);
        }
        Ok(self.trees.contains_key(digest.as_bytes())?)
    }
}
