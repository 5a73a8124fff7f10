//! Immutable directory snapshots

use std::collections::BTreeMap;

use crate::hash::{hash_bytes, Digest};

/// Kind of tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file; digest names a blob
    File,
    /// Subdirectory; digest names a child tree
    Dir,
}

/// Entry in a tree, pointing at a blob or a child tree by digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntry {
    pub kind: EntryKind,
    pub digest: Digest,
}

impl TreeEntry {
    pub fn file(digest: Digest) -> Self {
        Self {
            kind: EntryKind::File,
            digest,
        }
    }

    pub fn dir(digest: Digest) -> Self {
        Self {
            kind: EntryKind::Dir,
            digest,
        }
    }
}

/// A directory snapshot: names mapped to blob or child-tree digests
///
/// Immutable once written; identity is the digest of the serialized entry
/// list. BTreeMap keeps entries sorted by name, so two trees with the same
/// content serialize to identical bytes and share a digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    const MAGIC: [u8; 4] = *b"ATR1";

    /// Longest entry name the serialized format can carry (u16 length field)
    pub const MAX_NAME_LEN: usize = u16::MAX as usize;

    /// Create a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, name: impl Into<String>, entry: TreeEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Look up an entry by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    /// Remove an entry by name
    pub fn remove(&mut self, name: &str) -> Option<TreeEntry> {
        self.entries.remove(name)
    }

    /// Iterate entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the TreeV1 binary format
    ///
    /// Format:
    /// - magic: "ATR1" (4 bytes)
    /// - entry_count: u32 LE
    /// - entries (sorted lexicographically by name):
    ///   - name_len: u16 LE
    ///   - name_bytes: [u8; name_len]
    ///   - kind: u8 (0=file, 1=dir)
    ///   - digest: [u8; 32]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.entries.len() * 48);
        buf.extend_from_slice(&Self::MAGIC);
        buf.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for (name, entry) in &self.entries {
            buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
            buf.extend_from_slice(name.as_bytes());
            buf.push(match entry.kind {
                EntryKind::File => 0,
                EntryKind::Dir => 1,
            });
            buf.extend_from_slice(entry.digest.as_bytes());
        }
        buf
    }

    /// Deserialize from the TreeV1 binary format
    pub fn deserialize(bytes: &[u8]) -> std::result::Result<Self, String> {
        let mut cursor = Reader { bytes, pos: 0 };
        if cursor.take(4)? != Self::MAGIC {
            return Err("bad tree magic".to_string());
        }
        let count = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap());

        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let name_len = u16::from_le_bytes(cursor.take(2)?.try_into().unwrap()) as usize;
            let name = std::str::from_utf8(cursor.take(name_len)?)
                .map_err(|e| format!("entry name is not utf-8: {e}"))?
                .to_string();
            let kind = match cursor.take(1)?[0] {
                0 => EntryKind::File,
                1 => EntryKind::Dir,
                other => return Err(format!("unknown entry kind: {other}")),
            };
            let digest = Digest::from_bytes(cursor.take(32)?.try_into().unwrap());
            // Entry names are unique within one tree
            if entries.insert(name.clone(), TreeEntry { kind, digest }).is_some() {
                return Err(format!("duplicate entry name: {name}"));
            }
        }
        if cursor.pos != bytes.len() {
            return Err("trailing bytes after tree entries".to_string());
        }
        Ok(Self { entries })
    }

    /// Digest of this tree's serialized form
    ///
    /// Deterministic: same entries always yield the same digest.
    pub fn digest(&self) -> Digest {
        hash_bytes(&self.serialize())
    }
}

/// Digest of the canonical empty tree
pub fn empty_tree_digest() -> Digest {
    Tree::new().digest()
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], String> {
        if self.pos + n > self.bytes.len() {
            return Err("tree record truncated".to_string());
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}
