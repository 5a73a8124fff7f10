//! Commit records

use arbor_core::Digest;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{HistoryError, Result};

/// An immutable commit linking a tree snapshot into branch history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Unique ID (ULID: timestamp + uniqueness)
    pub id: Ulid,
    /// Root tree digest for this commit
    pub tree: Digest,
    /// Parent commit ID; `None` for the root commit of a branch
    pub parent: Option<Ulid>,
    /// Author identity (profile username)
    pub author: String,
    /// Commit message
    pub message: String,
    /// Timestamp (Unix milliseconds)
    pub ts_unix_ms: u64,
}

impl Commit {
    /// Create a new commit stamped with the current time
    pub fn new(
        tree: Digest,
        parent: Option<Ulid>,
        author: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let id = Ulid::new();
        Self {
            id,
            tree,
            parent,
            author: author.into(),
            message: message.into(),
            ts_unix_ms: id.timestamp_ms(),
        }
    }

    pub(crate) fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| HistoryError::Codec(e.to_string()))
    }

    pub(crate) fn deserialize(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| HistoryError::Codec(e.to_string()))
    }
}
