//! Error types for the object store

use crate::hash::Digest;

/// Result type for core store operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Kind of stored object, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Blob => write!(f, "blob"),
            ObjectKind::Tree => write!(f, "tree"),
        }
    }
}

/// Errors raised by the blob/tree store
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An object looked up by digest is not present
    #[error("{kind} not found: {digest}")]
    NotFound { kind: ObjectKind, digest: Digest },

    /// Stored bytes fail integrity checks; indicates storage-layer data loss
    #[error("corrupt {kind} {digest}: {detail}")]
    Corrupt {
        kind: ObjectKind,
        digest: Digest,
        detail: String,
    },

    /// Underlying sled failure
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization/deserialization failure
    #[error("codec error: {0}")]
    Codec(String),

    /// An edit path that cannot name a tree entry
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// I/O failure (compression streams)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
