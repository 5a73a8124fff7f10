//! Error types for commit history storage

use ulid::Ulid;

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors raised by the commit chain and branch registry
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// A commit looked up by id is not present
    #[error("commit not found: {0}")]
    CommitNotFound(Ulid),

    /// The (project, branch) pair is not registered
    #[error("branch not found: {branch} in project {project}")]
    BranchNotFound { project: String, branch: String },

    /// Attempt to append a commit whose parent does not exist
    #[error("parent commit does not exist: {0}")]
    MissingParent(Ulid),

    /// Underlying sled failure
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization/deserialization failure
    #[error("codec error: {0}")]
    Codec(String),
}
