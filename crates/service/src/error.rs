//! User-visible error taxonomy
//!
//! The transport layer (out of scope here) maps these onto status codes;
//! nothing below this surface reaches callers.

use arbor_core::CoreError;
use arbor_history::HistoryError;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by the code service
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Project, branch, or commit the caller named does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Head advancement lost its retry budget under sustained contention;
    /// the caller should retry later
    #[error("commit conflict: head moved {retries} times during commit")]
    Conflict { retries: u32 },

    /// A digest referenced by a stored record resolves to missing or bad
    /// content: invariant violation, storage-layer data loss
    #[error("integrity violation: {0}")]
    Corrupt(String),

    /// An edit path that cannot name a tree entry
    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    /// Underlying storage failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<CoreError> for ServiceError {
    fn from(e: CoreError) -> Self {
        match e {
            // The service only looks up digests it read out of commit and
            // tree records, so a miss here is data loss, not a user miss
            CoreError::NotFound { .. } => {
                tracing::warn!(error = %e, "referenced object missing from store");
                ServiceError::Corrupt(e.to_string())
            }
            CoreError::Corrupt { .. } => {
                tracing::warn!(error = %e, "corrupt object in store");
                ServiceError::Corrupt(e.to_string())
            }
            CoreError::InvalidPath { .. } => ServiceError::InvalidEdit(e.to_string()),
            CoreError::Storage(_) | CoreError::Codec(_) | CoreError::Io(_) => {
                ServiceError::Storage(e.to_string())
            }
        }
    }
}

impl From<HistoryError> for ServiceError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::BranchNotFound { .. } => ServiceError::NotFound(e.to_string()),
            // A head or parent reference that fails to resolve is chain
            // corruption; user-named commits are handled at the call site
            HistoryError::CommitNotFound(_) | HistoryError::MissingParent(_) => {
                tracing::warn!(error = %e, "dangling commit reference");
                ServiceError::Corrupt(e.to_string())
            }
            HistoryError::Storage(_) | HistoryError::Codec(_) => {
                ServiceError::Storage(e.to_string())
            }
        }
    }
}
