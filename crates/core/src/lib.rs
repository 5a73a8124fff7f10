//! Content-addressed object storage for the versioned tree store
//!
//! This crate provides:
//! - BLAKE3 digest type for content addressing
//! - Blob store (sled-backed, zstd compression, durable-before-ack)
//! - Immutable tree snapshots with deterministic serialization
//! - Recursive tree builder with structural sharing

pub mod blob;
pub mod builder;
pub mod error;
pub mod hash;
pub mod store;
pub mod tree;

// Re-exports
pub use blob::BlobStore;
pub use builder::{build_tree, EditAction, TreeEdit};
pub use error::{CoreError, ObjectKind, Result};
pub use hash::{hash_bytes, Digest};
pub use store::Store;
pub use tree::{empty_tree_digest, EntryKind, Tree, TreeEntry};
