//! Docstore Blob Storage
//!
//! This crate stores and retrieves the opaque byte payloads behind document
//! records: uploaded files, serialized JSON bodies, and thumbnail images.
//!
//! ## Design Principles
//!
//! - Metadata (what a payload *is*) and bytes (what a payload *contains*) are
//!   deliberately separated: the metadata index holds the record, this crate
//!   holds the bytes, and the record's `datapath` is the only link between
//!   them.
//! - Blobs are never interpreted; the store reads and writes bytes only.
//! - A stored blob is never modified in place. Replacing a document's payload
//!   writes a *new* blob and repoints the record; the old blob is orphaned
//!   rather than overwritten, so the current payload is always retrievable.
//!
//! ## Storage Layout
//!
//! Each user's blobs live in their own directory, addressed by a random
//! canonical identifier:
//!
//! ```text
//! <storage_root>/
//! ├── database.db              # metadata index (owned by docstore-index)
//! ├── data/
//! │   └── <username>/
//! │       └── <blob_id>        # document payloads
//! └── thumbnails/
//!     └── <username>/
//!         └── <blob_id>        # thumbnail images
//! ```
//!
//! ## Security Model
//!
//! - The storage root is canonicalised at construction and every read is
//!   checked to resolve inside it, so a tampered `datapath` cannot reach out
//!   of the store.
//! - Usernames become path components and are validated before use (no
//!   separators, no dot-prefixed names).
//! - Blob ids are generated, never caller-supplied.

mod files;

pub use docstore_uuid::StorageId;
pub use files::{content_digest, BlobKind, BlobSource, BlobStore, StoredBlob};

/// Errors that can occur during blob operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Storage root does not exist or is not a directory
    #[error("Invalid storage root: {0}")]
    InvalidRoot(String),

    /// Path validation failed (potential directory traversal or unsafe path)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Creating a blob directory failed
    #[error("failed to create blob directory: {0}")]
    DirCreation(std::io::Error),

    /// Moving an uploaded file into place failed
    #[error("failed to move blob into place: {0}")]
    Move(std::io::Error),

    /// Writing blob bytes failed
    #[error("failed to write blob: {0}")]
    Write(std::io::Error),

    /// No blob exists at the requested path
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Reading a stored blob failed
    #[error("failed to read blob: {0}")]
    Read(std::io::Error),
}
