//! Storage identifier utilities.
//!
//! Every object the docstore persists — document records, payload blobs,
//! thumbnail blobs, session tokens — is addressed by a random identifier in a
//! single *canonical* representation: **32 lowercase hexadecimal characters**
//! (no hyphens), i.e. the simple form of a v4 UUID.
//!
//! Keeping one canonical form everywhere means:
//! - blob file names and record ids never need normalisation,
//! - externally supplied document ids can be validated with a single strict
//!   parse before they ever reach the metadata index,
//! - an identifier is safe to embed in a filesystem path as-is (no `/`, no
//!   `..`, no case aliasing).
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Non-canonical inputs (uppercase, hyphenated, wrong length, non-hex) are
//! rejected by [`StorageId::parse`]; identifiers arriving from the API must go
//! through it before they are used in an index filter or a blob path.

mod service;

pub use service::{StorageId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
