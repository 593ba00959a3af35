//! # Docstore Metadata Index
//!
//! An embedded, queryable store of JSON records, persisted to a single file.
//!
//! The index is deliberately generic: it knows nothing about documents or
//! thumbnails. It stores JSON objects, assigns each one a canonical `id` at
//! insert time, and answers equality-filtered queries. The document layer
//! builds its ownership and search semantics entirely out of filters.
//!
//! ## Operations
//!
//! - [`RecordStore::insert`] — store a new record, assigning `id` when absent
//! - [`RecordStore::find`] — all records matching an equality [`Filter`],
//!   in insertion order
//! - [`RecordStore::update`] — patch the first matching record (`$set`-style
//!   field replacement and `$push`-style array append via [`Patch`]) and
//!   return the post-update record
//! - [`RecordStore::remove`] — delete matching records, returning the count
//!
//! ## Durability
//!
//! Records live in memory behind a mutex; every mutation rewrites the full
//! record set to a sibling temp file and atomically renames it over the store
//! file. A reader never observes a half-written store. This trades write
//! amplification for trivial recovery, which is the right trade for the
//! single-writer, low-concurrency deployments this index serves.

mod store;

pub use store::{Filter, Patch, RecordStore};

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The store file exists but cannot be read
    #[error("failed to open index file: {0}")]
    Open(std::io::Error),

    /// A persisted line is not a valid JSON object
    #[error("corrupt index record: {0}")]
    Corrupt(serde_json::Error),

    /// Writing or renaming the store file failed
    #[error("failed to persist index file: {0}")]
    Persist(std::io::Error),

    /// A record handed to the index was not a JSON object
    #[error("index records must be JSON objects")]
    NotAnObject,
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
