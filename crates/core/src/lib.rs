//! # Docstore Core
//!
//! Core business logic for the per-user document store.
//!
//! This crate contains the storage model and its query semantics:
//! - Document upload with create-vs-replace branching ([`DocumentService`])
//! - Metadata search, load, and delete, always scoped to the owning user
//! - The thumbnail collection attached to a document ([`ThumbnailService`])
//! - Session tokens and the request authorization gate ([`SessionStore`])
//! - Startup-resolved configuration ([`StoreConfig`])
//!
//! **No API concerns**: HTTP routing, multipart parsing, and response shaping
//! belong in `api-rest`. The services here receive an already-authenticated
//! username plus plain data and talk only to the metadata index
//! (`docstore-index`) and the blob store (`docstore_files`).

pub mod config;
pub mod constants;
pub mod documents;
pub mod error;
pub mod locks;
pub mod session;
pub mod thumbnails;

pub use config::StoreConfig;
pub use documents::{
    DocumentRecord, DocumentService, SearchFilters, ThumbnailEntry, UploadOptions, UploadPayload,
    UploadedFile,
};
pub use error::{StoreError, StoreResult};
pub use locks::DocLocks;
pub use session::{authorize_request, SessionStore};
pub use thumbnails::{ThumbnailDescriptor, ThumbnailService};

pub use docstore_files::{content_digest, BlobStore, StoredBlob};
pub use docstore_index::RecordStore;
pub use docstore_uuid::StorageId;
