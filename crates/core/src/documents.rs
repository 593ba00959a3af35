//! Document records and the Document Manager.
//!
//! An upload becomes two things: an opaque payload blob on disk and a
//! metadata record in the index. The record's `datapath` is the only pointer
//! from one to the other. Re-uploading against an existing id writes a new
//! blob and repoints the record (identity is stable, the payload is not);
//! uploading without an id creates a new record.
//!
//! Every index operation issued here is scoped by `username`. There is no
//! code path that looks a document up by id alone.

use crate::constants::{DEFAULT_TITLE, DEFAULT_TYPE, JSON_EXTENSION, JSON_MIMETYPE};
use crate::locks::{hold, DocLocks};
use crate::{StoreError, StoreResult};
use docstore_files::{BlobKind, BlobSource, BlobStore};
use docstore_index::{Filter, Patch, RecordStore};
use docstore_uuid::StorageId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// A dimensioned, mime-typed reference to a rendered preview image, embedded
/// in a document's thumbnail list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ThumbnailEntry {
    pub width: u32,
    pub height: u32,
    /// Composed as `{type}/{subtype}`
    pub mimetype: String,
    /// URL template under which this thumbnail is served
    pub src: String,
    /// Location of the thumbnail blob
    pub datapath: String,
}

/// Metadata row representing one logical document.
///
/// One record per document, not per version: `id` and `username` are fixed at
/// creation, `datapath` moves to the newest payload on every re-upload, and
/// `thumbnails` grows as previews are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DocumentRecord {
    /// Index-assigned identifier; immutable and globally unique
    pub id: String,
    /// Owner; set at creation, never changed
    pub username: String,
    /// Free-form classification
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Display name
    pub title: String,
    /// Present when the upload was a binary file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    pub extension: String,
    /// Location of the current payload blob
    pub datapath: String,
    /// Attached previews, in attach order
    #[serde(default)]
    pub thumbnails: Vec<ThumbnailEntry>,
}

/// Optional upload parameters, straight from the request query string.
///
/// Empty or whitespace-only values are treated as unsupplied, so
/// `?title=&type=json` classifies the document without renaming it.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Present → replace that document; absent → create a new one
    pub id: Option<String>,
    pub doc_type: Option<String>,
    pub title: Option<String>,
    pub filename: Option<String>,
    pub mimetype: Option<String>,
}

/// An uploaded file spooled to a temporary location by the HTTP layer.
///
/// The file at `path` is *consumed* (moved into blob storage) on success; on
/// failure it stays where it is for the caller to clean up.
#[derive(Debug)]
pub struct UploadedFile {
    /// Temporary on-disk location; must share a filesystem with the store
    pub path: PathBuf,
    /// Client-supplied file name, if any
    pub name: Option<String>,
    /// Declared content type, if any
    pub content_type: Option<String>,
}

/// What the client uploaded.
#[derive(Debug)]
pub enum UploadPayload {
    /// A parsed JSON body; stored as its serialized bytes
    Json(Value),
    /// A binary file upload
    File(UploadedFile),
}

/// Equality filters for search and delete.
///
/// Unsupplied (or empty) keys are omitted from the index query — there is no
/// wildcard matching, and an empty filter set selects all of the user's
/// documents.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub doc_type: Option<String>,
    pub mimetype: Option<String>,
    pub title: Option<String>,
    pub extension: Option<String>,
}

impl SearchFilters {
    fn to_filter(&self, username: &str) -> Filter {
        let mut filter = Filter::new().eq("username", username);
        if let Some(doc_type) = supplied(&self.doc_type) {
            filter = filter.eq("type", doc_type);
        }
        if let Some(mimetype) = supplied(&self.mimetype) {
            filter = filter.eq("mimetype", mimetype);
        }
        if let Some(title) = supplied(&self.title) {
            filter = filter.eq("title", title);
        }
        if let Some(extension) = supplied(&self.extension) {
            filter = filter.eq("extension", extension);
        }
        filter
    }
}

/// Record shape inserted on create; the index assigns `id`.
#[derive(Serialize)]
struct NewDocument {
    username: String,
    #[serde(rename = "type")]
    doc_type: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mimetype: Option<String>,
    extension: String,
    datapath: String,
    thumbnails: Vec<ThumbnailEntry>,
}

/// The Document Manager: translates upload requests into blob-write +
/// metadata-record pairs and enforces per-user ownership on every operation.
#[derive(Clone)]
pub struct DocumentService {
    index: Arc<RecordStore>,
    blobs: Arc<BlobStore>,
    locks: Arc<DocLocks>,
}

impl DocumentService {
    pub fn new(index: Arc<RecordStore>, blobs: Arc<BlobStore>, locks: Arc<DocLocks>) -> Self {
        Self {
            index,
            blobs,
            locks,
        }
    }

    /// Stores an uploaded payload and creates or replaces its document record.
    ///
    /// The payload blob is always written first; no metadata is touched if
    /// the blob write fails. With `opts.id` absent a fresh record is inserted
    /// (defaults: type `"unknown"`, title `"untitled"`); with it present the
    /// existing record owned by `username` is patched — `datapath` always,
    /// `title`/`type` only when supplied, everything else untouched. The
    /// replaced payload blob is left on disk; see the crate documentation on
    /// orphaned blobs.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] — `opts.id` is malformed (checked before
    ///   any blob write)
    /// - [`StoreError::NotFound`] — `opts.id` matches no record owned by
    ///   `username`
    /// - [`StoreError::Files`] — directory creation or blob write failed
    pub fn create_or_replace(
        &self,
        username: &str,
        opts: &UploadOptions,
        payload: UploadPayload,
    ) -> StoreResult<DocumentRecord> {
        match supplied(&opts.id) {
            Some(id) => {
                let id = parse_doc_id(id)?;
                self.replace(username, &id, opts, &payload)
            }
            None => self.create(username, opts, &payload),
        }
    }

    fn create(
        &self,
        username: &str,
        opts: &UploadOptions,
        payload: &UploadPayload,
    ) -> StoreResult<DocumentRecord> {
        let stored = self.store_payload(username, payload)?;

        let doc_type = supplied(&opts.doc_type).unwrap_or(DEFAULT_TYPE).to_string();
        let title = supplied(&opts.title).unwrap_or(DEFAULT_TITLE).to_string();

        let record = match payload {
            UploadPayload::Json(_) => NewDocument {
                username: username.to_string(),
                doc_type,
                title,
                filename: None,
                mimetype: Some(JSON_MIMETYPE.to_string()),
                extension: JSON_EXTENSION.to_string(),
                datapath: stored.path.display().to_string(),
                thumbnails: Vec::new(),
            },
            UploadPayload::File(file) => {
                let filename = supplied(&opts.filename)
                    .map(str::to_string)
                    .or_else(|| file.name.clone())
                    .ok_or_else(|| {
                        StoreError::Validation("uploaded file has no filename".into())
                    })?;
                let extension = file_extension(&filename).to_string();
                let mimetype = supplied(&opts.mimetype)
                    .map(str::to_string)
                    .or_else(|| file.content_type.clone())
                    .or_else(|| stored.media_type.clone());

                NewDocument {
                    username: username.to_string(),
                    doc_type,
                    title,
                    filename: Some(filename),
                    mimetype,
                    extension,
                    datapath: stored.path.display().to_string(),
                    thumbnails: Vec::new(),
                }
            }
        };

        let inserted = self
            .index
            .insert(serde_json::to_value(&record).map_err(StoreError::Serialization)?)?;
        let record = decode_record(inserted)?;
        tracing::info!(
            username,
            id = %record.id,
            size_bytes = stored.size_bytes,
            "created document"
        );
        Ok(record)
    }

    fn replace(
        &self,
        username: &str,
        id: &StorageId,
        opts: &UploadOptions,
        payload: &UploadPayload,
    ) -> StoreResult<DocumentRecord> {
        // Serialize writers on this document: the blob write and the
        // metadata repoint must not interleave with another replace.
        let lock = self.locks.for_doc(username, &id.to_string());
        let _guard = hold(&lock);

        let stored = self.store_payload(username, payload)?;

        let mut patch = Patch::new().set("datapath", stored.path.display().to_string());
        if let Some(doc_type) = supplied(&opts.doc_type) {
            patch = patch.set("type", doc_type);
        }
        if let Some(title) = supplied(&opts.title) {
            patch = patch.set("title", title);
        }

        let filter = Filter::new()
            .eq("id", id.to_string())
            .eq("username", username);
        let Some(updated) = self.index.update(&filter, &patch)? else {
            // The freshly written blob is now orphaned, matching what a
            // replaced payload leaves behind.
            tracing::warn!(username, id = %id, "replace matched no document");
            return Err(StoreError::NotFound);
        };

        let record = decode_record(updated)?;
        tracing::info!(
            username,
            id = %record.id,
            size_bytes = stored.size_bytes,
            "replaced document payload"
        );
        Ok(record)
    }

    fn store_payload(
        &self,
        username: &str,
        payload: &UploadPayload,
    ) -> StoreResult<docstore_files::StoredBlob> {
        let stored = match payload {
            UploadPayload::File(file) => {
                self.blobs
                    .store(BlobKind::Data, username, BlobSource::File(&file.path))?
            }
            UploadPayload::Json(body) => {
                let bytes = serde_json::to_vec(body).map_err(StoreError::Serialization)?;
                self.blobs
                    .store(BlobKind::Data, username, BlobSource::Bytes(&bytes))?
            }
        };
        Ok(stored)
    }

    /// Returns all of `username`'s documents matching `filters`, in
    /// insertion order.
    pub fn search(
        &self,
        username: &str,
        filters: &SearchFilters,
    ) -> StoreResult<Vec<DocumentRecord>> {
        self.index
            .find(&filters.to_filter(username))
            .into_iter()
            .map(decode_record)
            .collect()
    }

    /// Fetches the unique document `id` owned by `username`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`] for a malformed id; [`StoreError::NotFound`]
    /// when no record matches the `{id, username}` scope — or when more than
    /// one does, which indicates index corruption and is logged before being
    /// surfaced rather than silently resolved.
    pub fn load(&self, username: &str, id: &str) -> StoreResult<DocumentRecord> {
        let id = parse_doc_id(id)?;
        load_scoped(&self.index, username, &id)
    }

    /// Loads a document and reads back its current payload bytes.
    pub fn open_payload(&self, username: &str, id: &str) -> StoreResult<(DocumentRecord, Vec<u8>)> {
        let record = self.load(username, id)?;
        let bytes = self.blobs.read(std::path::Path::new(&record.datapath))?;
        Ok((record, bytes))
    }

    /// Deletes all of `username`'s documents matching `filters`.
    ///
    /// Returns the number removed; removing zero is not an error. Payload
    /// blobs are not reclaimed.
    pub fn delete(&self, username: &str, filters: &SearchFilters) -> StoreResult<usize> {
        let removed = self.index.remove(&filters.to_filter(username), true)?;
        tracing::info!(username, removed, "deleted documents");
        Ok(removed)
    }
}

/// Treats empty and whitespace-only option values as unsupplied.
pub(crate) fn supplied(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Validates an externally supplied document id.
pub(crate) fn parse_doc_id(id: &str) -> StoreResult<StorageId> {
    StorageId::parse(id).map_err(|e| StoreError::Validation(e.to_string()))
}

/// Extension of `name`: the substring after the last `.`, or the whole name
/// when it has no dot.
fn file_extension(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

pub(crate) fn decode_record(value: Value) -> StoreResult<DocumentRecord> {
    serde_json::from_value(value).map_err(StoreError::RecordDecode)
}

/// The one scoped lookup both managers share: find by `{id, username}`,
/// demand uniqueness.
pub(crate) fn load_scoped(
    index: &RecordStore,
    username: &str,
    id: &StorageId,
) -> StoreResult<DocumentRecord> {
    let mut matches = index.find(
        &Filter::new()
            .eq("id", id.to_string())
            .eq("username", username),
    );

    if matches.len() > 1 {
        tracing::error!(
            username,
            id = %id,
            count = matches.len(),
            "duplicate records for document id; index is corrupt"
        );
        return Err(StoreError::NotFound);
    }

    match matches.pop() {
        Some(record) => decode_record(record),
        None => Err(StoreError::NotFound),
    }
}
