//! The Thumbnail Manager.
//!
//! Thumbnails are previews attached to an existing document: each attach
//! stores the image bytes as a blob under `thumbnails/{username}/` and
//! appends an entry to the document's `thumbnails` array. The collection is
//! append-only — attaching the same dimensions twice appends again, and a
//! lookup by dimensions returns the *first* matching entry. De-duplication
//! is the caller's concern.

use crate::documents::{decode_record, load_scoped, parse_doc_id, DocumentRecord, ThumbnailEntry, UploadedFile};
use crate::locks::{hold, DocLocks};
use crate::{StoreError, StoreResult};
use docstore_files::{BlobKind, BlobSource, BlobStore};
use docstore_index::{Filter, Patch, RecordStore};
use std::path::Path;
use std::sync::Arc;

/// Thumbnail parameters parsed from request path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailDescriptor {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub mime_subtype: String,
}

impl ThumbnailDescriptor {
    /// Parses path-segment strings into a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] when `width` or `height` is not a
    /// non-negative integer.
    pub fn parse(
        width: &str,
        height: &str,
        mime_type: &str,
        mime_subtype: &str,
    ) -> StoreResult<Self> {
        let width = width.parse().map_err(|_| {
            StoreError::Validation(format!("malformed thumbnail width: '{}'", width))
        })?;
        let height = height.parse().map_err(|_| {
            StoreError::Validation(format!("malformed thumbnail height: '{}'", height))
        })?;

        Ok(Self {
            width,
            height,
            mime_type: mime_type.to_string(),
            mime_subtype: mime_subtype.to_string(),
        })
    }

    /// The composed `{type}/{subtype}` mimetype.
    pub fn mimetype(&self) -> String {
        format!("{}/{}", self.mime_type, self.mime_subtype)
    }
}

/// Manages the thumbnail collection attached to documents.
#[derive(Clone)]
pub struct ThumbnailService {
    index: Arc<RecordStore>,
    blobs: Arc<BlobStore>,
    locks: Arc<DocLocks>,
}

impl ThumbnailService {
    pub fn new(index: Arc<RecordStore>, blobs: Arc<BlobStore>, locks: Arc<DocLocks>) -> Self {
        Self {
            index,
            blobs,
            locks,
        }
    }

    /// Stores a thumbnail image and appends its entry to document `docid`.
    ///
    /// Returns the updated document record.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] — malformed `docid`
    /// - [`StoreError::NotFound`] — no document matches `{docid, username}`
    /// - [`StoreError::Files`] — thumbnail blob could not be written
    pub fn attach(
        &self,
        username: &str,
        docid: &str,
        descriptor: &ThumbnailDescriptor,
        file: UploadedFile,
    ) -> StoreResult<DocumentRecord> {
        let id = parse_doc_id(docid)?;

        let lock = self.locks.for_doc(username, &id.to_string());
        let _guard = hold(&lock);

        let stored = self
            .blobs
            .store(BlobKind::Thumbnail, username, BlobSource::File(&file.path))?;

        let entry = ThumbnailEntry {
            width: descriptor.width,
            height: descriptor.height,
            mimetype: descriptor.mimetype(),
            src: format!(
                "docs/{}/thumbnail/{}/version/{}/{}/{}/{}/thumbnail.jpg",
                username,
                id,
                descriptor.mime_type,
                descriptor.mime_subtype,
                descriptor.width,
                descriptor.height
            ),
            datapath: stored.path.display().to_string(),
        };

        let filter = Filter::new()
            .eq("id", id.to_string())
            .eq("username", username);
        let patch = Patch::new().push(
            "thumbnails",
            serde_json::to_value(&entry).map_err(StoreError::Serialization)?,
        );

        let Some(updated) = self.index.update(&filter, &patch)? else {
            tracing::warn!(username, id = %id, "thumbnail attach matched no document");
            return Err(StoreError::NotFound);
        };

        let record = decode_record(updated)?;
        tracing::info!(
            username,
            id = %id,
            width = descriptor.width,
            height = descriptor.height,
            count = record.thumbnails.len(),
            "attached thumbnail"
        );
        Ok(record)
    }

    /// Returns the first thumbnail of `docid` matching the given mimetype and
    /// dimensions.
    ///
    /// "First" is attach order, which is what makes a `src` URL stable: a
    /// later attach with the same dimensions does not change what the URL
    /// serves.
    pub fn find(
        &self,
        username: &str,
        docid: &str,
        descriptor: &ThumbnailDescriptor,
    ) -> StoreResult<ThumbnailEntry> {
        let id = parse_doc_id(docid)?;
        let record = load_scoped(&self.index, username, &id)?;

        let mimetype = descriptor.mimetype();
        record
            .thumbnails
            .into_iter()
            .find(|entry| {
                entry.mimetype == mimetype
                    && entry.width == descriptor.width
                    && entry.height == descriptor.height
            })
            .ok_or(StoreError::NotFound)
    }

    /// Reads the stored bytes of a thumbnail entry.
    pub fn read_entry(&self, entry: &ThumbnailEntry) -> StoreResult<Vec<u8>> {
        Ok(self.blobs.read(Path::new(&entry.datapath))?)
    }
}
