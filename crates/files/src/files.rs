//! Blob store implementation.

use crate::FilesError;
use chrono::{DateTime, Utc};
use docstore_uuid::StorageId;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Directory under the storage root holding document payloads.
const DATA_DIR_NAME: &str = "data";

/// Directory under the storage root holding thumbnail images.
const THUMBNAILS_DIR_NAME: &str = "thumbnails";

/// Which class of blob an operation targets.
///
/// The two classes share behaviour completely; they differ only in which
/// subtree of the storage root they land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    /// Document payloads (`data/<username>/`)
    Data,
    /// Thumbnail images (`thumbnails/<username>/`)
    Thumbnail,
}

impl BlobKind {
    fn dir_name(self) -> &'static str {
        match self {
            BlobKind::Data => DATA_DIR_NAME,
            BlobKind::Thumbnail => THUMBNAILS_DIR_NAME,
        }
    }
}

/// Where the bytes of a new blob come from.
#[derive(Debug)]
pub enum BlobSource<'a> {
    /// A file already on disk (an upload spooled to a temporary location).
    /// Stored by *moving* it into place — rename semantics, which assumes
    /// source and destination share a filesystem.
    File(&'a Path),
    /// Bytes in memory (a serialized JSON body).
    Bytes(&'a [u8]),
}

/// Metadata for a stored blob.
///
/// Returned by [`BlobStore::store`] so callers can record where the payload
/// landed and log what was written, without re-reading the file.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct StoredBlob {
    /// The random identifier the blob was stored under
    pub id: StorageId,

    /// Absolute path of the stored blob
    pub path: PathBuf,

    /// Size of the stored payload in bytes
    pub size_bytes: u64,

    /// Hexadecimal SHA-256 digest of the payload
    pub sha256: String,

    /// Detected media type, if any
    ///
    /// Best-effort detection from the payload bytes; not authoritative.
    pub media_type: Option<String>,

    /// UTC timestamp when the blob was stored
    pub stored_at: DateTime<Utc>,
}

/// Service for storing and retrieving opaque byte payloads.
///
/// The store is scoped to a single storage root, validated and canonicalised
/// at construction. It creates per-user directories lazily and never deletes
/// anything.
#[derive(Debug)]
pub struct BlobStore {
    /// Canonicalised storage root
    root: PathBuf,
}

impl BlobStore {
    /// Creates a `BlobStore` over `root`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRoot`] if `root` does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root: &Path) -> Result<Self, FilesError> {
        if !root.exists() {
            return Err(FilesError::InvalidRoot(format!(
                "directory does not exist: {}",
                root.display()
            )));
        }

        if !root.is_dir() {
            return Err(FilesError::InvalidRoot(format!(
                "path is not a directory: {}",
                root.display()
            )));
        }

        let root = root.canonicalize().map_err(|e| {
            FilesError::InvalidRoot(format!(
                "cannot canonicalize path {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    /// Idempotent recursive directory create.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::DirCreation`] on a permission or filesystem
    /// error; an already-existing directory is a no-op.
    pub fn ensure_directory(&self, path: &Path) -> Result<(), FilesError> {
        fs::create_dir_all(path).map_err(FilesError::DirCreation)
    }

    /// Stores a new blob for `username` and returns its metadata.
    ///
    /// Allocates a fresh random identifier, ensures the per-user directory
    /// exists, then either moves the source file into place (rename
    /// semantics) or writes the given bytes. The destination is
    /// `<root>/<data|thumbnails>/<username>/<id>`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] for an unsafe username,
    /// [`FilesError::DirCreation`] when the per-user directory cannot be
    /// created, and [`FilesError::Move`]/[`FilesError::Write`] when the
    /// payload cannot be placed (including a rename across filesystems or a
    /// vanished source).
    pub fn store(
        &self,
        kind: BlobKind,
        username: &str,
        source: BlobSource<'_>,
    ) -> Result<StoredBlob, FilesError> {
        let dir = self.user_dir(kind, username)?;
        self.ensure_directory(&dir)?;

        let (id, dest) = allocate_blob_path(&dir)?;

        let (size_bytes, sha256, media_type) = match source {
            BlobSource::File(temp) => {
                fs::rename(temp, &dest).map_err(FilesError::Move)?;
                let bytes = fs::read(&dest).map_err(FilesError::Read)?;
                (bytes.len() as u64, content_digest(&bytes), detect(&bytes))
            }
            BlobSource::Bytes(bytes) => {
                fs::write(&dest, bytes).map_err(FilesError::Write)?;
                (bytes.len() as u64, content_digest(bytes), detect(bytes))
            }
        };

        tracing::debug!(
            id = %id,
            path = %dest.display(),
            size_bytes,
            "stored blob"
        );

        Ok(StoredBlob {
            id,
            path: dest,
            size_bytes,
            sha256,
            media_type,
            stored_at: Utc::now(),
        })
    }

    /// Reads a stored blob back as bytes.
    ///
    /// The path must resolve inside the storage root; anything else is
    /// rejected even if a file exists there.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::NotFound`] when no blob exists at `path`,
    /// [`FilesError::InvalidPath`] when the path escapes the storage root,
    /// and [`FilesError::Read`] on I/O failure.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>, FilesError> {
        let resolved = match path.canonicalize() {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FilesError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(FilesError::Read(e)),
        };

        if !resolved.starts_with(&self.root) {
            return Err(FilesError::InvalidPath(format!(
                "blob path escapes storage root: {}",
                path.display()
            )));
        }

        fs::read(&resolved).map_err(FilesError::Read)
    }

    /// Returns the per-user blob directory for `kind`, validating `username`.
    ///
    /// Usernames become path components, so anything that could traverse or
    /// alias (separators, empty, dot-prefixed) is rejected here rather than
    /// relying on callers.
    pub fn user_dir(&self, kind: BlobKind, username: &str) -> Result<PathBuf, FilesError> {
        if username.is_empty()
            || username.starts_with('.')
            || username.contains('/')
            || username.contains('\\')
            || username.contains('\0')
        {
            return Err(FilesError::InvalidPath(format!(
                "unsafe username for blob path: '{}'",
                username
            )));
        }
        Ok(self.root.join(kind.dir_name()).join(username))
    }

    /// Returns the canonicalised storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Hexadecimal SHA-256 digest of `bytes`.
///
/// Used for stored-blob metadata and for payload ETags at the HTTP layer.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn detect(bytes: &[u8]) -> Option<String> {
    infer::get(bytes).map(|kind| kind.mime_type().to_string())
}

/// Picks a fresh random file name inside `dir` that does not collide.
///
/// Random ids make collisions vanishingly rare, but they are cheap to guard
/// against; bail out rather than loop forever if the filesystem disagrees
/// repeatedly.
fn allocate_blob_path(dir: &Path) -> Result<(StorageId, PathBuf), FilesError> {
    for _attempt in 0..5 {
        let id = StorageId::new();
        let candidate = dir.join(id.to_string());
        if !candidate.exists() {
            return Ok((id, candidate));
        }
    }

    Err(FilesError::Write(std::io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate a unique blob path after 5 attempts",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_over(temp: &TempDir) -> BlobStore {
        BlobStore::new(temp.path()).unwrap()
    }

    #[test]
    fn test_new_requires_existing_directory() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");

        let result = BlobStore::new(&missing);
        assert!(matches!(result, Err(FilesError::InvalidRoot(_))));
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("root.txt");
        fs::write(&file, "not a directory").unwrap();

        let result = BlobStore::new(&file);
        assert!(matches!(result, Err(FilesError::InvalidRoot(_))));
    }

    #[test]
    fn test_store_bytes_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let blob = store
            .store(BlobKind::Data, "user1", BlobSource::Bytes(b"{\"foo\":\"bar\"}"))
            .unwrap();

        assert_eq!(blob.size_bytes, 13);
        assert!(blob.path.starts_with(temp.path().canonicalize().unwrap()));
        assert!(blob
            .path
            .parent()
            .unwrap()
            .ends_with(Path::new("data").join("user1")));

        let bytes = store.read(&blob.path).unwrap();
        assert_eq!(bytes, b"{\"foo\":\"bar\"}");
    }

    #[test]
    fn test_store_file_moves_source() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let source = temp.path().join("upload.tmp");
        fs::write(&source, b"payload bytes").unwrap();

        let blob = store
            .store(BlobKind::Data, "user1", BlobSource::File(&source))
            .unwrap();

        // moved, not copied
        assert!(!source.exists());
        assert_eq!(store.read(&blob.path).unwrap(), b"payload bytes");
        assert_eq!(blob.size_bytes, 13);
    }

    #[test]
    fn test_store_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let result = store.store(
            BlobKind::Data,
            "user1",
            BlobSource::File(Path::new("/non-existent/upload.tmp")),
        );
        assert!(matches!(result, Err(FilesError::Move(_))));
    }

    #[test]
    fn test_thumbnail_blobs_live_apart_from_data() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let data = store
            .store(BlobKind::Data, "user1", BlobSource::Bytes(b"d"))
            .unwrap();
        let thumb = store
            .store(BlobKind::Thumbnail, "user1", BlobSource::Bytes(b"t"))
            .unwrap();

        assert!(data.path.to_string_lossy().contains("/data/user1/"));
        assert!(thumb.path.to_string_lossy().contains("/thumbnails/user1/"));
    }

    #[test]
    fn test_users_are_isolated() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let a = store
            .store(BlobKind::Data, "user1", BlobSource::Bytes(b"a"))
            .unwrap();
        let b = store
            .store(BlobKind::Data, "user2", BlobSource::Bytes(b"b"))
            .unwrap();

        assert_ne!(a.path.parent(), b.path.parent());
    }

    #[test]
    fn test_store_detects_media_type() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let blob = store
            .store(BlobKind::Thumbnail, "user1", BlobSource::Bytes(&png_header))
            .unwrap();

        assert_eq!(blob.media_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_store_plain_text_has_no_media_type() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let blob = store
            .store(BlobKind::Data, "user1", BlobSource::Bytes(b"{\"a\":1}"))
            .unwrap();
        assert_eq!(blob.media_type, None);
    }

    #[test]
    fn test_digest_matches_content() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let blob = store
            .store(BlobKind::Data, "user1", BlobSource::Bytes(b"hello"))
            .unwrap();

        assert_eq!(blob.sha256, content_digest(b"hello"));
        assert_eq!(blob.sha256.len(), 64);
    }

    #[test]
    fn test_fresh_ids_per_store() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let a = store
            .store(BlobKind::Data, "user1", BlobSource::Bytes(b"same"))
            .unwrap();
        let b = store
            .store(BlobKind::Data, "user1", BlobSource::Bytes(b"same"))
            .unwrap();

        // identical content still gets distinct blobs
        assert_ne!(a.id, b.id);
        assert_ne!(a.path, b.path);
    }

    #[test]
    fn test_read_missing_blob() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let result = store.read(&temp.path().join("data/user1/deadbeef"));
        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }

    #[test]
    fn test_read_rejects_path_outside_root() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let store = store_over(&temp);

        let stray = outside.path().join("stray");
        fs::write(&stray, b"outside").unwrap();

        let result = store.read(&stray);
        assert!(matches!(result, Err(FilesError::InvalidPath(_))));
    }

    #[test]
    fn test_unsafe_usernames_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        for bad in ["", "../user1", "a/b", ".hidden"] {
            let result = store.store(BlobKind::Data, bad, BlobSource::Bytes(b"x"));
            assert!(
                matches!(result, Err(FilesError::InvalidPath(_))),
                "username '{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_stored_blob_serializes() {
        let temp = TempDir::new().unwrap();
        let store = store_over(&temp);

        let blob = store
            .store(BlobKind::Data, "user1", BlobSource::Bytes(b"x"))
            .unwrap();

        let json = serde_json::to_string(&blob).unwrap();
        assert!(json.contains("sha256"));
        assert!(json.contains("stored_at"));
    }
}
