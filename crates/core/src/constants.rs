//! Shared constants for the docstore core.

/// Classification assigned to documents uploaded without an explicit type.
pub const DEFAULT_TYPE: &str = "unknown";

/// Title assigned to documents uploaded without an explicit title.
pub const DEFAULT_TITLE: &str = "untitled";

/// Mimetype recorded for JSON-body uploads.
pub const JSON_MIMETYPE: &str = "application/json";

/// Extension recorded for JSON-body uploads.
pub const JSON_EXTENSION: &str = "json";

/// File name of the metadata index within the storage root.
pub const DATABASE_FILE_NAME: &str = "database.db";

/// Prefix of issued session tokens.
pub const TOKEN_PREFIX: &str = "token-";
