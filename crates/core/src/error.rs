use docstore_files::FilesError;
use docstore_index::IndexError;

/// The failure taxonomy of the document store.
///
/// Every operation surfaces one of these; the HTTP layer maps them onto
/// status codes and the `{success:false, message}` envelope. None of them is
/// fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Missing required input, malformed id, or an unparsable parameter
    #[error("invalid input: {0}")]
    Validation(String),

    /// No record matches the id + username scope
    #[error("doc not found")]
    NotFound,

    /// The access token does not resolve to a session
    #[error("invalid access token, cannot find user")]
    Unauthenticated,

    /// The authenticated user is not in the allowed-users list
    #[error("user not approved")]
    NotApproved,

    /// The authenticated user does not match the path user
    #[error("incorrect user")]
    Ownership,

    /// A JSON body could not be serialized into payload bytes
    #[error("failed to serialize document payload: {0}")]
    Serialization(serde_json::Error),

    /// A stored record no longer decodes as a document
    #[error("failed to decode document record: {0}")]
    RecordDecode(serde_json::Error),

    /// Blob store failure (directory creation, write, move, read)
    #[error(transparent)]
    Files(#[from] FilesError),

    /// Metadata index failure
    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
