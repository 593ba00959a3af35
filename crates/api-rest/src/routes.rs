//! Request handlers.
//!
//! Every protected handler runs the same gate first: resolve the
//! `access-key` header to a session, then check the caller against the
//! username in the path. Storage work is delegated to the core services;
//! their errors convert into the failure envelope via [`ApiError`].

use crate::objects::{
    ApiError, DeleteRes, FailRes, HealthRes, InfoRes, SearchParams, SearchRes, TestLoginRes,
    UploadParams, UploadRes,
};
use crate::AppState;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::header::{CONTENT_TYPE, ETAG};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Json, Response};
use docstore_core::{
    authorize_request, content_digest, SearchFilters, ThumbnailDescriptor, UploadOptions,
    UploadPayload, UploadedFile,
};
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use tempfile::{NamedTempFile, TempPath};

/// Path segments of the thumbnail routes.
///
/// `width`/`height` stay strings here; the core parses and validates them so
/// malformed values become proper validation failures instead of routing
/// rejections.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Path)]
pub struct ThumbnailPath {
    pub username: String,
    pub docid: String,
    pub version: String,
    pub mtype: String,
    pub msubtype: String,
    pub width: String,
    pub height: String,
    pub filename: String,
}

/// Plain index page.
pub async fn index() -> &'static str {
    "this is the index page"
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "docstore is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/auth/test/{username}",
    responses(
        (status = 200, description = "Issued test session token", body = TestLoginRes),
        (status = 403, description = "Test auth is disabled", body = FailRes)
    )
)]
/// Issue a test-mode session token
///
/// Only available when the server runs with test auth enabled; production
/// deployments authenticate through an external identity provider instead.
#[axum::debug_handler]
pub async fn test_login(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<TestLoginRes>, ApiError> {
    if !state.cfg.test_auth() {
        return Err(ApiError::forbidden("test auth is disabled"));
    }

    let access_key = state.sessions.issue(&username);
    Ok(Json(TestLoginRes { access_key }))
}

#[utoipa::path(
    post,
    path = "/docs/{username}/upload",
    responses(
        (status = 200, description = "Created or replaced document", body = UploadRes),
        (status = 400, description = "Invalid upload", body = FailRes),
        (status = 404, description = "No document with the given id", body = FailRes)
    )
)]
/// Upload a document payload
///
/// Accepts either a JSON body or a multipart form with a field named
/// `file`. Without an `id` query parameter a new document is created; with
/// one, the named document's payload is replaced in place.
#[axum::debug_handler]
pub async fn upload_doc(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    request: Request,
) -> Result<Json<UploadRes>, ApiError> {
    let user = authorize(&state, &headers, &username)?;

    let opts = UploadOptions {
        id: params.id,
        doc_type: params.doc_type,
        title: params.title,
        filename: params.filename,
        mimetype: params.mimetype,
    };

    let doc = if is_multipart(&headers) {
        let (file, _spool) = spool_upload(
            &state,
            request,
            "file",
            "upload file should use multipart with a file named file",
        )
        .await?;
        state
            .documents
            .create_or_replace(&user, &opts, UploadPayload::File(file))?
    } else {
        let Json(body) = Json::<Value>::from_request(request, &())
            .await
            .map_err(|e| ApiError::validation(format!("invalid JSON body: {}", e)))?;
        state
            .documents
            .create_or_replace(&user, &opts, UploadPayload::Json(body))?
    };

    Ok(Json(UploadRes { success: true, doc }))
}

#[utoipa::path(
    get,
    path = "/docs/{username}/search",
    responses(
        (status = 200, description = "Matching documents", body = SearchRes),
        (status = 401, description = "Missing or invalid access token", body = FailRes),
        (status = 403, description = "Caller does not own this path", body = FailRes)
    )
)]
/// Search a user's documents
///
/// Equality filters only; omitted parameters are unconstrained, so an empty
/// query returns all of the user's documents.
#[axum::debug_handler]
pub async fn search_docs(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Json<SearchRes>, ApiError> {
    let user = authorize(&state, &headers, &username)?;

    let results = state.documents.search(&user, &filters_from(params))?;
    Ok(Json(SearchRes {
        success: true,
        results,
    }))
}

#[utoipa::path(
    post,
    path = "/docs/{username}/delete",
    responses(
        (status = 200, description = "Deleted matching documents", body = DeleteRes)
    )
)]
/// Delete a user's documents matching the query filters
///
/// Returns the number of removed documents; removing zero is not an error.
#[axum::debug_handler]
pub async fn delete_docs(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Json<DeleteRes>, ApiError> {
    let user = authorize(&state, &headers, &username)?;

    let docs = state.documents.delete(&user, &filters_from(params))?;
    Ok(Json(DeleteRes {
        success: true,
        docs,
    }))
}

#[utoipa::path(
    get,
    path = "/docs/{username}/data/{docid}/latest/{mtype}/{msubtype}/{filename}",
    responses(
        (status = 200, description = "Current payload bytes"),
        (status = 404, description = "No such document", body = FailRes)
    )
)]
/// Fetch a document's current payload
///
/// Open to unauthenticated callers but scoped to the path user: a guessed id
/// under the wrong username resolves to nothing. The record's mimetype, when
/// present, becomes the response content type.
#[axum::debug_handler]
pub async fn fetch_data(
    State(state): State<AppState>,
    Path((username, docid, _mtype, _msubtype, _filename)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
) -> Result<Response, ApiError> {
    let (record, bytes) = state.documents.open_payload(&username, &docid)?;
    payload_response(record.mimetype.as_deref(), bytes)
}

#[utoipa::path(
    get,
    path = "/docs/{username}/info/{docid}/{version}",
    responses(
        (status = 200, description = "Document metadata", body = InfoRes),
        (status = 404, description = "No such document", body = FailRes)
    )
)]
/// Fetch a document's metadata record
#[axum::debug_handler]
pub async fn doc_info(
    State(state): State<AppState>,
    Path((username, docid, _version)): Path<(String, String, String)>,
) -> Result<Json<InfoRes>, ApiError> {
    let doc = state.documents.load(&username, &docid)?;
    Ok(Json(InfoRes { doc }))
}

#[utoipa::path(
    post,
    path = "/docs/{username}/thumbnail/{docid}/{version}/{mtype}/{msubtype}/{width}/{height}/{filename}",
    responses(
        (status = 200, description = "Updated document", body = UploadRes),
        (status = 400, description = "Missing or malformed thumbnail upload", body = FailRes),
        (status = 404, description = "No such document", body = FailRes)
    )
)]
/// Attach a thumbnail to a document
///
/// Requires a multipart form with a field named `thumbnail`. Each call
/// appends an entry to the document's thumbnail collection; repeated
/// dimensions append again rather than replacing.
#[axum::debug_handler]
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(path): Path<ThumbnailPath>,
    headers: HeaderMap,
    request: Request,
) -> Result<Json<UploadRes>, ApiError> {
    let user = authorize(&state, &headers, &path.username)?;

    if !is_multipart(&headers) {
        return Err(ApiError::validation("no image attached to upload"));
    }

    let descriptor =
        ThumbnailDescriptor::parse(&path.width, &path.height, &path.mtype, &path.msubtype)?;

    let (file, _spool) = spool_upload(
        &state,
        request,
        "thumbnail",
        "upload file should use multipart with a file named thumbnail",
    )
    .await?;

    let doc = state
        .thumbnails
        .attach(&user, &path.docid, &descriptor, file)?;
    Ok(Json(UploadRes { success: true, doc }))
}

#[utoipa::path(
    get,
    path = "/docs/{username}/thumbnail/{docid}/{version}/{mtype}/{msubtype}/{width}/{height}/{filename}",
    responses(
        (status = 200, description = "Thumbnail bytes"),
        (status = 404, description = "No matching thumbnail", body = FailRes)
    )
)]
/// Fetch a previously attached thumbnail
///
/// Serves the first thumbnail whose mimetype and dimensions match the path —
/// the same entry a persisted `src` URL was minted for.
#[axum::debug_handler]
pub async fn fetch_thumbnail(
    State(state): State<AppState>,
    Path(path): Path<ThumbnailPath>,
) -> Result<Response, ApiError> {
    let descriptor =
        ThumbnailDescriptor::parse(&path.width, &path.height, &path.mtype, &path.msubtype)?;

    let entry = state
        .thumbnails
        .find(&path.username, &path.docid, &descriptor)?;
    let bytes = state.thumbnails.read_entry(&entry)?;
    payload_response(Some(&entry.mimetype), bytes)
}

/// Runs the auth gate for a protected route.
fn authorize(state: &AppState, headers: &HeaderMap, path_username: &str) -> Result<String, ApiError> {
    let token = headers.get("access-key").and_then(|v| v.to_str().ok());
    Ok(authorize_request(
        &state.cfg,
        &state.sessions,
        token,
        path_username,
    )?)
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/"))
        .unwrap_or(false)
}

fn filters_from(params: SearchParams) -> SearchFilters {
    SearchFilters {
        doc_type: params.doc_type,
        mimetype: params.mimetype,
        title: params.title,
        extension: params.extension,
    }
}

/// Reads the named multipart file field and spools it to a temporary file
/// inside the storage root.
///
/// Spooling into the storage root keeps the later rename within one
/// filesystem. The returned [`TempPath`] guard removes the spool file if the
/// upload is never consumed; once the blob store has moved it, the guard's
/// cleanup finds nothing and does nothing.
async fn spool_upload(
    state: &AppState,
    request: Request,
    field_name: &str,
    missing_message: &str,
) -> Result<(UploadedFile, TempPath), ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart request: {}", e)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart field: {}", e)))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("failed to read upload: {}", e)))?;

        let spool = NamedTempFile::new_in(state.cfg.storage_root()).map_err(|e| {
            tracing::error!("failed to create upload spool file: {}", e);
            ApiError::internal()
        })?;
        spool.as_file().write_all(&bytes).map_err(|e| {
            tracing::error!("failed to write upload spool file: {}", e);
            ApiError::internal()
        })?;
        let spool = spool.into_temp_path();

        let file = UploadedFile {
            path: spool.to_path_buf(),
            name,
            content_type,
        };
        return Ok((file, spool));
    }

    Err(ApiError::validation(missing_message))
}

/// Builds a payload response with the record's content type (when known) and
/// a digest ETag.
fn payload_response(mimetype: Option<&str>, bytes: Vec<u8>) -> Result<Response, ApiError> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(ETAG, format!("\"{}\"", content_digest(&bytes)));
    if let Some(mimetype) = mimetype {
        builder = builder.header(CONTENT_TYPE, mimetype);
    }

    builder.body(Body::from(bytes)).map_err(|e| {
        tracing::error!("failed to build payload response: {}", e);
        ApiError::internal()
    })
}
