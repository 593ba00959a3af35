//! Docstore REST API.
//!
//! The HTTP boundary of the document store: routing, the auth gate,
//! multipart intake, and response shaping. All storage semantics live in
//! `docstore-core`; handlers here authenticate the caller, translate the
//! request into a service call, and wrap the result in the response
//! envelope (`{success, ...}` on success, `{success:false, message}` on any
//! failure).

pub mod objects;
pub mod routes;


use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use docstore_core::{
    BlobStore, DocLocks, DocumentService, RecordStore, SessionStore, StoreConfig, StoreResult,
    ThumbnailService,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Maximum accepted request body: uploads larger than 20 MB are rejected.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across REST API handlers.
///
/// Holds the configuration, the session table, and the two storage-facing
/// services. Everything is behind `Arc`, so cloning the state per request is
/// cheap.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<StoreConfig>,
    pub sessions: Arc<SessionStore>,
    pub documents: DocumentService,
    pub thumbnails: ThumbnailService,
}

/// Opens the metadata index and blob store under the configured storage
/// root and assembles the application state.
///
/// # Errors
///
/// Fails when the storage root is unusable or the persisted index cannot be
/// loaded.
pub fn build_state(cfg: StoreConfig) -> StoreResult<AppState> {
    let cfg = Arc::new(cfg);
    let index = Arc::new(RecordStore::open(&cfg.database_path())?);
    let blobs = Arc::new(BlobStore::new(cfg.storage_root())?);
    let locks = Arc::new(DocLocks::new());

    Ok(AppState {
        cfg,
        sessions: Arc::new(SessionStore::new()),
        documents: DocumentService::new(index.clone(), blobs.clone(), locks.clone()),
        thumbnails: ThumbnailService::new(index, blobs, locks),
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health,
        routes::test_login,
        routes::upload_doc,
        routes::search_docs,
        routes::delete_docs,
        routes::fetch_data,
        routes::doc_info,
        routes::upload_thumbnail,
        routes::fetch_thumbnail,
    ),
    components(schemas(
        docstore_core::DocumentRecord,
        docstore_core::ThumbnailEntry,
        objects::HealthRes,
        objects::TestLoginRes,
        objects::UploadRes,
        objects::SearchRes,
        objects::InfoRes,
        objects::DeleteRes,
        objects::FailRes,
    ))
)]
struct ApiDoc;

/// Builds the docstore router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/auth/test/:username", post(routes::test_login))
        .route("/docs/:username/upload", post(routes::upload_doc))
        .route("/docs/:username/search", get(routes::search_docs))
        .route("/docs/:username/delete", post(routes::delete_docs))
        .route(
            "/docs/:username/data/:docid/latest/:mtype/:msubtype/:filename",
            get(routes::fetch_data),
        )
        .route("/docs/:username/info/:docid/:version", get(routes::doc_info))
        .route(
            "/docs/:username/thumbnail/:docid/:version/:mtype/:msubtype/:width/:height/:filename",
            post(routes::upload_thumbnail).get(routes::fetch_thumbnail),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the router until the process exits.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    tracing::info!("-- docstore REST API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Default storage root when `DOCSTORE_DIR` is not set.
pub const DEFAULT_STORAGE_DIR: &str = "docstore_data";

/// Resolves the store configuration from the environment, once, at startup.
///
/// Recognised variables: `DOCSTORE_DIR` (storage root; must exist),
/// `DOCSTORE_AUTH_ENABLED`, `DOCSTORE_TEST_AUTH` (booleans, `"true"`), and
/// `DOCSTORE_ALLOWED_USERS` (comma-separated).
pub fn config_from_env() -> anyhow::Result<StoreConfig> {
    let dir = std::env::var("DOCSTORE_DIR").unwrap_or_else(|_| DEFAULT_STORAGE_DIR.into());
    let root = std::path::Path::new(&dir);
    if !root.exists() {
        anyhow::bail!("storage directory does not exist: {}", root.display());
    }

    Ok(StoreConfig::new(
        root.to_path_buf(),
        docstore_core::config::bool_from_env_value(std::env::var("DOCSTORE_AUTH_ENABLED").ok()),
        docstore_core::config::bool_from_env_value(std::env::var("DOCSTORE_TEST_AUTH").ok()),
        docstore_core::config::users_from_env_value(std::env::var("DOCSTORE_ALLOWED_USERS").ok()),
    )?)
}
