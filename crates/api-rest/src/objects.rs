//! Request parameters, response envelopes, and the API error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use docstore_core::{DocumentRecord, StoreError};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Test-mode login response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TestLoginRes {
    #[serde(rename = "access-key")]
    pub access_key: String,
}

/// Response to an upload or thumbnail attach.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadRes {
    pub success: bool,
    pub doc: DocumentRecord,
}

/// Response to a metadata search.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchRes {
    pub success: bool,
    pub results: Vec<DocumentRecord>,
}

/// Response to a document info lookup.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InfoRes {
    pub doc: DocumentRecord,
}

/// Response to a delete, carrying the number of removed documents.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteRes {
    pub success: bool,
    pub docs: usize,
}

/// The failure envelope every error response carries.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FailRes {
    pub success: bool,
    pub message: String,
}

/// Query parameters accepted by the upload endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadParams {
    /// Present → replace that document's payload
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub title: Option<String>,
    pub filename: Option<String>,
    pub mimetype: Option<String>,
}

/// Query parameters accepted by search and delete.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub mimetype: Option<String>,
    pub title: Option<String>,
    pub extension: Option<String>,
}

/// A failed request: a status code plus the failure envelope.
///
/// Construction goes through [`From<StoreError>`] for service failures, or
/// the named constructors for failures detected at the HTTP layer.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::Validation(_) => StatusCode::BAD_REQUEST,
            StoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
            StoreError::NotApproved | StoreError::Ownership => StatusCode::FORBIDDEN,
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Serialization(_)
            | StoreError::RecordDecode(_)
            | StoreError::Files(_)
            | StoreError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:?}", err);
            return Self::internal();
        }

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(FailRes {
                success: false,
                message: self.message,
            }),
        )
            .into_response()
    }
}
