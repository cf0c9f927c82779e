use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use data_model::MetadataRecord;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::coordinator::CoordinatorError;

#[derive(Debug, ToSchema, Serialize, Deserialize)]
pub struct BlobgateAPIError {
    #[serde(skip)]
    status_code: StatusCode,
    message: String,
}

impl BlobgateAPIError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl IntoResponse for BlobgateAPIError {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            error!("API Error: {} - {}", self.status_code, self.message);
        } else {
            warn!("API Error: {} - {}", self.status_code, self.message);
        }
        (self.status_code, Json(self)).into_response()
    }
}

impl From<CoordinatorError> for BlobgateAPIError {
    fn from(err: CoordinatorError) -> Self {
        let status_code = match &err {
            CoordinatorError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoordinatorError::BackendUnavailable {
                retryable: true, ..
            } => StatusCode::SERVICE_UNAVAILABLE,
            CoordinatorError::BackendUnavailable {
                retryable: false, ..
            } => StatusCode::BAD_GATEWAY,
            CoordinatorError::MetadataUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            CoordinatorError::Conflict { .. } => StatusCode::CONFLICT,
            CoordinatorError::InternalInconsistency { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // The coordinator's messages only carry the key, the backend name and
        // a stable error kind.
        Self::new(status_code, &err.to_string())
    }
}

/// Body of `POST /v1/{backend}/blobs`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateBlobRequest {
    /// Generated when omitted.
    #[serde(default)]
    pub id: Option<String>,
    /// Standard base64 with padding.
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BlobCreated {
    pub id: String,
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub backend: String,
}

impl From<MetadataRecord> for BlobCreated {
    fn from(record: MetadataRecord) -> Self {
        Self {
            id: record.id,
            size: record.size,
            timestamp: record.timestamp,
            backend: record.backend.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BlobPayload {
    pub id: String,
    /// Standard base64 with padding.
    pub data: String,
    pub size: u64,
    pub timestamp: u64,
    pub backend: String,
}

impl BlobPayload {
    pub fn new(record: MetadataRecord, data: String) -> Self {
        Self {
            id: record.id,
            data,
            size: record.size,
            timestamp: record.timestamp,
            backend: record.backend.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub ok: bool,
    /// Configured backends.
    pub backends: Vec<String>,
}
