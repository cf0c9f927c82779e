use std::{str::FromStr, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{Method, StatusCode},
    middleware,
    routing::{get, post},
    Json,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use data_model::BackendKind;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::debug;
use utoipa::OpenApi;

use crate::{
    auth::{require_bearer, TokenValidator},
    gateway::Gateway,
    http_objects::{BlobCreated, BlobPayload, BlobgateAPIError, CreateBlobRequest, HealthStatus},
    middleware::RequestSpan,
};

#[derive(OpenApi)]
#[openapi(
        paths(
            create_blob,
            get_blob,
            delete_blob,
            health,
        ),
        components(
            schemas(
                CreateBlobRequest,
                BlobCreated,
                BlobPayload,
                HealthStatus,
                BlobgateAPIError,
            )
        ),
        tags(
            (name = "blobgate", description = "Blob gateway API")
        )
    )]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub gateway: Arc<Gateway>,
    pub tokens: Arc<dyn TokenValidator>,
    pub max_body_bytes: usize,
    pub request_span: RequestSpan,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_origin(Any)
        .allow_headers(Any);

    let blobs = Router::new()
        .route("/v1/{backend}/blobs", post(create_blob))
        .route("/v1/{backend}/blobs/{*id}", get(get_blob).delete(delete_blob))
        .route_layer(middleware::from_fn_with_state(
            route_state.tokens.clone(),
            require_bearer,
        ))
        .with_state(route_state.clone());

    Router::new()
        .route("/health", get(health))
        .route("/docs/openapi.json", get(openapi_json))
        .with_state(route_state.clone())
        .merge(blobs)
        .layer(DefaultBodyLimit::max(route_state.max_body_bytes))
        .layer(TraceLayer::new_for_http().make_span_with(route_state.request_span))
        .layer(cors)
}

fn parse_backend(backend: &str) -> Result<BackendKind, BlobgateAPIError> {
    BackendKind::from_str(backend)
        .map_err(|_| BlobgateAPIError::not_found(&format!("unknown backend: {}", backend)))
}

/// Store a blob
#[utoipa::path(
    post,
    path = "/v1/{backend}/blobs",
    tag = "blobgate",
    params(("backend" = String, Path, description = "One of local, db, s3")),
    request_body = CreateBlobRequest,
    responses(
        (status = 201, description = "Blob stored", body = BlobCreated),
        (status = 400, description = "Invalid id or base64 payload", body = BlobgateAPIError),
        (status = 401, description = "Missing or invalid bearer token", body = BlobgateAPIError),
        (status = 404, description = "Unknown backend", body = BlobgateAPIError),
        (status = 409, description = "Blob already exists", body = BlobgateAPIError),
        (status = 413, description = "Body exceeds max_body_bytes", body = BlobgateAPIError),
        (status = 500, description = "Data and metadata disagree", body = BlobgateAPIError),
        (status = 502, description = "Backend rejected the request", body = BlobgateAPIError),
        (status = 503, description = "Backend or metadata store unavailable", body = BlobgateAPIError),
    ),
)]
async fn create_blob(
    Path(backend): Path<String>,
    State(state): State<RouteState>,
    payload: Result<Json<CreateBlobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BlobCreated>), BlobgateAPIError> {
    let backend = parse_backend(&backend)?;
    let Json(request) = payload.map_err(|err| {
        debug!("rejected create body: {}", err.body_text());
        match err.status() {
            StatusCode::PAYLOAD_TOO_LARGE => {
                BlobgateAPIError::new(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
            }
            _ => BlobgateAPIError::bad_request(
                "body must be a JSON object with a base64 string field `data`",
            ),
        }
    })?;
    let data = STANDARD
        .decode(request.data.as_bytes())
        .map_err(|_| BlobgateAPIError::bad_request("data is not valid base64"))?;

    let record = state
        .gateway
        .create_blob(backend, request.id, Bytes::from(data))
        .await?;
    Ok((StatusCode::CREATED, Json(BlobCreated::from(record))))
}

/// Fetch a blob
#[utoipa::path(
    get,
    path = "/v1/{backend}/blobs/{id}",
    tag = "blobgate",
    params(
        ("backend" = String, Path, description = "One of local, db, s3"),
        ("id" = String, Path, description = "Blob id"),
    ),
    responses(
        (status = 200, description = "Blob bytes and metadata", body = BlobPayload),
        (status = 401, description = "Missing or invalid bearer token", body = BlobgateAPIError),
        (status = 404, description = "Blob or backend not found", body = BlobgateAPIError),
        (status = 500, description = "Data and metadata disagree", body = BlobgateAPIError),
        (status = 503, description = "Backend or metadata store unavailable", body = BlobgateAPIError),
    ),
)]
async fn get_blob(
    Path((backend, id)): Path<(String, String)>,
    State(state): State<RouteState>,
) -> Result<Json<BlobPayload>, BlobgateAPIError> {
    let backend = parse_backend(&backend)?;
    let (record, data) = state.gateway.read_blob(backend, &id).await?;
    Ok(Json(BlobPayload::new(record, STANDARD.encode(&data))))
}

/// Delete a blob
#[utoipa::path(
    delete,
    path = "/v1/{backend}/blobs/{id}",
    tag = "blobgate",
    params(
        ("backend" = String, Path, description = "One of local, db, s3"),
        ("id" = String, Path, description = "Blob id"),
    ),
    responses(
        (status = 204, description = "Blob deleted"),
        (status = 401, description = "Missing or invalid bearer token", body = BlobgateAPIError),
        (status = 404, description = "Blob or backend not found", body = BlobgateAPIError),
        (status = 503, description = "Backend or metadata store unavailable", body = BlobgateAPIError),
    ),
)]
async fn delete_blob(
    Path((backend, id)): Path<(String, String)>,
    State(state): State<RouteState>,
) -> Result<StatusCode, BlobgateAPIError> {
    let backend = parse_backend(&backend)?;
    state.gateway.delete_blob(backend, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Liveness and configured backends
#[utoipa::path(
    get,
    path = "/health",
    tag = "blobgate",
    responses((status = 200, description = "Service is up", body = HealthStatus)),
)]
async fn health(State(state): State<RouteState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        ok: true,
        backends: state
            .gateway
            .backends()
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
