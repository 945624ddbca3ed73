//! HTTP surface (feature `server`): auth endpoints for the viewer plus the
//! model upload/list/status routes.

pub mod logging;

use std::sync::Arc;

use axum::extract::{Multipart, Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use tracing::Instrument;

use crate::derivative::{TranslationStatus, urn_from_object_id};
use crate::{Aps, BridgeError, ObjectDetails};

const FIELD_MODEL_FILE: &str = "model-file";
const FIELD_ZIP_ENTRY: &str = "model-zip-entry";

#[derive(Clone)]
pub struct BridgeHttpState {
    aps: Arc<Aps>,
}

impl BridgeHttpState {
    pub fn new(aps: Aps) -> Self {
        Self { aps: Arc::new(aps) }
    }
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
struct HealthResponse {
    health: u8,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Serialize)]
struct ModelEntry {
    name: String,
    urn: String,
}

impl From<&ObjectDetails> for ModelEntry {
    fn from(object: &ObjectDetails) -> Self {
        Self {
            name: object.object_key.clone(),
            urn: urn_from_object_id(&object.object_id),
        }
    }
}

pub fn router(state: BridgeHttpState) -> Router {
    Router::new()
        .route("/api/auth/health", get(health))
        .route("/api/auth/token", get(public_token))
        .route("/api/models", get(list_models).post(upload_model))
        .route("/api/models/:urn/status", get(model_status))
        .fallback(handle_fallback)
        .layer(middleware::from_fn(request_span))
        .with_state(state)
}

async fn request_span(request: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        status = tracing::field::Empty,
    );
    async move {
        let response = next.run(request).await;
        tracing::Span::current().record("status", response.status().as_u16());
        tracing::debug!("request finished");
        response
    }
    .instrument(span)
    .await
}

fn error_response(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }),
    )
}

fn bridge_error(err: BridgeError) -> ApiError {
    let (status, code) = match &err {
        BridgeError::Auth(_) => (StatusCode::BAD_GATEWAY, "auth_failure"),
        BridgeError::Api { .. } | BridgeError::Http(_) => {
            (StatusCode::BAD_GATEWAY, "upstream_error")
        }
        BridgeError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        BridgeError::InvalidResponse(_) | BridgeError::Json(_) => {
            (StatusCode::BAD_GATEWAY, "invalid_upstream_response")
        }
        BridgeError::Io(_) | BridgeError::Config(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    error_response(status, code, err.to_string())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { health: 1 })
}

async fn public_token(
    State(state): State<BridgeHttpState>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.aps.public_token().await.map_err(bridge_error)?;
    let expires_in = token.expires_in_secs(state.aps.now());
    Ok(Json(TokenResponse {
        access_token: token.access_token,
        expires_in,
    }))
}

async fn list_models(
    State(state): State<BridgeHttpState>,
) -> Result<Json<Vec<ModelEntry>>, ApiError> {
    let objects = state.aps.list_objects().await.map_err(bridge_error)?;
    Ok(Json(objects.iter().map(ModelEntry::from).collect()))
}

async fn model_status(
    State(state): State<BridgeHttpState>,
    Path(urn): Path<String>,
) -> Result<Json<TranslationStatus>, ApiError> {
    let status = state
        .aps
        .translation_status(&urn)
        .await
        .map_err(bridge_error)?;
    Ok(Json(status))
}

/// Streams the `model-file` part straight into OSS, then starts the
/// translation (with `model-zip-entry` as root file when present).
async fn upload_model(
    State(state): State<BridgeHttpState>,
    mut multipart: Multipart,
) -> Result<Json<ModelEntry>, ApiError> {
    let invalid_form = |err: axum::extract::multipart::MultipartError| {
        error_response(StatusCode::BAD_REQUEST, "invalid_request", err.body_text())
    };

    let mut zip_entry: Option<String> = None;
    let mut uploaded: Option<ObjectDetails> = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(FIELD_ZIP_ENTRY) => {
                zip_entry = Some(field.text().await.map_err(invalid_form)?);
            }
            Some(FIELD_MODEL_FILE) => {
                let Some(name) = field
                    .file_name()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                else {
                    return Err(error_response(
                        StatusCode::BAD_REQUEST,
                        "invalid_request",
                        format!("{FIELD_MODEL_FILE} must carry a file name"),
                    ));
                };
                let body = Box::pin(field.map_err(|err| {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, err)
                }));
                let details = state
                    .aps
                    .upload_model(&name, StreamReader::new(body))
                    .await
                    .map_err(|err| bridge_error(form_stream_error(err)))?;
                uploaded = Some(details);
            }
            _ => {}
        }
    }

    let Some(object) = uploaded else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            format!("missing {FIELD_MODEL_FILE} part"),
        ));
    };
    state
        .aps
        .translate_model(&object.object_id, zip_entry.as_deref())
        .await
        .map_err(bridge_error)?;
    Ok(Json(ModelEntry::from(&object)))
}

/// A broken request body surfaces from the upload as `InvalidData` I/O; that
/// is the client's fault, not ours.
fn form_stream_error(err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Io(io) if io.kind() == std::io::ErrorKind::InvalidData => {
            BridgeError::InvalidInput(format!("{FIELD_MODEL_FILE} body is malformed: {io}"))
        }
        other => other,
    }
}

async fn handle_fallback() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "not_found", "no such route")
}
