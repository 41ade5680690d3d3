//! HTTP surface.
//!
//! - `POST /idea-capture` – multipart form with `typed_input` (founder notes)
//!   and `file` (the pitch PDF). Returns the [`InsightRecord`] as JSON, or
//!   `{"error": "..."}` with a 4xx/5xx status.
//! - `GET /health` – always `{"status":"healthy"}`.
//!
//! | Failure | Status |
//! |---------|--------|
//! | missing/empty field, malformed form, document error | 400 |
//! | upload larger than `max_upload_bytes` | 413 |
//! | model endpoint failure | 502 |
//! | model timeout | 504 |
//! | anything else | 500 |
//!
//! Transport and internal failures carry a generic message; the detail goes
//! to the log only.
//!
//! [`InsightRecord`]: crate::output::InsightRecord

use crate::capture::IdeaCapture;
use crate::error::{CaptureError, ErrorKind};
use crate::output::InsightRecord;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Multipart field carrying the founder notes.
pub const NOTES_FIELD: &str = "typed_input";

/// Multipart field carrying the PDF.
pub const FILE_FIELD: &str = "file";

/// Room for multipart boundaries and the notes field on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the router. `capture` is shared by every request.
pub fn create_router(capture: Arc<IdeaCapture>) -> Router {
    let body_limit = capture.config().max_upload_bytes + FORM_OVERHEAD_BYTES;
    Router::new()
        .route("/idea-capture", post(capture_idea))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(capture)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(capture: Arc<IdeaCapture>, addr: SocketAddr) -> std::io::Result<()> {
    let app = create_router(capture);
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn capture_idea(
    State(capture): State<Arc<IdeaCapture>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<InsightRecord>, ApiError> {
    let form = read_form(multipart?, capture.config().max_upload_bytes).await?;
    info!(
        notes_chars = form.notes.chars().count(),
        file_bytes = form.file.len(),
        "Idea capture request"
    );

    let output = capture.analyze_bytes(&form.notes, &form.file).await?;
    Ok(Json(output.record))
}

struct CaptureForm {
    notes: String,
    file: Vec<u8>,
}

async fn read_form(mut multipart: Multipart, max_file_bytes: usize) -> Result<CaptureForm, ApiError> {
    let mut notes: Option<String> = None;
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(ApiError::from_multipart)? {
        match field.name() {
            Some(NOTES_FIELD) => {
                notes = Some(field.text().await.map_err(ApiError::from_multipart)?);
            }
            Some(FILE_FIELD) => {
                let bytes = field.bytes().await.map_err(ApiError::from_multipart)?;
                if bytes.len() > max_file_bytes {
                    return Err(ApiError::too_large(max_file_bytes));
                }
                file = Some(bytes.to_vec());
            }
            other => {
                warn!("Ignoring unexpected form field {:?}", other);
            }
        }
    }

    let notes = notes
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Missing '{NOTES_FIELD}' field")))?;
    let file = file
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Missing '{FILE_FIELD}' field")))?;

    Ok(CaptureForm { notes, file })
}

/// An error body `{"error": message}` with its status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn too_large(limit: usize) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: format!("Uploaded file exceeds {} bytes", limit),
        }
    }

    fn from_multipart(e: axum::extract::multipart::MultipartError) -> Self {
        let status = e.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Self {
                status,
                message: "Upload too large".to_string(),
            };
        }
        Self::bad_request(format!("Malformed form: {}", e.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<CaptureError> for ApiError {
    fn from(e: CaptureError) -> Self {
        let status = match (e.kind(), &e) {
            (ErrorKind::DocumentFormat, _) => StatusCode::BAD_REQUEST,
            (_, CaptureError::ModelTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            (ErrorKind::Transport, _) => StatusCode::BAD_GATEWAY,
            (ErrorKind::Internal, _) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Analysis failed: {}", e);
        } else {
            warn!("Rejected upload: {}", e);
        }
        Self {
            status,
            message: e.public_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
