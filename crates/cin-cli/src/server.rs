//! HTTP extraction service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use cin_core::{CinError, OcrError};

use crate::service::ExtractionService;

/// State shared across routes.
#[derive(Clone)]
pub struct AppState {
    service: Arc<ExtractionService>,
    timeout: Option<Duration>,
}

impl AppState {
    /// `timeout` of `None` means requests run to completion.
    pub fn new(service: ExtractionService, timeout: Option<Duration>) -> Self {
        Self {
            service: Arc::new(service),
            timeout,
        }
    }
}

/// Error body returned by every failing route.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

impl From<CinError> for ApiError {
    fn from(error: CinError) -> Self {
        let status = match &error {
            CinError::EmptyInput => StatusCode::UNPROCESSABLE_ENTITY,
            CinError::UpstreamOcr(OcrError::InvalidImage(_)) => StatusCode::BAD_REQUEST,
            CinError::UpstreamOcr(_) => StatusCode::BAD_GATEWAY,
            CinError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            CinError::Io(_) | CinError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::new(error.status(), error.body_text())
    }
}

/// Build the router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/extract", post(extract))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
    info!("CIN extraction service listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn service_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Morocco CIN OCR API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/extract": "POST - Extract CIN data from image",
            "/health": "GET - Service health",
        }
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Read the `file` field; it must be an image by content type or content.
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }

        let declared_image = content_type.as_deref().is_some_and(|c| c.starts_with("image/"));
        if !declared_image && image::guess_format(&bytes).is_err() {
            return Err(ApiError::bad_request("File must be an image"));
        }
        return Ok(bytes.to_vec());
    }

    Err(ApiError::bad_request("Missing multipart field 'file'"))
}

async fn extract(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    info!("Received {} byte upload", upload.len());

    let deadline = state.timeout.map(|limit| Instant::now() + limit);
    let work = state.service.extract(&upload, deadline);
    let result = match state.timeout {
        Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
            warn!("Extraction exceeded {:?}", limit);
            ApiError::new(StatusCode::GATEWAY_TIMEOUT, "extraction timed out")
        })?,
        None => work.await,
    };

    let result = result.map_err(|e| {
        warn!("Extraction failed: {}", e);
        ApiError::from(e)
    })?;

    info!(
        "Extracted {} fields from {} side",
        result.field_confidence.len(),
        result.record.side
    );
    Ok(Json(result.record).into_response())
}
