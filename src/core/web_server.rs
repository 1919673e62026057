//! HTTP API for metadata lookups, downloads and status polling.
//!
//! Every route is served both at the root and under `/api`. Errors are JSON
//! objects of the form `{"error": "..."}`.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;

use crate::core::config;
use crate::core::error::AppError;
use crate::core::metrics;
use crate::core::utils::content_disposition;
use crate::download::config_space::{MediaKind, Quality};
use crate::download::service::DownloadService;
use crate::download::stream::content_type_for;

/// Shared state for the web server.
#[derive(Clone)]
struct WebState {
    service: Arc<DownloadService>,
}

#[derive(Debug, Default, Deserialize)]
struct InfoRequest {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadRequest {
    #[serde(default)]
    url: String,
    #[serde(default)]
    format: MediaKind,
    #[serde(default)]
    quality: Quality,
}

/// JSON error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(message) => Self::bad_request(message),
            AppError::Extraction(summary) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, summary),
            other => {
                log::error!("Request failed ({}): {}", other.category(), other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Builds the router; used by the server and by tests.
pub fn router(service: Arc<DownloadService>) -> Router {
    let api = Router::new()
        .route("/info", post(info_handler))
        .route("/download", post(download_handler))
        .route("/download-stream", post(download_stream_handler))
        .route("/status/{status_key}", get(status_handler))
        .route("/downloads", get(list_downloads_handler))
        .route("/downloads/{filename}", get(stored_file_handler))
        .route("/download-file/{filename}", get(stored_file_handler));

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(WebState { service })
}

/// Start the HTTP server and the status sweeper.
pub async fn start_web_server(port: u16, service: Arc<DownloadService>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let sweeper = Arc::clone(service.tracker()).spawn_sweeper(config::status::sweep_interval());
    let app = router(service);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  POST /info             - Video metadata");
    log::info!("  POST /download         - Background download, returns statusKey");
    log::info!("  POST /download-stream  - Download and stream the file");
    log::info!("  GET  /status/{{key}}     - Download progress");
    log::info!("  GET  /downloads        - Stored files");
    log::info!("  GET  /download-file/{{name}} - One stored file");
    log::info!("  GET  /metrics          - Prometheus metrics");

    let listener = TcpListener::bind(&addr).await?;
    let result = axum::serve(listener, app).await;
    sweeper.abort();
    result?;

    Ok(())
}

/// Records the route/status pair and passes the response through.
fn finish(route: &str, response: Response) -> Response {
    metrics::record_request(route, response.status().as_u16());
    response
}

/// Parses a JSON body; an empty body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

/// POST /info
async fn info_handler(State(state): State<WebState>, body: Bytes) -> Response {
    let result = async {
        let request: InfoRequest = parse_body(&body)?;
        let info = state.service.info(&request.url).await?;
        Ok::<_, ApiError>(Json(info))
    }
    .await;
    finish("info", result.into_response())
}

/// POST /download
async fn download_handler(State(state): State<WebState>, body: Bytes) -> Response {
    let result = async {
        let request: DownloadRequest = parse_body(&body)?;
        let key = state
            .service
            .start_download(&request.url, request.format, request.quality)
            .await?;
        Ok::<_, ApiError>(Json(json!({ "statusKey": key })))
    }
    .await;
    finish("download", result.into_response())
}

/// POST /download-stream
async fn download_stream_handler(State(state): State<WebState>, body: Bytes) -> Response {
    let result = async {
        let request: DownloadRequest = parse_body(&body)?;
        let stream = state
            .service
            .download_for_streaming(&request.url, request.format, request.quality)
            .await?;

        let headers = [
            (CONTENT_TYPE, stream.content_type().to_string()),
            (CONTENT_LENGTH, stream.content_length().to_string()),
            (CONTENT_DISPOSITION, content_disposition(stream.file_name())),
        ];
        Ok::<_, ApiError>((headers, Body::from_stream(stream)))
    }
    .await;
    finish("download_stream", result.into_response())
}

/// GET /status/{status_key}
async fn status_handler(Path(status_key): Path<String>, State(state): State<WebState>) -> Response {
    let response = match state.service.status(&status_key) {
        Some(status) => Json(status).into_response(),
        None => ApiError::not_found("Status not found").into_response(),
    };
    finish("status", response)
}

/// GET /downloads
async fn list_downloads_handler(State(state): State<WebState>) -> Response {
    let response = match state.service.list_downloads().await {
        Ok(files) => Json(json!({ "files": files })).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    };
    finish("downloads", response)
}

/// GET /downloads/{filename}
async fn stored_file_handler(Path(filename): Path<String>, State(state): State<WebState>) -> Response {
    let Some(path) = state.service.resolve_download(&filename) else {
        return finish("stored_file", ApiError::not_found("File not found").into_response());
    };

    let result = async {
        let file = tokio::fs::File::open(&path).await.map_err(AppError::from)?;
        let len = file.metadata().await.map_err(AppError::from)?.len();
        let headers = [
            (CONTENT_TYPE, content_type_for(&path).to_string()),
            (CONTENT_LENGTH, len.to_string()),
            (CONTENT_DISPOSITION, content_disposition(&filename)),
        ];
        Ok::<_, ApiError>((headers, Body::from_stream(ReaderStream::new(file))))
    }
    .await;
    finish("stored_file", result.into_response())
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /metrics
async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (StatusCode::OK, [(CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}
