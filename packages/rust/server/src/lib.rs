//! HTTP boundary for InsightFlow.
//!
//! - `GET /health` returns a static status payload.
//! - `POST /analyze-file` takes a multipart upload in the `file` field, runs
//!   the pipeline on it and returns the result record as JSON.
//!
//! The orchestrator is shared across requests; each request still gets its
//! own session context because [`Orchestrator::run`] opens one per call.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{error, info, warn};

use insightflow_core::{CsvSource, Orchestrator};

/// Multipart field carrying the CSV upload.
const FILE_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error response: a status code plus `{"error": message}`.
#[derive(Debug)]
struct ApiError {
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

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Build the API router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze-file", post(analyze_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(
    addr: SocketAddr,
    max_upload_bytes: usize,
    orchestrator: Orchestrator,
) -> std::io::Result<()> {
    let app = router(AppState::new(orchestrator), max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "InsightFlow API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        name: "InsightFlow API",
    })
}

async fn analyze_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let missing_file = || ApiError::bad_request("Please upload a CSV file as 'file'");

    let mut multipart = multipart.map_err(|_| missing_file())?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.csv").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
        upload = Some(CsvSource::Bytes {
            name,
            data: data.to_vec(),
        });
        break;
    }
    let source = upload.ok_or_else(missing_file)?;

    info!(file = %source.label(), "analyzing upload");
    let orchestrator = Arc::clone(&state.orchestrator);
    let result = tokio::task::spawn_blocking(move || orchestrator.run(&source))
        .await
        .map_err(|e| ApiError::internal(format!("pipeline task failed: {e}")))?;

    match result {
        Ok(record) => Ok(Json(record).into_response()),
        Err(e) => {
            error!(error = %e, "pipeline failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}
