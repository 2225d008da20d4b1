//! HTTP API for the course assistant.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Answer a question (`{query, session_id?}`) |
//! | `GET`  | `/api/courses` | Course count and titles |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `generation_error` (502),
//! `index_unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can be served from anywhere.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::RagError;
use crate::rag::{CourseAnalytics, QueryResponse, RagSystem};

/// Build the system from config, load the configured docs folder, and
/// serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let system = Arc::new(RagSystem::from_config(config).await?);

    let summary = system
        .add_course_folder(
            &config.loader.docs_dir,
            &config.loader.include_globs,
            false,
        )
        .await?;
    tracing::info!(
        courses = summary.courses_added,
        chunks = summary.chunks_added,
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "startup load finished"
    );

    let app = router(system);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes with CORS applied, over a shared [`RagSystem`].
pub fn router(system: Arc<RagSystem>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/courses", get(handle_courses))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(system)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_error"),
            RagError::IndexUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable"),
            RagError::Format(_) | RagError::NotFound(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            RagError::ToolExecution { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        tracing::error!(code, error = %err, "request failed");
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/query ============

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

async fn handle_query(
    State(system): State<Arc<RagSystem>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let response = system
        .query(&request.query, request.session_id.as_deref())
        .await?;
    Ok(Json(response))
}

// ============ GET /api/courses ============

async fn handle_courses(
    State(system): State<Arc<RagSystem>>,
) -> Result<Json<CourseAnalytics>, AppError> {
    Ok(Json(system.get_course_analytics().await?))
}
