//! JSON HTTP adapter.
//!
//! Marshals requests into [`Query`] values and hands them to the shared
//! [`Assistant`]. The pipeline is synchronous (blocking HTTP clients), so
//! every answer runs on Tokio's blocking pool.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer one message |
//! | `GET`  | `/api/health` | Knowledge-base size, retrieval settings, providers |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser front end
//! can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use campus_assist_core::models::{AnswerResult, LangHint, Query};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::assistant::{Assistant, Status};

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

/// Build the router. Exposed separately from [`run_server`] for tests.
pub fn router(assistant: Arc<Assistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { assistant })
}

/// Bind to `bind` and serve until the process is terminated.
pub async fn run_server(assistant: Arc<Assistant>, bind: &str) -> anyhow::Result<()> {
    let app = router(assistant);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    #[serde(flatten)]
    status: Status,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        status: state.assistant.status(),
    })
}

// ============ POST /api/chat ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: String,
    conversation_id: String,
    #[serde(default)]
    language: Option<String>,
}

impl ChatRequest {
    fn into_query(self) -> Result<Query, AppError> {
        if self.message.is_empty() {
            return Err(bad_request("message must not be empty"));
        }
        if self.conversation_id.is_empty() {
            return Err(bad_request("conversationId must not be empty"));
        }
        let hint = match self.language.as_deref() {
            None => LangHint::default(),
            Some(raw) => LangHint::parse(raw).ok_or_else(|| {
                bad_request(format!("language must be one of ar, en, fr (got '{}')", raw))
            })?,
        };
        Ok(Query::new(self.message)
            .with_hint(hint)
            .with_conversation(self.conversation_id))
    }
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let query = request.into_query()?;

    let assistant = state.assistant.clone();
    let result = tokio::task::spawn_blocking(move || assistant.answer(&query))
        .await
        .map_err(|e| internal(format!("answer task failed: {}", e)))?
        .map_err(|e| {
            tracing::error!(error = %format!("{:#}", e), "answer failed");
            internal(format!("{:#}", e))
        })?;

    Ok(Json(result))
}
