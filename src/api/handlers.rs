//! HTTP request handlers

use super::stream::{text_stream_response, TEXT_PLAIN};
use super::types::{AskRequest, ErrorResponse, HealthResponse, HistoryResponse};
use super::AppState;
use crate::runtime::{TutorError, TutorErrorKind};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Tutoring
        .route("/ask", post(ask))
        // Conversation retrieval
        .route("/api/history/:user_id", get(get_history))
        // Service info
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Tutoring
// ============================================================

async fn ask(State(state): State<AppState>, Json(req): Json<AskRequest>) -> Response {
    if !req.history.is_empty() {
        tracing::debug!(
            user_id = %req.user_id,
            items = req.history.len(),
            "Ignoring client-supplied history"
        );
    }

    match state.runtime.ask(&req.user_id, &req.message).await {
        Ok(reply) => {
            tracing::debug!(user_id = %req.user_id, state = reply.state.name(), "Streaming reply");
            text_stream_response(StatusCode::OK, reply.text, state.stream_delay)
        }
        Err(e) => {
            tracing::warn!(user_id = %req.user_id, kind = ?e.kind, error = %e.message, "Ask failed");
            error_text_response(&e, &state)
        }
    }
}

/// Render a tutoring failure as `Error: ...` text.
///
/// The text is paced like a normal reply under a 200 status, unless the
/// service is configured to report failures through the status code.
fn error_text_response(error: &TutorError, state: &AppState) -> Response {
    let body = format!("Error: {}", error.message);
    if state.error_status {
        return (status_for(error.kind), [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response();
    }
    text_stream_response(StatusCode::OK, body, state.stream_delay)
}

fn status_for(kind: TutorErrorKind) -> StatusCode {
    match kind {
        TutorErrorKind::Storage => StatusCode::SERVICE_UNAVAILABLE,
        TutorErrorKind::Completion => StatusCode::BAD_GATEWAY,
        TutorErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        TutorErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================
// Conversation Retrieval
// ============================================================

async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let view = state.runtime.conversation(&user_id).await?;

    Ok(Json(HistoryResponse {
        user_id,
        state: view.state,
        turns: view.turns.into_iter().map(Into::into).collect(),
    }))
}

// ============================================================
// Service Info
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.runtime.model_id().to_string(),
        models_available: state.llm_registry.has_models(),
    })
}

async fn get_version() -> &'static str {
    concat!("quiz-tutor ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Unavailable(String),
    Internal(String),
}

impl From<TutorError> for AppError {
    fn from(e: TutorError) -> Self {
        match e.kind {
            TutorErrorKind::InvalidRequest => AppError::BadRequest(e.message),
            TutorErrorKind::Storage | TutorErrorKind::Completion => AppError::Unavailable(e.message),
            TutorErrorKind::Internal => AppError::Internal(e.message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
