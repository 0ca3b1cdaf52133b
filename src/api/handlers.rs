//! HTTP request handlers

use super::types::{ErrorResponse, GreetingRequest, HealthResponse};
use super::AppState;
use crate::contract::{ChatResponse, InboundEvent};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/greeting", post(greeting))
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .with_state(state)
}

// ============================================================
// Dialogue
// ============================================================

async fn greeting(
    State(state): State<AppState>,
    body: Option<Json<GreetingRequest>>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = body.unwrap_or_default();
    let conversation_id = match req.conversation_id {
        Some(id) if id.trim().is_empty() => {
            return Err(AppError::BadRequest(
                "conversationId must not be blank".to_string(),
            ))
        }
        Some(id) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };

    Ok(Json(state.controller.greet(&conversation_id).await))
}

async fn chat(
    State(state): State<AppState>,
    Json(event): Json<InboundEvent>,
) -> Result<Json<ChatResponse>, AppError> {
    if event.conversation_id.trim().is_empty() {
        return Err(AppError::BadRequest("conversationId is required".to_string()));
    }
    if event.request_id.trim().is_empty() {
        return Err(AppError::BadRequest("requestId is required".to_string()));
    }

    tracing::debug!(
        conv_id = %event.conversation_id,
        request_id = %event.request_id,
        "Chat event received"
    );
    Ok(Json(state.controller.handle(event).await))
}

// ============================================================
// Health
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.controller.orchestrator().engine();
    Json(HealthResponse {
        status: "ok",
        diagnostic_mode: engine.mode_name(),
        model: engine.model_id().map(str::to_string),
    })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
