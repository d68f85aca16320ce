//! HTTP surface of the domain agent.
//!
//! `POST /chat` returns 200 on success and on graceful refusal alike; a
//! 5xx can only come from an internal invariant violation, which the
//! chat pipeline is built not to produce. Session creation and logout are
//! thin hooks for the external authentication layer.

use super::agent::DomainAgent;
use crate::session::SessionStore;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
struct HttpState {
    agent: Arc<DomainAgent>,
    sessions: Arc<SessionStore>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    /// Attach intent/task/tool-count diagnostics to the response
    #[serde(default)]
    pub diagnostics: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<super::agent::Diagnostics>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    customer_id: String,
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    session_id: String,
}

/// Build the domain agent's router.
pub fn chat_router(agent: Arc<DomainAgent>, sessions: Arc<SessionStore>) -> Router {
    let state = HttpState { agent, sessions };
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/session", post(create_session_handler))
        .route("/session/{session_id}", delete(logout_handler))
        .with_state(state)
}

async fn chat_handler(
    State(state): State<HttpState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let outcome = state
        .agent
        .chat(&request.session_id, &request.message, request.diagnostics)
        .await;
    Json(ChatResponse {
        reply: outcome.reply_text,
        diagnostics: outcome.diagnostics,
    })
}

/// Bind a session for an already-authenticated customer. Authentication
/// itself is an external concern; this endpoint is its landing hook.
async fn create_session_handler(
    State(state): State<HttpState>,
    Json(request): Json<CreateSessionRequest>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.sessions.create(request.customer_id);
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id }),
    )
}

async fn logout_handler(
    State(state): State<HttpState>,
    Path(session_id): Path<String>,
) -> StatusCode {
    if state.sessions.logout(&session_id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
