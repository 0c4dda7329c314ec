//! Chat session API endpoints
//!
//! POST /api/v1/chat/sessions     - Open a chat session
//! GET  /api/v1/chat/sessions/:id - Session details

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use parentline_core::{ConversationSession, SessionKind, SessionStatus};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath};
use super::response::{created, ok, ApiResult, Created};
use super::state::AppState;
use crate::middleware::auth::RequireAuth;

#[derive(Debug, Default, Deserialize)]
pub struct CreateChatSessionRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
}

/// A session as shown to its owner
#[derive(Debug, Serialize)]
pub struct ChatSessionView {
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub category: String,
    pub status: SessionStatus,
    pub websocket_url: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<ConversationSession> for ChatSessionView {
    fn from(session: ConversationSession) -> Self {
        Self {
            websocket_url: format!("/ws/chat/{}", session.id),
            message_count: session.turns.len(),
            session_id: session.id,
            kind: session.kind,
            category: session.category,
            status: session.status,
            created_at: session.created_at,
            last_activity: session.last_activity,
        }
    }
}

async fn create_session(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateChatSessionRequest>,
) -> Created<ChatSessionView> {
    let kind = match request.kind.as_deref() {
        Some(raw) => raw
            .parse::<SessionKind>()
            .map_err(|e| ApiError::invalid("type", e.to_string()))?,
        None => SessionKind::default(),
    };
    let category = request.category.filter(|c| !c.trim().is_empty());

    let session = state
        .chat
        .create_session(kind, category, Some(user.id.to_string()))
        .await?;
    created("Chat session created.", session.into())
}

async fn get_session(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<ChatSessionView> {
    let session = state
        .chat
        .session(&id)
        .await?
        .filter(|s| s.user_id.as_deref().map_or(true, |owner| owner == user.id.to_string()))
        .ok_or_else(|| ApiError::NotFound("chat session not found.".to_string()))?;
    ok("Chat session retrieved.", session.into())
}

/// Create chat session routes
pub fn chat_sessions_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/chat/sessions", post(create_session))
        .route("/api/v1/chat/sessions/:id", get(get_session))
        .with_state(state)
}
