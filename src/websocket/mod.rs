//! WebSocket module for Parentline
//!
//! - /ws/chat/:session_id - Interactive chat WebSocket

pub mod chat;

pub use chat::chat_handler;

use axum::{routing::get, Router};

use crate::api::AppState;

/// Create the WebSocket router
pub fn websocket_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/chat/:session_id", get(chat_handler))
        .with_state(state)
}
