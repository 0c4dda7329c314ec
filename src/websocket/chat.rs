//! Chat WebSocket handler
//!
//! A socket attaches to a session created through `POST /api/v1/chat/sessions`.
//! Turns are answered by [`ChatService`]; each answer runs in its own task so
//! the socket keeps reading while the model works.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parentline_core::{ChatService, Error as CoreError, SessionKind, SourceCitation, Turn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::AppState;

/// Close code sent when the session does not exist or has expired
pub const CLOSE_SESSION_NOT_FOUND: u16 = 4001;

/// Close code sent when the session store fails during the handshake
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask a question
    Chat {
        #[serde(default)]
        message: String,
    },
    /// Drop the turn history
    ClearHistory,
    /// Request the turn history
    GetHistory,
}

/// Message to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Assistant answer (also used for the welcome greeting)
    AiResponse {
        message: String,
        timestamp: DateTime<Utc>,
        sources: Vec<SourceCitation>,
        session_type: SessionKind,
    },
    /// Typing indicator
    Typing { is_typing: bool },
    /// Error report; the socket stays open
    Error { error: String },
    /// History was dropped
    HistoryCleared { message: String },
    /// Turn history, oldest first
    ChatHistory { history: Vec<Turn> },
}

impl ServerMessage {
    fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    fn to_text(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json)),
            Err(e) => {
                error!("Failed to serialize server message: {}", e);
                None
            }
        }
    }
}

/// WebSocket upgrade handler for `/ws/chat/:session_id`
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let chat = state.chat.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, chat))
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, session_id: String, chat: Arc<ChatService>) {
    let session = match chat.connect(&session_id).await {
        Ok(session) => session,
        Err(CoreError::SessionNotFound(_)) => {
            warn!(session_id = %session_id, "WebSocket rejected: unknown session");
            close_with(socket, CLOSE_SESSION_NOT_FOUND, "session not found").await;
            return;
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "WebSocket rejected: session store failure");
            close_with(socket, CLOSE_INTERNAL_ERROR, "session store unavailable").await;
            return;
        }
    };
    info!(session_id = %session_id, attempts = session.connection_attempts, "WebSocket chat connection established");

    let (mut sender, mut receiver) = socket.split();

    let welcome = ServerMessage::AiResponse {
        message: ChatService::welcome_message(&session),
        timestamp: Utc::now(),
        sources: Vec::new(),
        session_type: session.kind,
    };
    if let Some(msg) = welcome.to_text() {
        let _ = sender.send(msg).await;
    }

    // Answers computed in spawned tasks come back through here
    let (tx, mut internal_rx) = mpsc::unbounded_channel::<ServerMessage>();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received message: {}", text);
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Chat { message }) => {
                                let _ = tx.send(ServerMessage::Typing { is_typing: true });
                                let chat = chat.clone();
                                let session_id = session_id.clone();
                                let tx = tx.clone();
                                let kind = session.kind;
                                tokio::spawn(async move {
                                    let replies = handle_client_message(
                                        &chat,
                                        &session_id,
                                        kind,
                                        ClientMessage::Chat { message },
                                    )
                                    .await;
                                    for reply in replies {
                                        let _ = tx.send(reply);
                                    }
                                });
                            }
                            Ok(client_msg) => {
                                let replies =
                                    handle_client_message(&chat, &session_id, session.kind, client_msg)
                                        .await;
                                for reply in replies {
                                    let _ = tx.send(reply);
                                }
                            }
                            Err(e) => {
                                debug!("Invalid client message: {}", e);
                                if let Some(msg) = ServerMessage::error("Invalid message format").to_text() {
                                    if sender.send(msg).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(session_id = %session_id, "WebSocket connection closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
            server_msg = internal_rx.recv() => {
                match server_msg {
                    Some(msg) => {
                        if let Some(msg) = msg.to_text() {
                            if sender.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }

    if let Err(e) = chat.disconnect(&session_id).await {
        warn!(session_id = %session_id, error = %e, "Failed to mark session disconnected");
    }
    info!(session_id = %session_id, "WebSocket chat connection ended");
}

/// Answer one client message
///
/// A chat reply is preceded by `typing: false`. Failures become `error`
/// messages; nothing here closes the socket. `kind` is the session kind seen
/// at connect time and routes the turn if the store is unreachable.
pub async fn handle_client_message(
    chat: &ChatService,
    session_id: &str,
    kind: SessionKind,
    msg: ClientMessage,
) -> Vec<ServerMessage> {
    match msg {
        ClientMessage::Chat { message } => {
            let reply = chat.handle_turn_as(session_id, kind, &message).await;
            let typing_off = ServerMessage::Typing { is_typing: false };
            match reply {
                Ok(reply) => vec![
                    typing_off,
                    ServerMessage::AiResponse {
                        message: reply.text,
                        timestamp: Utc::now(),
                        sources: reply.sources,
                        session_type: reply.session_kind,
                    },
                ],
                Err(CoreError::InvalidInput(reason)) => {
                    vec![typing_off, ServerMessage::error(reason)]
                }
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "Chat turn failed");
                    vec![
                        typing_off,
                        ServerMessage::error("An error occurred while processing your message."),
                    ]
                }
            }
        }
        ClientMessage::ClearHistory => match chat.clear_history(session_id).await {
            Ok(_) => vec![ServerMessage::HistoryCleared {
                message: "Chat history cleared.".to_string(),
            }],
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to clear history");
                vec![ServerMessage::error("Failed to clear chat history.")]
            }
        },
        ClientMessage::GetHistory => match chat.history(session_id).await {
            Ok(history) => vec![ServerMessage::ChatHistory { history }],
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to load history");
                vec![ServerMessage::error("Failed to load chat history.")]
            }
        },
    }
}
