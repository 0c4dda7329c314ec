//! Chat turn pipeline
//!
//! One turn runs strictly in order: load history, classify, dispatch to
//! exactly one backend, then append both sides of the exchange in a single
//! atomic store call. A backend failure turns into a fixed apology for that
//! turn only. A store failure degrades the turn to a stateless exchange.

use super::classifier::{Classifier, RoutingDecision, Topic};
use super::generation::{GenerationHandler, FALLBACK_REDIRECT};
use super::retrieval::{RetrievalHandler, SourceCitation};
use super::session::{ConversationSession, SessionKind, SessionStatus, Turn};
use super::sidecar::{Sidecar, SidecarEndpoint};
use super::store::SessionStore;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Reply sent when a backend fails
pub const APOLOGY_MESSAGE: &str =
    "Sorry, something went wrong while preparing an answer. Please try again in a moment.";

/// Longest accepted chat message, in characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Where a turn is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Sidecar fine-tuned model
    Tuning,
    /// Sidecar document search service
    Vector,
    /// Sidecar hosted general model
    Openai,
    /// In-process retrieval-augmented generation
    Retrieval,
    /// In-process plain generation
    Generation,
}

/// Topic-to-backend table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTable {
    /// Sleep questions
    pub sleep: Backend,
    /// Development questions
    pub development: Backend,
    /// Other parenting questions
    pub general: Backend,
    /// Every turn of a document session
    pub doc: Backend,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            sleep: Backend::Tuning,
            development: Backend::Tuning,
            general: Backend::Generation,
            doc: Backend::Retrieval,
        }
    }
}

impl RouteTable {
    /// Backend for a topic
    #[must_use]
    pub fn for_topic(&self, topic: Topic) -> Backend {
        match topic {
            Topic::Sleep => self.sleep,
            Topic::Development => self.development,
            Topic::General => self.general,
        }
    }
}

/// Answer to one chat turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    /// Answer text
    pub text: String,
    /// Category label of the turn
    pub category: String,
    /// Cited sources
    pub sources: Vec<SourceCitation>,
    /// Kind of the session the turn belongs to
    pub session_kind: SessionKind,
}

/// Human label for a session category
#[must_use]
pub fn category_label(category: &str) -> &str {
    match category {
        "general" => "general parenting",
        "sleep" => "sleep",
        "development" => "child development",
        "document" => "parenting document",
        other => other,
    }
}

/// Chat engine: session lifecycle and turn routing
pub struct ChatService {
    store: Arc<dyn SessionStore>,
    classifier: Classifier,
    sidecar: Arc<dyn Sidecar>,
    retrieval: RetrievalHandler,
    generation: Arc<GenerationHandler>,
    routes: RouteTable,
    history_turns: usize,
}

impl ChatService {
    /// Assemble the engine
    pub fn new(
        store: Arc<dyn SessionStore>,
        classifier: Classifier,
        sidecar: Arc<dyn Sidecar>,
        retrieval: RetrievalHandler,
        generation: Arc<GenerationHandler>,
        routes: RouteTable,
        history_turns: usize,
    ) -> Self {
        Self {
            store,
            classifier,
            sidecar,
            retrieval,
            generation,
            routes,
            history_turns,
        }
    }

    /// Session store in use
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Open a new session; the user's other sessions are marked disconnected
    pub async fn create_session(
        &self,
        kind: SessionKind,
        category: Option<String>,
        user_id: Option<String>,
    ) -> Result<ConversationSession> {
        let session = ConversationSession::new(kind, category, user_id);
        if let Some(user_id) = &session.user_id {
            let closed = self
                .store
                .mark_user_sessions_disconnected(user_id, &session.id)
                .await?;
            if closed > 0 {
                debug!(user_id = %user_id, closed, "Previous sessions marked disconnected");
            }
        }
        self.store.put(&session).await?;
        info!(session_id = %session.id, kind = kind.as_str(), category = %session.category, "Chat session created");
        Ok(session)
    }

    /// Look a session up
    pub async fn session(&self, id: &str) -> Result<Option<ConversationSession>> {
        self.store.get(id).await
    }

    /// Mark a session connected; `SessionNotFound` when it does not exist
    pub async fn connect(&self, id: &str) -> Result<ConversationSession> {
        self.store
            .set_status(id, SessionStatus::Connected)
            .await?
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Mark a session disconnected
    pub async fn disconnect(&self, id: &str) -> Result<()> {
        self.store.set_status(id, SessionStatus::Disconnected).await?;
        Ok(())
    }

    /// Drop the turn history
    pub async fn clear_history(&self, id: &str) -> Result<bool> {
        self.store.clear(id).await
    }

    /// Turn history, oldest first
    pub async fn history(&self, id: &str) -> Result<Vec<Turn>> {
        Ok(self
            .store
            .get(id)
            .await?
            .map(|s| s.turns)
            .unwrap_or_default())
    }

    /// Greeting sent when a socket attaches
    #[must_use]
    pub fn welcome_message(session: &ConversationSession) -> String {
        format!(
            "Hello! I'm your {} assistant. Ask me anything and I'll do my best to help.",
            category_label(&session.category)
        )
    }

    /// Handle one chat message
    ///
    /// Only input validation can fail; every downstream failure becomes
    /// fallback text in the returned reply.
    pub async fn handle_turn(&self, session_id: &str, message: &str) -> Result<ChatReply> {
        self.handle_turn_as(session_id, SessionKind::default(), message)
            .await
    }

    /// Handle one chat message for a caller that already knows the session kind
    ///
    /// `known_kind` only decides routing when the store cannot be read; a
    /// stored session's own kind always wins.
    #[instrument(skip(self, message), fields(session_id = %session_id))]
    pub async fn handle_turn_as(
        &self,
        session_id: &str,
        known_kind: SessionKind,
        message: &str,
    ) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("message is empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(Error::InvalidInput(format!(
                "message exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let (session, stateless) = match self.store.get(session_id).await {
            Ok(session) => (session, false),
            Err(e) => {
                warn!(error = %e, "Session store unavailable, answering statelessly");
                (None, true)
            }
        };
        let kind = session.as_ref().map_or(known_kind, |s| s.kind);
        let history: &[Turn] = session
            .as_ref()
            .map(|s| s.recent_turns(self.history_turns))
            .unwrap_or(&[]);

        let (text, category, sources) = match kind {
            SessionKind::Doc => {
                let (text, sources) = self.dispatch(self.routes.doc, message, history).await;
                (text, "document".to_string(), sources)
            }
            SessionKind::AiExpert => match self.classifier.classify(message).await {
                RoutingDecision::OffTopic => {
                    let text = self.generation.redirect(message).await.unwrap_or_else(|e| {
                        warn!(error = %e, "Redirect generation failed");
                        FALLBACK_REDIRECT.to_string()
                    });
                    (text, RoutingDecision::OffTopic.label().to_string(), Vec::new())
                }
                RoutingDecision::Topical(topic) => {
                    let backend = self.routes.for_topic(topic);
                    let (text, sources) = self.dispatch(backend, message, history).await;
                    (text, topic.as_str().to_string(), sources)
                }
            },
        };

        if !stateless {
            let turns = vec![
                Turn::user(message),
                Turn::assistant(text.clone(), Some(category.clone())),
            ];
            if let Err(e) = self.store.append(session_id, turns).await {
                warn!(error = %e, "Failed to persist turn");
            }
        }

        Ok(ChatReply {
            text,
            category,
            sources,
            session_kind: kind,
        })
    }

    async fn ask_sidecar(
        &self,
        endpoint: SidecarEndpoint,
        message: &str,
    ) -> Result<(String, Vec<SourceCitation>)> {
        self.sidecar
            .ask(endpoint, message)
            .await
            .map(|r| (r.response, r.sources))
    }

    async fn dispatch(
        &self,
        backend: Backend,
        message: &str,
        history: &[Turn],
    ) -> (String, Vec<SourceCitation>) {
        debug!(?backend, "Dispatching turn");
        let outcome = match backend {
            Backend::Tuning => self.ask_sidecar(SidecarEndpoint::Tuning, message).await,
            Backend::Vector => self.ask_sidecar(SidecarEndpoint::Vector, message).await,
            Backend::Openai => self.ask_sidecar(SidecarEndpoint::Openai, message).await,
            Backend::Retrieval => self
                .retrieval
                .answer(message, history)
                .await
                .map(|a| (a.text, a.sources)),
            Backend::Generation => self
                .generation
                .answer(message, history)
                .await
                .map(|text| (text, Vec::new())),
        };

        match outcome {
            Ok((text, _)) if text.trim().is_empty() => {
                warn!(?backend, "Backend returned an empty answer");
                (APOLOGY_MESSAGE.to_string(), Vec::new())
            }
            Ok(answer) => answer,
            Err(e) => {
                warn!(?backend, error = %e, "Backend failed");
                (APOLOGY_MESSAGE.to_string(), Vec::new())
            }
        }
    }
}
