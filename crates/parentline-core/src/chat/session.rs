//! Conversation sessions
//!
//! A session is an append-only, bounded sequence of turns plus connection
//! metadata. It is created when a client asks for one (or lazily on first
//! append), mutated by each turn, and expires after an inactivity window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of turns kept per session
pub const DEFAULT_MAX_TURNS: usize = 50;

/// Inactivity window after which a session expires
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// What the client opened the session for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Parenting Q&A routed through classification
    #[default]
    AiExpert,
    /// Questions answered from the document index only
    Doc,
}

impl SessionKind {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiExpert => "ai_expert",
            Self::Doc => "doc",
        }
    }

    /// Category a new session gets when the client names none
    #[must_use]
    pub fn default_category(&self) -> &'static str {
        match self {
            Self::AiExpert => "general",
            Self::Doc => "document",
        }
    }
}

impl std::str::FromStr for SessionKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "ai_expert" => Ok(Self::AiExpert),
            "doc" => Ok(Self::Doc),
            other => Err(crate::Error::InvalidInput(format!(
                "unsupported session type: {}",
                other
            ))),
        }
    }
}

/// Connection status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, no socket attached yet
    #[default]
    Pending,
    /// A websocket is attached
    Connected,
    /// The socket went away
    Disconnected,
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The parent asking
    User,
    /// The bot answering
    Assistant,
}

/// One message in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who said it
    pub role: TurnRole,
    /// Text of the message
    pub text: String,
    /// Topic label the router attached, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// When it was said
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// A user turn stamped now
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            category: None,
            timestamp: Utc::now(),
        }
    }

    /// An assistant turn stamped now
    #[must_use]
    pub fn assistant(text: impl Into<String>, category: Option<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
            category,
            timestamp: Utc::now(),
        }
    }
}

/// A conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Opaque session identifier (UUID string)
    pub id: String,
    /// Session kind
    pub kind: SessionKind,
    /// Category label (`general`, `document`, ...)
    pub category: String,
    /// Owning user, when the session was opened by a signed-in client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Connection status
    pub status: SessionStatus,
    /// Turn history, oldest first
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last activity time
    pub last_activity: DateTime<Utc>,
    /// How many times a socket attached
    #[serde(default)]
    pub connection_attempts: u32,
    /// When the socket last went away
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl ConversationSession {
    /// Create a pending session with a fresh id
    #[must_use]
    pub fn new(kind: SessionKind, category: Option<String>, user_id: Option<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), kind, category, user_id)
    }

    /// Create a pending session with a caller-chosen id
    #[must_use]
    pub fn with_id(
        id: impl Into<String>,
        kind: SessionKind,
        category: Option<String>,
        user_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            category: category.unwrap_or_else(|| kind.default_category().to_string()),
            user_id,
            status: SessionStatus::Pending,
            turns: Vec::new(),
            created_at: now,
            last_activity: now,
            connection_attempts: 0,
            disconnected_at: None,
        }
    }

    /// Append turns, evicting the oldest beyond `max_turns`
    pub fn push_turns(&mut self, turns: impl IntoIterator<Item = Turn>, max_turns: usize) {
        self.turns.extend(turns);
        if self.turns.len() > max_turns {
            let excess = self.turns.len() - max_turns;
            self.turns.drain(0..excess);
        }
        self.touch();
    }

    /// Drop the turn history, keep metadata
    pub fn clear_turns(&mut self) {
        self.turns.clear();
        self.touch();
    }

    /// Refresh last activity
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Apply a status change
    pub fn apply_status(&mut self, status: SessionStatus) {
        match status {
            SessionStatus::Connected => {
                self.connection_attempts += 1;
                self.disconnected_at = None;
            }
            SessionStatus::Disconnected => self.disconnected_at = Some(Utc::now()),
            SessionStatus::Pending => {}
        }
        self.status = status;
        self.touch();
    }

    /// The last `n` turns, oldest first
    #[must_use]
    pub fn recent_turns(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Whether the inactivity window has elapsed
    #[must_use]
    pub fn is_expired(&self, ttl_secs: u64) -> bool {
        Utc::now() - self.last_activity > Duration::seconds(ttl_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let s = ConversationSession::new(SessionKind::AiExpert, None, None);
        assert_eq!(s.status, SessionStatus::Pending);
        assert_eq!(s.category, "general");
        assert!(Uuid::parse_str(&s.id).is_ok());

        let d = ConversationSession::new(SessionKind::Doc, None, Some("u1".into()));
        assert_eq!(d.category, "document");
        assert_eq!(d.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_turn_cap_evicts_oldest_first() {
        let mut s = ConversationSession::new(SessionKind::AiExpert, None, None);
        for i in 0..60 {
            s.push_turns([Turn::user(format!("q{}", i))], DEFAULT_MAX_TURNS);
        }
        assert_eq!(s.turns.len(), DEFAULT_MAX_TURNS);
        assert_eq!(s.turns[0].text, "q10");
        assert_eq!(s.turns.last().unwrap().text, "q59");
    }

    #[test]
    fn test_status_transitions() {
        let mut s = ConversationSession::new(SessionKind::AiExpert, None, None);
        s.apply_status(SessionStatus::Connected);
        s.apply_status(SessionStatus::Disconnected);
        assert!(s.disconnected_at.is_some());
        s.apply_status(SessionStatus::Connected);
        assert_eq!(s.connection_attempts, 2);
        assert!(s.disconnected_at.is_none());
    }

    #[test]
    fn test_recent_turns_and_expiry() {
        let mut s = ConversationSession::new(SessionKind::AiExpert, None, None);
        s.push_turns([Turn::user("a"), Turn::assistant("b", None), Turn::user("c")], 50);
        let recent = s.recent_turns(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "b");
        assert_eq!(s.recent_turns(10).len(), 3);

        assert!(!s.is_expired(DEFAULT_TTL_SECS));
        s.last_activity = Utc::now() - Duration::seconds(3601);
        assert!(s.is_expired(DEFAULT_TTL_SECS));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("doc".parse::<SessionKind>().unwrap(), SessionKind::Doc);
        assert!("community".parse::<SessionKind>().is_err());
    }
}
