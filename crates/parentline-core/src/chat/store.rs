//! Session storage backends
//!
//! Provides both in-memory and Redis-backed conversation session storage.
//!
//! Turn appends are atomic in both backends: the in-memory store runs the
//! whole read-modify-write under one write lock, and the Redis store pushes
//! turns onto a list inside a `MULTI/EXEC` block. Session metadata (status,
//! category, counters) is last-write-wins.
//!
//! # Production Safety
//!
//! When `PARENTLINE_ENV=production`, `MemoryStore::try_new()` returns an error
//! unless `PARENTLINE_ALLOW_MEMORY_STORE_IN_PRODUCTION=1` is set.

use super::session::{ConversationSession, SessionKind, SessionStatus, Turn};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

fn is_production() -> bool {
    std::env::var("PARENTLINE_ENV")
        .map(|v| v.to_lowercase() == "production")
        .unwrap_or(false)
}

fn is_production_bypass_enabled() -> bool {
    std::env::var("PARENTLINE_ALLOW_MEMORY_STORE_IN_PRODUCTION")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Session store trait for abstracting storage backends
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get a live session by id
    async fn get(&self, id: &str) -> Result<Option<ConversationSession>>;

    /// Store a freshly created session (overwrites metadata and turns)
    async fn put(&self, session: &ConversationSession) -> Result<()>;

    /// Append turns atomically, creating the session if absent
    async fn append(&self, id: &str, turns: Vec<Turn>) -> Result<ConversationSession>;

    /// Drop the turn history of a session; returns false when it does not exist
    async fn clear(&self, id: &str) -> Result<bool>;

    /// Refresh last activity and TTL; returns false when it does not exist
    async fn touch(&self, id: &str) -> Result<bool>;

    /// Change connection status
    async fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<Option<ConversationSession>>;

    /// Mark every other live session of `user_id` as disconnected
    async fn mark_user_sessions_disconnected(&self, user_id: &str, keep: &str) -> Result<usize>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<()>;

    /// Cleanup expired sessions
    async fn cleanup_expired(&self) -> Result<usize>;
}

/// In-memory session store (for development/testing)
///
/// Data is lost on restart and not shared between processes, so deployments
/// with more than one server must use [`RedisStore`].
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, ConversationSession>>>,
    ttl_secs: u64,
    max_turns: usize,
}

impl MemoryStore {
    /// Create a new memory store
    ///
    /// # Errors
    ///
    /// Returns error if `PARENTLINE_ENV=production` unless bypass is enabled.
    pub fn try_new(ttl_secs: u64, max_turns: usize) -> Result<Self> {
        if is_production() && !is_production_bypass_enabled() {
            error!("MemoryStore is not allowed in production, use the redis session backend");
            return Err(Error::Configuration(
                "MemoryStore is not allowed in production. Use RedisStore instead.".to_string(),
            ));
        }

        if is_production() {
            warn!("MemoryStore is being used in production with safety bypass");
        }

        info!(ttl_secs, max_turns, "Initializing MemoryStore for chat sessions");
        Ok(Self::new_unsafe(ttl_secs, max_turns))
    }

    /// Create a new memory store, bypassing production safety checks
    #[must_use]
    pub fn new_unsafe(ttl_secs: u64, max_turns: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl_secs,
            max_turns,
        }
    }

    /// Number of sessions held, expired or not
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn live<'a>(
        map: &'a mut HashMap<String, ConversationSession>,
        id: &str,
        ttl_secs: u64,
    ) -> Option<&'a mut ConversationSession> {
        if map.get(id).is_some_and(|s| s.is_expired(ttl_secs)) {
            map.remove(id);
            debug!(session_id = %id, "Expired session dropped");
        }
        map.get_mut(id)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<ConversationSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .filter(|s| !s.is_expired(self.ttl_secs))
            .cloned())
    }

    async fn put(&self, session: &ConversationSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn append(&self, id: &str, turns: Vec<Turn>) -> Result<ConversationSession> {
        let mut sessions = self.sessions.write().await;
        if Self::live(&mut sessions, id, self.ttl_secs).is_none() {
            sessions.insert(
                id.to_string(),
                ConversationSession::with_id(id, SessionKind::default(), None, None),
            );
        }
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::Store(format!("session {} vanished during append", id)))?;
        session.push_turns(turns, self.max_turns);
        Ok(session.clone())
    }

    async fn clear(&self, id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        match Self::live(&mut sessions, id, self.ttl_secs) {
            Some(session) => {
                session.clear_turns();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch(&self, id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        match Self::live(&mut sessions, id, self.ttl_secs) {
            Some(session) => {
                session.touch();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<Option<ConversationSession>> {
        let mut sessions = self.sessions.write().await;
        Ok(Self::live(&mut sessions, id, self.ttl_secs).map(|session| {
            session.apply_status(status);
            session.clone()
        }))
    }

    async fn mark_user_sessions_disconnected(&self, user_id: &str, keep: &str) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let mut count = 0;
        for session in sessions.values_mut() {
            if session.id != keep
                && session.user_id.as_deref() == Some(user_id)
                && session.status != SessionStatus::Disconnected
                && !session.is_expired(self.ttl_secs)
            {
                session.apply_status(SessionStatus::Disconnected);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.ttl_secs));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, remaining = sessions.len(), "Cleaned up expired sessions");
        }
        Ok(removed)
    }
}

/// Redis-backed session store (for production)
///
/// Layout per session, all keys expiring after the TTL:
/// - `{prefix}{id}:meta`: session metadata as JSON (turns omitted)
/// - `{prefix}{id}:turns`: list of JSON turns, trimmed to the cap
/// - `{prefix}user:{user_id}`: set of session ids owned by a user
pub struct RedisStore {
    client: redis::Client,
    prefix: String,
    ttl_secs: u64,
    max_turns: usize,
}

impl RedisStore {
    /// Create a new Redis store
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid
    pub fn new(redis_url: &str, prefix: &str, ttl_secs: u64, max_turns: usize) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| Error::Store(e.to_string()))?;

        Ok(Self {
            client,
            prefix: prefix.to_string(),
            ttl_secs,
            max_turns,
        })
    }

    fn meta_key(&self, id: &str) -> String {
        format!("{}{}:meta", self.prefix, id)
    }

    fn turns_key(&self, id: &str) -> String {
        format!("{}{}:turns", self.prefix, id)
    }

    fn user_key(&self, user_id: &str) -> String {
        format!("{}user:{}", self.prefix, user_id)
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Store(format!("Redis connection failed: {}", e)))
    }

    fn meta_json(session: &ConversationSession) -> Result<String> {
        let meta = ConversationSession {
            turns: Vec::new(),
            ..session.clone()
        };
        Ok(serde_json::to_string(&meta)?)
    }

    async fn load_meta(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        id: &str,
    ) -> Result<Option<ConversationSession>> {
        let data: Option<String> = redis::cmd("GET")
            .arg(self.meta_key(id))
            .query_async(conn)
            .await
            .map_err(|e| Error::Store(format!("Redis GET failed: {}", e)))?;

        data.map(|json| serde_json::from_str(&json).map_err(Error::from))
            .transpose()
    }

    async fn save_meta(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        session: &ConversationSession,
    ) -> Result<()> {
        redis::cmd("SETEX")
            .arg(self.meta_key(&session.id))
            .arg(self.ttl_secs)
            .arg(Self::meta_json(session)?)
            .query_async::<()>(conn)
            .await
            .map_err(|e| Error::Store(format!("Redis SETEX failed: {}", e)))
    }

    fn decode_turns(raw: Vec<String>) -> Vec<Turn> {
        raw.into_iter()
            .filter_map(|json| match serde_json::from_str(&json) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable turn");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<ConversationSession>> {
        let mut conn = self.get_connection().await?;
        let Some(mut session) = self.load_meta(&mut conn, id).await? else {
            return Ok(None);
        };

        let raw: Vec<String> = redis::cmd("LRANGE")
            .arg(self.turns_key(id))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("Redis LRANGE failed: {}", e)))?;
        session.turns = Self::decode_turns(raw);

        debug!(session_id = %id, turns = session.turns.len(), "Session loaded from Redis");
        Ok(Some(session))
    }

    async fn put(&self, session: &ConversationSession) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let turns_key = self.turns_key(&session.id);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SETEX")
            .arg(self.meta_key(&session.id))
            .arg(self.ttl_secs)
            .arg(Self::meta_json(session)?)
            .ignore()
            .cmd("DEL")
            .arg(&turns_key)
            .ignore();
        for turn in &session.turns {
            pipe.cmd("RPUSH")
                .arg(&turns_key)
                .arg(serde_json::to_string(turn)?)
                .ignore();
        }
        if !session.turns.is_empty() {
            pipe.cmd("EXPIRE").arg(&turns_key).arg(self.ttl_secs).ignore();
        }
        if let Some(user_id) = &session.user_id {
            let user_key = self.user_key(user_id);
            pipe.cmd("SADD")
                .arg(&user_key)
                .arg(&session.id)
                .ignore()
                .cmd("EXPIRE")
                .arg(&user_key)
                .arg(self.ttl_secs)
                .ignore();
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("Redis session write failed: {}", e)))?;

        debug!(session_id = %session.id, ttl = %self.ttl_secs, "Session saved to Redis");
        Ok(())
    }

    async fn append(&self, id: &str, turns: Vec<Turn>) -> Result<ConversationSession> {
        let mut conn = self.get_connection().await?;
        let mut session = self
            .load_meta(&mut conn, id)
            .await?
            .unwrap_or_else(|| ConversationSession::with_id(id, SessionKind::default(), None, None));
        session.touch();

        let turns_key = self.turns_key(id);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for turn in &turns {
            pipe.cmd("RPUSH")
                .arg(&turns_key)
                .arg(serde_json::to_string(turn)?)
                .ignore();
        }
        pipe.cmd("LTRIM")
            .arg(&turns_key)
            .arg(-(self.max_turns as i64))
            .arg(-1)
            .ignore()
            .cmd("EXPIRE")
            .arg(&turns_key)
            .arg(self.ttl_secs)
            .ignore()
            .cmd("SETEX")
            .arg(self.meta_key(id))
            .arg(self.ttl_secs)
            .arg(Self::meta_json(&session)?)
            .ignore()
            .cmd("LRANGE")
            .arg(&turns_key)
            .arg(0)
            .arg(-1);

        let (raw,): (Vec<String>,) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("Redis append failed: {}", e)))?;
        session.turns = Self::decode_turns(raw);

        debug!(session_id = %id, appended = turns.len(), total = session.turns.len(), "Turns appended");
        Ok(session)
    }

    async fn clear(&self, id: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let Some(mut session) = self.load_meta(&mut conn, id).await? else {
            return Ok(false);
        };
        session.touch();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("DEL")
            .arg(self.turns_key(id))
            .ignore()
            .cmd("SETEX")
            .arg(self.meta_key(id))
            .arg(self.ttl_secs)
            .arg(Self::meta_json(&session)?)
            .ignore();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("Redis clear failed: {}", e)))?;
        Ok(true)
    }

    async fn touch(&self, id: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let Some(mut session) = self.load_meta(&mut conn, id).await? else {
            return Ok(false);
        };
        session.touch();

        let mut pipe = redis::pipe();
        pipe.cmd("SETEX")
            .arg(self.meta_key(id))
            .arg(self.ttl_secs)
            .arg(Self::meta_json(&session)?)
            .ignore()
            .cmd("EXPIRE")
            .arg(self.turns_key(id))
            .arg(self.ttl_secs)
            .ignore();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("Redis touch failed: {}", e)))?;
        Ok(true)
    }

    async fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<Option<ConversationSession>> {
        let mut conn = self.get_connection().await?;
        let Some(mut session) = self.load_meta(&mut conn, id).await? else {
            return Ok(None);
        };
        session.apply_status(status);
        self.save_meta(&mut conn, &session).await?;
        Ok(Some(session))
    }

    async fn mark_user_sessions_disconnected(&self, user_id: &str, keep: &str) -> Result<usize> {
        let mut conn = self.get_connection().await?;
        let ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.user_key(user_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("Redis SMEMBERS failed: {}", e)))?;

        let mut count = 0;
        for id in ids.iter().filter(|id| id.as_str() != keep) {
            match self.load_meta(&mut conn, id).await? {
                Some(mut session) if session.status != SessionStatus::Disconnected => {
                    session.apply_status(SessionStatus::Disconnected);
                    self.save_meta(&mut conn, &session).await?;
                    count += 1;
                }
                Some(_) => {}
                None => {
                    redis::cmd("SREM")
                        .arg(self.user_key(user_id))
                        .arg(id)
                        .query_async::<()>(&mut conn)
                        .await
                        .map_err(|e| Error::Store(format!("Redis SREM failed: {}", e)))?;
                }
            }
        }
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("Redis PING failed: {}", e)))?;
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        // Redis TTL handles expiration automatically
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::session::DEFAULT_MAX_TURNS;
    use chrono::{Duration, Utc};

    fn store() -> MemoryStore {
        MemoryStore::new_unsafe(3600, DEFAULT_MAX_TURNS)
    }

    #[tokio::test]
    async fn test_append_creates_missing_session() {
        let store = store();
        let session = store.append("abc", vec![Turn::user("hello")]).await.unwrap();
        assert_eq!(session.id, "abc");
        assert_eq!(session.turns.len(), 1);
        assert!(store.get("abc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_lose_turns() {
        let store = Arc::new(MemoryStore::new_unsafe(3600, 1000));
        let mut handles = Vec::new();
        for i in 0..40 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append("shared", vec![Turn::user(format!("q{}", i)), Turn::assistant("a", None)])
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let session = store.get("shared").await.unwrap().unwrap();
        assert_eq!(session.turns.len(), 80);
    }

    #[tokio::test]
    async fn test_cap_applies_through_store() {
        let store = MemoryStore::new_unsafe(3600, 4);
        for i in 0..3 {
            store
                .append("s", vec![Turn::user(format!("q{}", i)), Turn::assistant(format!("a{}", i), None)])
                .await
                .unwrap();
        }
        let session = store.get("s").await.unwrap().unwrap();
        assert_eq!(session.turns.len(), 4);
        assert_eq!(session.turns[0].text, "q1");
    }

    #[tokio::test]
    async fn test_clear_keeps_metadata() {
        let store = store();
        let session = ConversationSession::new(SessionKind::Doc, None, Some("u1".into()));
        store.put(&session).await.unwrap();
        store.append(&session.id, vec![Turn::user("q")]).await.unwrap();

        assert!(store.clear(&session.id).await.unwrap());
        let after = store.get(&session.id).await.unwrap().unwrap();
        assert!(after.turns.is_empty());
        assert_eq!(after.kind, SessionKind::Doc);
        assert!(!store.clear("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_invisible_and_swept() {
        let store = store();
        let mut session = ConversationSession::new(SessionKind::AiExpert, None, None);
        session.last_activity = Utc::now() - Duration::seconds(7200);
        store.put(&session).await.unwrap();

        assert!(store.get(&session.id).await.unwrap().is_none());
        assert!(!store.touch(&session.id).await.unwrap());
        assert_eq!(store.cleanup_expired().await.unwrap(), 0);

        let mut stale = ConversationSession::new(SessionKind::AiExpert, None, None);
        stale.last_activity = Utc::now() - Duration::seconds(7200);
        store.put(&stale).await.unwrap();
        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_status_and_user_disconnect() {
        let store = store();
        let old = ConversationSession::new(SessionKind::AiExpert, None, Some("u1".into()));
        let other = ConversationSession::new(SessionKind::AiExpert, None, Some("u2".into()));
        let new = ConversationSession::new(SessionKind::AiExpert, None, Some("u1".into()));
        for s in [&old, &other, &new] {
            store.put(s).await.unwrap();
        }
        store.set_status(&old.id, SessionStatus::Connected).await.unwrap();

        let n = store.mark_user_sessions_disconnected("u1", &new.id).await.unwrap();
        assert_eq!(n, 1);
        let old_after = store.get(&old.id).await.unwrap().unwrap();
        assert_eq!(old_after.status, SessionStatus::Disconnected);
        assert!(old_after.disconnected_at.is_some());
        assert_eq!(
            store.get(&new.id).await.unwrap().unwrap().status,
            SessionStatus::Pending
        );
        assert!(store.set_status("missing", SessionStatus::Connected).await.unwrap().is_none());
    }

    #[cfg(feature = "redis-tests")]
    #[tokio::test]
    async fn test_redis_append_roundtrip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let store = RedisStore::new(&url, "parentline:test:", 60, 3).unwrap();
        let session = ConversationSession::new(SessionKind::AiExpert, None, Some("u1".into()));
        store.put(&session).await.unwrap();
        store
            .append(&session.id, vec![Turn::user("a"), Turn::assistant("b", None)])
            .await
            .unwrap();
        let after = store
            .append(&session.id, vec![Turn::user("c"), Turn::assistant("d", None)])
            .await
            .unwrap();
        assert_eq!(after.turns.len(), 3);
        assert_eq!(after.turns[0].text, "b");
        assert!(store.clear(&session.id).await.unwrap());
        assert!(store.get(&session.id).await.unwrap().unwrap().turns.is_empty());
    }
}
