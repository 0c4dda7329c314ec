//! Server configuration types
//!
//! Contains all configuration structures for the Parentline server.

use parentline_core::RouteTable;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sidecar: SidecarConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// SQLite database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/parentline.db".to_string(),
        }
    }
}

/// Chat session store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Process-local map; refused in production
    #[default]
    Memory,
    /// Shared Redis
    Redis,
}

/// Chat session storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_session_ttl() -> u64 {
    parentline_core::chat::session::DEFAULT_TTL_SECS
}
fn default_max_turns() -> usize {
    parentline_core::chat::session::DEFAULT_MAX_TURNS
}
fn default_key_prefix() -> String {
    "parentline:chat:".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            redis_url: default_redis_url(),
            ttl_secs: default_session_ttl(),
            max_turns: default_max_turns(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Text-generation provider (OpenAI-compatible endpoint)
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &parentline_llm::util::mask_api_key(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: parentline_llm::openai::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: parentline_llm::openai::DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 800,
            timeout_secs: 20,
        }
    }
}

/// Model sidecar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Similarity index and answer assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub index_url: String,
    pub top_k: usize,
    pub history_turns: usize,
    pub max_context_chars: usize,
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_index_timeout() -> u64 {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_url: "http://localhost:8002".to_string(),
            top_k: parentline_core::chat::retrieval::DEFAULT_TOP_K,
            history_turns: parentline_core::chat::generation::DEFAULT_HISTORY_TURNS,
            max_context_chars: parentline_core::chat::retrieval::DEFAULT_MAX_CONTEXT_CHARS,
            timeout_secs: default_index_timeout(),
        }
    }
}

/// Chat routing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub routes: RouteTable,
}

/// Bearer token lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: parentline_core::token::DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: parentline_core::token::DEFAULT_REFRESH_TTL_SECS,
        }
    }
}

/// Log output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}
