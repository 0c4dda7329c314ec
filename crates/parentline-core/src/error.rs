//! Error types for parentline-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Session store failure (Redis down, poisoned state)
    #[error("session store error: {0}")]
    Store(String),

    /// Session does not exist or has expired
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Input rejected before any external call
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error (invalid settings, production safety violations)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Model sidecar call failed
    #[error("sidecar error: {0}")]
    Sidecar(String),

    /// Similarity index call failed
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// Social login provider rejected the token or returned an unusable profile
    #[error("oauth error: {0}")]
    OAuth(String),

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] parentline_llm::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Store(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
