//! Opaque bearer tokens
//!
//! Tokens are random strings with a kind prefix. Only their SHA-256 hex
//! digests are stored, so a leaked database does not leak usable tokens.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Access token lifetime
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 3600;

/// Refresh token lifetime
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 3600;

/// Token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived API credential
    Access,
    /// Long-lived credential used only to mint new access tokens
    Refresh,
}

impl TokenKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Access => "pla_",
            Self::Refresh => "plr_",
        }
    }

    /// Whether `raw` carries this kind's prefix
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        raw.starts_with(self.prefix())
    }
}

/// SHA-256 hex digest of a raw token
#[must_use]
pub fn hash_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn mint(kind: TokenKind) -> String {
    format!(
        "{}{}{}",
        kind.prefix(),
        Uuid::new_v4().as_simple(),
        Uuid::new_v4().as_simple()
    )
}

/// A freshly minted token pair; raw values are only ever shown once
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    /// Raw access token
    pub access: String,
    /// Raw refresh token
    pub refresh: String,
    /// Digest of the access token
    pub access_hash: String,
    /// Digest of the refresh token
    pub refresh_hash: String,
    /// Access expiry
    pub access_expires_at: DateTime<Utc>,
    /// Refresh expiry
    pub refresh_expires_at: DateTime<Utc>,
}

impl IssuedTokens {
    /// Mint a pair with the given lifetimes
    #[must_use]
    pub fn mint(access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        let now = Utc::now();
        let access = mint(TokenKind::Access);
        let refresh = mint(TokenKind::Refresh);
        Self {
            access_hash: hash_token(&access),
            refresh_hash: hash_token(&refresh),
            access,
            refresh,
            access_expires_at: now + Duration::seconds(access_ttl_secs),
            refresh_expires_at: now + Duration::seconds(refresh_ttl_secs),
        }
    }
}
