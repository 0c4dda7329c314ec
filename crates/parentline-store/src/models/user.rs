use super::{check_len, parse_uuid};
use crate::error::{FieldErrors, Result, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A platform account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// Account id
    pub id: Uuid,
    /// Unique email
    pub email: String,
    /// Display name
    pub name: String,
    /// Profile image URL
    pub profile_image: Option<String>,
    /// Social provider that created the account
    pub auth_provider: String,
    /// Provider-side account id
    pub auth_provider_id: Option<String>,
    /// Whether the account may sign in
    pub is_active: bool,
    /// Staff flag
    pub is_staff: bool,
    /// Last sign-in
    pub last_login: Option<DateTime<Utc>>,
    /// Sign-up time
    pub date_joined: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Joined within the last five minutes
    #[must_use]
    pub fn is_new(&self) -> bool {
        Utc::now() - self.date_joined < chrono::Duration::minutes(5)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub profile_image: Option<String>,
    pub auth_provider: String,
    pub auth_provider_id: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id, "user")?,
            email: row.email,
            name: row.name,
            profile_image: row.profile_image,
            auth_provider: row.auth_provider,
            auth_provider_id: row.auth_provider_id,
            is_active: row.is_active,
            is_staff: row.is_staff,
            last_login: row.last_login,
            date_joined: row.date_joined,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// Profile data vouched for by a social provider
#[derive(Debug, Clone)]
pub struct SocialSignup {
    /// Verified email
    pub email: String,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub profile_image: Option<String>,
    /// Provider name
    pub auth_provider: String,
    /// Provider-side id
    pub auth_provider_id: Option<String>,
}

/// Profile edit
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// New display name
    pub name: Option<String>,
    /// New avatar; `Some(None)` clears it
    pub profile_image: Option<Option<String>>,
}

impl ProfileUpdate {
    /// Validate the edit
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            check_len(&mut errors, "name", name, 1, 50);
        }
        errors.into_result()
    }
}

/// A signed-in device session
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    /// Session id
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Client user agent
    pub device_info: Option<String>,
    /// Client address
    pub ip_address: Option<String>,
    /// Access token expiry
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry
    pub refresh_expires_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct AuthSessionRow {
    pub id: String,
    pub user_id: String,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuthSessionRow> for AuthSession {
    type Error = StoreError;

    fn try_from(row: AuthSessionRow) -> Result<Self> {
        Ok(AuthSession {
            id: parse_uuid(&row.id, "session")?,
            user_id: parse_uuid(&row.user_id, "user")?,
            device_info: row.device_info,
            ip_address: row.ip_address,
            access_expires_at: row.access_expires_at,
            refresh_expires_at: row.refresh_expires_at,
            created_at: row.created_at,
        })
    }
}

/// Token digests and metadata for a new auth session
#[derive(Debug, Clone)]
pub struct NewAuthSession {
    /// SHA-256 of the access token
    pub access_hash: String,
    /// SHA-256 of the refresh token
    pub refresh_hash: String,
    /// Client user agent
    pub device_info: Option<String>,
    /// Client address
    pub ip_address: Option<String>,
    /// Access expiry
    pub access_expires_at: DateTime<Utc>,
    /// Refresh expiry
    pub refresh_expires_at: DateTime<Utc>,
}
