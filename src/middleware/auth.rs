//! Authentication middleware for Axum
//!
//! Extracts Bearer tokens from requests and resolves them to a live user
//! through the [`Store`]. Provides `RequireAuth` extractor for handlers.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use parentline_core::{hash_token, TokenKind};
use parentline_store::{Store, User};
use tracing::debug;

use crate::api::ApiError;

const MISSING_CREDENTIALS: &str =
    "Authentication credentials were not provided. Use Authorization: Bearer <token>.";
const INVALID_TOKEN: &str = "Invalid or expired token.";

/// Axum extractor that requires a signed-in user.
///
/// Extracts the token from:
/// 1. `Authorization: Bearer <token>` header
/// 2. `?token=<token>` query parameter
pub struct RequireAuth(pub User);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let store = parts
            .extensions
            .get::<Store>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("Store extension not configured".to_string()))?;

        let token =
            extract_token(parts).ok_or_else(|| ApiError::Unauthorized(MISSING_CREDENTIALS.to_string()))?;
        authenticate(&store, &token).await.map(RequireAuth)
    }
}

/// Resolve a raw access token to its user
pub async fn authenticate(store: &Store, token: &str) -> Result<User, ApiError> {
    if !TokenKind::Access.matches(token) {
        debug!("Rejected token with wrong prefix");
        return Err(ApiError::Unauthorized(INVALID_TOKEN.to_string()));
    }
    store
        .user_for_access_hash(&hash_token(token), Utc::now())
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_TOKEN.to_string()))
}

/// Extract token from request headers or query params
fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    parts.uri.query().and_then(|query| {
        query
            .split('&')
            .find_map(|param| param.strip_prefix("token="))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use parentline_core::IssuedTokens;
    use parentline_store::{NewAuthSession, SocialSignup};
    use tempfile::TempDir;

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_extract_token_sources() {
        assert_eq!(
            extract_token(&parts("/x", Some("Bearer pla_abc"))),
            Some("pla_abc".to_string())
        );
        assert_eq!(
            extract_token(&parts("/x?a=1&token=pla_q", None)),
            Some("pla_q".to_string())
        );
        assert_eq!(extract_token(&parts("/x", Some("Basic Zm9v"))), None);
        assert_eq!(extract_token(&parts("/x", None)), None);
    }

    #[tokio::test]
    async fn test_authenticate_resolves_live_session() {
        let dir = TempDir::new().unwrap();
        let store = Store::from_path(&dir.path().join("auth.db")).await.unwrap();
        let user = store
            .upsert_social_user(&SocialSignup {
                email: "parent@example.com".to_string(),
                name: "Parent".to_string(),
                profile_image: None,
                auth_provider: "google".to_string(),
                auth_provider_id: None,
            })
            .await
            .unwrap();

        let tokens = IssuedTokens::mint(3600, 7200);
        store
            .create_auth_session(
                user.id,
                &NewAuthSession {
                    access_hash: tokens.access_hash.clone(),
                    refresh_hash: tokens.refresh_hash.clone(),
                    device_info: None,
                    ip_address: None,
                    access_expires_at: tokens.access_expires_at,
                    refresh_expires_at: tokens.refresh_expires_at,
                },
            )
            .await
            .unwrap();

        let found = authenticate(&store, &tokens.access).await.unwrap();
        assert_eq!(found.id, user.id);

        let err = authenticate(&store, &tokens.refresh).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        store.delete_user_sessions(user.id).await.unwrap();
        assert!(authenticate(&store, &tokens.access).await.is_err());
    }
}
