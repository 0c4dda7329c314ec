//! Auth API endpoints
//!
//! POST /api/v1/auth/social/token  - Exchange a provider token for API tokens
//! POST /api/v1/auth/token/refresh - Rotate the token pair
//! GET  /api/v1/auth/token/verify  - Check the caller's access token
//! POST /api/v1/auth/logout        - End every session of the caller
//! GET  /api/v1/auth/user/status   - Onboarding status

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use parentline_core::{hash_token, IssuedTokens, OAuthProvider, TokenKind};
use parentline_store::{NewAuthSession, ReadScope, SocialSignup, User};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::error::ApiError;
use super::extract::ApiJson;
use super::response::{ok, ApiResponse, ApiResult};
use super::state::AppState;
use super::users::{child_views, ChildView};
use crate::middleware::auth::RequireAuth;

const INVALID_REFRESH: &str = "Invalid or expired refresh token.";

#[derive(Debug, Deserialize)]
pub struct SocialLoginRequest {
    pub provider: String,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Signed-in user with onboarding data
#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub is_new_user: bool,
    pub children: Vec<ChildView>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UserStatus {
    pub user: User,
    pub is_new_user: bool,
    pub has_children: bool,
    pub children_count: usize,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .or_else(|| header_value(headers, "x-real-ip"))
}

/// Mint a token pair and record it as the user's only session
async fn issue_tokens(
    state: &AppState,
    user_id: Uuid,
    headers: &HeaderMap,
) -> Result<IssuedTokens, ApiError> {
    let tokens = IssuedTokens::mint(state.auth.access_ttl_secs, state.auth.refresh_ttl_secs);
    state
        .store
        .create_auth_session(
            user_id,
            &NewAuthSession {
                access_hash: tokens.access_hash.clone(),
                refresh_hash: tokens.refresh_hash.clone(),
                device_info: header_value(headers, "user-agent"),
                ip_address: client_ip(headers),
                access_expires_at: tokens.access_expires_at,
                refresh_expires_at: tokens.refresh_expires_at,
            },
        )
        .await?;
    Ok(tokens)
}

/// Exchange a social provider token for API tokens
async fn social_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<SocialLoginRequest>,
) -> ApiResult<LoginResponse> {
    let provider: OAuthProvider = request.provider.parse().map_err(|_| {
        ApiError::invalid(
            "provider",
            format!("Unsupported provider: {}", request.provider),
        )
    })?;
    if request.access_token.trim().is_empty() {
        return Err(ApiError::invalid("access_token", "This field may not be blank."));
    }

    let profile = state
        .profiles
        .fetch_profile(provider, request.access_token.trim())
        .await?;
    let user = state
        .store
        .upsert_social_user(&SocialSignup {
            email: profile.email,
            name: profile.name,
            profile_image: profile.avatar,
            auth_provider: provider.as_str().to_string(),
            auth_provider_id: profile.provider_id,
        })
        .await?;

    let tokens = issue_tokens(&state, user.id, &headers).await?;
    let children = child_views(&state.store, user.id).await?;
    info!(user_id = %user.id, provider = provider.as_str(), "Social login");

    ok(
        "Login successful.",
        LoginResponse {
            access: tokens.access,
            refresh: tokens.refresh,
            user: UserView {
                is_new_user: user.is_new(),
                user,
                children,
            },
        },
    )
}

/// Rotate both tokens
async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> ApiResult<TokenPair> {
    let raw = request.refresh_token.trim();
    if !TokenKind::Refresh.matches(raw) {
        return Err(ApiError::Unauthorized(INVALID_REFRESH.to_string()));
    }

    let session = state
        .store
        .session_for_refresh_hash(&hash_token(raw), Utc::now())
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_REFRESH.to_string()))?;
    let user = match state.store.get_user(session.user_id, ReadScope::live()).await {
        Ok(user) if user.is_active => user,
        Ok(_) | Err(parentline_store::StoreError::NotFound { .. }) => {
            return Err(ApiError::Unauthorized(INVALID_REFRESH.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let tokens = issue_tokens(&state, user.id, &headers).await?;
    ok(
        "Token refreshed.",
        TokenPair {
            access_token: tokens.access,
            refresh_token: tokens.refresh,
        },
    )
}

async fn verify_token(RequireAuth(user): RequireAuth) -> ApiResult<VerifyResponse> {
    ok(
        "Token is valid.",
        VerifyResponse {
            valid: true,
            user_id: user.id,
        },
    )
}

async fn logout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<()> {
    let ended = state.store.delete_user_sessions(user.id).await?;
    info!(user_id = %user.id, sessions = ended, "Logged out");
    Ok(Json(ApiResponse::done("Logged out.")))
}

async fn user_status(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<UserStatus> {
    let children = state
        .store
        .list_children(user.id, ReadScope::live())
        .await?;
    ok(
        "User status retrieved.",
        UserStatus {
            is_new_user: user.is_new(),
            has_children: !children.is_empty(),
            children_count: children.len(),
            user,
        },
    )
}

/// Create auth routes
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/auth/social/token", post(social_token))
        .route("/api/v1/auth/token/refresh", post(refresh_token))
        .route("/api/v1/auth/token/verify", get(verify_token))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/user/status", get(user_status))
        .with_state(state)
}
