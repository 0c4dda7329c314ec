//! REST API for Parentline
//!
//! Provides endpoints for:
//! - Social login and bearer tokens
//! - User profiles and children
//! - Development records, milestones and the timeline
//! - Community posts, comments and likes
//! - Chat session creation
//! - Health

pub mod auth;
pub mod chat_sessions;
pub mod community;
pub mod development;
pub mod error;
pub mod extract;
pub mod health;
pub mod response;
pub mod state;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

use axum::Router;

pub use auth::auth_routes;
pub use chat_sessions::chat_sessions_routes;
pub use community::community_routes;
pub use development::development_routes;
pub use error::ApiError;
pub use health::health_routes;
pub use response::{ApiResponse, ApiResult};
pub use state::AppState;
pub use users::users_routes;

/// Create the API router with all endpoints
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes(state.clone()))
        .merge(auth_routes(state.clone()))
        .merge(users_routes(state.clone()))
        .merge(development_routes(state.clone()))
        .merge(community_routes(state.clone()))
        .merge(chat_sessions_routes(state))
}
