//! Users API endpoints
//!
//! GET    /api/v1/users/profile       - Current user's profile
//! PUT    /api/v1/users/profile       - Edit the profile
//! DELETE /api/v1/users/profile       - Delete the account (soft)
//! GET    /api/v1/users/children      - List the user's children
//! POST   /api/v1/users/children      - Register a child
//! GET    /api/v1/users/children/:id  - Child details
//! PUT    /api/v1/users/children/:id  - Edit a child
//! DELETE /api/v1/users/children/:id  - Remove a child (soft)

use axum::{extract::State, routing::get, Json, Router};
use chrono::{NaiveDate, Utc};
use parentline_store::{
    Child, ChildUpdate, Gender, NewChild, ProfileUpdate, ReadScope, Store, User,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;
use uuid::Uuid;

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath};
use super::response::{created, ok, ApiResponse, ApiResult, Created};
use super::state::AppState;
use crate::middleware::auth::RequireAuth;

/// Distinguishes an absent field from an explicit `null`
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A child with its age in months
#[derive(Debug, Clone, Serialize)]
pub struct ChildView {
    #[serde(flatten)]
    pub child: Child,
    pub age_months: i64,
}

impl ChildView {
    fn new(child: Child, today: NaiveDate) -> Self {
        Self {
            age_months: child.age_months(today),
            child,
        }
    }
}

/// The user's live children, oldest first
pub(crate) async fn child_views(store: &Store, user_id: Uuid) -> Result<Vec<ChildView>, ApiError> {
    let today = Utc::now().date_naive();
    Ok(store
        .list_children(user_id, ReadScope::live())
        .await?
        .into_iter()
        .map(|c| ChildView::new(c, today))
        .collect())
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub profile_image: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct NewChildRequest {
    pub name: String,
    pub birth_date: NaiveDate,
    pub gender: Option<Gender>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChildUpdateRequest {
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub gender: Option<Option<Gender>>,
}

async fn get_profile(RequireAuth(user): RequireAuth) -> ApiResult<User> {
    ok("Profile retrieved.", user)
}

async fn update_profile(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProfileRequest>,
) -> ApiResult<User> {
    let updated = state
        .store
        .update_profile(
            user.id,
            &ProfileUpdate {
                name: request.name,
                profile_image: request.profile_image,
            },
        )
        .await?;
    ok("Profile updated.", updated)
}

async fn delete_account(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<()> {
    state.store.soft_delete_user(user.id).await?;
    info!(user_id = %user.id, "Account deleted");
    Ok(Json(ApiResponse::done("Account deleted.")))
}

async fn list_children(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<ChildView>> {
    ok("Children retrieved.", child_views(&state.store, user.id).await?)
}

async fn create_child(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewChildRequest>,
) -> Created<ChildView> {
    let child = state
        .store
        .create_child(
            user.id,
            &NewChild {
                name: request.name,
                birth_date: request.birth_date,
                gender: request.gender,
            },
        )
        .await?;
    created("Child registered.", ChildView::new(child, Utc::now().date_naive()))
}

async fn get_child(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ChildView> {
    let child = state.store.get_child(user.id, id, ReadScope::live()).await?;
    ok("Child retrieved.", ChildView::new(child, Utc::now().date_naive()))
}

async fn update_child(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ChildUpdateRequest>,
) -> ApiResult<ChildView> {
    let child = state
        .store
        .update_child(
            user.id,
            id,
            &ChildUpdate {
                name: request.name,
                birth_date: request.birth_date,
                gender: request.gender,
            },
        )
        .await?;
    ok("Child updated.", ChildView::new(child, Utc::now().date_naive()))
}

async fn delete_child(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.store.delete_child(user.id, id).await?;
    Ok(Json(ApiResponse::done("Child deleted.")))
}

/// Create users routes
pub fn users_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/users/profile",
            get(get_profile).put(update_profile).delete(delete_account),
        )
        .route("/api/v1/users/children", get(list_children).post(create_child))
        .route(
            "/api/v1/users/children/:id",
            get(get_child).put(update_child).delete(delete_child),
        )
        .with_state(state)
}
