//! Community API endpoints
//!
//! GET    /api/v1/community/categories      - Categories with post counts
//! GET    /api/v1/community/posts           - Filtered, paged posts
//! POST   /api/v1/community/posts           - Create a post
//! GET    /api/v1/community/posts/:id       - Post with its comment tree
//! PUT    /api/v1/community/posts/:id       - Edit a post (author only)
//! DELETE /api/v1/community/posts/:id       - Delete a post (author only, soft)
//! PUT    /api/v1/community/posts/:id/solve - Toggle solved (author only)
//! POST   /api/v1/community/comments        - Comment or reply
//! PUT    /api/v1/community/comments/:id    - Edit a comment (author only)
//! DELETE /api/v1/community/comments/:id    - Delete a comment (author only, soft)
//! POST   /api/v1/community/likes           - Toggle a like
//! GET    /api/v1/community/stats           - Community statistics

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use parentline_store::{
    Category, Comment, CommunityStats, LikeOutcome, LikeTarget, NewComment, NewPost, PageRequest,
    Post, PostDetail, PostFilter, PostType, PostUpdate, ReadScope,
};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{created, ok, ApiResponse, ApiResult, Created};
use super::state::AppState;
use crate::middleware::auth::RequireAuth;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub post_type: Option<PostType>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostQuery {
    pub post_type: Option<PostType>,
    pub category: Option<Uuid>,
    pub search: Option<String>,
    pub is_pinned: Option<bool>,
    pub is_solved: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct NewPostRequest {
    pub category_id: Uuid,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostUpdateRequest {
    pub category_id: Option<Uuid>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_anonymous: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct NewCommentRequest {
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Deserialize)]
pub struct CommentUpdateRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub target_type: LikeTarget,
    pub target_id: Uuid,
}

async fn list_categories(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> ApiResult<Vec<Category>> {
    let categories = state.store.list_categories(query.post_type).await?;
    ok("Categories retrieved.", categories)
}

async fn list_posts(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PostQuery>,
) -> ApiResult<Vec<Post>> {
    let filter = PostFilter {
        post_type: query.post_type,
        category_id: query.category,
        search: query.search.filter(|s| !s.trim().is_empty()),
        is_pinned: query.is_pinned,
        is_solved: query.is_solved,
    };
    let page = state
        .store
        .list_posts(
            &filter,
            ReadScope::live(),
            PageRequest::new(query.page, query.limit),
        )
        .await?;
    Ok(Json(ApiResponse::paged("Posts retrieved.", page)))
}

async fn create_post(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewPostRequest>,
) -> Created<Post> {
    let post = state
        .store
        .create_post(
            user.id,
            &NewPost {
                category_id: request.category_id,
                post_type: request.post_type,
                title: request.title,
                content: request.content,
                is_anonymous: request.is_anonymous,
            },
        )
        .await?;
    created("Post created.", post)
}

async fn get_post(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<PostDetail> {
    let detail = state.store.post_detail(user.id, id).await?;
    ok("Post retrieved.", detail)
}

async fn update_post(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<PostUpdateRequest>,
) -> ApiResult<Post> {
    let post = state
        .store
        .update_post(
            user.id,
            id,
            &PostUpdate {
                category_id: request.category_id,
                title: request.title,
                content: request.content,
                is_anonymous: request.is_anonymous,
            },
        )
        .await?;
    ok("Post updated.", post)
}

async fn delete_post(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.store.delete_post(user.id, id).await?;
    Ok(Json(ApiResponse::done("Post deleted.")))
}

async fn toggle_solved(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Post> {
    let post = state.store.toggle_solved(user.id, id).await?;
    let message = if post.is_solved {
        "Post marked as solved."
    } else {
        "Post marked as unsolved."
    };
    ok(message, post)
}

async fn create_comment(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewCommentRequest>,
) -> Created<Comment> {
    let comment = state
        .store
        .create_comment(
            user.id,
            &NewComment {
                post_id: request.post_id,
                parent_id: request.parent_id,
                content: request.content,
                is_anonymous: request.is_anonymous,
            },
        )
        .await?;
    created("Comment created.", comment)
}

async fn update_comment(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CommentUpdateRequest>,
) -> ApiResult<Comment> {
    let comment = state
        .store
        .update_comment(user.id, id, &request.content)
        .await?;
    ok("Comment updated.", comment)
}

async fn delete_comment(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.store.delete_comment(user.id, id).await?;
    Ok(Json(ApiResponse::done("Comment deleted.")))
}

async fn toggle_like(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LikeRequest>,
) -> ApiResult<LikeOutcome> {
    let outcome = state
        .store
        .toggle_like(user.id, request.target_type, request.target_id)
        .await?;
    let message = if outcome.is_liked { "Liked." } else { "Like removed." };
    ok(message, outcome)
}

async fn community_stats(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<CommunityStats> {
    ok("Community statistics retrieved.", state.store.community_stats().await?)
}

/// Create community routes
pub fn community_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/community/categories", get(list_categories))
        .route(
            "/api/v1/community/posts",
            get(list_posts).post(create_post),
        )
        .route(
            "/api/v1/community/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/api/v1/community/posts/:id/solve", put(toggle_solved))
        .route("/api/v1/community/comments", post(create_comment))
        .route(
            "/api/v1/community/comments/:id",
            put(update_comment).delete(delete_comment),
        )
        .route("/api/v1/community/likes", post(toggle_like))
        .route("/api/v1/community/stats", get(community_stats))
        .with_state(state)
}
