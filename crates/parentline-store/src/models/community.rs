use super::{check_len, parse_label, parse_uuid, text_enum};
use crate::error::{FieldErrors, Result, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Name shown for anonymous authors
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

text_enum! {
    /// Kind of community post
    pub enum PostType {
        /// Asking for help
        Question => "question",
        /// Sharing advice
        Tip => "tip",
        /// Sharing an experience
        Story => "story",
    }
}

text_enum! {
    /// What a like points at
    pub enum LikeTarget {
        /// A post
        Post => "post",
        /// A comment
        Comment => "comment",
    }
}

/// A community board category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    /// Category id
    pub id: Uuid,
    /// Name
    pub name: String,
    /// Description
    pub description: String,
    /// Post kind this category holds
    pub post_type: PostType,
    /// Hex color
    pub color: String,
    /// Icon name
    pub icon: String,
    /// Sort key
    pub display_order: i64,
    /// Live posts in the category
    pub post_count: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct CategoryRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub post_type: String,
    pub color: String,
    pub icon: String,
    pub display_order: i64,
    pub post_count: i64,
}

impl TryFrom<CategoryRow> for Category {
    type Error = StoreError;

    fn try_from(row: CategoryRow) -> Result<Self> {
        Ok(Category {
            id: parse_uuid(&row.id, "category")?,
            name: row.name,
            description: row.description,
            post_type: parse_label(&row.post_type)?,
            color: row.color,
            icon: row.icon,
            display_order: row.display_order,
            post_count: row.post_count,
        })
    }
}

/// Category creation input
#[derive(Debug, Clone)]
pub struct NewCategory {
    /// Unique name
    pub name: String,
    /// Description
    pub description: String,
    /// Post kind
    pub post_type: PostType,
    /// Hex color
    pub color: String,
    /// Icon name
    pub icon: String,
    /// Sort key
    pub display_order: i64,
}

/// A community post
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    /// Post id
    pub id: Uuid,
    /// Author account (hidden from other users when anonymous)
    #[serde(skip)]
    pub user_id: Uuid,
    /// Author display name, or [`ANONYMOUS_AUTHOR`]
    pub author_name: String,
    /// Category
    pub category_id: Uuid,
    /// Category name
    pub category_name: String,
    /// Kind
    pub post_type: PostType,
    /// Title
    pub title: String,
    /// Body
    pub content: String,
    /// Views
    pub view_count: i64,
    /// Likes
    pub like_count: i64,
    /// Live comments
    pub comment_count: i64,
    /// Hide the author
    pub is_anonymous: bool,
    /// Question answered
    pub is_solved: bool,
    /// Shown first
    pub is_pinned: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
pub(crate) struct PostRow {
    pub id: String,
    pub user_id: String,
    pub author_name: String,
    pub category_id: String,
    pub category_name: String,
    pub post_type: String,
    pub title: String,
    pub content: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub is_anonymous: bool,
    pub is_solved: bool,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Post {
            id: parse_uuid(&row.id, "post")?,
            user_id: parse_uuid(&row.user_id, "user")?,
            author_name: if row.is_anonymous {
                ANONYMOUS_AUTHOR.to_string()
            } else {
                row.author_name
            },
            category_id: parse_uuid(&row.category_id, "category")?,
            category_name: row.category_name,
            post_type: parse_label(&row.post_type)?,
            title: row.title,
            content: row.content,
            view_count: row.view_count,
            like_count: row.like_count,
            comment_count: row.comment_count,
            is_anonymous: row.is_anonymous,
            is_solved: row.is_solved,
            is_pinned: row.is_pinned,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn check_post_text(errors: &mut FieldErrors, title: Option<&str>, content: Option<&str>) {
    if let Some(title) = title {
        check_len(errors, "title", title, 1, 200);
    }
    if let Some(content) = content {
        check_len(errors, "content", content, 1, 10_000);
    }
}

/// Post creation input
#[derive(Debug, Clone)]
pub struct NewPost {
    /// Category
    pub category_id: Uuid,
    /// Kind
    pub post_type: PostType,
    /// Title (1 to 200 characters)
    pub title: String,
    /// Body (1 to 10000 characters)
    pub content: String,
    /// Hide the author
    pub is_anonymous: bool,
}

impl NewPost {
    /// Validate the input
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_post_text(&mut errors, Some(&self.title), Some(&self.content));
        errors.into_result()
    }
}

/// Post edit
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    /// New category
    pub category_id: Option<Uuid>,
    /// New title
    pub title: Option<String>,
    /// New body
    pub content: Option<String>,
    /// New anonymity
    pub is_anonymous: Option<bool>,
}

impl PostUpdate {
    /// Validate the edit
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_post_text(&mut errors, self.title.as_deref(), self.content.as_deref());
        errors.into_result()
    }
}

/// Post list filters
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Only this kind
    pub post_type: Option<PostType>,
    /// Only this category
    pub category_id: Option<Uuid>,
    /// Substring of title or content
    pub search: Option<String>,
    /// Pinned state
    pub is_pinned: Option<bool>,
    /// Solved state
    pub is_solved: Option<bool>,
}

/// A comment on a post
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    /// Comment id
    pub id: Uuid,
    /// Post
    pub post_id: Uuid,
    /// Author account
    #[serde(skip)]
    pub user_id: Uuid,
    /// Author display name, or [`ANONYMOUS_AUTHOR`]
    pub author_name: String,
    /// Parent comment for replies
    pub parent_id: Option<Uuid>,
    /// 0 for top level, 1 for replies
    pub depth: i64,
    /// Body
    pub content: String,
    /// Likes
    pub like_count: i64,
    /// Hide the author
    pub is_anonymous: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub author_name: String,
    pub parent_id: Option<String>,
    pub depth: i64,
    pub content: String,
    pub like_count: i64,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = StoreError;

    fn try_from(row: CommentRow) -> Result<Self> {
        Ok(Comment {
            id: parse_uuid(&row.id, "comment")?,
            post_id: parse_uuid(&row.post_id, "post")?,
            user_id: parse_uuid(&row.user_id, "user")?,
            author_name: if row.is_anonymous {
                ANONYMOUS_AUTHOR.to_string()
            } else {
                row.author_name
            },
            parent_id: row
                .parent_id
                .as_deref()
                .map(|raw| parse_uuid(raw, "comment"))
                .transpose()?,
            depth: row.depth,
            content: row.content,
            like_count: row.like_count,
            is_anonymous: row.is_anonymous,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A top-level comment with its replies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
    /// The comment
    #[serde(flatten)]
    pub comment: Comment,
    /// Replies, oldest first
    pub replies: Vec<Comment>,
}

/// Group a flat, oldest-first comment list into top-level nodes
pub(crate) fn comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let (top, replies): (Vec<_>, Vec<_>) =
        comments.into_iter().partition(|c| c.parent_id.is_none());

    let mut by_parent: BTreeMap<Uuid, Vec<Comment>> = BTreeMap::new();
    for reply in replies {
        if let Some(parent) = reply.parent_id {
            by_parent.entry(parent).or_default().push(reply);
        }
    }

    top.into_iter()
        .map(|comment| CommentNode {
            replies: by_parent.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect()
}

/// A post with its comment tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetail {
    /// The post
    #[serde(flatten)]
    pub post: Post,
    /// Top-level comments, oldest first
    pub comments: Vec<CommentNode>,
    /// Whether the viewer liked the post
    pub is_liked: bool,
}

/// Comment creation input
#[derive(Debug, Clone)]
pub struct NewComment {
    /// Post
    pub post_id: Uuid,
    /// Parent comment for a reply
    pub parent_id: Option<Uuid>,
    /// Body (1 to 1000 characters)
    pub content: String,
    /// Hide the author
    pub is_anonymous: bool,
}

impl NewComment {
    /// Validate the input
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_len(&mut errors, "content", &self.content, 1, 1000);
        errors.into_result()
    }
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    /// Liked after the toggle
    pub is_liked: bool,
    /// Target's like count after the toggle
    pub like_count: i64,
}

/// Community-wide aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommunityStats {
    /// Live posts
    pub total_posts: i64,
    /// Live comments
    pub total_comments: i64,
    /// Likes on anything
    pub total_likes: i64,
    /// Live posts by kind
    pub posts_by_type: BTreeMap<String, i64>,
    /// Live posts by category name
    pub posts_by_category: BTreeMap<String, i64>,
    /// Ten newest posts
    pub recent_posts: Vec<Post>,
    /// Ten most liked posts
    pub popular_posts: Vec<Post>,
}
