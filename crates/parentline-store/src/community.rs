use crate::error::{Result, StoreError};
use crate::models::{
    comment_tree, Category, CategoryRow, Comment, CommentRow, CommunityStats, LikeOutcome,
    LikeTarget, NewCategory, NewComment, NewPost, Post, PostDetail, PostFilter, PostRow, PostType,
    PostUpdate,
};
use crate::page::{Page, PageRequest};
use crate::scope::ReadScope;
use crate::Store;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

const POST_SELECT: &str = r#"
    SELECT p.id, p.user_id, u.name AS author_name, p.category_id,
           cat.name AS category_name, p.post_type, p.title, p.content,
           p.view_count, p.like_count, p.comment_count, p.is_anonymous,
           p.is_solved, p.is_pinned, p.created_at, p.updated_at, p.deleted_at
    FROM posts p
    JOIN users u ON u.id = p.user_id
    JOIN categories cat ON cat.id = p.category_id
"#;

const POST_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM posts p
    JOIN users u ON u.id = p.user_id
    JOIN categories cat ON cat.id = p.category_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT cm.id, cm.post_id, cm.user_id, u.name AS author_name, cm.parent_id,
           cm.depth, cm.content, cm.like_count, cm.is_anonymous,
           cm.created_at, cm.updated_at
    FROM comments cm
    JOIN users u ON u.id = cm.user_id
"#;

/// Deepest reply level
const MAX_COMMENT_DEPTH: i64 = 1;

fn posts<'a>(select: &str, filter: &PostFilter, scope: ReadScope) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" WHERE ").push(scope.predicate("p"));
    if let Some(post_type) = filter.post_type {
        qb.push(" AND p.post_type = ").push_bind(post_type.as_str());
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND p.category_id = ").push_bind(category_id.to_string());
    }
    if let Some(pinned) = filter.is_pinned {
        qb.push(" AND p.is_pinned = ").push_bind(pinned);
    }
    if let Some(solved) = filter.is_solved {
        qb.push(" AND p.is_solved = ").push_bind(solved);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (p.title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.content LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb
}

impl Store {
    /// Active categories with their live post counts
    pub async fn list_categories(&self, post_type: Option<PostType>) -> Result<Vec<Category>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"
            SELECT cat.id, cat.name, cat.description, cat.post_type, cat.color, cat.icon,
                   cat.display_order,
                   (SELECT COUNT(*) FROM posts p
                    WHERE p.category_id = cat.id AND {}) AS post_count
            FROM categories cat
            WHERE cat.is_active = TRUE
            "#,
            ReadScope::live().predicate("p")
        ));
        if let Some(post_type) = post_type {
            qb.push(" AND cat.post_type = ").push_bind(post_type.as_str());
        }
        qb.push(" ORDER BY cat.display_order ASC, cat.name ASC");

        let rows: Vec<CategoryRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Category::try_from).collect()
    }

    /// Add a category
    pub async fn create_category(&self, category: &NewCategory) -> Result<Category> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, post_type, color, icon, display_order, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(category.name.trim())
        .bind(&category.description)
        .bind(category.post_type.as_str())
        .bind(&category.color)
        .bind(&category.icon)
        .bind(category.display_order)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unique_as_validation(e, "name", "Category already exists."))?;

        self.list_categories(None)
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("category", id))
    }

    /// Filtered, paged posts: pinned first, then newest
    pub async fn list_posts(
        &self,
        filter: &PostFilter,
        scope: ReadScope,
        page: PageRequest,
    ) -> Result<Page<Post>> {
        let total: i64 = posts(POST_COUNT, filter, scope)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = posts(POST_SELECT, filter, scope);
        qb.push(" ORDER BY p.is_pinned DESC, p.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<PostRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Post::try_from)
                .collect::<Result<Vec<_>>>()?,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    /// One post
    pub async fn get_post(&self, id: Uuid, scope: ReadScope) -> Result<Post> {
        let mut qb = posts(POST_SELECT, &PostFilter::default(), scope);
        qb.push(" AND p.id = ").push_bind(id.to_string());
        let row: PostRow = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("post", id))?;
        row.try_into()
    }

    /// Open a post: count the view and load its comment tree
    pub async fn post_detail(&self, viewer: Uuid, id: Uuid) -> Result<PostDetail> {
        let viewed = sqlx::query(
            "UPDATE posts SET view_count = view_count + 1 WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if viewed.rows_affected() == 0 {
            return Err(StoreError::not_found("post", id));
        }

        let post = self.get_post(id, ReadScope::live()).await?;
        let comments = self.list_comments(id, ReadScope::live()).await?;

        let is_liked = self.has_liked(viewer, LikeTarget::Post, id).await?;
        Ok(PostDetail {
            post,
            comments: comment_tree(comments),
            is_liked,
        })
    }

    /// Publish a post
    pub async fn create_post(&self, user_id: Uuid, input: &NewPost) -> Result<Post> {
        input.validate()?;
        self.require_category(input.category_id).await?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, user_id, category_id, post_type, title, content,
                is_anonymous, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(input.category_id.to_string())
        .bind(input.post_type.as_str())
        .bind(input.title.trim())
        .bind(&input.content)
        .bind(input.is_anonymous)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(user_id = %user_id, post_id = %id, "Post created");
        self.get_post(id, ReadScope::live()).await
    }

    async fn own_post(&self, user_id: Uuid, id: Uuid) -> Result<Post> {
        let post = self.get_post(id, ReadScope::live()).await?;
        if post.user_id != user_id {
            return Err(StoreError::Forbidden(
                "only the author may change this post".to_string(),
            ));
        }
        Ok(post)
    }

    async fn require_category(&self, id: Uuid) -> Result<()> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM categories WHERE id = ? AND is_active = TRUE")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(StoreError::invalid("category_id", "Category not found.")),
        }
    }

    /// Edit a post (author only)
    pub async fn update_post(&self, user_id: Uuid, id: Uuid, update: &PostUpdate) -> Result<Post> {
        update.validate()?;
        let mut post = self.own_post(user_id, id).await?;
        if let Some(category_id) = update.category_id {
            self.require_category(category_id).await?;
            post.category_id = category_id;
        }
        if let Some(title) = &update.title {
            post.title = title.trim().to_string();
        }
        if let Some(content) = &update.content {
            post.content = content.clone();
        }
        if let Some(anonymous) = update.is_anonymous {
            post.is_anonymous = anonymous;
        }

        sqlx::query(
            r#"
            UPDATE posts SET category_id = ?, title = ?, content = ?, is_anonymous = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(post.category_id.to_string())
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.is_anonymous)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.get_post(id, ReadScope::live()).await
    }

    /// Soft-delete a post (author only)
    pub async fn delete_post(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.own_post(user_id, id).await?;
        let now = Utc::now();
        sqlx::query("UPDATE posts SET deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        info!(user_id = %user_id, post_id = %id, "Post soft-deleted");
        Ok(())
    }

    /// Flip the solved flag (author only)
    pub async fn toggle_solved(&self, user_id: Uuid, id: Uuid) -> Result<Post> {
        self.own_post(user_id, id).await?;
        sqlx::query("UPDATE posts SET is_solved = NOT is_solved, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.get_post(id, ReadScope::live()).await
    }

    /// Comments on a post, oldest first
    pub async fn list_comments(&self, post_id: Uuid, scope: ReadScope) -> Result<Vec<Comment>> {
        let rows: Vec<CommentRow> = sqlx::query_as(&format!(
            "{} WHERE cm.post_id = ? AND {} ORDER BY cm.created_at ASC",
            COMMENT_SELECT,
            scope.predicate("cm")
        ))
        .bind(post_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Comment::try_from).collect()
    }

    /// One comment
    pub async fn get_comment(&self, id: Uuid, scope: ReadScope) -> Result<Comment> {
        let row: CommentRow = sqlx::query_as(&format!(
            "{} WHERE cm.id = ? AND {}",
            COMMENT_SELECT,
            scope.predicate("cm")
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("comment", id))?;
        row.try_into()
    }

    /// Comment on a post, or reply to a top-level comment
    pub async fn create_comment(&self, user_id: Uuid, input: &NewComment) -> Result<Comment> {
        input.validate()?;
        self.get_post(input.post_id, ReadScope::live()).await?;

        let depth = match input.parent_id {
            Some(parent_id) => {
                let parent = match self.get_comment(parent_id, ReadScope::live()).await {
                    Ok(parent) => parent,
                    Err(StoreError::NotFound { .. }) => {
                        return Err(StoreError::invalid("parent_id", "Parent comment not found."))
                    }
                    Err(e) => return Err(e),
                };
                if parent.post_id != input.post_id {
                    return Err(StoreError::invalid(
                        "parent_id",
                        "Parent comment belongs to another post.",
                    ));
                }
                if parent.depth + 1 > MAX_COMMENT_DEPTH {
                    return Err(StoreError::invalid(
                        "parent_id",
                        "Replies can only be one level deep.",
                    ));
                }
                parent.depth + 1
            }
            None => 0,
        };

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO comments (
                id, post_id, user_id, parent_id, depth, content, is_anonymous,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(input.post_id.to_string())
        .bind(user_id.to_string())
        .bind(input.parent_id.map(|p| p.to_string()))
        .bind(depth)
        .bind(&input.content)
        .bind(input.is_anonymous)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?")
            .bind(input.post_id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(post_id = %input.post_id, comment_id = %id, depth, "Comment created");
        self.get_comment(id, ReadScope::live()).await
    }

    /// Edit a comment (author only)
    pub async fn update_comment(&self, user_id: Uuid, id: Uuid, content: &str) -> Result<Comment> {
        let draft = NewComment {
            post_id: Uuid::nil(),
            parent_id: None,
            content: content.to_string(),
            is_anonymous: false,
        };
        draft.validate()?;

        let comment = self.get_comment(id, ReadScope::live()).await?;
        if comment.user_id != user_id {
            return Err(StoreError::Forbidden(
                "only the author may change this comment".to_string(),
            ));
        }

        sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.get_comment(id, ReadScope::live()).await
    }

    /// Soft-delete a comment (author only)
    pub async fn delete_comment(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let comment = self.get_comment(id, ReadScope::live()).await?;
        if comment.user_id != user_id {
            return Err(StoreError::Forbidden(
                "only the author may change this comment".to_string(),
            ));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE comments SET deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE posts SET comment_count = MAX(comment_count - 1, 0) WHERE id = ?",
        )
        .bind(comment.post_id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn has_liked(&self, user_id: Uuid, target: LikeTarget, target_id: Uuid) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM likes WHERE user_id = ? AND target_type = ? AND target_id = ?",
        )
        .bind(user_id.to_string())
        .bind(target.as_str())
        .bind(target_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Like a post or comment, or take the like back
    pub async fn toggle_like(
        &self,
        user_id: Uuid,
        target: LikeTarget,
        target_id: Uuid,
    ) -> Result<LikeOutcome> {
        let table = match target {
            LikeTarget::Post => {
                self.get_post(target_id, ReadScope::live()).await?;
                "posts"
            }
            LikeTarget::Comment => {
                self.get_comment(target_id, ReadScope::live()).await?;
                "comments"
            }
        };

        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query(
            "DELETE FROM likes WHERE user_id = ? AND target_type = ? AND target_id = ?",
        )
        .bind(user_id.to_string())
        .bind(target.as_str())
        .bind(target_id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let is_liked = removed == 0;
        if is_liked {
            sqlx::query(
                "INSERT INTO likes (id, user_id, target_type, target_id, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(user_id.to_string())
            .bind(target.as_str())
            .bind(target_id.to_string())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        let delta = if is_liked { "+ 1" } else { "- 1" };
        sqlx::query(&format!(
            "UPDATE {table} SET like_count = MAX(like_count {delta}, 0) WHERE id = ?"
        ))
        .bind(target_id.to_string())
        .execute(&mut *tx)
        .await?;

        let like_count: i64 = sqlx::query_scalar(&format!("SELECT like_count FROM {table} WHERE id = ?"))
            .bind(target_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(LikeOutcome {
            is_liked,
            like_count,
        })
    }

    /// Community-wide totals and highlights
    pub async fn community_stats(&self) -> Result<CommunityStats> {
        let live = ReadScope::live();
        let total_posts: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM posts p WHERE {}",
            live.predicate("p")
        ))
        .fetch_one(&self.pool)
        .await?;
        let total_comments: i64 = sqlx::query_scalar(&format!(
            r#"
            SELECT COUNT(*) FROM comments cm
            JOIN posts p ON p.id = cm.post_id
            WHERE {} AND {}
            "#,
            live.predicate("cm"),
            live.predicate("p")
        ))
        .fetch_one(&self.pool)
        .await?;
        let total_likes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes")
            .fetch_one(&self.pool)
            .await?;

        let by_type: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT p.post_type, COUNT(*) FROM posts p WHERE {} GROUP BY p.post_type",
            live.predicate("p")
        ))
        .fetch_all(&self.pool)
        .await?;
        let by_category: Vec<(String, i64)> = sqlx::query_as(&format!(
            r#"
            SELECT cat.name, COUNT(*) FROM posts p
            JOIN categories cat ON cat.id = p.category_id
            WHERE {}
            GROUP BY cat.name
            "#,
            live.predicate("p")
        ))
        .fetch_all(&self.pool)
        .await?;

        let highlight = |order: &str| {
            format!(
                "{} WHERE {} ORDER BY {} LIMIT 10",
                POST_SELECT,
                live.predicate("p"),
                order
            )
        };
        let recent: Vec<PostRow> = sqlx::query_as(&highlight("p.created_at DESC"))
            .fetch_all(&self.pool)
            .await?;
        let popular: Vec<PostRow> = sqlx::query_as(&highlight("p.like_count DESC, p.created_at DESC"))
            .fetch_all(&self.pool)
            .await?;

        Ok(CommunityStats {
            total_posts,
            total_comments,
            total_likes,
            posts_by_type: by_type.into_iter().collect(),
            posts_by_category: by_category.into_iter().collect(),
            recent_posts: recent.into_iter().map(Post::try_from).collect::<Result<_>>()?,
            popular_posts: popular.into_iter().map(Post::try_from).collect::<Result<_>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{
        LikeTarget, NewCategory, NewComment, NewPost, PostFilter, PostType, PostUpdate,
        ANONYMOUS_AUTHOR,
    };
    use crate::page::PageRequest;
    use crate::test_support::{create_test_context, user};
    use crate::{ReadScope, Store, StoreError};
    use uuid::Uuid;

    async fn category(store: &Store, name: &str) -> Uuid {
        store
            .create_category(&NewCategory {
                name: name.to_string(),
                description: String::new(),
                post_type: PostType::Question,
                color: "#3B82F6".to_string(),
                icon: "help".to_string(),
                display_order: 1,
            })
            .await
            .unwrap()
            .id
    }

    fn post(category_id: Uuid, title: &str) -> NewPost {
        NewPost {
            category_id,
            post_type: PostType::Question,
            title: title.to_string(),
            content: "How do you handle night feeds?".to_string(),
            is_anonymous: false,
        }
    }

    fn comment(post_id: Uuid, parent_id: Option<Uuid>) -> NewComment {
        NewComment {
            post_id,
            parent_id,
            content: "Same here".to_string(),
            is_anonymous: false,
        }
    }

    #[tokio::test]
    async fn test_post_lifecycle_and_ownership() {
        let ctx = create_test_context().await;
        let author = user(&ctx.store, "author@example.com").await;
        let other = user(&ctx.store, "other@example.com").await;
        let cat = category(&ctx.store, "Sleep").await;

        let created = ctx.store.create_post(author.id, &post(cat, "Night feeds")).await.unwrap();
        assert_eq!(created.category_name, "Sleep");
        assert_eq!(created.author_name, "Test Parent");

        let err = ctx
            .store
            .update_post(
                other.id,
                created.id,
                &PostUpdate {
                    title: Some("Hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        assert!(matches!(
            ctx.store.toggle_solved(other.id, created.id).await,
            Err(StoreError::Forbidden(_))
        ));

        let solved = ctx.store.toggle_solved(author.id, created.id).await.unwrap();
        assert!(solved.is_solved);

        ctx.store.delete_post(author.id, created.id).await.unwrap();
        let page = ctx
            .store
            .list_posts(&PostFilter::default(), ReadScope::live(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(ctx.store.get_post(created.id, ReadScope::include_deleted()).await.is_ok());
        assert_eq!(ctx.store.list_categories(None).await.unwrap()[0].post_count, 0);
    }

    #[tokio::test]
    async fn test_anonymous_post_hides_author() {
        let ctx = create_test_context().await;
        let author = user(&ctx.store, "anon@example.com").await;
        let cat = category(&ctx.store, "Worries").await;

        let mut input = post(cat, "Is this normal?");
        input.is_anonymous = true;
        let created = ctx.store.create_post(author.id, &input).await.unwrap();
        assert_eq!(created.author_name, ANONYMOUS_AUTHOR);

        let json = serde_json::to_value(&created).unwrap();
        assert!(json.get("user_id").is_none());
    }

    #[tokio::test]
    async fn test_pinned_first_and_filters() {
        let ctx = create_test_context().await;
        let author = user(&ctx.store, "a@example.com").await;
        let cat = category(&ctx.store, "General").await;

        let first = ctx.store.create_post(author.id, &post(cat, "Older")).await.unwrap();
        ctx.store.create_post(author.id, &post(cat, "Newer")).await.unwrap();
        sqlx::query("UPDATE posts SET is_pinned = TRUE WHERE id = ?")
            .bind(first.id.to_string())
            .execute(&ctx.store.pool)
            .await
            .unwrap();

        let page = ctx
            .store
            .list_posts(&PostFilter::default(), ReadScope::live(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items[0].title, "Older");

        let search = PostFilter {
            search: Some("newer".to_string()),
            ..Default::default()
        };
        let found = ctx
            .store
            .list_posts(&search, ReadScope::live(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(found.total, 1);
    }

    #[tokio::test]
    async fn test_comment_tree_and_counts() {
        let ctx = create_test_context().await;
        let author = user(&ctx.store, "a@example.com").await;
        let reader = user(&ctx.store, "r@example.com").await;
        let cat = category(&ctx.store, "Food").await;
        let p = ctx.store.create_post(author.id, &post(cat, "Weaning")).await.unwrap();

        let top = ctx.store.create_comment(reader.id, &comment(p.id, None)).await.unwrap();
        let reply = ctx
            .store
            .create_comment(author.id, &comment(p.id, Some(top.id)))
            .await
            .unwrap();
        assert_eq!(reply.depth, 1);

        let err = ctx
            .store
            .create_comment(reader.id, &comment(p.id, Some(reply.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let detail = ctx.store.post_detail(reader.id, p.id).await.unwrap();
        assert_eq!(detail.post.comment_count, 2);
        assert_eq!(detail.post.view_count, 1);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].replies[0].id, reply.id);

        assert!(matches!(
            ctx.store.delete_comment(author.id, top.id).await,
            Err(StoreError::Forbidden(_))
        ));
        ctx.store.delete_comment(author.id, reply.id).await.unwrap();
        let detail = ctx.store.post_detail(reader.id, p.id).await.unwrap();
        assert_eq!(detail.post.comment_count, 1);
        assert!(detail.comments[0].replies.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_comment_visible_only_with_include_deleted() {
        let ctx = create_test_context().await;
        let author = user(&ctx.store, "a@example.com").await;
        let cat = category(&ctx.store, "Play").await;
        let p = ctx.store.create_post(author.id, &post(cat, "Toys")).await.unwrap();
        let c = ctx.store.create_comment(author.id, &comment(p.id, None)).await.unwrap();

        ctx.store.delete_comment(author.id, c.id).await.unwrap();

        assert!(matches!(
            ctx.store.get_comment(c.id, ReadScope::live()).await,
            Err(StoreError::NotFound { .. })
        ));
        let kept = ctx
            .store
            .get_comment(c.id, ReadScope::include_deleted())
            .await
            .unwrap();
        assert_eq!(kept.id, c.id);

        let live = ctx.store.list_comments(p.id, ReadScope::live()).await.unwrap();
        assert!(live.is_empty());
        let all = ctx
            .store
            .list_comments(p.id, ReadScope::include_deleted())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_like_toggles() {
        let ctx = create_test_context().await;
        let author = user(&ctx.store, "a@example.com").await;
        let fan = user(&ctx.store, "f@example.com").await;
        let cat = category(&ctx.store, "Play").await;
        let p = ctx.store.create_post(author.id, &post(cat, "Rainy day games")).await.unwrap();

        let liked = ctx.store.toggle_like(fan.id, LikeTarget::Post, p.id).await.unwrap();
        assert!(liked.is_liked);
        assert_eq!(liked.like_count, 1);
        assert!(ctx.store.post_detail(fan.id, p.id).await.unwrap().is_liked);

        let unliked = ctx.store.toggle_like(fan.id, LikeTarget::Post, p.id).await.unwrap();
        assert!(!unliked.is_liked);
        assert_eq!(unliked.like_count, 0);

        assert!(matches!(
            ctx.store.toggle_like(fan.id, LikeTarget::Comment, Uuid::new_v4()).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let ctx = create_test_context().await;
        let author = user(&ctx.store, "a@example.com").await;
        let cat = category(&ctx.store, "Health").await;
        let p = ctx.store.create_post(author.id, &post(cat, "Fever")).await.unwrap();
        ctx.store.create_comment(author.id, &comment(p.id, None)).await.unwrap();
        ctx.store.toggle_like(author.id, LikeTarget::Post, p.id).await.unwrap();

        let stats = ctx.store.community_stats().await.unwrap();
        assert_eq!(stats.total_posts, 1);
        assert_eq!(stats.total_comments, 1);
        assert_eq!(stats.total_likes, 1);
        assert_eq!(stats.posts_by_type.get("question"), Some(&1));
        assert_eq!(stats.posts_by_category.get("Health"), Some(&1));
        assert_eq!(stats.popular_posts[0].id, p.id);
    }
}
