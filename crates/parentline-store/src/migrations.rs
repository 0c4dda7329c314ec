use crate::error::{Result, StoreError};
use crate::Store;

const SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            profile_image TEXT,
            auth_provider TEXT NOT NULL,
            auth_provider_id TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            is_staff BOOLEAN NOT NULL DEFAULT FALSE,
            last_login TIMESTAMP,
            date_joined TIMESTAMP NOT NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            deleted_at TIMESTAMP
        )
        "#,
    ),
    (
        "auth_sessions",
        r#"
        CREATE TABLE IF NOT EXISTS auth_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            access_hash TEXT NOT NULL UNIQUE,
            refresh_hash TEXT NOT NULL UNIQUE,
            device_info TEXT,
            ip_address TEXT,
            access_expires_at TIMESTAMP NOT NULL,
            refresh_expires_at TIMESTAMP NOT NULL,
            created_at TIMESTAMP NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "children",
        r#"
        CREATE TABLE IF NOT EXISTS children (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            birth_date DATE NOT NULL,
            gender TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            deleted_at TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "development_records",
        r#"
        CREATE TABLE IF NOT EXISTS development_records (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            child_id TEXT NOT NULL,
            date DATE NOT NULL,
            age_group TEXT NOT NULL,
            development_area TEXT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            record_type TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            deleted_at TIMESTAMP,
            FOREIGN KEY (child_id) REFERENCES children(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "development_milestones",
        r#"
        CREATE TABLE IF NOT EXISTS development_milestones (
            id TEXT PRIMARY KEY,
            age_group TEXT NOT NULL,
            development_area TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            display_order INTEGER NOT NULL DEFAULT 0,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL,
            UNIQUE (age_group, development_area, title)
        )
        "#,
    ),
    (
        "child_milestones",
        r#"
        CREATE TABLE IF NOT EXISTS child_milestones (
            id TEXT PRIMARY KEY,
            child_id TEXT NOT NULL,
            milestone_id TEXT NOT NULL,
            achieved_date DATE NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL,
            UNIQUE (child_id, milestone_id),
            FOREIGN KEY (child_id) REFERENCES children(id) ON DELETE CASCADE,
            FOREIGN KEY (milestone_id) REFERENCES development_milestones(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "categories",
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            post_type TEXT NOT NULL,
            color TEXT NOT NULL DEFAULT '#6B7280',
            icon TEXT NOT NULL DEFAULT '',
            display_order INTEGER NOT NULL DEFAULT 0,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    ),
    (
        "posts",
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            post_type TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            view_count INTEGER NOT NULL DEFAULT 0,
            like_count INTEGER NOT NULL DEFAULT 0,
            comment_count INTEGER NOT NULL DEFAULT 0,
            is_anonymous BOOLEAN NOT NULL DEFAULT FALSE,
            is_solved BOOLEAN NOT NULL DEFAULT FALSE,
            is_pinned BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            deleted_at TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    ),
    (
        "comments",
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            parent_id TEXT,
            depth INTEGER NOT NULL DEFAULT 0,
            content TEXT NOT NULL,
            like_count INTEGER NOT NULL DEFAULT 0,
            is_anonymous BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            deleted_at TIMESTAMP,
            FOREIGN KEY (post_id) REFERENCES posts(id),
            FOREIGN KEY (parent_id) REFERENCES comments(id)
        )
        "#,
    ),
    (
        "likes",
        r#"
        CREATE TABLE IF NOT EXISTS likes (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            target_type TEXT NOT NULL,
            target_id TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            UNIQUE (user_id, target_type, target_id)
        )
        "#,
    ),
    (
        "idx_records_child",
        "CREATE INDEX IF NOT EXISTS idx_records_child ON development_records(child_id, date)",
    ),
    (
        "idx_records_user",
        "CREATE INDEX IF NOT EXISTS idx_records_user ON development_records(user_id)",
    ),
    (
        "idx_children_user",
        "CREATE INDEX IF NOT EXISTS idx_children_user ON children(user_id)",
    ),
    (
        "idx_posts_listing",
        "CREATE INDEX IF NOT EXISTS idx_posts_listing ON posts(is_pinned, created_at)",
    ),
    (
        "idx_comments_post",
        "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)",
    ),
    (
        "idx_sessions_user",
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON auth_sessions(user_id)",
    ),
];

impl Store {
    /// Run database migrations
    pub(crate) async fn migrate(&self) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Setup(e.to_string()))?;

        for (name, ddl) in SCHEMA {
            sqlx::query(ddl)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Setup(format!("Migration failed ({}): {}", name, e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Setup(e.to_string()))?;

        Ok(())
    }
}
