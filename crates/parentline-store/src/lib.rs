//! Parentline Store - relational persistence
//!
//! SQLite repositories (sqlx) for the REST side of the platform:
//! - Users and auth sessions
//! - Children
//! - Development records, milestones and child milestone achievements
//! - Community categories, posts, comments and likes
//!
//! Soft delete is part of the repository contract: every read takes a
//! [`ReadScope`] whose default hides soft-deleted rows, and deletes only set
//! `deleted_at`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod page;
pub mod scope;

mod children;
mod community;
mod development;
mod migrations;
mod milestones;
mod users;

pub use error::{FieldErrors, Result, StoreError};
pub use models::*;
pub use page::{Page, PageRequest};
pub use scope::ReadScope;

use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use tracing::info;

/// SQLite-backed store
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: Pool<Sqlite>,
}

impl Store {
    /// Open (creating if needed) the database at `path`
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Setup(format!("Failed to create directory: {}", e)))?;
        }
        Self::connect(&format!("sqlite:{}?mode=rwc", path.display())).await
    }

    /// Connect to a sqlx SQLite URL and run migrations
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url = %url, "Database ready");
        Ok(store)
    }

    /// Check the database answers
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;
    use uuid::Uuid;

    pub struct TestContext {
        pub store: Store,
        _dir: TempDir,
    }

    pub async fn create_test_context() -> TestContext {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_parentline.db");
        let store = Store::from_path(&path).await.unwrap();
        TestContext { store, _dir: dir }
    }

    pub async fn user(store: &Store, email: &str) -> User {
        store
            .upsert_social_user(&SocialSignup {
                email: email.to_string(),
                name: "Test Parent".to_string(),
                profile_image: None,
                auth_provider: "google".to_string(),
                auth_provider_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn child(store: &Store, user_id: Uuid, name: &str) -> Child {
        store
            .create_child(
                user_id,
                &NewChild {
                    name: name.to_string(),
                    birth_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                    gender: Some(Gender::Female),
                },
            )
            .await
            .unwrap()
    }
}
