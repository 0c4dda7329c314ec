use crate::error::{Result, StoreError};
use crate::models::{
    AuthSession, AuthSessionRow, NewAuthSession, ProfileUpdate, SocialSignup, User, UserRow,
};
use crate::scope::ReadScope;
use crate::Store;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

impl Store {
    /// Sign-in by a verified social profile: fetch the account with that
    /// email or create it, and record the login
    ///
    /// A soft-deleted or deactivated account is refused.
    pub async fn upsert_social_user(&self, signup: &SocialSignup) -> Result<User> {
        let email = signup.email.trim().to_lowercase();
        let now = Utc::now();

        let existing: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = existing {
            let user = User::try_from(row)?;
            if user.deleted_at.is_some() {
                return Err(StoreError::Forbidden("account has been deleted".to_string()));
            }
            if !user.is_active {
                return Err(StoreError::Forbidden("account is inactive".to_string()));
            }
            self.touch_last_login(user.id).await?;
            debug!(user_id = %user.id, "Existing user signed in");
            return self.get_user(user.id, ReadScope::live()).await;
        }

        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, name, profile_image, auth_provider, auth_provider_id,
                is_active, is_staff, last_login, date_joined, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, TRUE, FALSE, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&email)
        .bind(signup.name.trim())
        .bind(&signup.profile_image)
        .bind(&signup.auth_provider)
        .bind(&signup.auth_provider_id)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unique_as_validation(e, "email", "Email is already registered."))?;

        info!(user_id = %id, provider = %signup.auth_provider, "User created");
        self.get_user(id, ReadScope::live()).await
    }

    /// Get a user
    pub async fn get_user(&self, id: Uuid, scope: ReadScope) -> Result<User> {
        let sql = format!("SELECT * FROM users u WHERE u.id = ? AND {}", scope.predicate("u"));
        let row: UserRow = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("user", id))?;

        row.try_into()
    }

    /// Apply a profile edit
    pub async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User> {
        update.validate()?;
        let mut user = self.get_user(id, ReadScope::live()).await?;
        if let Some(name) = &update.name {
            user.name = name.trim().to_string();
        }
        if let Some(image) = &update.profile_image {
            user.profile_image = image.clone();
        }

        sqlx::query(
            "UPDATE users SET name = ?, profile_image = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&user.name)
        .bind(&user.profile_image)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.get_user(id, ReadScope::live()).await
    }

    /// Soft-delete an account and end its sessions
    pub async fn soft_delete_user(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE users SET deleted_at = ?, is_active = FALSE, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", id));
        }

        sqlx::query("DELETE FROM auth_sessions WHERE user_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(user_id = %id, "User soft-deleted");
        Ok(())
    }

    /// Record a sign-in
    pub async fn touch_last_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store a new auth session, replacing any the user already had
    pub async fn create_auth_session(
        &self,
        user_id: Uuid,
        session: &NewAuthSession,
    ) -> Result<AuthSession> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let replaced = sqlx::query("DELETE FROM auth_sessions WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                id, user_id, access_hash, refresh_hash, device_info, ip_address,
                access_expires_at, refresh_expires_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(&session.access_hash)
        .bind(&session.refresh_hash)
        .bind(&session.device_info)
        .bind(&session.ip_address)
        .bind(session.access_expires_at)
        .bind(session.refresh_expires_at)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(user_id = %user_id, replaced, "Auth session issued");

        let row: AuthSessionRow = sqlx::query_as(
            r#"
            SELECT id, user_id, device_info, ip_address, access_expires_at,
                   refresh_expires_at, created_at
            FROM auth_sessions WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    /// Resolve an unexpired access-token digest to its live, active user
    pub async fn user_for_access_hash(
        &self,
        access_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            SELECT u.* FROM auth_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.access_hash = ? AND s.access_expires_at > ?
              AND {} AND u.is_active = TRUE
            "#,
            ReadScope::live().predicate("u")
        ))
        .bind(access_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Find the session holding an unexpired refresh-token digest
    pub async fn session_for_refresh_hash(
        &self,
        refresh_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthSession>> {
        let row: Option<AuthSessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, device_info, ip_address, access_expires_at,
                   refresh_expires_at, created_at
            FROM auth_sessions
            WHERE refresh_hash = ? AND refresh_expires_at > ?
            "#,
        )
        .bind(refresh_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AuthSession::try_from).transpose()
    }

    /// End every session of a user
    pub async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
