use crate::error::{Result, StoreError};
use crate::models::{Child, ChildRow, ChildUpdate, NewChild};
use crate::scope::ReadScope;
use crate::Store;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

impl Store {
    /// Children of a user, oldest first
    pub async fn list_children(&self, user_id: Uuid, scope: ReadScope) -> Result<Vec<Child>> {
        let sql = format!(
            "SELECT * FROM children c WHERE c.user_id = ? AND {} ORDER BY c.birth_date ASC, c.created_at ASC",
            scope.predicate("c")
        );
        let rows: Vec<ChildRow> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// One child owned by `user_id`
    pub async fn get_child(&self, user_id: Uuid, id: Uuid, scope: ReadScope) -> Result<Child> {
        let sql = format!(
            "SELECT * FROM children c WHERE c.id = ? AND c.user_id = ? AND {}",
            scope.predicate("c")
        );
        let row: ChildRow = sqlx::query_as(&sql)
            .bind(id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("child", id))?;

        row.try_into()
    }

    /// Add a child profile
    pub async fn create_child(&self, user_id: Uuid, child: &NewChild) -> Result<Child> {
        let now = Utc::now();
        child.validate(now.date_naive())?;

        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO children (id, user_id, name, birth_date, gender, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(child.name.trim())
        .bind(child.birth_date)
        .bind(child.gender.map(|g| g.as_str()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(user_id = %user_id, child_id = %id, "Child created");
        self.get_child(user_id, id, ReadScope::live()).await
    }

    /// Edit a child profile
    pub async fn update_child(&self, user_id: Uuid, id: Uuid, update: &ChildUpdate) -> Result<Child> {
        update.validate(Utc::now().date_naive())?;
        let mut child = self.get_child(user_id, id, ReadScope::live()).await?;
        if let Some(name) = &update.name {
            child.name = name.trim().to_string();
        }
        if let Some(birth_date) = update.birth_date {
            child.birth_date = birth_date;
        }
        if let Some(gender) = update.gender {
            child.gender = gender;
        }

        sqlx::query(
            "UPDATE children SET name = ?, birth_date = ?, gender = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&child.name)
        .bind(child.birth_date)
        .bind(child.gender.map(|g| g.as_str()))
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.get_child(user_id, id, ReadScope::live()).await
    }

    /// Soft-delete a child
    pub async fn delete_child(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE children SET deleted_at = ?, updated_at = ? WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("child", id));
        }

        info!(user_id = %user_id, child_id = %id, "Child soft-deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{ChildUpdate, Gender};
    use crate::test_support::{child, create_test_context, user};
    use crate::{ReadScope, StoreError};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_children_are_scoped_to_owner() {
        let ctx = create_test_context().await;
        let mom = user(&ctx.store, "mom@example.com").await;
        let other = user(&ctx.store, "other@example.com").await;
        let kid = child(&ctx.store, mom.id, "Haneul").await;

        assert_eq!(kid.gender, Some(Gender::Female));
        assert_eq!(ctx.store.list_children(mom.id, ReadScope::live()).await.unwrap().len(), 1);
        assert!(ctx.store.list_children(other.id, ReadScope::live()).await.unwrap().is_empty());
        assert!(matches!(
            ctx.store.get_child(other.id, kid.id, ReadScope::live()).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_future_birth_date() {
        let ctx = create_test_context().await;
        let mom = user(&ctx.store, "mom@example.com").await;
        let kid = child(&ctx.store, mom.id, "Haneul").await;

        let err = ctx
            .store
            .update_child(
                mom.id,
                kid.id,
                &ChildUpdate {
                    birth_date: Some(Utc::now().date_naive() + Duration::days(3)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let renamed = ctx
            .store
            .update_child(
                mom.id,
                kid.id,
                &ChildUpdate {
                    name: Some("Byeol".to_string()),
                    gender: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Byeol");
        assert_eq!(renamed.gender, None);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_but_keeps_row() {
        let ctx = create_test_context().await;
        let mom = user(&ctx.store, "mom@example.com").await;
        let kid = child(&ctx.store, mom.id, "Haneul").await;

        ctx.store.delete_child(mom.id, kid.id).await.unwrap();

        assert!(ctx.store.list_children(mom.id, ReadScope::live()).await.unwrap().is_empty());
        let all = ctx
            .store
            .list_children(mom.id, ReadScope::include_deleted())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].deleted_at.is_some());

        assert!(matches!(
            ctx.store.delete_child(mom.id, kid.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
