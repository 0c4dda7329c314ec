use crate::error::{Result, StoreError};
use crate::models::{
    DevelopmentRecord, NewRecord, RecentActivity, RecordFilter, RecordRow, RecordStats,
    RecordUpdate,
};
use crate::page::{Page, PageRequest};
use crate::scope::ReadScope;
use crate::Store;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

const RECORD_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.child_id, c.name AS child_name, r.date, r.age_group,
           r.development_area, r.title, r.description, r.record_type,
           r.created_at, r.updated_at, r.deleted_at
    FROM development_records r
    JOIN children c ON c.id = r.child_id
"#;

const RECORD_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM development_records r
    JOIN children c ON c.id = r.child_id
"#;

/// Start a record query with owner, visibility and filter predicates applied
fn filtered<'a>(
    select: &str,
    user_id: Uuid,
    filter: &RecordFilter,
    scope: ReadScope,
) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" WHERE r.user_id = ").push_bind(user_id.to_string());
    qb.push(" AND ").push(scope.predicate("r"));
    qb.push(" AND ").push(scope.predicate("c"));

    if let Some(child_id) = filter.child_id {
        qb.push(" AND r.child_id = ").push_bind(child_id.to_string());
    }
    if let Some(area) = filter.development_area {
        qb.push(" AND r.development_area = ").push_bind(area.as_str());
    }
    if let Some(age_group) = filter.age_group {
        qb.push(" AND r.age_group = ").push_bind(age_group.as_str());
    }
    if let Some(record_type) = filter.record_type {
        qb.push(" AND r.record_type = ").push_bind(record_type.as_str());
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND r.date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND r.date <= ").push_bind(end);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (r.title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.description LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb
}

impl Store {
    /// Filtered, paged development records, newest date first
    pub async fn list_records(
        &self,
        user_id: Uuid,
        filter: &RecordFilter,
        scope: ReadScope,
        page: PageRequest,
    ) -> Result<Page<DevelopmentRecord>> {
        let total: i64 = filtered(RECORD_COUNT, user_id, filter, scope)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = filtered(RECORD_SELECT, user_id, filter, scope);
        qb.push(" ORDER BY r.date DESC, r.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<RecordRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let items = rows
            .into_iter()
            .map(DevelopmentRecord::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    /// Every live record matching `filter`, unpaged
    pub(crate) async fn all_records(
        &self,
        user_id: Uuid,
        filter: &RecordFilter,
    ) -> Result<Vec<DevelopmentRecord>> {
        let mut qb = filtered(RECORD_SELECT, user_id, filter, ReadScope::live());
        qb.push(" ORDER BY r.date DESC, r.created_at DESC");
        let rows: Vec<RecordRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(DevelopmentRecord::try_from).collect()
    }

    /// One record owned by `user_id`
    pub async fn get_record(
        &self,
        user_id: Uuid,
        id: Uuid,
        scope: ReadScope,
    ) -> Result<DevelopmentRecord> {
        let mut qb = filtered(RECORD_SELECT, user_id, &RecordFilter::default(), scope);
        qb.push(" AND r.id = ").push_bind(id.to_string());
        let row: RecordRow = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("development record", id))?;

        row.try_into()
    }

    /// Add a record for one of the user's children
    pub async fn create_record(&self, user_id: Uuid, record: &NewRecord) -> Result<DevelopmentRecord> {
        record.validate()?;
        self.require_own_child(user_id, record.child_id).await?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO development_records (
                id, user_id, child_id, date, age_group, development_area,
                title, description, record_type, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(record.child_id.to_string())
        .bind(record.date)
        .bind(record.age_group.as_str())
        .bind(record.development_area.map(|a| a.as_str()))
        .bind(record.title.trim())
        .bind(&record.description)
        .bind(record.record_type.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(user_id = %user_id, record_id = %id, "Development record created");
        self.get_record(user_id, id, ReadScope::live()).await
    }

    /// Edit a record
    pub async fn update_record(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: &RecordUpdate,
    ) -> Result<DevelopmentRecord> {
        update.validate()?;
        let mut record = self.get_record(user_id, id, ReadScope::live()).await?;
        if let Some(date) = update.date {
            record.date = date;
        }
        if let Some(age_group) = update.age_group {
            record.age_group = age_group;
        }
        if let Some(area) = update.development_area {
            record.development_area = area;
        }
        if let Some(title) = &update.title {
            record.title = title.trim().to_string();
        }
        if let Some(description) = &update.description {
            record.description = description.clone();
        }
        if let Some(record_type) = update.record_type {
            record.record_type = record_type;
        }

        sqlx::query(
            r#"
            UPDATE development_records SET
                date = ?, age_group = ?, development_area = ?, title = ?,
                description = ?, record_type = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(record.date)
        .bind(record.age_group.as_str())
        .bind(record.development_area.map(|a| a.as_str()))
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.record_type.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.get_record(user_id, id, ReadScope::live()).await
    }

    /// Soft-delete a record
    pub async fn delete_record(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE development_records SET deleted_at = ?, updated_at = ? WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("development record", id));
        }
        Ok(())
    }

    /// Aggregates over the user's live records
    pub async fn record_stats(&self, user_id: Uuid, today: NaiveDate) -> Result<RecordStats> {
        let live = RecordFilter::default();
        let scope = ReadScope::live();

        let total_records: i64 = filtered(RECORD_COUNT, user_id, &live, scope)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let since = |days: i64| RecordFilter {
            start_date: Some(today - Duration::days(days)),
            ..Default::default()
        };
        let records_this_week: i64 = filtered(RECORD_COUNT, user_id, &since(7), scope)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        let records_this_month: i64 = filtered(RECORD_COUNT, user_id, &since(30), scope)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(RecordStats {
            total_records,
            records_by_area: self
                .grouped_record_counts(user_id, "COALESCE(r.development_area, 'unspecified')")
                .await?,
            records_by_type: self.grouped_record_counts(user_id, "r.record_type").await?,
            records_by_age_group: self.grouped_record_counts(user_id, "r.age_group").await?,
            recent_activity: RecentActivity {
                records_this_week,
                records_this_month,
            },
            milestone_progress: self.milestone_progress(user_id, None).await?.overall,
        })
    }

    async fn grouped_record_counts(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> Result<BTreeMap<String, i64>> {
        let select = format!(
            "SELECT {} AS label, COUNT(*) AS n FROM development_records r JOIN children c ON c.id = r.child_id",
            key
        );
        let mut qb = filtered(&select, user_id, &RecordFilter::default(), ReadScope::live());
        qb.push(" GROUP BY label");
        let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().collect())
    }

    /// Fail with a field error unless `child_id` is a live child of `user_id`
    pub(crate) async fn require_own_child(&self, user_id: Uuid, child_id: Uuid) -> Result<()> {
        match self.get_child(user_id, child_id, ReadScope::live()).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                Err(StoreError::invalid("child_id", "Child not found."))
            }
            Err(e) => Err(e),
        }
    }
}
