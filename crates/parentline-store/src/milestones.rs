use crate::error::{Result, StoreError};
use crate::models::{
    default_milestones, AgeGroup, ChildMilestone, ChildMilestoneFilter, ChildMilestoneRow,
    DevelopmentArea, Milestone, MilestoneProgress, MilestoneRow, NewChildMilestone, NewMilestone,
    ProgressCell, RecordFilter, TimelineItem,
};
use crate::page::{Page, PageRequest};
use crate::scope::ReadScope;
use crate::Store;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

const ACHIEVEMENT_SELECT: &str = r#"
    SELECT cm.id, cm.child_id, c.name AS child_name, cm.achieved_date, cm.notes,
           cm.created_at, m.id AS milestone_id, m.age_group, m.development_area,
           m.title, m.description, m.display_order, m.is_active
    FROM child_milestones cm
    JOIN children c ON c.id = cm.child_id
    JOIN development_milestones m ON m.id = cm.milestone_id
"#;

fn achievements<'a>(user_id: Uuid, filter: &ChildMilestoneFilter) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new(ACHIEVEMENT_SELECT);
    qb.push(" WHERE c.user_id = ").push_bind(user_id.to_string());
    qb.push(" AND ").push(ReadScope::live().predicate("c"));
    if let Some(child_id) = filter.child_id {
        qb.push(" AND cm.child_id = ").push_bind(child_id.to_string());
    }
    if let Some(area) = filter.development_area {
        qb.push(" AND m.development_area = ").push_bind(area.as_str());
    }
    if let Some(age_group) = filter.age_group {
        qb.push(" AND m.age_group = ").push_bind(age_group.as_str());
    }
    qb
}

impl Store {
    /// Active milestones, youngest bracket first
    pub async fn list_milestones(
        &self,
        age_group: Option<AgeGroup>,
        area: Option<DevelopmentArea>,
    ) -> Result<Vec<Milestone>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM development_milestones WHERE is_active = TRUE");
        if let Some(age_group) = age_group {
            qb.push(" AND age_group = ").push_bind(age_group.as_str());
        }
        if let Some(area) = area {
            qb.push(" AND development_area = ").push_bind(area.as_str());
        }
        qb.push(" ORDER BY display_order ASC, title ASC");

        let rows: Vec<MilestoneRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let mut milestones = rows
            .into_iter()
            .map(Milestone::try_from)
            .collect::<Result<Vec<_>>>()?;
        milestones.sort_by_key(|m| m.age_group);
        Ok(milestones)
    }

    /// Insert catalogue entries, skipping ones already present
    ///
    /// Returns how many were inserted.
    pub async fn seed_milestones(&self, milestones: &[NewMilestone]) -> Result<u64> {
        let now = Utc::now();
        let mut inserted = 0;
        let mut tx = self.pool.begin().await?;

        for m in milestones {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO development_milestones (
                    id, age_group, development_area, title, description,
                    display_order, is_active, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, TRUE, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(m.age_group.as_str())
            .bind(m.development_area.as_str())
            .bind(&m.title)
            .bind(&m.description)
            .bind(m.display_order)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        info!(inserted, offered = milestones.len(), "Milestones seeded");
        Ok(inserted)
    }

    /// Seed the built-in catalogue
    pub async fn seed_default_milestones(&self) -> Result<u64> {
        self.seed_milestones(&default_milestones()?).await
    }

    /// Achievements of the user's live children, most recent first
    pub async fn list_child_milestones(
        &self,
        user_id: Uuid,
        filter: &ChildMilestoneFilter,
    ) -> Result<Vec<ChildMilestone>> {
        let mut qb = achievements(user_id, filter);
        qb.push(" ORDER BY cm.achieved_date DESC, cm.created_at DESC");
        let rows: Vec<ChildMilestoneRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ChildMilestone::try_from).collect()
    }

    async fn get_child_milestone(&self, user_id: Uuid, id: Uuid) -> Result<ChildMilestone> {
        let mut qb = achievements(user_id, &ChildMilestoneFilter::default());
        qb.push(" AND cm.id = ").push_bind(id.to_string());
        let row: ChildMilestoneRow = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("child milestone", id))?;
        row.try_into()
    }

    /// Record that a child reached a milestone
    ///
    /// Each (child, milestone) pair may be recorded once; a repeat is a
    /// validation error.
    pub async fn create_child_milestone(
        &self,
        user_id: Uuid,
        input: &NewChildMilestone,
    ) -> Result<ChildMilestone> {
        self.require_own_child(user_id, input.child_id).await?;

        let active: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM development_milestones WHERE id = ? AND is_active = TRUE",
        )
        .bind(input.milestone_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        if active.is_none() {
            return Err(StoreError::invalid("milestone_id", "Milestone not found."));
        }

        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO child_milestones (id, child_id, milestone_id, achieved_date, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(input.child_id.to_string())
        .bind(input.milestone_id.to_string())
        .bind(input.achieved_date)
        .bind(&input.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            StoreError::unique_as_validation(
                e,
                "milestone_id",
                "This milestone is already recorded for the child.",
            )
        })?;

        info!(child_id = %input.child_id, milestone_id = %input.milestone_id, "Milestone achieved");
        self.get_child_milestone(user_id, id).await
    }

    /// Remove an achievement
    pub async fn delete_child_milestone(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let sql = format!(
            r#"
            DELETE FROM child_milestones
            WHERE id = ?
              AND child_id IN (SELECT c.id FROM children c WHERE c.user_id = ? AND {})
            "#,
            ReadScope::live().predicate("c")
        );
        let result = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("child milestone", id));
        }
        Ok(())
    }

    /// Achieved versus available milestones
    ///
    /// With no child the denominator is every active milestone once per live
    /// child of the user.
    pub async fn milestone_progress(
        &self,
        user_id: Uuid,
        child_id: Option<Uuid>,
    ) -> Result<MilestoneProgress> {
        let children = match child_id {
            Some(child_id) => {
                self.require_own_child(user_id, child_id).await?;
                1
            }
            None => self.list_children(user_id, ReadScope::live()).await?.len() as i64,
        };

        let catalogue = self.list_milestones(None, None).await?;
        let achieved: Vec<ChildMilestone> = self
            .list_child_milestones(
                user_id,
                &ChildMilestoneFilter {
                    child_id,
                    ..Default::default()
                },
            )
            .await?
            .into_iter()
            .filter(|a| a.milestone.is_active)
            .collect();

        let mut area_totals: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        let mut age_totals: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for m in &catalogue {
            area_totals.entry(m.development_area.to_string()).or_default().1 += children;
            age_totals.entry(m.age_group.to_string()).or_default().1 += children;
        }
        for a in &achieved {
            area_totals
                .entry(a.milestone.development_area.to_string())
                .or_default()
                .0 += 1;
            age_totals.entry(a.milestone.age_group.to_string()).or_default().0 += 1;
        }

        let cells = |totals: BTreeMap<String, (i64, i64)>| -> BTreeMap<String, ProgressCell> {
            totals
                .into_iter()
                .map(|(key, (done, total))| (key, ProgressCell::new(done, total)))
                .collect()
        };

        Ok(MilestoneProgress {
            overall: ProgressCell::new(achieved.len() as i64, catalogue.len() as i64 * children),
            by_area: cells(area_totals),
            by_age_group: cells(age_totals),
        })
    }

    /// Records and achievements merged, newest first
    pub async fn timeline(
        &self,
        user_id: Uuid,
        child_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<TimelineItem>> {
        let records = self
            .all_records(
                user_id,
                &RecordFilter {
                    child_id,
                    ..Default::default()
                },
            )
            .await?;
        let achievements = self
            .list_child_milestones(
                user_id,
                &ChildMilestoneFilter {
                    child_id,
                    ..Default::default()
                },
            )
            .await?;

        let mut items: Vec<TimelineItem> = records
            .into_iter()
            .map(TimelineItem::from)
            .chain(achievements.into_iter().map(TimelineItem::from))
            .collect();
        items.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));

        Ok(page.slice(items))
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{
        AgeGroup, ChildMilestoneFilter, DevelopmentArea, NewChildMilestone, NewMilestone,
        NewRecord, RecordType, TimelineKind,
    };
    use crate::page::PageRequest;
    use crate::test_support::{child, create_test_context, user};
    use crate::{Store, StoreError};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn entry(age_group: AgeGroup, area: DevelopmentArea, title: &str) -> NewMilestone {
        NewMilestone {
            age_group,
            development_area: area,
            title: title.to_string(),
            description: String::new(),
            display_order: 1,
        }
    }

    async fn small_catalogue(store: &Store) {
        store
            .seed_milestones(&[
                entry(AgeGroup::M0To3, DevelopmentArea::Physical, "Lifts head"),
                entry(AgeGroup::M0To3, DevelopmentArea::Social, "Social smile"),
                entry(AgeGroup::M3To6, DevelopmentArea::Physical, "Rolls over"),
            ])
            .await
            .unwrap();
    }

    fn achieve(child_id: Uuid, milestone_id: Uuid) -> NewChildMilestone {
        NewChildMilestone {
            child_id,
            milestone_id,
            achieved_date: Utc::now().date_naive(),
            notes: "at the park".to_string(),
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let ctx = create_test_context().await;
        let first = ctx.store.seed_default_milestones().await.unwrap();
        assert!(first > 0);
        assert_eq!(ctx.store.seed_default_milestones().await.unwrap(), 0);

        let all = ctx.store.list_milestones(None, None).await.unwrap();
        assert_eq!(all.len() as u64, first);
        assert_eq!(all[0].age_group, AgeGroup::M0To3);
    }

    #[tokio::test]
    async fn test_milestone_filters() {
        let ctx = create_test_context().await;
        small_catalogue(&ctx.store).await;

        let physical = ctx
            .store
            .list_milestones(None, Some(DevelopmentArea::Physical))
            .await
            .unwrap();
        assert_eq!(physical.len(), 2);
        let newborn = ctx
            .store
            .list_milestones(Some(AgeGroup::M0To3), Some(DevelopmentArea::Social))
            .await
            .unwrap();
        assert_eq!(newborn[0].title, "Social smile");
    }

    #[tokio::test]
    async fn test_achievement_is_unique_per_child() {
        let ctx = create_test_context().await;
        small_catalogue(&ctx.store).await;
        let u = user(&ctx.store, "m@example.com").await;
        let c = child(&ctx.store, u.id, "Yuna").await;
        let milestone = ctx.store.list_milestones(None, None).await.unwrap()[0].clone();

        let created = ctx
            .store
            .create_child_milestone(u.id, &achieve(c.id, milestone.id))
            .await
            .unwrap();
        assert_eq!(created.milestone.id, milestone.id);
        assert_eq!(created.child_name, "Yuna");

        let err = ctx
            .store
            .create_child_milestone(u.id, &achieve(c.id, milestone.id))
            .await
            .unwrap_err();
        match err {
            StoreError::Validation(errors) => assert_eq!(errors.first().unwrap().0, "milestone_id"),
            other => panic!("unexpected: {:?}", other),
        }

        ctx.store.delete_child_milestone(u.id, created.id).await.unwrap();
        assert!(ctx
            .store
            .list_child_milestones(u.id, &ChildMilestoneFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_progress_counts_every_live_child() {
        let ctx = create_test_context().await;
        small_catalogue(&ctx.store).await;
        let u = user(&ctx.store, "p@example.com").await;
        let first = child(&ctx.store, u.id, "Yuna").await;
        let second = child(&ctx.store, u.id, "Minho").await;
        let catalogue = ctx.store.list_milestones(None, None).await.unwrap();
        let head = catalogue.iter().find(|m| m.title == "Lifts head").unwrap();

        ctx.store
            .create_child_milestone(u.id, &achieve(first.id, head.id))
            .await
            .unwrap();

        let overall = ctx.store.milestone_progress(u.id, None).await.unwrap();
        assert_eq!(overall.overall.total, 6);
        assert_eq!(overall.overall.achieved, 1);
        assert_eq!(overall.overall.percentage, 16.7);
        assert_eq!(overall.by_area["physical"].total, 4);
        assert_eq!(overall.by_area["physical"].achieved, 1);
        assert_eq!(overall.by_age_group["3-6months"].achieved, 0);

        let one = ctx.store.milestone_progress(u.id, Some(first.id)).await.unwrap();
        assert_eq!(one.overall.total, 3);
        assert_eq!(one.overall.percentage, 33.3);

        ctx.store.delete_child(u.id, second.id).await.unwrap();
        let after = ctx.store.milestone_progress(u.id, None).await.unwrap();
        assert_eq!(after.overall.total, 3);
    }

    #[tokio::test]
    async fn test_timeline_merges_newest_first() {
        let ctx = create_test_context().await;
        small_catalogue(&ctx.store).await;
        let u = user(&ctx.store, "t@example.com").await;
        let c = child(&ctx.store, u.id, "Yuna").await;
        let today = Utc::now().date_naive();
        let milestone = ctx.store.list_milestones(None, None).await.unwrap()[0].clone();

        ctx.store
            .create_record(
                u.id,
                &NewRecord {
                    child_id: c.id,
                    date: today - Duration::days(3),
                    age_group: AgeGroup::M0To3,
                    development_area: None,
                    title: "First bath".to_string(),
                    description: String::new(),
                    record_type: RecordType::Observation,
                },
            )
            .await
            .unwrap();
        ctx.store
            .create_child_milestone(u.id, &achieve(c.id, milestone.id))
            .await
            .unwrap();

        let page = ctx.store.timeline(u.id, None, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].kind, TimelineKind::Milestone);
        assert_eq!(page.items[1].title, "First bath");

        let json = serde_json::to_value(&page.items[1]).unwrap();
        assert_eq!(json["type"], "record");
        assert_eq!(json["record_type"], "observation");
    }
}
