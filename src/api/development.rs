//! Development tracking API endpoints
//!
//! GET    /api/v1/development/records                   - Filtered, paged records
//! POST   /api/v1/development/records                   - Create a record
//! GET    /api/v1/development/records/stats             - Record statistics
//! GET    /api/v1/development/records/:id               - Record details
//! PUT    /api/v1/development/records/:id               - Edit a record
//! DELETE /api/v1/development/records/:id               - Delete a record (soft)
//! GET    /api/v1/development/milestones                - Active milestone catalogue
//! GET    /api/v1/development/child-milestones          - Achieved milestones
//! POST   /api/v1/development/child-milestones          - Mark a milestone achieved
//! GET    /api/v1/development/child-milestones/progress - Achievement progress
//! DELETE /api/v1/development/child-milestones/:id      - Unmark an achievement
//! GET    /api/v1/development/timeline                  - Records and achievements, newest first

use axum::{
    extract::State,
    routing::{delete, get},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use parentline_store::{
    AgeGroup, ChildMilestone, ChildMilestoneFilter, DevelopmentArea, DevelopmentRecord, Milestone,
    MilestoneProgress, NewChildMilestone, NewRecord, PageRequest, ReadScope, RecordFilter,
    RecordStats, RecordType, RecordUpdate, TimelineItem,
};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{created, ok, ApiResponse, ApiResult, Created};
use super::state::AppState;
use super::users::double_option;
use crate::middleware::auth::RequireAuth;

#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    pub child_id: Option<Uuid>,
    pub development_area: Option<DevelopmentArea>,
    pub age_group: Option<AgeGroup>,
    pub record_type: Option<RecordType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl RecordQuery {
    fn filter(&self) -> RecordFilter {
        RecordFilter {
            child_id: self.child_id,
            development_area: self.development_area,
            age_group: self.age_group,
            record_type: self.record_type,
            start_date: self.start_date,
            end_date: self.end_date,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewRecordRequest {
    pub child_id: Uuid,
    pub date: NaiveDate,
    pub age_group: AgeGroup,
    pub development_area: Option<DevelopmentArea>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub record_type: Option<RecordType>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordUpdateRequest {
    pub date: Option<NaiveDate>,
    pub age_group: Option<AgeGroup>,
    #[serde(default, deserialize_with = "double_option")]
    pub development_area: Option<Option<DevelopmentArea>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub record_type: Option<RecordType>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MilestoneQuery {
    pub age_group: Option<AgeGroup>,
    pub development_area: Option<DevelopmentArea>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChildMilestoneQuery {
    pub child_id: Option<Uuid>,
    pub development_area: Option<DevelopmentArea>,
    pub age_group: Option<AgeGroup>,
}

#[derive(Debug, Deserialize)]
pub struct NewChildMilestoneRequest {
    pub child_id: Uuid,
    pub milestone_id: Uuid,
    pub achieved_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChildQuery {
    pub child_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    pub child_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn list_records(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RecordQuery>,
) -> ApiResult<Vec<DevelopmentRecord>> {
    let page = state
        .store
        .list_records(
            user.id,
            &query.filter(),
            ReadScope::live(),
            PageRequest::new(query.page, query.limit),
        )
        .await?;
    Ok(Json(ApiResponse::paged("Records retrieved.", page)))
}

async fn create_record(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewRecordRequest>,
) -> Created<DevelopmentRecord> {
    let record = state
        .store
        .create_record(
            user.id,
            &NewRecord {
                child_id: request.child_id,
                date: request.date,
                age_group: request.age_group,
                development_area: request.development_area,
                title: request.title,
                description: request.description,
                record_type: request.record_type.unwrap_or(RecordType::DevelopmentRecord),
            },
        )
        .await?;
    created("Record created.", record)
}

async fn record_stats(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<RecordStats> {
    let stats = state
        .store
        .record_stats(user.id, Utc::now().date_naive())
        .await?;
    ok("Record statistics retrieved.", stats)
}

async fn get_record(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<DevelopmentRecord> {
    let record = state.store.get_record(user.id, id, ReadScope::live()).await?;
    ok("Record retrieved.", record)
}

async fn update_record(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RecordUpdateRequest>,
) -> ApiResult<DevelopmentRecord> {
    let record = state
        .store
        .update_record(
            user.id,
            id,
            &RecordUpdate {
                date: request.date,
                age_group: request.age_group,
                development_area: request.development_area,
                title: request.title,
                description: request.description,
                record_type: request.record_type,
            },
        )
        .await?;
    ok("Record updated.", record)
}

async fn delete_record(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.store.delete_record(user.id, id).await?;
    Ok(Json(ApiResponse::done("Record deleted.")))
}

async fn list_milestones(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MilestoneQuery>,
) -> ApiResult<Vec<Milestone>> {
    let milestones = state
        .store
        .list_milestones(query.age_group, query.development_area)
        .await?;
    ok("Milestones retrieved.", milestones)
}

async fn list_child_milestones(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ChildMilestoneQuery>,
) -> ApiResult<Vec<ChildMilestone>> {
    let achieved = state
        .store
        .list_child_milestones(
            user.id,
            &ChildMilestoneFilter {
                child_id: query.child_id,
                development_area: query.development_area,
                age_group: query.age_group,
            },
        )
        .await?;
    ok("Achieved milestones retrieved.", achieved)
}

async fn create_child_milestone(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewChildMilestoneRequest>,
) -> Created<ChildMilestone> {
    let achieved = state
        .store
        .create_child_milestone(
            user.id,
            &NewChildMilestone {
                child_id: request.child_id,
                milestone_id: request.milestone_id,
                achieved_date: request.achieved_date,
                notes: request.notes,
            },
        )
        .await?;
    created("Milestone marked as achieved.", achieved)
}

async fn milestone_progress(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ChildQuery>,
) -> ApiResult<MilestoneProgress> {
    let progress = state
        .store
        .milestone_progress(user.id, query.child_id)
        .await?;
    ok("Milestone progress retrieved.", progress)
}

async fn delete_child_milestone(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.store.delete_child_milestone(user.id, id).await?;
    Ok(Json(ApiResponse::done("Milestone achievement removed.")))
}

async fn timeline(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TimelineQuery>,
) -> ApiResult<Vec<TimelineItem>> {
    let page = state
        .store
        .timeline(
            user.id,
            query.child_id,
            PageRequest::new(query.page, query.limit),
        )
        .await?;
    Ok(Json(ApiResponse::paged("Timeline retrieved.", page)))
}

/// Create development routes
pub fn development_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/development/records",
            get(list_records).post(create_record),
        )
        .route("/api/v1/development/records/stats", get(record_stats))
        .route(
            "/api/v1/development/records/:id",
            get(get_record).put(update_record).delete(delete_record),
        )
        .route("/api/v1/development/milestones", get(list_milestones))
        .route(
            "/api/v1/development/child-milestones",
            get(list_child_milestones).post(create_child_milestone),
        )
        .route(
            "/api/v1/development/child-milestones/progress",
            get(milestone_progress),
        )
        .route(
            "/api/v1/development/child-milestones/:id",
            delete(delete_child_milestone),
        )
        .route("/api/v1/development/timeline", get(timeline))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{auth, test_app, TestApp};
    use axum::http::StatusCode;
    use parentline_store::{NewMilestone, User};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn record(app: &TestApp, user: &User, child_id: Uuid, title: &str, on: NaiveDate) {
        create_record(
            auth(user),
            State(app.state.clone()),
            ApiJson(NewRecordRequest {
                child_id,
                date: on,
                age_group: AgeGroup::M6To9,
                development_area: Some(DevelopmentArea::Physical),
                title: title.to_string(),
                description: String::new(),
                record_type: None,
            }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_records_are_paged_and_filtered() {
        let app = test_app().await;
        let user = app.user("parent@example.com").await;
        let child = app.child(user.id, "Mina").await;
        for day in 1..=3 {
            record(&app, &user, child.id, &format!("Rolled over #{}", day), date(2024, 8, day)).await;
        }

        let response = list_records(
            auth(&user),
            State(app.state.clone()),
            ApiQuery(RecordQuery {
                child_id: Some(child.id),
                limit: Some(2),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .0;

        let items = response.data.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Rolled over #3");
        assert_eq!(items[0].record_type, RecordType::DevelopmentRecord);
        let pagination = response.pagination.unwrap();
        assert_eq!(pagination.count, 3);
        assert!(pagination.has_next);

        let searched = list_records(
            auth(&user),
            State(app.state.clone()),
            ApiQuery(RecordQuery {
                search: Some("#2".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();
        assert_eq!(searched.len(), 1);
    }

    #[tokio::test]
    async fn test_record_for_foreign_child_is_a_validation_error() {
        let app = test_app().await;
        let owner = app.user("owner@example.com").await;
        let other = app.user("other@example.com").await;
        let child = app.child(owner.id, "Jun").await;

        let err = create_record(
            auth(&other),
            State(app.state.clone()),
            ApiJson(NewRecordRequest {
                child_id: child.id,
                date: date(2024, 8, 1),
                age_group: AgeGroup::M6To9,
                development_area: None,
                title: "First steps".to_string(),
                description: String::new(),
                record_type: Some(RecordType::Observation),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("child_id:"));
    }

    #[tokio::test]
    async fn test_record_update_clears_area_and_delete_hides() {
        let app = test_app().await;
        let user = app.user("parent@example.com").await;
        let child = app.child(user.id, "Mina").await;
        record(&app, &user, child.id, "Babbling", date(2024, 8, 1)).await;
        let id = app
            .state
            .store
            .list_records(user.id, &RecordFilter::default(), ReadScope::live(), PageRequest::default())
            .await
            .unwrap()
            .items[0]
            .id;

        let updated = update_record(
            auth(&user),
            State(app.state.clone()),
            ApiPath(id),
            ApiJson(RecordUpdateRequest {
                development_area: Some(None),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();
        assert_eq!(updated.development_area, None);

        delete_record(auth(&user), State(app.state.clone()), ApiPath(id))
            .await
            .unwrap();
        let err = get_record(auth(&user), State(app.state.clone()), ApiPath(id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let stats = record_stats(auth(&user), State(app.state.clone()))
            .await
            .unwrap()
            .0
            .data
            .unwrap();
        assert_eq!(stats.total_records, 0);
    }

    #[tokio::test]
    async fn test_milestone_achievement_flow() {
        let app = test_app().await;
        let user = app.user("parent@example.com").await;
        let child = app.child(user.id, "Mina").await;
        app.state
            .store
            .seed_milestones(&[
                NewMilestone {
                    age_group: AgeGroup::M6To9,
                    development_area: DevelopmentArea::Physical,
                    title: "Sits without support".to_string(),
                    description: String::new(),
                    display_order: 1,
                },
                NewMilestone {
                    age_group: AgeGroup::M6To9,
                    development_area: DevelopmentArea::Language,
                    title: "Babbles".to_string(),
                    description: String::new(),
                    display_order: 2,
                },
            ])
            .await
            .unwrap();

        let milestones = list_milestones(
            auth(&user),
            State(app.state.clone()),
            ApiQuery(MilestoneQuery {
                development_area: Some(DevelopmentArea::Physical),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();
        assert_eq!(milestones.len(), 1);

        let request = || NewChildMilestoneRequest {
            child_id: child.id,
            milestone_id: milestones[0].id,
            achieved_date: date(2024, 8, 10),
            notes: String::new(),
        };
        let (status, _) = create_child_milestone(
            auth(&user),
            State(app.state.clone()),
            ApiJson(request()),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let err = create_child_milestone(auth(&user), State(app.state.clone()), ApiJson(request()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let progress = milestone_progress(
            auth(&user),
            State(app.state.clone()),
            ApiQuery(ChildQuery {
                child_id: Some(child.id),
            }),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();
        assert_eq!(progress.overall.achieved, 1);
        assert_eq!(progress.overall.total, 2);
        assert_eq!(progress.overall.percentage, 50.0);

        record(&app, &user, child.id, "Crawling attempt", date(2024, 8, 12)).await;
        let timeline_page = timeline(
            auth(&user),
            State(app.state.clone()),
            ApiQuery(TimelineQuery::default()),
        )
        .await
        .unwrap()
        .0;
        let items = timeline_page.data.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Crawling attempt");
        assert_eq!(items[1].title, "Sits without support");
    }
}
