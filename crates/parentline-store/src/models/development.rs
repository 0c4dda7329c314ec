use super::{check_len, parse_label, parse_uuid, text_enum};
use crate::error::{FieldErrors, Result, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

text_enum! {
    /// Age bracket a record or milestone belongs to
    pub enum AgeGroup {
        /// 0 to 3 months
        M0To3 => "0-3months",
        /// 3 to 6 months
        M3To6 => "3-6months",
        /// 6 to 9 months
        M6To9 => "6-9months",
        /// 9 to 12 months
        M9To12 => "9-12months",
        /// 12 to 18 months
        M12To18 => "12-18months",
        /// 18 to 24 months
        M18To24 => "18-24months",
        /// 24 to 36 months
        M24To36 => "24-36months",
        /// 36 to 48 months
        M36To48 => "36-48months",
        /// 48 to 60 months
        M48To60 => "48-60months",
        /// Over 60 months
        M60Plus => "60months+",
    }
}

text_enum! {
    /// Developmental domain
    pub enum DevelopmentArea {
        /// Gross and fine motor skills
        Physical => "physical",
        /// Thinking and problem solving
        Cognitive => "cognitive",
        /// Speech and understanding
        Language => "language",
        /// Interaction with others
        Social => "social",
        /// Feelings and self-regulation
        Emotional => "emotional",
        /// Eating, dressing, toileting
        SelfCare => "self_care",
    }
}

text_enum! {
    /// Kind of development record
    pub enum RecordType {
        /// Ordinary diary entry
        DevelopmentRecord => "development_record",
        /// A milestone was reached
        MilestoneAchievement => "milestone_achievement",
        /// Something noticed
        Observation => "observation",
        /// A worry to follow up on
        Concern => "concern",
    }
}

/// A dated development diary entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevelopmentRecord {
    /// Record id
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Child the record is about
    pub child_id: Uuid,
    /// Child name at read time
    pub child_name: String,
    /// Date of the observation
    pub date: NaiveDate,
    /// Age bracket
    pub age_group: AgeGroup,
    /// Domain, if any
    pub development_area: Option<DevelopmentArea>,
    /// Title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Kind
    pub record_type: RecordType,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
pub(crate) struct RecordRow {
    pub id: String,
    pub user_id: String,
    pub child_id: String,
    pub child_name: String,
    pub date: NaiveDate,
    pub age_group: String,
    pub development_area: Option<String>,
    pub title: String,
    pub description: String,
    pub record_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<RecordRow> for DevelopmentRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self> {
        Ok(DevelopmentRecord {
            id: parse_uuid(&row.id, "record")?,
            user_id: parse_uuid(&row.user_id, "user")?,
            child_id: parse_uuid(&row.child_id, "child")?,
            child_name: row.child_name,
            date: row.date,
            age_group: parse_label(&row.age_group)?,
            development_area: row
                .development_area
                .as_deref()
                .map(parse_label::<DevelopmentArea>)
                .transpose()?,
            title: row.title,
            description: row.description,
            record_type: parse_label(&row.record_type)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// Record creation input
///
/// A `date` in the future is accepted; only child birth dates are checked
/// against today.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// Child the record is about
    pub child_id: Uuid,
    /// Date of the observation
    pub date: NaiveDate,
    /// Age bracket
    pub age_group: AgeGroup,
    /// Domain
    pub development_area: Option<DevelopmentArea>,
    /// Title (1 to 200 characters)
    pub title: String,
    /// Description
    pub description: String,
    /// Kind
    pub record_type: RecordType,
}

impl NewRecord {
    /// Validate the input
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_len(&mut errors, "title", &self.title, 1, 200);
        errors.into_result()
    }
}

/// Record edit
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    /// New date
    pub date: Option<NaiveDate>,
    /// New age bracket
    pub age_group: Option<AgeGroup>,
    /// New domain; `Some(None)` clears it
    pub development_area: Option<Option<DevelopmentArea>>,
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New kind
    pub record_type: Option<RecordType>,
}

impl RecordUpdate {
    /// Validate the edit
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            check_len(&mut errors, "title", title, 1, 200);
        }
        errors.into_result()
    }
}

/// Record list filters
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Only this child
    pub child_id: Option<Uuid>,
    /// Only this domain
    pub development_area: Option<DevelopmentArea>,
    /// Only this bracket
    pub age_group: Option<AgeGroup>,
    /// Only this kind
    pub record_type: Option<RecordType>,
    /// On or after
    pub start_date: Option<NaiveDate>,
    /// On or before
    pub end_date: Option<NaiveDate>,
    /// Substring of title or description
    pub search: Option<String>,
}

/// Recent record counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecentActivity {
    /// Records dated in the last 7 days
    pub records_this_week: i64,
    /// Records dated in the last 30 days
    pub records_this_month: i64,
}

/// Achieved versus available milestones
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressCell {
    /// Achievements
    pub achieved: i64,
    /// Milestones available
    pub total: i64,
    /// achieved / total, as a percentage rounded to one decimal
    pub percentage: f64,
}

impl ProgressCell {
    /// Build a cell, computing the percentage
    #[must_use]
    pub fn new(achieved: i64, total: i64) -> Self {
        let percentage = if total > 0 {
            (achieved as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            achieved,
            total,
            percentage,
        }
    }
}

/// Aggregates over a user's development records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordStats {
    /// Live records
    pub total_records: i64,
    /// Counts by domain (`unspecified` for records without one)
    pub records_by_area: BTreeMap<String, i64>,
    /// Counts by kind
    pub records_by_type: BTreeMap<String, i64>,
    /// Counts by bracket
    pub records_by_age_group: BTreeMap<String, i64>,
    /// Recent counts
    pub recent_activity: RecentActivity,
    /// Milestone progress over all children
    pub milestone_progress: ProgressCell,
}

/// A reference milestone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    /// Milestone id
    pub id: Uuid,
    /// Age bracket
    pub age_group: AgeGroup,
    /// Domain
    pub development_area: DevelopmentArea,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Sort key within the bracket
    pub display_order: i64,
    /// Whether it counts toward progress
    pub is_active: bool,
}

#[derive(Debug, FromRow)]
pub(crate) struct MilestoneRow {
    pub id: String,
    pub age_group: String,
    pub development_area: String,
    pub title: String,
    pub description: String,
    pub display_order: i64,
    pub is_active: bool,
}

impl TryFrom<MilestoneRow> for Milestone {
    type Error = StoreError;

    fn try_from(row: MilestoneRow) -> Result<Self> {
        Ok(Milestone {
            id: parse_uuid(&row.id, "milestone")?,
            age_group: parse_label(&row.age_group)?,
            development_area: parse_label(&row.development_area)?,
            title: row.title,
            description: row.description,
            display_order: row.display_order,
            is_active: row.is_active,
        })
    }
}

/// Seed entry for the milestone catalogue
#[derive(Debug, Clone, Deserialize)]
pub struct NewMilestone {
    /// Age bracket
    pub age_group: AgeGroup,
    /// Domain
    pub development_area: DevelopmentArea,
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Sort key
    #[serde(default)]
    pub display_order: i64,
}

/// Built-in milestone catalogue
pub fn default_milestones() -> Result<Vec<NewMilestone>> {
    Ok(serde_json::from_str(include_str!(
        "../../data/milestones.json"
    ))?)
}

/// A milestone a child reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildMilestone {
    /// Achievement id
    pub id: Uuid,
    /// Child
    pub child_id: Uuid,
    /// Child name at read time
    pub child_name: String,
    /// Milestone reached
    pub milestone: Milestone,
    /// When it was reached
    pub achieved_date: NaiveDate,
    /// Notes
    pub notes: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ChildMilestoneRow {
    pub id: String,
    pub child_id: String,
    pub child_name: String,
    pub achieved_date: NaiveDate,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub milestone_id: String,
    pub age_group: String,
    pub development_area: String,
    pub title: String,
    pub description: String,
    pub display_order: i64,
    pub is_active: bool,
}

impl TryFrom<ChildMilestoneRow> for ChildMilestone {
    type Error = StoreError;

    fn try_from(row: ChildMilestoneRow) -> Result<Self> {
        Ok(ChildMilestone {
            id: parse_uuid(&row.id, "child milestone")?,
            child_id: parse_uuid(&row.child_id, "child")?,
            child_name: row.child_name,
            achieved_date: row.achieved_date,
            notes: row.notes,
            created_at: row.created_at,
            milestone: MilestoneRow {
                id: row.milestone_id,
                age_group: row.age_group,
                development_area: row.development_area,
                title: row.title,
                description: row.description,
                display_order: row.display_order,
                is_active: row.is_active,
            }
            .try_into()?,
        })
    }
}

/// Achievement input
#[derive(Debug, Clone)]
pub struct NewChildMilestone {
    /// Child
    pub child_id: Uuid,
    /// Milestone reached
    pub milestone_id: Uuid,
    /// When
    pub achieved_date: NaiveDate,
    /// Notes
    pub notes: String,
}

/// Achievement list filters
#[derive(Debug, Clone, Default)]
pub struct ChildMilestoneFilter {
    /// Only this child
    pub child_id: Option<Uuid>,
    /// Only this domain
    pub development_area: Option<DevelopmentArea>,
    /// Only this bracket
    pub age_group: Option<AgeGroup>,
}

/// Milestone progress broken down
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MilestoneProgress {
    /// Over everything
    pub overall: ProgressCell,
    /// Per domain
    pub by_area: BTreeMap<String, ProgressCell>,
    /// Per bracket
    pub by_age_group: BTreeMap<String, ProgressCell>,
}

/// Kind of timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    /// A development record
    Record,
    /// A milestone achievement
    Milestone,
}

/// One entry of the merged development timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineItem {
    /// Source row id
    pub id: Uuid,
    /// Entry kind
    #[serde(rename = "type")]
    pub kind: TimelineKind,
    /// Date of the event
    pub date: NaiveDate,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Child name
    pub child_name: String,
    /// Domain
    pub area: Option<DevelopmentArea>,
    /// Bracket
    pub age_group: AgeGroup,
    /// Record kind (records only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,
    /// Notes (achievements only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip)]
    pub(crate) created_at: DateTime<Utc>,
}

impl From<DevelopmentRecord> for TimelineItem {
    fn from(r: DevelopmentRecord) -> Self {
        Self {
            id: r.id,
            kind: TimelineKind::Record,
            date: r.date,
            title: r.title,
            description: r.description,
            child_name: r.child_name,
            area: r.development_area,
            age_group: r.age_group,
            record_type: Some(r.record_type),
            notes: None,
            created_at: r.created_at,
        }
    }
}

impl From<ChildMilestone> for TimelineItem {
    fn from(a: ChildMilestone) -> Self {
        Self {
            id: a.id,
            kind: TimelineKind::Milestone,
            date: a.achieved_date,
            title: a.milestone.title,
            description: a.milestone.description,
            child_name: a.child_name,
            area: Some(a.milestone.development_area),
            age_group: a.milestone.age_group,
            record_type: None,
            notes: Some(a.notes),
            created_at: a.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rounding() {
        assert_eq!(ProgressCell::new(1, 3).percentage, 33.3);
        assert_eq!(ProgressCell::new(2, 3).percentage, 66.7);
        assert_eq!(ProgressCell::new(0, 0).percentage, 0.0);
    }

    #[test]
    fn test_labels_roundtrip_through_serde() {
        assert_eq!(
            serde_json::to_value(AgeGroup::M60Plus).unwrap(),
            "60months+"
        );
        assert_eq!("self_care".parse::<DevelopmentArea>().unwrap(), DevelopmentArea::SelfCare);
        assert!("teen".parse::<AgeGroup>().is_err());
    }

    #[test]
    fn test_default_catalogue_parses() {
        let catalogue = default_milestones().unwrap();
        assert!(catalogue.len() >= 50);
        assert!(catalogue.iter().all(|m| !m.title.is_empty()));
    }
}
