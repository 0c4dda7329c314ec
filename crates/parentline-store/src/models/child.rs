use super::{check_len, parse_label, parse_uuid, text_enum};
use crate::error::{FieldErrors, Result, StoreError};
use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

text_enum! {
    /// Child gender
    pub enum Gender {
        /// Male
        Male => "male",
        /// Female
        Female => "female",
        /// Other or unspecified
        Other => "other",
    }
}

/// A child profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Child {
    /// Child id
    pub id: Uuid,
    /// Parent account
    pub user_id: Uuid,
    /// Name
    pub name: String,
    /// Birth date
    pub birth_date: NaiveDate,
    /// Gender
    pub gender: Option<Gender>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Child {
    /// Age in whole months, counted as 30-day blocks
    #[must_use]
    pub fn age_months(&self, today: NaiveDate) -> i64 {
        ((today - self.birth_date).num_days() / 30).max(0)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ChildRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub birth_date: NaiveDate,
    pub gender: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ChildRow> for Child {
    type Error = StoreError;

    fn try_from(row: ChildRow) -> Result<Self> {
        Ok(Child {
            id: parse_uuid(&row.id, "child")?,
            user_id: parse_uuid(&row.user_id, "user")?,
            name: row.name,
            birth_date: row.birth_date,
            gender: row.gender.as_deref().map(parse_label::<Gender>).transpose()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn check_birth_date(errors: &mut FieldErrors, birth_date: NaiveDate, today: NaiveDate) {
    if birth_date > today {
        errors.add("birth_date", "Birth date cannot be in the future.");
    } else if today
        .checked_sub_months(Months::new(120))
        .is_some_and(|limit| birth_date < limit)
    {
        errors.add("birth_date", "Birth date cannot be more than 10 years ago.");
    }
}

/// Child creation input
#[derive(Debug, Clone)]
pub struct NewChild {
    /// Name (1 to 20 characters)
    pub name: String,
    /// Birth date (not in the future, at most 10 years ago)
    pub birth_date: NaiveDate,
    /// Gender
    pub gender: Option<Gender>,
}

impl NewChild {
    /// Validate against `today`
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_len(&mut errors, "name", &self.name, 1, 20);
        check_birth_date(&mut errors, self.birth_date, today);
        errors.into_result()
    }
}

/// Child edit
#[derive(Debug, Clone, Default)]
pub struct ChildUpdate {
    /// New name
    pub name: Option<String>,
    /// New birth date
    pub birth_date: Option<NaiveDate>,
    /// New gender; `Some(None)` clears it
    pub gender: Option<Option<Gender>>,
}

impl ChildUpdate {
    /// Validate against `today`
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            check_len(&mut errors, "name", name, 1, 20);
        }
        if let Some(birth_date) = self.birth_date {
            check_birth_date(&mut errors, birth_date, today);
        }
        errors.into_result()
    }
}
