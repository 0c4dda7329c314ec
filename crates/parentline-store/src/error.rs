//! Error types for parentline-store

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Field-level validation messages, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field error
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a message against a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First field and its first message
    #[must_use]
    pub fn first(&self) -> Option<(&str, &str)> {
        self.0
            .iter()
            .find_map(|(field, msgs)| msgs.first().map(|m| (field.as_str(), m.as_str())))
    }

    /// `Ok(())` when empty, otherwise a validation error
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first() {
            Some((field, message)) => write!(f, "{}: {}", field, message),
            None => write!(f, "invalid input"),
        }
    }
}

/// Store error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Row does not exist, is soft-deleted, or belongs to someone else
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity name
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Input failed validation
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Caller may not modify the row
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Stored data could not be decoded
    #[error("invalid stored data: {0}")]
    InvalidData(String),

    /// Migration or setup failure
    #[error("setup error: {0}")]
    Setup(String),
}

impl StoreError {
    /// Not-found helper
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Single-field validation helper
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    /// Map a unique-constraint violation to a validation error on `field`
    pub(crate) fn unique_as_validation(e: sqlx::Error, field: &str, message: &str) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::invalid(field, message),
            _ => Self::Database(e),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
