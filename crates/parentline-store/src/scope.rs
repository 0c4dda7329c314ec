//! Soft-delete visibility

/// Which rows a read may see
///
/// The default hides soft-deleted rows. Pass [`ReadScope::include_deleted`]
/// only where tombstones are wanted (audits, restores).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadScope {
    include_deleted: bool,
}

impl ReadScope {
    /// Only live rows
    #[must_use]
    pub fn live() -> Self {
        Self::default()
    }

    /// Live and soft-deleted rows
    #[must_use]
    pub fn include_deleted() -> Self {
        Self {
            include_deleted: true,
        }
    }

    /// Whether tombstones are visible
    #[must_use]
    pub fn includes_deleted(&self) -> bool {
        self.include_deleted
    }

    /// SQL predicate for a table alias, always safe to `AND` onto a WHERE
    pub(crate) fn predicate(&self, alias: &str) -> String {
        if self.include_deleted {
            "1 = 1".to_string()
        } else {
            format!("{}.deleted_at IS NULL", alias)
        }
    }
}
