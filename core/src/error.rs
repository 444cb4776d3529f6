//! Shared error type for store operations.

use thiserror::Error;

/// Errors returned by repository and store implementations.
///
/// Every repository trait in this crate reports failures through this enum so the
/// web layer can map them to HTTP statuses in one place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of record (e.g. "group", "postmaster filter").
        resource: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The write collides with an existing record (duplicate name, rows still referencing it).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The input was rejected before touching the database.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Database connection or query failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Returns true for [`StoreError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found("group", 42);
        assert_eq!(err.to_string(), "group not found: 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_conflict_is_not_not_found() {
        assert!(!StoreError::Conflict("dup".into()).is_not_found());
    }
}
