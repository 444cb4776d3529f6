//! Agent and customer groups.

use crate::{StoreError, StoreFuture};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum group name length in characters.
pub const MAX_NAME_LEN: usize = 200;

/// The system administrators group, which cannot be deleted.
pub const ADMIN_GROUP: &str = "admin";

/// A group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Row id.
    pub id: i64,
    /// Unique name.
    pub name: String,
    /// Free-form description.
    pub comments: Option<String>,
    /// 1 = valid.
    pub valid_id: i32,
    /// Creation time.
    pub create_time: DateTime<Utc>,
    /// Last change time.
    pub change_time: DateTime<Utc>,
}

/// Input for creating or updating a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInput {
    /// Group name; trimmed before storing.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub comments: Option<String>,
    /// Validity, defaults to 1.
    #[serde(default = "default_valid_id")]
    pub valid_id: i32,
}

const fn default_valid_id() -> i32 {
    1
}

impl GroupInput {
    /// Trim and check the name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an empty or overlong name.
    pub fn normalized(self) -> Result<Self, StoreError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::Validation("group name is required".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(StoreError::Validation(format!(
                "group name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        let comments = self
            .comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Ok(Self {
            name,
            comments,
            valid_id: self.valid_id,
        })
    }
}

/// Group storage.
///
/// Implementations call [`GroupInput::normalized`] before writing and report duplicate
/// names as [`StoreError::Conflict`].
pub trait GroupRepository: Send + Sync {
    /// Groups whose name contains `search` (case-insensitive), ordered by name.
    fn list<'a>(&'a self, search: Option<&'a str>) -> StoreFuture<'a, Vec<Group>>;

    /// One group by id.
    fn get(&self, id: i64) -> StoreFuture<'_, Group>;

    /// Insert a group.
    fn create<'a>(&'a self, input: &'a GroupInput, user_id: i64) -> StoreFuture<'a, Group>;

    /// Update name, comments and validity.
    fn update<'a>(&'a self, id: i64, input: &'a GroupInput, user_id: i64) -> StoreFuture<'a, Group>;

    /// Delete a group that is not `admin` and has no permission rows.
    fn delete(&self, id: i64) -> StoreFuture<'_, ()>;
}

/// Reject deletion of the admin group.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] when `group` is the admin group.
pub fn ensure_deletable(group: &Group) -> Result<(), StoreError> {
    if group.name.eq_ignore_ascii_case(ADMIN_GROUP) {
        return Err(StoreError::Validation(
            "the admin group cannot be deleted".into(),
        ));
    }
    Ok(())
}

/// Case-insensitive substring match used by in-memory listings.
#[must_use]
pub fn name_matches(name: &str, search: Option<&str>) -> bool {
    match search.map(str::trim) {
        None | Some("") => true,
        Some(needle) => name.to_lowercase().contains(&needle.to_lowercase()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(name: &str) -> GroupInput {
        GroupInput {
            name: name.to_string(),
            comments: Some("  ".to_string()),
            valid_id: 1,
        }
    }

    #[test]
    fn test_normalized_trims() {
        let g = input("  support ").normalized().unwrap();
        assert_eq!(g.name, "support");
        assert_eq!(g.comments, None);
    }

    #[test]
    fn test_normalized_rejects_blank_and_long() {
        assert!(input("   ").normalized().is_err());
        assert!(input(&"g".repeat(MAX_NAME_LEN)).normalized().is_ok());
        assert!(input(&"g".repeat(MAX_NAME_LEN + 1)).normalized().is_err());
    }

    #[test]
    fn test_admin_not_deletable() {
        let now = Utc::now();
        let mut group = Group {
            id: 1,
            name: "admin".into(),
            comments: None,
            valid_id: 1,
            create_time: now,
            change_time: now,
        };
        assert!(matches!(
            ensure_deletable(&group),
            Err(StoreError::Validation(_))
        ));
        group.name = "support".into();
        assert!(ensure_deletable(&group).is_ok());
    }

    #[test]
    fn test_name_matches() {
        assert!(name_matches("Support", Some("port")));
        assert!(name_matches("Support", Some("SUP")));
        assert!(name_matches("Support", None));
        assert!(name_matches("Support", Some(" ")));
        assert!(!name_matches("Support", Some("sales")));
    }
}
