//! Group permission matrices.
//!
//! Three independent tables grant `(subject, group, key)` permissions:
//!
//! | Kind | Table | Subject column |
//! |------|-------|----------------|
//! | [`PermissionSubjectKind::CustomerCompany`] | `group_customer` | `customer_id` |
//! | [`PermissionSubjectKind::CustomerUser`] | `group_customer_user` | `user_id` (login) |
//! | [`PermissionSubjectKind::Agent`] | `group_user` | `user_id` |
//!
//! A matrix is always replaced as a whole; only granted keys are stored.

use crate::{StoreError, StoreFuture};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The key that implies every other key.
pub const RW: &str = "rw";

/// `permission_context` written for every row.
pub const PERMISSION_CONTEXT: &str = "Ticket";

const CUSTOMER_KEYS: &[&str] = &["ro", "rw"];
const AGENT_KEYS: &[&str] = &["ro", "move_into", "create", "note", "owner", "priority", "rw"];

/// Group id → permission key → granted.
pub type PermissionMatrix = BTreeMap<i64, BTreeMap<String, bool>>;

/// Subject → permission key → granted.
pub type SubjectMatrix = BTreeMap<String, BTreeMap<String, bool>>;

/// Who a permission row is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionSubjectKind {
    /// A customer company (`customer_company.customer_id`).
    CustomerCompany,
    /// A customer user login.
    CustomerUser,
    /// An agent user id.
    Agent,
}

impl PermissionSubjectKind {
    /// Table holding this kind's rows.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        match self {
            Self::CustomerCompany => "group_customer",
            Self::CustomerUser => "group_customer_user",
            Self::Agent => "group_user",
        }
    }

    /// Column naming the subject.
    #[must_use]
    pub const fn subject_column(&self) -> &'static str {
        match self {
            Self::CustomerCompany => "customer_id",
            Self::CustomerUser | Self::Agent => "user_id",
        }
    }

    /// Permission keys valid for this kind.
    #[must_use]
    pub const fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::CustomerCompany | Self::CustomerUser => CUSTOMER_KEYS,
            Self::Agent => AGENT_KEYS,
        }
    }

    /// Whether `key` is valid for this kind.
    #[must_use]
    pub fn is_valid_key(&self, key: &str) -> bool {
        self.keys().contains(&key)
    }

    /// Path segment used in URLs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerCompany => "customer-company",
            Self::CustomerUser => "customer-user",
            Self::Agent => "agent",
        }
    }

    /// Check a subject identifier. Agent subjects are numeric user ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for a blank subject or a non-numeric agent id.
    pub fn validate_subject(&self, subject: &str) -> Result<(), StoreError> {
        if subject.trim().is_empty() {
            return Err(StoreError::Validation("subject is required".into()));
        }
        if matches!(self, Self::Agent) && subject.parse::<i64>().is_err() {
            return Err(StoreError::Validation(format!(
                "agent subject must be a user id, got {subject:?}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PermissionSubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionSubjectKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer-company" => Ok(Self::CustomerCompany),
            "customer-user" => Ok(Self::CustomerUser),
            "agent" => Ok(Self::Agent),
            other => Err(StoreError::Validation(format!(
                "unknown permission kind {other:?}"
            ))),
        }
    }
}

fn is_enabled(value: &str) -> bool {
    matches!(value.trim(), "1" | "on" | "true")
}

/// Split `permissions[<outer>][<key>]` into its two parts.
fn split_form_key(key: &str) -> Option<(&str, &str)> {
    let inner = key.strip_prefix("permissions[")?.strip_suffix(']')?;
    let (outer, key) = inner.split_once("][")?;
    if outer.is_empty() || key.is_empty() || key.contains(['[', ']']) {
        return None;
    }
    Some((outer, key))
}

/// Parse the by-subject form: `permissions[<group_id>][<key>] = 1|on|true`.
///
/// Keys invalid for `kind` and group ids that do not parse are ignored. Any other
/// value records the key as not granted.
pub fn parse_permission_form<'a, I>(pairs: I, kind: PermissionSubjectKind) -> PermissionMatrix
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut matrix = PermissionMatrix::new();
    for (name, value) in pairs {
        let Some((group, key)) = split_form_key(name) else {
            continue;
        };
        let Ok(group_id) = group.parse::<i64>() else {
            continue;
        };
        if !kind.is_valid_key(key) {
            continue;
        }
        let entry = matrix.entry(group_id).or_default();
        let granted = entry.get(key).copied().unwrap_or(false) || is_enabled(value);
        entry.insert(key.to_string(), granted);
    }
    matrix
}

/// Parse the by-group form: `permissions[<subject>][<key>] = 1|on|true`.
pub fn parse_subject_permission_form<'a, I>(pairs: I, kind: PermissionSubjectKind) -> SubjectMatrix
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut matrix = SubjectMatrix::new();
    for (name, value) in pairs {
        let Some((subject, key)) = split_form_key(name) else {
            continue;
        };
        if !kind.is_valid_key(key) || kind.validate_subject(subject).is_err() {
            continue;
        }
        let entry = matrix.entry(subject.to_string()).or_default();
        let granted = entry.get(key).copied().unwrap_or(false) || is_enabled(value);
        entry.insert(key.to_string(), granted);
    }
    matrix
}

/// Drop keys that are invalid for `kind` from a JSON-supplied matrix.
#[must_use]
pub fn retain_valid_keys<K: Ord>(
    mut matrix: BTreeMap<K, BTreeMap<String, bool>>,
    kind: PermissionSubjectKind,
) -> BTreeMap<K, BTreeMap<String, bool>> {
    for perms in matrix.values_mut() {
        perms.retain(|key, _| kind.is_valid_key(key));
    }
    matrix
}

/// Whether `key` is effectively granted in `group_id`; `rw` implies every key.
#[must_use]
pub fn effective(matrix: &PermissionMatrix, group_id: i64, key: &str) -> bool {
    matrix.get(&group_id).is_some_and(|perms| {
        perms.get(key).copied().unwrap_or(false) || perms.get(RW).copied().unwrap_or(false)
    })
}

/// Storage for the three permission tables.
pub trait PermissionRepository: Send + Sync {
    /// Everything granted to one subject, by group.
    fn for_subject<'a>(
        &'a self,
        kind: PermissionSubjectKind,
        subject: &'a str,
    ) -> StoreFuture<'a, PermissionMatrix>;

    /// Everything granted within one group, by subject.
    fn for_group(&self, kind: PermissionSubjectKind, group_id: i64) -> StoreFuture<'_, SubjectMatrix>;

    /// Replace all rows of one subject in a single transaction.
    fn replace_for_subject<'a>(
        &'a self,
        kind: PermissionSubjectKind,
        subject: &'a str,
        matrix: &'a PermissionMatrix,
        user_id: i64,
    ) -> StoreFuture<'a, ()>;

    /// Replace all rows of one group in a single transaction.
    fn replace_for_group<'a>(
        &'a self,
        kind: PermissionSubjectKind,
        group_id: i64,
        matrix: &'a SubjectMatrix,
        user_id: i64,
    ) -> StoreFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tables() {
        assert_eq!(PermissionSubjectKind::CustomerCompany.table(), "group_customer");
        assert_eq!(PermissionSubjectKind::CustomerUser.table(), "group_customer_user");
        assert_eq!(PermissionSubjectKind::Agent.table(), "group_user");
        assert_eq!(
            PermissionSubjectKind::CustomerCompany.subject_column(),
            "customer_id"
        );
        assert_eq!(PermissionSubjectKind::Agent.keys().len(), 7);
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            "customer-user".parse::<PermissionSubjectKind>(),
            Ok(PermissionSubjectKind::CustomerUser)
        );
        assert!("robot".parse::<PermissionSubjectKind>().is_err());
    }

    #[test]
    fn test_parse_form() {
        let matrix = parse_permission_form(
            [
                ("permissions[1][ro]", "1"),
                ("permissions[1][rw]", "0"),
                ("permissions[2][rw]", "on"),
                ("permissions[2][owner]", "1"),
                ("permissions[abc][ro]", "1"),
                ("other", "1"),
            ],
            PermissionSubjectKind::CustomerCompany,
        );

        assert_eq!(matrix.len(), 2);
        assert!(matrix[&1]["ro"]);
        assert!(!matrix[&1]["rw"]);
        assert!(matrix[&2]["rw"]);
        // owner is an agent-only key
        assert!(!matrix[&2].contains_key("owner"));
    }

    #[test]
    fn test_parse_form_checkbox_with_hidden_default() {
        // A hidden "0" field followed by a checked box must stay granted.
        let matrix = parse_permission_form(
            [("permissions[5][note]", "0"), ("permissions[5][note]", "true")],
            PermissionSubjectKind::Agent,
        );
        assert!(matrix[&5]["note"]);
    }

    #[test]
    fn test_parse_subject_form() {
        let matrix = parse_subject_permission_form(
            [
                ("permissions[jdoe][ro]", "1"),
                ("permissions[acme][rw]", "1"),
                ("permissions[][rw]", "1"),
            ],
            PermissionSubjectKind::CustomerUser,
        );
        assert_eq!(matrix.len(), 2);
        assert!(matrix["jdoe"]["ro"]);

        let agents = parse_subject_permission_form(
            [("permissions[7][ro]", "1"), ("permissions[bob][ro]", "1")],
            PermissionSubjectKind::Agent,
        );
        assert_eq!(agents.keys().collect::<Vec<_>>(), vec!["7"]);
    }

    #[test]
    fn test_effective_rw_implies_all() {
        let mut matrix = PermissionMatrix::new();
        matrix
            .entry(1)
            .or_default()
            .insert("rw".to_string(), true);
        matrix
            .entry(2)
            .or_default()
            .insert("ro".to_string(), true);

        assert!(effective(&matrix, 1, "move_into"));
        assert!(effective(&matrix, 2, "ro"));
        assert!(!effective(&matrix, 2, "note"));
        assert!(!effective(&matrix, 3, "ro"));
    }

    #[test]
    fn test_retain_valid_keys() {
        let mut matrix = PermissionMatrix::new();
        let perms = matrix.entry(1).or_default();
        perms.insert("ro".into(), true);
        perms.insert("owner".into(), true);
        let matrix = retain_valid_keys(matrix, PermissionSubjectKind::CustomerUser);
        assert_eq!(matrix[&1].len(), 1);
    }

    #[test]
    fn test_validate_subject() {
        assert!(PermissionSubjectKind::Agent.validate_subject("12").is_ok());
        assert!(PermissionSubjectKind::Agent.validate_subject("jdoe").is_err());
        assert!(PermissionSubjectKind::CustomerUser.validate_subject(" ").is_err());
    }
}
