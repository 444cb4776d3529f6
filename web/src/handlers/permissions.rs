//! Group permission matrices, by subject and by group.
//!
//! `:kind` is `customer-company`, `customer-user` or `agent`. PUT accepts either a
//! JSON matrix or the admin form encoding `permissions[<outer>][<key>]=1`.

use super::{ApiResponse, ok};
use crate::error::AppError;
use crate::extractors::AdminUser;
use crate::state::AppState;
use axum::{
    Form, Json, async_trait,
    extract::{FromRequest, Path, Request, State},
    http::header::CONTENT_TYPE,
};
use helpdesk_core::permission::{
    PermissionMatrix, PermissionSubjectKind, SubjectMatrix, parse_permission_form,
    parse_subject_permission_form, retain_valid_keys,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// PUT body: JSON matrix keyed by the outer id, or form pairs.
#[derive(Debug)]
pub enum MatrixBody {
    /// `{"<outer>": {"<key>": true}}`
    Json(BTreeMap<String, BTreeMap<String, bool>>),
    /// `permissions[<outer>][<key>]=1` pairs.
    Form(Vec<(String, String)>),
}

#[async_trait]
impl<S> FromRequest<S> for MatrixBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            Ok(Self::Form(pairs))
        } else {
            let Json(matrix) = Json::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            Ok(Self::Json(matrix))
        }
    }
}

impl MatrixBody {
    fn into_permission_matrix(self, kind: PermissionSubjectKind) -> Result<PermissionMatrix, AppError> {
        match self {
            Self::Form(pairs) => Ok(parse_permission_form(
                pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                kind,
            )),
            Self::Json(raw) => {
                let mut matrix = PermissionMatrix::new();
                for (group, keys) in raw {
                    let group_id = group
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| AppError::validation(format!("invalid group id {group:?}")))?;
                    matrix.insert(group_id, keys);
                }
                Ok(retain_valid_keys(matrix, kind))
            }
        }
    }

    fn into_subject_matrix(self, kind: PermissionSubjectKind) -> Result<SubjectMatrix, AppError> {
        match self {
            Self::Form(pairs) => Ok(parse_subject_permission_form(
                pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                kind,
            )),
            Self::Json(raw) => {
                for subject in raw.keys() {
                    kind.validate_subject(subject)?;
                }
                Ok(retain_valid_keys(raw, kind))
            }
        }
    }
}

/// Permissions of one subject.
#[derive(Debug, Serialize)]
pub struct SubjectPermissions {
    /// Subject kind, as in the path.
    pub kind: PermissionSubjectKind,
    /// Customer id, login or agent id.
    pub subject: String,
    /// Keys valid for this kind.
    pub keys: &'static [&'static str],
    /// Group id → key → granted.
    pub permissions: PermissionMatrix,
}

/// Permissions within one group.
#[derive(Debug, Serialize)]
pub struct GroupPermissions {
    /// Subject kind, as in the path.
    pub kind: PermissionSubjectKind,
    /// Group id.
    pub group_id: i64,
    /// Keys valid for this kind.
    pub keys: &'static [&'static str],
    /// Subject → key → granted.
    pub permissions: SubjectMatrix,
}

/// `GET /admin/permissions/:kind/subjects/:subject`
pub async fn get_subject_permissions(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((kind, subject)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SubjectPermissions>>, AppError> {
    let kind: PermissionSubjectKind = kind.parse()?;
    kind.validate_subject(&subject)?;
    let permissions = state.permissions.for_subject(kind, &subject).await?;
    Ok(ok(SubjectPermissions {
        kind,
        subject,
        keys: kind.keys(),
        permissions,
    }))
}

/// `PUT /admin/permissions/:kind/subjects/:subject`
pub async fn put_subject_permissions(
    State(state): State<AppState>,
    admin: AdminUser,
    Path((kind, subject)): Path<(String, String)>,
    body: MatrixBody,
) -> Result<Json<ApiResponse<SubjectPermissions>>, AppError> {
    let kind: PermissionSubjectKind = kind.parse()?;
    kind.validate_subject(&subject)?;
    let matrix = body.into_permission_matrix(kind)?;
    for group_id in matrix.keys() {
        state.groups.get(*group_id).await?;
    }
    state
        .permissions
        .replace_for_subject(kind, &subject, &matrix, admin.user_id())
        .await?;
    let permissions = state.permissions.for_subject(kind, &subject).await?;
    Ok(ok(SubjectPermissions {
        kind,
        subject,
        keys: kind.keys(),
        permissions,
    }))
}

/// `GET /admin/permissions/:kind/groups/:group_id`
pub async fn get_group_permissions(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((kind, group_id)): Path<(String, i64)>,
) -> Result<Json<ApiResponse<GroupPermissions>>, AppError> {
    let kind: PermissionSubjectKind = kind.parse()?;
    state.groups.get(group_id).await?;
    let permissions = state.permissions.for_group(kind, group_id).await?;
    Ok(ok(GroupPermissions {
        kind,
        group_id,
        keys: kind.keys(),
        permissions,
    }))
}

/// `PUT /admin/permissions/:kind/groups/:group_id`
pub async fn put_group_permissions(
    State(state): State<AppState>,
    admin: AdminUser,
    Path((kind, group_id)): Path<(String, i64)>,
    body: MatrixBody,
) -> Result<Json<ApiResponse<GroupPermissions>>, AppError> {
    let kind: PermissionSubjectKind = kind.parse()?;
    state.groups.get(group_id).await?;
    let matrix = body.into_subject_matrix(kind)?;
    state
        .permissions
        .replace_for_group(kind, group_id, &matrix, admin.user_id())
        .await?;
    let permissions = state.permissions.for_group(kind, group_id).await?;
    Ok(ok(GroupPermissions {
        kind,
        group_id,
        keys: kind.keys(),
        permissions,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_json_matrix_drops_invalid_keys() {
        let raw = BTreeMap::from([(
            "3".to_string(),
            BTreeMap::from([("ro".to_string(), true), ("owner".to_string(), true)]),
        )]);
        let matrix = MatrixBody::Json(raw)
            .into_permission_matrix(PermissionSubjectKind::CustomerUser)
            .unwrap();
        assert_eq!(matrix[&3], BTreeMap::from([("ro".to_string(), true)]));
    }

    #[test]
    fn test_json_matrix_rejects_bad_group_id() {
        let raw = BTreeMap::from([("abc".to_string(), BTreeMap::new())]);
        assert!(MatrixBody::Json(raw)
            .into_permission_matrix(PermissionSubjectKind::Agent)
            .is_err());
    }

    #[test]
    fn test_form_body() {
        let pairs = vec![
            ("permissions[ACME][rw]".to_string(), "on".to_string()),
            ("permissions[ACME][move_into]".to_string(), "on".to_string()),
        ];
        let matrix = MatrixBody::Form(pairs)
            .into_subject_matrix(PermissionSubjectKind::CustomerCompany)
            .unwrap();
        assert_eq!(matrix["ACME"], BTreeMap::from([("rw".to_string(), true)]));
    }

    #[test]
    fn test_json_subject_matrix_rejects_non_numeric_agent() {
        let raw = BTreeMap::from([("bob".to_string(), BTreeMap::new())]);
        assert!(MatrixBody::Json(raw)
            .into_subject_matrix(PermissionSubjectKind::Agent)
            .is_err());
    }
}
