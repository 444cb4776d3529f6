//! Group administration.

use super::{ApiResponse, ok};
use crate::error::AppError;
use crate::extractors::AdminUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use helpdesk_core::group::{Group, GroupInput};
use serde::Deserialize;
use serde_json::{Value, json};

/// Query of `GET /admin/groups`.
#[derive(Debug, Default, Deserialize)]
pub struct GroupQuery {
    /// Case-insensitive name substring.
    pub search: Option<String>,
}

/// `GET /admin/groups`
pub async fn list_groups(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<GroupQuery>,
) -> Result<Json<ApiResponse<Vec<Group>>>, AppError> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    Ok(ok(state.groups.list(search).await?))
}

/// `GET /admin/groups/:id`
pub async fn get_group(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Group>>, AppError> {
    Ok(ok(state.groups.get(id).await?))
}

/// `POST /admin/groups`
pub async fn create_group(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(input): Json<GroupInput>,
) -> Result<(StatusCode, Json<ApiResponse<Group>>), AppError> {
    let group = state.groups.create(&input, admin.user_id()).await?;
    tracing::info!(group_id = group.id, name = %group.name, "group created");
    Ok((StatusCode::CREATED, ok(group)))
}

/// `PUT /admin/groups/:id`
pub async fn update_group(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(input): Json<GroupInput>,
) -> Result<Json<ApiResponse<Group>>, AppError> {
    let group = state.groups.update(id, &input, admin.user_id()).await?;
    tracing::info!(group_id = id, name = %group.name, "group updated");
    Ok(ok(group))
}

/// `DELETE /admin/groups/:id`
///
/// Refused for the admin group and for groups still referenced by permissions.
pub async fn delete_group(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    state.groups.delete(id).await?;
    tracing::info!(group_id = id, "group deleted");
    Ok(ok(json!({ "message": "Group deleted" })))
}
