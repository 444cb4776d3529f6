//! Dynamic field export, import and search metadata.

use super::{ApiResponse, ok};
use crate::error::AppError;
use crate::extractors::AdminUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use helpdesk_core::dynamic_field::exchange::{
    self, DynamicFieldExport, ImportPreviewItem, ImportResult,
};
use helpdesk_core::dynamic_field::{ObjectType, SearchableDynamicField, searchable_fields};
use serde::Deserialize;

/// Query of the export endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    /// Comma-separated field names; empty exports every field.
    #[serde(default)]
    pub names: String,
    /// Include screen configuration.
    #[serde(default)]
    pub screens: bool,
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// `GET /admin/dynamic-fields/export?names=a,b&screens=true`
///
/// Responds with a YAML attachment.
pub async fn export_fields(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let names = split_names(&query.names);
    let document = exchange::export(state.dynamic_fields.as_ref(), &names, query.screens).await?;
    let yaml = document.to_yaml()?;
    tracing::info!(
        fields = document.dynamic_fields.len(),
        screens = query.screens,
        "dynamic fields exported"
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/x-yaml; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"dynamic_fields.yml\"",
            ),
        ],
        yaml,
    ))
}

/// `POST /admin/dynamic-fields/import/preview`, with the YAML document as the body.
pub async fn preview_import(
    State(state): State<AppState>,
    _admin: AdminUser,
    body: String,
) -> Result<Json<ApiResponse<Vec<ImportPreviewItem>>>, AppError> {
    let document = DynamicFieldExport::parse_yaml(&body)?;
    let items = exchange::preview(state.dynamic_fields.as_ref(), &document).await?;
    Ok(ok(items))
}

/// Body of `POST /admin/dynamic-fields/import`.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    /// The YAML document.
    pub yaml: String,
    /// Field names to import.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Field names whose screen configuration to import.
    #[serde(default)]
    pub screens: Vec<String>,
    /// Update fields that already exist.
    #[serde(default)]
    pub overwrite: bool,
}

/// `POST /admin/dynamic-fields/import`
pub async fn import_fields(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ApiResponse<ImportResult>>, AppError> {
    let document = DynamicFieldExport::parse_yaml(&req.yaml)?;
    let result = exchange::import(
        state.dynamic_fields.as_ref(),
        &document,
        &req.fields,
        &req.screens,
        req.overwrite,
        admin.user_id(),
    )
    .await?;
    tracing::info!(
        created = result.created.len(),
        updated = result.updated.len(),
        skipped = result.skipped.len(),
        errors = result.errors.len(),
        screens = result.screens_ok,
        "dynamic fields imported"
    );
    Ok(ok(result))
}

/// Query of the search metadata endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SearchFieldsQuery {
    /// `Ticket`, `Article`, `CustomerUser` or `CustomerCompany`; all when absent.
    pub object_type: Option<String>,
}

/// `GET /admin/dynamic-fields/search?object_type=Ticket`
pub async fn searchable(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<SearchFieldsQuery>,
) -> Result<Json<ApiResponse<Vec<SearchableDynamicField>>>, AppError> {
    let object_type = query
        .object_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ObjectType>)
        .transpose()?;
    let fields = searchable_fields(state.dynamic_fields.as_ref(), object_type).await?;
    Ok(ok(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_names() {
        assert_eq!(split_names(" a, ,b,"), vec!["a".to_string(), "b".to_string()]);
        assert!(split_names("").is_empty());
    }
}
