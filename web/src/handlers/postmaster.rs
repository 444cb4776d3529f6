//! Postmaster filter administration and dry runs.

use super::{ApiResponse, ok};
use crate::error::AppError;
use crate::extractors::AdminUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use helpdesk_core::postmaster::{FilterOutcome, InboundMessage, PostmasterFilter, apply_filters};
use serde::Deserialize;
use serde_json::{Value, json};

/// `GET /admin/postmaster-filters`
pub async fn list_filters(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<PostmasterFilter>>>, AppError> {
    Ok(ok(state.postmaster_filters.list().await?))
}

/// `GET /admin/postmaster-filters/:name`
pub async fn get_filter(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<PostmasterFilter>>, AppError> {
    Ok(ok(state.postmaster_filters.get(&name).await?))
}

/// `POST /admin/postmaster-filters`
pub async fn create_filter(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(filter): Json<PostmasterFilter>,
) -> Result<(StatusCode, Json<ApiResponse<PostmasterFilter>>), AppError> {
    filter.validate()?;
    state.postmaster_filters.create(&filter).await?;
    let stored = state.postmaster_filters.get(filter.name.trim()).await?;
    Ok((StatusCode::CREATED, ok(stored)))
}

/// `PUT /admin/postmaster-filters/:name`
///
/// A blank name in the body keeps the current one.
pub async fn update_filter(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(name): Path<String>,
    Json(filter): Json<PostmasterFilter>,
) -> Result<Json<ApiResponse<PostmasterFilter>>, AppError> {
    let new_name = match filter.name.trim() {
        "" => name.clone(),
        n => n.to_string(),
    };
    PostmasterFilter {
        name: new_name.clone(),
        ..filter.clone()
    }
    .validate()?;

    state.postmaster_filters.update(&name, &filter).await?;
    Ok(ok(state.postmaster_filters.get(&new_name).await?))
}

/// `DELETE /admin/postmaster-filters/:name`
pub async fn delete_filter(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    state.postmaster_filters.delete(&name).await?;
    Ok(ok(json!({ "message": "Filter deleted" })))
}

/// Body of `POST /admin/postmaster-filters/test`.
#[derive(Debug, Deserialize)]
pub struct TestMessageRequest {
    /// Raw RFC 5322 message.
    pub message: String,
}

/// `POST /admin/postmaster-filters/test`
///
/// Runs every stored filter over the message without creating anything.
pub async fn test_filters(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<TestMessageRequest>,
) -> Result<Json<ApiResponse<FilterOutcome>>, AppError> {
    let filters = state.postmaster_filters.list().await?;
    let message = InboundMessage::parse(&req.message);
    let outcome = apply_filters(&filters, &message);
    tracing::info!(
        filters = filters.len(),
        matched = outcome.matched.len(),
        stopped = outcome.stopped,
        "postmaster dry run"
    );
    Ok(ok(outcome))
}
