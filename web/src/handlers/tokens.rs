//! API token endpoints: self-service under `/api/v1/tokens`, oversight under `/admin/tokens`.

use super::{ApiResponse, ok};
use crate::error::AppError;
use crate::extractors::{AdminUser, AuthenticatedUser, ClientIp};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use helpdesk_core::api_token::{
    ApiToken, ApiTokenCreateRequest, ApiTokenCreateResponse, ApiTokenSummary, scopes_for,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One selectable scope.
#[derive(Debug, Serialize)]
pub struct ScopeInfo {
    /// Scope string.
    pub scope: &'static str,
    /// What it grants.
    pub description: &'static str,
}

/// `GET /api/v1/tokens`
pub async fn list_tokens(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<ApiTokenSummary>>>, AppError> {
    let tokens = state
        .tokens
        .list_for_user(user.user_id(), user.user_type())
        .await?;
    Ok(ok(tokens))
}

/// `POST /api/v1/tokens`
///
/// The full token is returned exactly once.
pub async fn create_token(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    user: AuthenticatedUser,
    Json(req): Json<ApiTokenCreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ApiTokenCreateResponse>>), AppError> {
    let created = state
        .tokens
        .generate(&req, user.user_id(), user.user_type(), user.user_id())
        .await?;
    tracing::info!(
        token_id = created.id,
        issued_with = user.token.id,
        %client_ip,
        "api token issued"
    );
    Ok((StatusCode::CREATED, ok(created)))
}

/// `DELETE /api/v1/tokens/:id`
pub async fn revoke_token(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    state
        .tokens
        .revoke(id, user.user_id(), user.user_type(), user.user_id())
        .await?;
    Ok(ok(json!({ "message": "Token revoked" })))
}

/// `GET /api/v1/tokens/scopes`
pub async fn list_scopes(user: AuthenticatedUser) -> Json<ApiResponse<Vec<ScopeInfo>>> {
    let scopes = scopes_for(user.user_type())
        .into_iter()
        .map(|(scope, description)| ScopeInfo { scope, description })
        .collect();
    ok(scopes)
}

/// Query of `GET /admin/tokens`.
#[derive(Debug, Default, Deserialize)]
pub struct AdminTokenQuery {
    /// Include revoked tokens.
    #[serde(default)]
    pub include_revoked: bool,
}

/// `GET /admin/tokens`
pub async fn admin_list_tokens(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminTokenQuery>,
) -> Result<Json<ApiResponse<Vec<ApiToken>>>, AppError> {
    let tokens = state.tokens.list_all(query.include_revoked).await?;
    Ok(ok(tokens))
}

/// `DELETE /admin/tokens/:id`
pub async fn admin_revoke_token(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    state.tokens.revoke_admin(id, admin.user_id()).await?;
    Ok(ok(json!({ "message": "Token revoked" })))
}
