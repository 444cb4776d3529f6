//! Personal access tokens in `api_tokens`.

use crate::db_error;
use chrono::{DateTime, Utc};
use helpdesk_core::api_token::{ApiToken, ApiTokenRepository, ApiTokenUserType, NewApiToken};
use helpdesk_core::{StoreError, StoreFuture};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const TOKEN_COLUMNS: &str = "id, user_id, user_type, name, prefix, token_hash, scopes, \
    expires_at, last_used_at, last_used_ip, rate_limit, created_at, created_by, \
    revoked_at, revoked_by";

/// Token store. Scopes are a JSONB array.
#[derive(Clone, Debug)]
pub struct PostgresApiTokenStore {
    pool: PgPool,
}

impl PostgresApiTokenStore {
    /// Create a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_token(row: &PgRow) -> Result<ApiToken, StoreError> {
        let user_type: String = row.get("user_type");
        let scopes: serde_json::Value = row.get("scopes");
        Ok(ApiToken {
            id: row.get("id"),
            user_id: row.get("user_id"),
            user_type: user_type.parse::<ApiTokenUserType>()?,
            name: row.get("name"),
            prefix: row.get("prefix"),
            token_hash: row.get("token_hash"),
            scopes: serde_json::from_value(scopes)
                .map_err(|e| StoreError::Database(format!("malformed token scopes: {e}")))?,
            expires_at: row.get("expires_at"),
            last_used_at: row.get("last_used_at"),
            last_used_ip: row.get("last_used_ip"),
            rate_limit: row.get("rate_limit"),
            created_at: row.get("created_at"),
            created_by: row.get("created_by"),
            revoked_at: row.get("revoked_at"),
            revoked_by: row.get("revoked_by"),
        })
    }
}

fn tokens(rows: &[PgRow]) -> Result<Vec<ApiToken>, StoreError> {
    rows.iter().map(PostgresApiTokenStore::row_to_token).collect()
}

impl ApiTokenRepository for PostgresApiTokenStore {
    fn insert<'a>(&'a self, token: &'a NewApiToken) -> StoreFuture<'a, ApiToken> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "INSERT INTO api_tokens ( \
                     user_id, user_type, name, prefix, token_hash, scopes, \
                     expires_at, rate_limit, created_at, created_by \
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 RETURNING {TOKEN_COLUMNS}"
            ))
            .bind(token.user_id)
            .bind(token.user_type.as_str())
            .bind(&token.name)
            .bind(&token.prefix)
            .bind(&token.token_hash)
            .bind(serde_json::json!(token.scopes))
            .bind(token.expires_at)
            .bind(token.rate_limit)
            .bind(token.created_at)
            .bind(token.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
            Self::row_to_token(&row)
        })
    }

    fn get(&self, id: i64) -> StoreFuture<'_, Option<ApiToken>> {
        Box::pin(async move {
            let sql = format!("SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE id = $1");
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
            row.as_ref().map(Self::row_to_token).transpose()
        })
    }

    fn by_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<ApiToken>> {
        Box::pin(async move {
            let sql = format!("SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE prefix = $1");
            let rows = sqlx::query(&sql)
                .bind(prefix)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            tokens(&rows)
        })
    }

    fn list_by_user(&self, user_id: i64, user_type: ApiTokenUserType) -> StoreFuture<'_, Vec<ApiToken>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {TOKEN_COLUMNS} FROM api_tokens \
                 WHERE user_id = $1 AND user_type = $2 AND revoked_at IS NULL \
                 ORDER BY created_at DESC, id DESC"
            );
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .bind(user_type.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            tokens(&rows)
        })
    }

    fn list_all(&self, include_revoked: bool) -> StoreFuture<'_, Vec<ApiToken>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {TOKEN_COLUMNS} FROM api_tokens \
                 WHERE $1 OR revoked_at IS NULL \
                 ORDER BY created_at DESC, id DESC"
            );
            let rows = sqlx::query(&sql)
                .bind(include_revoked)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            tokens(&rows)
        })
    }

    fn revoke(&self, id: i64, revoked_by: i64, at: DateTime<Utc>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE api_tokens
                SET revoked_at = $1, revoked_by = $2
                WHERE id = $3 AND revoked_at IS NULL
                ",
            )
            .bind(at)
            .bind(revoked_by)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("api token", id));
            }
            Ok(())
        })
    }

    fn touch<'a>(&'a self, id: i64, ip: Option<&'a str>, at: DateTime<Utc>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            sqlx::query("UPDATE api_tokens SET last_used_at = $1, last_used_ip = $2 WHERE id = $3")
                .bind(at)
                .bind(ip)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
            Ok(())
        })
    }
}
