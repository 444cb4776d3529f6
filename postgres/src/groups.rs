//! Agent groups in the `groups` table.

use crate::db_error;
use helpdesk_core::dynamic_field::filter::escape_like;
use helpdesk_core::group::{Group, GroupInput, GroupRepository, ensure_deletable};
use helpdesk_core::{StoreError, StoreFuture};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Group store.
#[derive(Clone, Debug)]
pub struct PostgresGroupStore {
    pool: PgPool,
}

impl PostgresGroupStore {
    /// Create a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_group(row: &PgRow) -> Group {
        let valid_id: i16 = row.get("valid_id");
        Group {
            id: row.get("id"),
            name: row.get("name"),
            comments: row.get("comments"),
            valid_id: i32::from(valid_id),
            create_time: row.get("create_time"),
            change_time: row.get("change_time"),
        }
    }

    async fn name_taken(&self, name: &str, except: Option<i64>) -> Result<bool, StoreError> {
        let (taken,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM groups WHERE name = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(except)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(taken)
    }
}

fn valid_id(input: &GroupInput) -> Result<i16, StoreError> {
    i16::try_from(input.valid_id)
        .map_err(|_| StoreError::Validation(format!("invalid valid_id {}", input.valid_id)))
}

impl GroupRepository for PostgresGroupStore {
    fn list<'a>(&'a self, search: Option<&'a str>) -> StoreFuture<'a, Vec<Group>> {
        Box::pin(async move {
            let pattern = search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| format!("%{}%", escape_like(s)));
            let rows = sqlx::query(
                r"
                SELECT id, name, comments, valid_id, create_time, change_time
                FROM groups
                WHERE $1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\'
                ORDER BY name
                ",
            )
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(rows.iter().map(Self::row_to_group).collect())
        })
    }

    fn get(&self, id: i64) -> StoreFuture<'_, Group> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, name, comments, valid_id, create_time, change_time FROM groups WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::not_found("group", id))?;
            Ok(Self::row_to_group(&row))
        })
    }

    fn create<'a>(&'a self, input: &'a GroupInput, user_id: i64) -> StoreFuture<'a, Group> {
        Box::pin(async move {
            let input = input.clone().normalized()?;
            if self.name_taken(&input.name, None).await? {
                return Err(StoreError::Conflict(format!(
                    "group {} already exists",
                    input.name
                )));
            }
            let row = sqlx::query(
                r"
                INSERT INTO groups (name, comments, valid_id, create_time, create_by, change_time, change_by)
                VALUES ($1, $2, $3, NOW(), $4, NOW(), $4)
                RETURNING id, name, comments, valid_id, create_time, change_time
                ",
            )
            .bind(&input.name)
            .bind(&input.comments)
            .bind(valid_id(&input)?)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

            let group = Self::row_to_group(&row);
            tracing::info!(group_id = group.id, name = %group.name, user_id, "group created");
            Ok(group)
        })
    }

    fn update<'a>(&'a self, id: i64, input: &'a GroupInput, user_id: i64) -> StoreFuture<'a, Group> {
        Box::pin(async move {
            let input = input.clone().normalized()?;
            if self.name_taken(&input.name, Some(id)).await? {
                return Err(StoreError::Conflict(format!(
                    "group {} already exists",
                    input.name
                )));
            }
            let row = sqlx::query(
                r"
                UPDATE groups
                SET name = $1, comments = $2, valid_id = $3, change_time = NOW(), change_by = $4
                WHERE id = $5
                RETURNING id, name, comments, valid_id, create_time, change_time
                ",
            )
            .bind(&input.name)
            .bind(&input.comments)
            .bind(valid_id(&input)?)
            .bind(user_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::not_found("group", id))?;
            Ok(Self::row_to_group(&row))
        })
    }

    fn delete(&self, id: i64) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let group = self.get(id).await?;
            ensure_deletable(&group)?;

            let (in_use,): (bool,) = sqlx::query_as(
                r"
                SELECT EXISTS (SELECT 1 FROM group_user WHERE group_id = $1)
                    OR EXISTS (SELECT 1 FROM group_customer_user WHERE group_id = $1)
                    OR EXISTS (SELECT 1 FROM group_customer WHERE group_id = $1)
                ",
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
            if in_use {
                return Err(StoreError::Conflict(format!(
                    "group {} still has permission assignments",
                    group.name
                )));
            }

            sqlx::query("DELETE FROM groups WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
            tracing::info!(group_id = id, name = %group.name, "group deleted");
            Ok(())
        })
    }
}
