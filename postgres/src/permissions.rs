//! Group permission tables: `group_customer`, `group_customer_user` and `group_user`.

use crate::db_error;
use helpdesk_core::permission::{
    PERMISSION_CONTEXT, PermissionMatrix, PermissionRepository, PermissionSubjectKind,
    SubjectMatrix,
};
use helpdesk_core::{StoreError, StoreFuture};
use sqlx::{PgPool, Postgres, Row, Transaction};

/// Permission store for all three subject kinds.
///
/// Table and column names come from [`PermissionSubjectKind`], never from input.
#[derive(Clone, Debug)]
pub struct PostgresPermissionStore {
    pool: PgPool,
}

impl PostgresPermissionStore {
    /// Create a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Only `group_customer` carries a permission context column.
const fn has_context(kind: PermissionSubjectKind) -> bool {
    matches!(kind, PermissionSubjectKind::CustomerCompany)
}

async fn insert_grant(
    tx: &mut Transaction<'_, Postgres>,
    kind: PermissionSubjectKind,
    subject: &str,
    group_id: i64,
    key: &str,
    user_id: i64,
) -> Result<(), StoreError> {
    let table = kind.table();
    let column = kind.subject_column();
    let sql = if has_context(kind) {
        format!(
            "INSERT INTO {table} ({column}, group_id, permission_key, permission_value, \
             permission_context, create_time, create_by, change_time, change_by) \
             VALUES ($1, $2, $3, 1, $5, NOW(), $4, NOW(), $4)"
        )
    } else {
        format!(
            "INSERT INTO {table} ({column}, group_id, permission_key, permission_value, \
             create_time, create_by, change_time, change_by) \
             VALUES ($1, $2, $3, 1, NOW(), $4, NOW(), $4)"
        )
    };
    let mut query = sqlx::query(&sql)
        .bind(subject)
        .bind(group_id)
        .bind(key)
        .bind(user_id);
    if has_context(kind) {
        query = query.bind(PERMISSION_CONTEXT);
    }
    query.execute(&mut **tx).await.map_err(db_error)?;
    Ok(())
}

impl PermissionRepository for PostgresPermissionStore {
    fn for_subject<'a>(
        &'a self,
        kind: PermissionSubjectKind,
        subject: &'a str,
    ) -> StoreFuture<'a, PermissionMatrix> {
        Box::pin(async move {
            let sql = format!(
                "SELECT group_id, permission_key, permission_value FROM {} WHERE {} = $1",
                kind.table(),
                kind.subject_column()
            );
            let rows = sqlx::query(&sql)
                .bind(subject)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;

            let mut matrix = PermissionMatrix::new();
            for row in &rows {
                let value: i16 = row.get("permission_value");
                let key: String = row.get("permission_key");
                if kind.is_valid_key(&key) {
                    matrix
                        .entry(row.get("group_id"))
                        .or_default()
                        .insert(key, value > 0);
                }
            }
            Ok(matrix)
        })
    }

    fn for_group(&self, kind: PermissionSubjectKind, group_id: i64) -> StoreFuture<'_, SubjectMatrix> {
        Box::pin(async move {
            let column = kind.subject_column();
            let sql = format!(
                "SELECT {column} AS subject, permission_key, permission_value FROM {} WHERE group_id = $1",
                kind.table()
            );
            let rows = sqlx::query(&sql)
                .bind(group_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;

            let mut matrix = SubjectMatrix::new();
            for row in &rows {
                let value: i16 = row.get("permission_value");
                let key: String = row.get("permission_key");
                if kind.is_valid_key(&key) {
                    matrix
                        .entry(row.get("subject"))
                        .or_default()
                        .insert(key, value > 0);
                }
            }
            Ok(matrix)
        })
    }

    fn replace_for_subject<'a>(
        &'a self,
        kind: PermissionSubjectKind,
        subject: &'a str,
        matrix: &'a PermissionMatrix,
        user_id: i64,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            kind.validate_subject(subject)?;
            let mut tx = self.pool.begin().await.map_err(db_error)?;

            let group_ids: Vec<i64> = matrix.keys().copied().collect();
            let known: Vec<i64> = sqlx::query_scalar("SELECT id FROM groups WHERE id = ANY($1)")
                .bind(&group_ids)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_error)?;
            if let Some(missing) = group_ids.iter().find(|id| !known.contains(id)) {
                return Err(StoreError::not_found("group", missing));
            }

            sqlx::query(&format!(
                "DELETE FROM {} WHERE {} = $1",
                kind.table(),
                kind.subject_column()
            ))
            .bind(subject)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

            let mut granted = 0usize;
            for (group_id, keys) in matrix {
                for (key, enabled) in keys {
                    if *enabled && kind.is_valid_key(key) {
                        insert_grant(&mut tx, kind, subject, *group_id, key, user_id).await?;
                        granted += 1;
                    }
                }
            }

            tx.commit().await.map_err(db_error)?;
            tracing::info!(kind = %kind, subject, granted, user_id, "permissions replaced for subject");
            Ok(())
        })
    }

    fn replace_for_group<'a>(
        &'a self,
        kind: PermissionSubjectKind,
        group_id: i64,
        matrix: &'a SubjectMatrix,
        user_id: i64,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            for subject in matrix.keys() {
                kind.validate_subject(subject)?;
            }
            let mut tx = self.pool.begin().await.map_err(db_error)?;

            sqlx::query(&format!("DELETE FROM {} WHERE group_id = $1", kind.table()))
                .bind(group_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;

            let mut granted = 0usize;
            for (subject, keys) in matrix {
                for (key, enabled) in keys {
                    if *enabled && kind.is_valid_key(key) {
                        insert_grant(&mut tx, kind, subject, group_id, key, user_id).await?;
                        granted += 1;
                    }
                }
            }

            tx.commit().await.map_err(db_error)?;
            tracing::info!(kind = %kind, group_id, granted, user_id, "permissions replaced for group");
            Ok(())
        })
    }
}
