//! Postmaster filters in `postmaster_filter`, one row per match or set rule.

use crate::{db_error, flag};
use helpdesk_core::postmaster::{FilterRow, PostmasterFilter, PostmasterFilterRepository};
use helpdesk_core::{StoreError, StoreFuture};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

/// Postmaster filter store.
#[derive(Clone, Debug)]
pub struct PostgresPostmasterFilterStore {
    pool: PgPool,
}

impl PostgresPostmasterFilterStore {
    /// Create a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_filter_row(row: &PgRow) -> FilterRow {
        let stop: i16 = row.get("f_stop");
        let not: i16 = row.get("f_not");
        FilterRow {
            name: row.get("f_name"),
            stop: stop != 0,
            row_type: row.get("f_type"),
            key: row.get("f_key"),
            value: row.get("f_value"),
            not: not != 0,
        }
    }
}

/// Serialize writers touching `names` until the transaction ends.
///
/// Names are locked in sorted order so two renames cannot deadlock.
async fn lock_names(
    tx: &mut Transaction<'_, Postgres>,
    names: &[&str],
) -> Result<(), StoreError> {
    let mut names = names.to_vec();
    names.sort_unstable();
    names.dedup();
    for name in names {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('postmaster_filter:' || $1))")
            .bind(name)
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
    }
    Ok(())
}

async fn exists(tx: &mut Transaction<'_, Postgres>, name: &str) -> Result<bool, StoreError> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM postmaster_filter WHERE f_name = $1)")
            .bind(name)
            .fetch_one(&mut **tx)
            .await
            .map_err(db_error)?;
    Ok(exists)
}

async fn insert_rows(
    tx: &mut Transaction<'_, Postgres>,
    filter: &PostmasterFilter,
) -> Result<(), StoreError> {
    for row in filter.to_rows() {
        sqlx::query(
            r"
            INSERT INTO postmaster_filter (f_name, f_stop, f_type, f_key, f_value, f_not)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&row.name)
        .bind(flag(row.stop))
        .bind(&row.row_type)
        .bind(&row.key)
        .bind(&row.value)
        .bind(flag(row.not))
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

impl PostmasterFilterRepository for PostgresPostmasterFilterStore {
    fn list(&self) -> StoreFuture<'_, Vec<PostmasterFilter>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT f_name, f_stop, f_type, f_key, f_value, f_not
                FROM postmaster_filter
                ORDER BY f_name, f_type, f_key
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(PostmasterFilter::from_rows(
                rows.iter().map(Self::row_to_filter_row),
            ))
        })
    }

    fn get<'a>(&'a self, name: &'a str) -> StoreFuture<'a, PostmasterFilter> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT f_name, f_stop, f_type, f_key, f_value, f_not
                FROM postmaster_filter
                WHERE f_name = $1
                ORDER BY f_type, f_key
                ",
            )
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
            PostmasterFilter::from_rows(rows.iter().map(Self::row_to_filter_row))
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::not_found("postmaster filter", name))
        })
    }

    fn create<'a>(&'a self, filter: &'a PostmasterFilter) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut filter = filter.clone();
            filter.name = filter.name.trim().to_string();
            if filter.name.is_empty() {
                return Err(StoreError::Validation("filter name is required".into()));
            }

            let mut tx = self.pool.begin().await.map_err(db_error)?;
            lock_names(&mut tx, &[filter.name.as_str()]).await?;
            if exists(&mut tx, &filter.name).await? {
                return Err(StoreError::Conflict(format!(
                    "filter {} already exists",
                    filter.name
                )));
            }
            insert_rows(&mut tx, &filter).await?;
            tx.commit().await.map_err(db_error)?;

            tracing::info!(filter = %filter.name, rows = filter.matches.len() + filter.sets.len(), "postmaster filter created");
            Ok(())
        })
    }

    fn update<'a>(&'a self, name: &'a str, filter: &'a PostmasterFilter) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut filter = filter.clone();
            filter.name = match filter.name.trim() {
                "" => name.to_string(),
                n => n.to_string(),
            };

            let mut tx = self.pool.begin().await.map_err(db_error)?;
            lock_names(&mut tx, &[name, filter.name.as_str()]).await?;
            let removed = sqlx::query("DELETE FROM postmaster_filter WHERE f_name = $1")
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
            if removed.rows_affected() == 0 {
                return Err(StoreError::not_found("postmaster filter", name));
            }
            if filter.name != name && exists(&mut tx, &filter.name).await? {
                return Err(StoreError::Conflict(format!(
                    "filter {} already exists",
                    filter.name
                )));
            }
            insert_rows(&mut tx, &filter).await?;
            tx.commit().await.map_err(db_error)?;

            tracing::info!(old_name = name, filter = %filter.name, "postmaster filter updated");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM postmaster_filter WHERE f_name = $1")
                .bind(name)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("postmaster filter", name));
            }
            tracing::info!(filter = name, "postmaster filter deleted");
            Ok(())
        })
    }
}
