//! Generic agent jobs in `generic_agent_jobs`.

use crate::db_error;
use chrono::{DateTime, Utc};
use helpdesk_core::generic_agent::{
    GenericAgentJob, GenericAgentRepository, JobUpdate, LAST_RUN_KEY, VALID_KEY, validate_name,
};
use helpdesk_core::{StoreError, StoreFuture};
use sqlx::{PgPool, Postgres, Transaction};

/// Generic agent job store.
#[derive(Clone, Debug)]
pub struct PostgresGenericAgentStore {
    pool: PgPool,
}

impl PostgresGenericAgentStore {
    /// Create a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn job_exists(tx: &mut Transaction<'_, Postgres>, name: &str) -> Result<bool, StoreError> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM generic_agent_jobs WHERE job_name = $1)")
            .bind(name)
            .fetch_one(&mut **tx)
            .await
            .map_err(db_error)?;
    Ok(exists)
}

/// Delete-then-insert one `(job, key)` row.
async fn put_row(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    key: &str,
    value: &str,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM generic_agent_jobs WHERE job_name = $1 AND job_key = $2")
        .bind(name)
        .bind(key)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
    sqlx::query("INSERT INTO generic_agent_jobs (job_name, job_key, job_value) VALUES ($1, $2, $3)")
        .bind(name)
        .bind(key)
        .bind(value)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
    Ok(())
}

fn valid_value(valid: bool) -> &'static str {
    if valid { "1" } else { "0" }
}

impl GenericAgentRepository for PostgresGenericAgentStore {
    fn list_names(&self) -> StoreFuture<'_, Vec<String>> {
        Box::pin(async move {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT DISTINCT job_name FROM generic_agent_jobs ORDER BY job_name")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_error)?;
            Ok(rows.into_iter().map(|(name,)| name).collect())
        })
    }

    fn get<'a>(&'a self, name: &'a str) -> StoreFuture<'a, GenericAgentJob> {
        Box::pin(async move {
            let rows: Vec<(String, Option<String>)> = sqlx::query_as(
                "SELECT job_key, job_value FROM generic_agent_jobs WHERE job_name = $1 ORDER BY job_key",
            )
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
            if rows.is_empty() {
                return Err(StoreError::not_found("generic agent job", name));
            }
            Ok(GenericAgentJob::from_rows(
                name,
                rows.into_iter().map(|(k, v)| (k, v.unwrap_or_default())),
            ))
        })
    }

    fn create<'a>(&'a self, job: &'a GenericAgentJob) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            validate_name(&job.name)?;
            let mut tx = self.pool.begin().await.map_err(db_error)?;
            if job_exists(&mut tx, &job.name).await? {
                return Err(StoreError::Conflict(format!(
                    "job {} already exists",
                    job.name
                )));
            }

            put_row(&mut tx, &job.name, VALID_KEY, valid_value(job.valid)).await?;
            for (key, value) in &job.config {
                if key != VALID_KEY {
                    put_row(&mut tx, &job.name, key, value).await?;
                }
            }
            tx.commit().await.map_err(db_error)?;

            tracing::info!(job = %job.name, keys = job.config.len(), "generic agent job created");
            Ok(())
        })
    }

    fn update<'a>(&'a self, name: &'a str, update: &'a JobUpdate) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error)?;
            if !job_exists(&mut tx, name).await? {
                return Err(StoreError::not_found("generic agent job", name));
            }

            let mut target = name;
            if let Some(new_name) = update.new_name.as_deref().map(str::trim) {
                if !new_name.is_empty() && new_name != name {
                    if job_exists(&mut tx, new_name).await? {
                        return Err(StoreError::Conflict(format!(
                            "job {new_name} already exists"
                        )));
                    }
                    sqlx::query("UPDATE generic_agent_jobs SET job_name = $1 WHERE job_name = $2")
                        .bind(new_name)
                        .bind(name)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_error)?;
                    target = new_name;
                }
            }

            if let Some(valid) = update.valid {
                put_row(&mut tx, target, VALID_KEY, valid_value(valid)).await?;
            }
            for (key, value) in &update.config {
                if key != VALID_KEY {
                    put_row(&mut tx, target, key, value).await?;
                }
            }
            tx.commit().await.map_err(db_error)?;

            tracing::info!(job = target, old_name = name, "generic agent job updated");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM generic_agent_jobs WHERE job_name = $1")
                .bind(name)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("generic agent job", name));
            }
            tracing::info!(job = name, "generic agent job deleted");
            Ok(())
        })
    }

    fn record_run<'a>(&'a self, name: &'a str, at: DateTime<Utc>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error)?;
            put_row(&mut tx, name, LAST_RUN_KEY, &at.to_rfc3339()).await?;
            tx.commit().await.map_err(db_error)?;
            Ok(())
        })
    }
}
