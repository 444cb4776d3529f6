//! Ticket number counters in `ticket_number_counter`.

use helpdesk_core::StoreFuture;
use helpdesk_core::ticket_number::{CounterScope, CounterStore, TicketNumberError};
use sqlx::PgPool;

fn counter_error(e: sqlx::Error) -> TicketNumberError {
    TicketNumberError::Counter(e.to_string())
}

/// Counter store with row-level locking.
///
/// `add` runs `INSERT ... ON CONFLICT DO NOTHING` then `SELECT ... FOR UPDATE` and the
/// update in one transaction, so concurrent callers serialize on the counter row.
#[derive(Clone, Debug)]
pub struct PostgresCounterStore {
    pool: PgPool,
}

impl PostgresCounterStore {
    /// Create a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CounterStore for PostgresCounterStore {
    fn add(&self, scope: CounterScope, offset: i64) -> StoreFuture<'_, i64, TicketNumberError> {
        Box::pin(async move {
            let uid = scope.counter_uid();
            let mut tx = self.pool.begin().await.map_err(counter_error)?;

            sqlx::query(
                r"
                INSERT INTO ticket_number_counter (counter, counter_uid, create_time)
                VALUES (0, $1, NOW())
                ON CONFLICT (counter_uid) DO NOTHING
                ",
            )
            .bind(&uid)
            .execute(&mut *tx)
            .await
            .map_err(counter_error)?;

            let (current,): (i64,) = sqlx::query_as(
                r"
                SELECT counter FROM ticket_number_counter
                WHERE counter_uid = $1
                FOR UPDATE
                ",
            )
            .bind(&uid)
            .fetch_one(&mut *tx)
            .await
            .map_err(counter_error)?;

            let next = current + offset;
            sqlx::query("UPDATE ticket_number_counter SET counter = $1 WHERE counter_uid = $2")
                .bind(next)
                .bind(&uid)
                .execute(&mut *tx)
                .await
                .map_err(counter_error)?;

            tx.commit().await.map_err(counter_error)?;
            Ok(next)
        })
    }

    fn reset(&self, scope: CounterScope, value: i64) -> StoreFuture<'_, (), TicketNumberError> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO ticket_number_counter (counter, counter_uid, create_time)
                VALUES ($1, $2, NOW())
                ON CONFLICT (counter_uid) DO UPDATE
                SET counter = EXCLUDED.counter, create_time = NOW()
                ",
            )
            .bind(value)
            .bind(scope.counter_uid())
            .execute(&self.pool)
            .await
            .map_err(counter_error)?;

            tracing::info!(scope = %scope, value, "ticket number counter reset");
            Ok(())
        })
    }
}
