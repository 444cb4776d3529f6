//! Tickets.

use crate::db_error;
use helpdesk_core::dynamic_field::filter::{SqlArg, build_filter_sql};
use helpdesk_core::ticket::{NewTicket, Ticket, TicketRepository, TicketSearch};
use helpdesk_core::{StoreError, StoreFuture};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

const TICKET_COLUMNS: &str = "t.id, t.tn, t.title, t.queue_id, t.ticket_priority_id, \
    t.ticket_state_id, t.customer_id, t.customer_user_id, t.create_time, t.create_by";

/// Ticket store over the `ticket` table.
#[derive(Clone, Debug)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Create a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_ticket(row: &PgRow) -> Ticket {
        Ticket {
            id: row.get("id"),
            tn: row.get("tn"),
            title: row.get("title"),
            queue_id: row.get("queue_id"),
            priority_id: row.get("ticket_priority_id"),
            state_id: row.get("ticket_state_id"),
            customer_id: row.get("customer_id"),
            customer_user_id: row.get("customer_user_id"),
            create_time: row.get("create_time"),
            create_by: row.get("create_by"),
        }
    }
}

/// Assemble the search statement; `$1..$4` are queue, state, limit and offset.
fn search_sql(search: &TicketSearch) -> Result<(String, Vec<SqlArg>), StoreError> {
    let (filter_sql, args) = build_filter_sql(&search.dynamic_field_filters, 5)
        .map_err(|e| StoreError::Validation(e.to_string()))?;
    let mut sql = format!(
        "SELECT {TICKET_COLUMNS} FROM ticket t \
         WHERE ($1::BIGINT IS NULL OR t.queue_id = $1) \
         AND ($2::BIGINT IS NULL OR t.ticket_state_id = $2)"
    );
    if !filter_sql.is_empty() {
        sql.push_str(" AND ");
        sql.push_str(&filter_sql);
    }
    sql.push_str(" ORDER BY t.create_time DESC, t.id DESC LIMIT $3 OFFSET $4");
    Ok((sql, args))
}

fn bind_arg<'q>(
    query: Query<'q, Postgres, PgArguments>,
    arg: &'q SqlArg,
) -> Query<'q, Postgres, PgArguments> {
    match arg {
        SqlArg::Text(value) => query.bind(value),
        SqlArg::TextList(values) => query.bind(values),
    }
}

impl TicketRepository for PostgresTicketStore {
    fn queue_exists(&self, queue_id: i64) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM queue WHERE id = $1)")
                    .bind(queue_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_error)?;
            Ok(exists)
        })
    }

    fn insert<'a>(
        &'a self,
        tn: &'a str,
        ticket: &'a NewTicket,
        user_id: i64,
    ) -> StoreFuture<'a, Ticket> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                INSERT INTO ticket (
                    tn, title, queue_id, ticket_priority_id, ticket_state_id,
                    customer_id, customer_user_id,
                    create_time, create_by, change_time, change_by
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), $8, NOW(), $8)
                RETURNING id, tn, title, queue_id, ticket_priority_id, ticket_state_id,
                          customer_id, customer_user_id, create_time, create_by
                ",
            )
            .bind(tn)
            .bind(&ticket.title)
            .bind(ticket.queue_id)
            .bind(ticket.priority_id)
            .bind(ticket.state_id)
            .bind(&ticket.customer_id)
            .bind(&ticket.customer_user_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(Self::row_to_ticket(&row))
        })
    }

    fn get(&self, id: i64) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {TICKET_COLUMNS} FROM ticket t WHERE t.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
            Ok(row.as_ref().map(Self::row_to_ticket))
        })
    }

    fn search<'a>(&'a self, search: &'a TicketSearch) -> StoreFuture<'a, Vec<Ticket>> {
        Box::pin(async move {
            let (sql, args) = search_sql(search)?;
            let mut query = sqlx::query(&sql)
                .bind(search.queue_id)
                .bind(search.state_id)
                .bind(search.limit)
                .bind(search.offset);
            for arg in &args {
                query = bind_arg(query, arg);
            }
            let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
            Ok(rows.iter().map(Self::row_to_ticket).collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use helpdesk_core::dynamic_field::filter::{DynamicFieldFilter, FilterOperator};

    #[test]
    fn test_search_sql_without_filters() {
        let (sql, args) = search_sql(&TicketSearch::default()).unwrap();
        assert!(args.is_empty());
        assert!(!sql.contains("EXISTS"));
        assert!(sql.ends_with("LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn test_search_sql_numbers_filters_after_base_params() {
        let search = TicketSearch {
            dynamic_field_filters: vec![DynamicFieldFilter {
                field_name: "Severity".into(),
                operator: FilterOperator::Eq,
                value: "high".into(),
            }],
            ..TicketSearch::default()
        };
        let (sql, args) = search_sql(&search).unwrap();
        assert!(sql.contains("df.name = $5"));
        assert!(sql.contains("dfv.value_text = $6"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_search_sql_rejects_bad_field_name() {
        let search = TicketSearch {
            dynamic_field_filters: vec![DynamicFieldFilter {
                field_name: "x; DROP TABLE ticket".into(),
                operator: FilterOperator::Eq,
                value: "1".into(),
            }],
            ..TicketSearch::default()
        };
        assert!(matches!(search_sql(&search), Err(StoreError::Validation(_))));
    }
}
