//! Ticket endpoints.

use super::{ApiResponse, ok};
use crate::error::AppError;
use crate::extractors::{AuthenticatedUser, CorrelationId};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use helpdesk_core::dynamic_field::filter::{build_filter_sql, parse_filters_from_query};
use helpdesk_core::ticket::{
    DEFAULT_PRIORITY_ID, DEFAULT_SEARCH_LIMIT, DEFAULT_STATE_ID, NewTicket, Ticket, TicketSearch,
};
use serde::Deserialize;

/// Body of `POST /api/tickets`.
#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    /// Ticket title.
    pub title: String,
    /// Target queue.
    pub queue_id: i64,
    /// Defaults to 3 (normal).
    pub priority_id: Option<i64>,
    /// Defaults to 1 (new).
    pub state_id: Option<i64>,
    /// Customer company.
    pub customer_id: Option<String>,
    /// Customer user login.
    pub customer_user_id: Option<String>,
}

/// `POST /api/tickets`
pub async fn create_ticket(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    user: AuthenticatedUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Ticket>>), AppError> {
    user.require_scope("tickets:write")?;

    let ticket = NewTicket {
        title: req.title,
        queue_id: req.queue_id,
        priority_id: req.priority_id.unwrap_or(DEFAULT_PRIORITY_ID),
        state_id: req.state_id.unwrap_or(DEFAULT_STATE_ID),
        customer_id: req.customer_id,
        customer_user_id: req.customer_user_id,
    };
    let created = state.ticket_service.create(ticket, user.user_id()).await?;
    tracing::info!(
        ticket_id = created.id,
        tn = %created.tn,
        user_id = user.user_id(),
        %correlation_id,
        "ticket created via API"
    );
    Ok((StatusCode::CREATED, ok(created)))
}

/// `GET /api/tickets/:id`
pub async fn get_ticket(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Ticket>>, AppError> {
    user.require_scope("tickets:read")?;
    let ticket = state
        .tickets
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("ticket", id))?;
    Ok(ok(ticket))
}

fn int_param(pairs: &[(String, String)], name: &str) -> Result<Option<i64>, AppError> {
    pairs
        .iter()
        .find(|(k, v)| k == name && !v.trim().is_empty())
        .map(|(_, v)| {
            v.trim()
                .parse()
                .map_err(|_| AppError::validation(format!("{name} must be an integer")))
        })
        .transpose()
}

/// Build a search from raw query pairs. `df_*` pairs become dynamic field filters.
///
/// # Errors
///
/// 400 for non-numeric ids, limits or offsets, and for malformed filters.
pub fn search_from_query(pairs: &[(String, String)]) -> Result<TicketSearch, AppError> {
    let filters =
        parse_filters_from_query(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    // Rejects bad names before any store sees them
    build_filter_sql(&filters, 1)?;

    Ok(TicketSearch {
        queue_id: int_param(pairs, "queue_id")?,
        state_id: int_param(pairs, "state_id")?,
        dynamic_field_filters: filters,
        limit: int_param(pairs, "limit")?.unwrap_or(DEFAULT_SEARCH_LIMIT),
        offset: int_param(pairs, "offset")?.unwrap_or(0),
    }
    .normalized())
}

/// `GET /api/tickets?queue_id=&state_id=&limit=&offset=&df_<Name>[_<op>]=`
pub async fn search_tickets(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ApiResponse<Vec<Ticket>>>, AppError> {
    user.require_scope("tickets:read")?;
    let search = search_from_query(&pairs)?;
    let tickets = state.tickets.search(&search).await?;
    tracing::debug!(
        results = tickets.len(),
        filters = search.dynamic_field_filters.len(),
        "ticket search"
    );
    Ok(ok(tickets))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use helpdesk_core::dynamic_field::filter::FilterOperator;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_search_from_query() {
        let search = search_from_query(&pairs(&[
            ("queue_id", "2"),
            ("limit", "10"),
            ("df_Severity", "high"),
            ("df_Due_gte", "2025-01-01"),
            ("unrelated", "x"),
        ]))
        .unwrap();

        assert_eq!(search.queue_id, Some(2));
        assert_eq!(search.state_id, None);
        assert_eq!(search.limit, 10);
        assert_eq!(search.dynamic_field_filters.len(), 2);
        assert_eq!(search.dynamic_field_filters[0].field_name, "Due");
        assert_eq!(search.dynamic_field_filters[0].operator, FilterOperator::Gte);
    }

    #[test]
    fn test_search_defaults() {
        let search = search_from_query(&[]).unwrap();
        assert_eq!(search.limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(search.offset, 0);
    }

    #[test]
    fn test_search_rejects_bad_input() {
        assert!(search_from_query(&pairs(&[("queue_id", "abc")])).is_err());
        assert!(search_from_query(&pairs(&[("df_Due_Date", "x")])).is_err());
    }
}
