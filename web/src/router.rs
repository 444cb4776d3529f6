//! Route table.

use crate::handlers::{
    dynamic_fields, generic_agent, groups, health, permissions, postmaster, ticket_number,
    tickets, tokens,
};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

/// Build the application router.
///
/// Layers run outermost first: correlation ID, then request tracing, then
/// response compression.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .merge(api_routes())
        .nest("/admin", admin_routes())
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tickets",
            get(tickets::search_tickets).post(tickets::create_ticket),
        )
        .route("/api/tickets/:id", get(tickets::get_ticket))
        .route(
            "/api/v1/tokens",
            get(tokens::list_tokens).post(tokens::create_token),
        )
        .route("/api/v1/tokens/scopes", get(tokens::list_scopes))
        .route(
            "/api/v1/tokens/:id",
            axum::routing::delete(tokens::revoke_token),
        )
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/debug/ticket-number",
            get(ticket_number::ticket_number_info),
        )
        .route(
            "/groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route(
            "/groups/:id",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        .route(
            "/permissions/:kind/subjects/:subject",
            get(permissions::get_subject_permissions).put(permissions::put_subject_permissions),
        )
        .route(
            "/permissions/:kind/groups/:group_id",
            get(permissions::get_group_permissions).put(permissions::put_group_permissions),
        )
        .route(
            "/postmaster-filters",
            get(postmaster::list_filters).post(postmaster::create_filter),
        )
        .route("/postmaster-filters/test", post(postmaster::test_filters))
        .route(
            "/postmaster-filters/:name",
            get(postmaster::get_filter)
                .put(postmaster::update_filter)
                .delete(postmaster::delete_filter),
        )
        .route(
            "/generic-agent",
            get(generic_agent::list_jobs).post(generic_agent::create_job),
        )
        .route(
            "/generic-agent/:name",
            get(generic_agent::get_job)
                .put(generic_agent::update_job)
                .delete(generic_agent::delete_job),
        )
        .route("/dynamic-fields/export", get(dynamic_fields::export_fields))
        .route(
            "/dynamic-fields/import/preview",
            post(dynamic_fields::preview_import),
        )
        .route("/dynamic-fields/import", post(dynamic_fields::import_fields))
        .route("/dynamic-fields/search", get(dynamic_fields::searchable))
        .route("/tokens", get(tokens::admin_list_tokens))
        .route(
            "/tokens/:id",
            axum::routing::delete(tokens::admin_revoke_token),
        )
}
