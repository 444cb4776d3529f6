//! Application state for Axum handlers.
//!
//! Stores are held as `Arc<dyn Trait>` so the same router runs against
//! `PostgreSQL` in the server and in-memory stores in tests.

use helpdesk_core::api_token::ApiTokenService;
use helpdesk_core::dynamic_field::DynamicFieldRepository;
use helpdesk_core::environment::Clock;
use helpdesk_core::generic_agent::GenericAgentRepository;
use helpdesk_core::group::GroupRepository;
use helpdesk_core::permission::PermissionRepository;
use helpdesk_core::postmaster::PostmasterFilterRepository;
use helpdesk_core::ticket::{TicketRepository, TicketService};
use helpdesk_core::StoreFuture;
use std::sync::Arc;

/// Readiness check for the backing database.
pub trait HealthProbe: Send + Sync {
    /// Succeeds if the database answers.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ticket creation (validation, numbering, insert).
    pub ticket_service: TicketService,
    /// Ticket reads and search.
    pub tickets: Arc<dyn TicketRepository>,
    /// Token generation and verification.
    pub tokens: ApiTokenService,
    /// Groups.
    pub groups: Arc<dyn GroupRepository>,
    /// Group permissions for all subject kinds.
    pub permissions: Arc<dyn PermissionRepository>,
    /// Postmaster filters.
    pub postmaster_filters: Arc<dyn PostmasterFilterRepository>,
    /// Generic agent jobs.
    pub generic_agent: Arc<dyn GenericAgentRepository>,
    /// Dynamic field definitions.
    pub dynamic_fields: Arc<dyn DynamicFieldRepository>,
    /// Database readiness.
    pub health: Arc<dyn HealthProbe>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Axum requires Clone state
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
