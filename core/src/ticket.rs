//! Tickets: the minimal record the number generator feeds.

use crate::dynamic_field::filter::DynamicFieldFilter;
use crate::ticket_number::{CounterStore, TicketNumberError, TicketNumberGenerator};
use crate::{StoreError, StoreFuture};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 255;
/// Default priority id ("3 normal").
pub const DEFAULT_PRIORITY_ID: i64 = 3;
/// Default state id ("new").
pub const DEFAULT_STATE_ID: i64 = 1;
/// Default page size for [`TicketSearch`].
pub const DEFAULT_SEARCH_LIMIT: i64 = 50;
/// Largest accepted page size.
pub const MAX_SEARCH_LIMIT: i64 = 500;

const fn default_priority_id() -> i64 {
    DEFAULT_PRIORITY_ID
}

const fn default_state_id() -> i64 {
    DEFAULT_STATE_ID
}

/// Input for creating a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// Ticket title.
    pub title: String,
    /// Queue the ticket is filed in.
    pub queue_id: i64,
    /// Priority id.
    #[serde(default = "default_priority_id")]
    pub priority_id: i64,
    /// State id.
    #[serde(default = "default_state_id")]
    pub state_id: i64,
    /// Customer company id.
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Customer user login.
    #[serde(default)]
    pub customer_user_id: Option<String>,
}

impl NewTicket {
    /// Check the fields that do not need a database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for a blank or overlong title or a
    /// non-positive queue id.
    pub fn validate(&self) -> Result<(), StoreError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("title is required".into()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(StoreError::Validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        if self.queue_id <= 0 {
            return Err(StoreError::Validation("queue_id is required".into()));
        }
        Ok(())
    }
}

/// A stored ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Row id.
    pub id: i64,
    /// Ticket number.
    pub tn: String,
    /// Title.
    pub title: String,
    /// Queue id.
    pub queue_id: i64,
    /// Priority id.
    pub priority_id: i64,
    /// State id.
    pub state_id: i64,
    /// Customer company id.
    pub customer_id: Option<String>,
    /// Customer user login.
    pub customer_user_id: Option<String>,
    /// Creation time.
    pub create_time: DateTime<Utc>,
    /// Creating user.
    pub create_by: i64,
}

/// Ticket search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TicketSearch {
    /// Restrict to one queue.
    pub queue_id: Option<i64>,
    /// Restrict to one state.
    pub state_id: Option<i64>,
    /// Dynamic field predicates, all of which must hold.
    pub dynamic_field_filters: Vec<DynamicFieldFilter>,
    /// Page size.
    pub limit: i64,
    /// Rows to skip.
    pub offset: i64,
}

impl TicketSearch {
    /// Clamp `limit` into `1..=MAX_SEARCH_LIMIT` (0 means the default) and `offset` to `>= 0`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.limit = match self.limit {
            l if l <= 0 => DEFAULT_SEARCH_LIMIT,
            l => l.min(MAX_SEARCH_LIMIT),
        };
        self.offset = self.offset.max(0);
        self
    }
}

/// Ticket storage.
pub trait TicketRepository: Send + Sync {
    /// Whether a queue with this id exists.
    fn queue_exists(&self, queue_id: i64) -> StoreFuture<'_, bool>;

    /// Insert a ticket under the given number.
    fn insert<'a>(
        &'a self,
        tn: &'a str,
        ticket: &'a NewTicket,
        user_id: i64,
    ) -> StoreFuture<'a, Ticket>;

    /// Look up a ticket by id.
    fn get(&self, id: i64) -> StoreFuture<'_, Option<Ticket>>;

    /// Search tickets, newest first.
    fn search<'a>(&'a self, search: &'a TicketSearch) -> StoreFuture<'a, Vec<Ticket>>;
}

/// Errors from [`TicketService::create`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// Input or store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The number generator failed.
    #[error(transparent)]
    Number(#[from] TicketNumberError),
}

/// Ticket creation: validation, number generation, insertion.
#[derive(Clone)]
pub struct TicketService {
    tickets: Arc<dyn TicketRepository>,
    counters: Arc<dyn CounterStore>,
    generator: Arc<dyn TicketNumberGenerator>,
}

impl TicketService {
    /// Create a service over the given stores.
    #[must_use]
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        counters: Arc<dyn CounterStore>,
        generator: Arc<dyn TicketNumberGenerator>,
    ) -> Self {
        Self {
            tickets,
            counters,
            generator,
        }
    }

    /// The configured number generator.
    #[must_use]
    pub fn generator(&self) -> &dyn TicketNumberGenerator {
        self.generator.as_ref()
    }

    /// Create a ticket.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] for invalid input or an unknown queue
    /// - [`TicketError::Number`] if no number could be generated
    /// - other store failures from the insert
    pub async fn create(&self, ticket: NewTicket, user_id: i64) -> Result<Ticket, TicketError> {
        ticket.validate()?;
        let ticket = NewTicket {
            title: ticket.title.trim().to_string(),
            ..ticket
        };

        if !self.tickets.queue_exists(ticket.queue_id).await? {
            return Err(StoreError::Validation(format!(
                "queue {} does not exist",
                ticket.queue_id
            ))
            .into());
        }

        let tn = self.generator.next(self.counters.as_ref()).await?;
        let created = self.tickets.insert(&tn, &ticket, user_id).await?;

        tracing::info!(
            ticket_id = created.id,
            tn = %created.tn,
            queue_id = created.queue_id,
            user_id,
            "ticket created"
        );
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_ticket(title: &str) -> NewTicket {
        NewTicket {
            title: title.to_string(),
            queue_id: 1,
            priority_id: DEFAULT_PRIORITY_ID,
            state_id: DEFAULT_STATE_ID,
            customer_id: None,
            customer_user_id: None,
        }
    }

    #[test]
    fn test_validate_title() {
        assert!(new_ticket("Printer on fire").validate().is_ok());
        assert!(matches!(
            new_ticket("   ").validate(),
            Err(StoreError::Validation(_))
        ));
        assert!(new_ticket(&"x".repeat(MAX_TITLE_LEN)).validate().is_ok());
        assert!(new_ticket(&"x".repeat(MAX_TITLE_LEN + 1)).validate().is_err());
    }

    #[test]
    fn test_validate_queue() {
        let mut t = new_ticket("ok");
        t.queue_id = 0;
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_defaults_from_json() {
        let t: NewTicket = serde_json::from_str(r#"{"title":"x","queue_id":2}"#)
            .unwrap();
        assert_eq!(t.priority_id, DEFAULT_PRIORITY_ID);
        assert_eq!(t.state_id, DEFAULT_STATE_ID);
        assert_eq!(t.customer_id, None);
    }

    #[test]
    fn test_search_normalization() {
        let s = TicketSearch {
            limit: 0,
            offset: -5,
            ..TicketSearch::default()
        }
        .normalized();
        assert_eq!(s.limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(s.offset, 0);

        let s = TicketSearch {
            limit: 10_000,
            ..TicketSearch::default()
        }
        .normalized();
        assert_eq!(s.limit, MAX_SEARCH_LIMIT);
    }
}
