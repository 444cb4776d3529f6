//! In-memory tickets with dynamic field values.

use crate::store_time;
use helpdesk_core::dynamic_field::filter::{DynamicFieldFilter, FilterOperator};
use helpdesk_core::ticket::{NewTicket, Ticket, TicketRepository, TicketSearch};
use helpdesk_core::{StoreError, StoreFuture};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct State {
    queues: HashSet<i64>,
    tickets: BTreeMap<i64, Ticket>,
    field_values: HashMap<(i64, String), String>,
    next_id: i64,
}

/// Ticket store that evaluates dynamic field filters in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTicketStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryTicketStore {
    /// Create a store with the given queues.
    #[must_use]
    pub fn with_queues(queues: impl IntoIterator<Item = i64>) -> Self {
        let store = Self::default();
        store.state.write().unwrap().queues.extend(queues);
        store
    }

    /// Set a dynamic field value on a ticket.
    pub fn set_field_value(&self, ticket_id: i64, field: &str, value: &str) {
        self.state
            .write()
            .unwrap()
            .field_values
            .insert((ticket_id, field.to_string()), value.to_string());
    }

    /// Number of stored tickets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().unwrap().tickets.len()
    }

    /// Whether no ticket is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compare(stored: &str, wanted: &str) -> Ordering {
    match (stored.parse::<i64>(), wanted.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => stored.cmp(wanted),
    }
}

fn matches(filter: &DynamicFieldFilter, value: Option<&String>) -> bool {
    let Some(value) = value else {
        return false;
    };
    match filter.operator {
        FilterOperator::Eq => *value == filter.value,
        FilterOperator::Ne => *value != filter.value,
        FilterOperator::Contains => value
            .to_lowercase()
            .contains(&filter.value.to_lowercase()),
        FilterOperator::Gt => compare(value, &filter.value) == Ordering::Greater,
        FilterOperator::Gte => compare(value, &filter.value) != Ordering::Less,
        FilterOperator::Lt => compare(value, &filter.value) == Ordering::Less,
        FilterOperator::Lte => compare(value, &filter.value) != Ordering::Greater,
        FilterOperator::In => filter
            .value
            .split(',')
            .map(str::trim)
            .any(|v| !v.is_empty() && v == value),
    }
}

impl TicketRepository for InMemoryTicketStore {
    fn queue_exists(&self, queue_id: i64) -> StoreFuture<'_, bool> {
        let exists = self.state.read().unwrap().queues.contains(&queue_id);
        Box::pin(async move { Ok(exists) })
    }

    fn insert<'a>(
        &'a self,
        tn: &'a str,
        ticket: &'a NewTicket,
        user_id: i64,
    ) -> StoreFuture<'a, Ticket> {
        let result = {
            let mut state = self.state.write().unwrap();
            if state.tickets.values().any(|t| t.tn == tn) {
                Err(StoreError::Conflict(format!("ticket number {tn} already exists")))
            } else {
                state.next_id += 1;
                let stored = Ticket {
                    id: state.next_id,
                    tn: tn.to_string(),
                    title: ticket.title.clone(),
                    queue_id: ticket.queue_id,
                    priority_id: ticket.priority_id,
                    state_id: ticket.state_id,
                    customer_id: ticket.customer_id.clone(),
                    customer_user_id: ticket.customer_user_id.clone(),
                    create_time: store_time(),
                    create_by: user_id,
                };
                state.tickets.insert(stored.id, stored.clone());
                Ok(stored)
            }
        };
        Box::pin(async move { result })
    }

    fn get(&self, id: i64) -> StoreFuture<'_, Option<Ticket>> {
        let ticket = self.state.read().unwrap().tickets.get(&id).cloned();
        Box::pin(async move { Ok(ticket) })
    }

    fn search<'a>(&'a self, search: &'a TicketSearch) -> StoreFuture<'a, Vec<Ticket>> {
        let found: Vec<Ticket> = {
            let state = self.state.read().unwrap();
            state
                .tickets
                .values()
                .rev()
                .filter(|t| search.queue_id.is_none_or(|q| t.queue_id == q))
                .filter(|t| search.state_id.is_none_or(|s| t.state_id == s))
                .filter(|t| {
                    search.dynamic_field_filters.iter().all(|f| {
                        matches(f, state.field_values.get(&(t.id, f.field_name.clone())))
                    })
                })
                .skip(usize::try_from(search.offset).unwrap_or(0))
                .take(usize::try_from(search.limit).unwrap_or(usize::MAX))
                .cloned()
                .collect()
        };
        Box::pin(async move { Ok(found) })
    }
}
