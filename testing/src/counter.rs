//! In-memory ticket number counters.

use helpdesk_core::StoreFuture;
use helpdesk_core::ticket_number::{CounterScope, CounterStore, TicketNumberError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Counter store backed by a `HashMap` keyed on the counter uid.
///
/// A single mutex makes `add` atomic, matching the row lock the `PostgreSQL`
/// store takes.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Arc<Mutex<HashMap<String, i64>>>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a scope, if it exists.
    #[must_use]
    pub fn value(&self, scope: CounterScope) -> Option<i64> {
        self.counters.lock().unwrap().get(&scope.counter_uid()).copied()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn add(&self, scope: CounterScope, offset: i64) -> StoreFuture<'_, i64, TicketNumberError> {
        let result = {
            let mut counters = self.counters.lock().unwrap();
            let value = counters.entry(scope.counter_uid()).or_insert(0);
            *value += offset;
            *value
        };
        Box::pin(async move { Ok(result) })
    }

    fn reset(&self, scope: CounterScope, value: i64) -> StoreFuture<'_, (), TicketNumberError> {
        self.counters
            .lock()
            .unwrap()
            .insert(scope.counter_uid(), value);
        Box::pin(async { Ok(()) })
    }
}
