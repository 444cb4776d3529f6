//! In-memory postmaster filters.

use helpdesk_core::postmaster::{PostmasterFilter, PostmasterFilterRepository};
use helpdesk_core::{StoreError, StoreFuture};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Postmaster filter store keyed by name.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPostmasterFilterStore {
    filters: Arc<RwLock<BTreeMap<String, PostmasterFilter>>>,
}

impl InMemoryPostmasterFilterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PostmasterFilterRepository for InMemoryPostmasterFilterStore {
    fn list(&self) -> StoreFuture<'_, Vec<PostmasterFilter>> {
        let filters = self.filters.read().unwrap().values().cloned().collect();
        Box::pin(async move { Ok(filters) })
    }

    fn get<'a>(&'a self, name: &'a str) -> StoreFuture<'a, PostmasterFilter> {
        let filter = self
            .filters
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("postmaster filter", name));
        Box::pin(async move { filter })
    }

    fn create<'a>(&'a self, filter: &'a PostmasterFilter) -> StoreFuture<'a, ()> {
        let result = {
            let mut filters = self.filters.write().unwrap();
            let name = filter.name.trim();
            if name.is_empty() {
                Err(StoreError::Validation("filter name is required".into()))
            } else if filters.contains_key(name) {
                Err(StoreError::Conflict(format!("filter {name} already exists")))
            } else {
                let mut stored = filter.clone();
                stored.name = name.to_string();
                filters.insert(stored.name.clone(), stored);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn update<'a>(&'a self, name: &'a str, filter: &'a PostmasterFilter) -> StoreFuture<'a, ()> {
        let result = {
            let mut filters = self.filters.write().unwrap();
            let new_name = match filter.name.trim() {
                "" => name.to_string(),
                n => n.to_string(),
            };
            if !filters.contains_key(name) {
                Err(StoreError::not_found("postmaster filter", name))
            } else if new_name != name && filters.contains_key(&new_name) {
                Err(StoreError::Conflict(format!("filter {new_name} already exists")))
            } else {
                filters.remove(name);
                let mut stored = filter.clone();
                stored.name.clone_from(&new_name);
                filters.insert(new_name, stored);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn delete<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        let result = self
            .filters
            .write()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("postmaster filter", name));
        Box::pin(async move { result })
    }
}
