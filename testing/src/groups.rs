//! In-memory groups.

use crate::{InMemoryPermissionStore, store_time};
use helpdesk_core::group::{Group, GroupInput, GroupRepository, ensure_deletable, name_matches};
use helpdesk_core::{StoreError, StoreFuture};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<i64, Group>,
    next_id: i64,
}

/// Group store. Deletion consults the attached permission store for references.
#[derive(Clone, Debug, Default)]
pub struct InMemoryGroupStore {
    state: Arc<RwLock<State>>,
    permissions: InMemoryPermissionStore,
}

impl InMemoryGroupStore {
    /// Create a store whose delete checks `permissions` for rows referencing a group.
    #[must_use]
    pub fn new(permissions: InMemoryPermissionStore) -> Self {
        Self {
            state: Arc::default(),
            permissions,
        }
    }

    /// Create a store seeded with the standard `admin` and `users` groups.
    #[must_use]
    pub fn seeded(permissions: InMemoryPermissionStore) -> Self {
        let store = Self::new(permissions);
        for name in ["admin", "users"] {
            let _ = store.insert(&GroupInput {
                name: name.to_string(),
                comments: None,
                valid_id: 1,
            });
        }
        store
    }

    fn insert(&self, input: &GroupInput) -> Result<Group, StoreError> {
        let input = input.clone().normalized()?;
        let mut state = self.state.write().unwrap();
        if state.groups.values().any(|g| g.name == input.name) {
            return Err(StoreError::Conflict(format!(
                "group {} already exists",
                input.name
            )));
        }
        state.next_id += 1;
        let now = store_time();
        let group = Group {
            id: state.next_id,
            name: input.name,
            comments: input.comments,
            valid_id: input.valid_id,
            create_time: now,
            change_time: now,
        };
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    fn remove(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        let group = state
            .groups
            .get(&id)
            .ok_or_else(|| StoreError::not_found("group", id))?;
        ensure_deletable(group)?;
        if self.permissions.group_in_use(id) {
            return Err(StoreError::Conflict(format!(
                "group {} still has permission assignments",
                group.name
            )));
        }
        state.groups.remove(&id);
        Ok(())
    }
}

impl GroupRepository for InMemoryGroupStore {
    fn list<'a>(&'a self, search: Option<&'a str>) -> StoreFuture<'a, Vec<Group>> {
        let mut groups: Vec<Group> = self
            .state
            .read()
            .unwrap()
            .groups
            .values()
            .filter(|g| name_matches(&g.name, search))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Box::pin(async move { Ok(groups) })
    }

    fn get(&self, id: i64) -> StoreFuture<'_, Group> {
        let group = self
            .state
            .read()
            .unwrap()
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("group", id));
        Box::pin(async move { group })
    }

    fn create<'a>(&'a self, input: &'a GroupInput, _user_id: i64) -> StoreFuture<'a, Group> {
        let result = self.insert(input);
        Box::pin(async move { result })
    }

    fn update<'a>(&'a self, id: i64, input: &'a GroupInput, _user_id: i64) -> StoreFuture<'a, Group> {
        let result = input.clone().normalized().and_then(|input| {
            let mut state = self.state.write().unwrap();
            if state
                .groups
                .values()
                .any(|g| g.id != id && g.name == input.name)
            {
                return Err(StoreError::Conflict(format!(
                    "group {} already exists",
                    input.name
                )));
            }
            let group = state
                .groups
                .get_mut(&id)
                .ok_or_else(|| StoreError::not_found("group", id))?;
            group.name = input.name;
            group.comments = input.comments;
            group.valid_id = input.valid_id;
            group.change_time = store_time();
            Ok(group.clone())
        });
        Box::pin(async move { result })
    }

    fn delete(&self, id: i64) -> StoreFuture<'_, ()> {
        let result = self.remove(id);
        Box::pin(async move { result })
    }
}
