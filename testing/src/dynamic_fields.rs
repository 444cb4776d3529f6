//! In-memory dynamic field definitions.

use helpdesk_core::dynamic_field::{
    DynamicField, DynamicFieldRepository, ObjectType, ScreenConfig,
};
use helpdesk_core::{StoreError, StoreFuture};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct State {
    fields: BTreeMap<i64, DynamicField>,
    screens: BTreeMap<(i64, String), i32>,
    next_id: i64,
}

/// Dynamic field store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDynamicFieldStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryDynamicFieldStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored screen settings.
    #[must_use]
    pub fn screen_count(&self) -> usize {
        self.state.read().unwrap().screens.len()
    }
}

impl DynamicFieldRepository for InMemoryDynamicFieldStore {
    fn list(&self, object_type: Option<ObjectType>) -> StoreFuture<'_, Vec<DynamicField>> {
        let mut fields: Vec<DynamicField> = self
            .state
            .read()
            .unwrap()
            .fields
            .values()
            .filter(|f| object_type.is_none_or(|o| f.object_type == o))
            .cloned()
            .collect();
        fields.sort_by(|a, b| a.field_order.cmp(&b.field_order).then(a.name.cmp(&b.name)));
        Box::pin(async move { Ok(fields) })
    }

    fn get_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<DynamicField>> {
        let field = self
            .state
            .read()
            .unwrap()
            .fields
            .values()
            .find(|f| f.name == name)
            .cloned();
        Box::pin(async move { Ok(field) })
    }

    fn create<'a>(&'a self, field: &'a DynamicField, _user_id: i64) -> StoreFuture<'a, i64> {
        let result = {
            let mut state = self.state.write().unwrap();
            if state.fields.values().any(|f| f.name == field.name) {
                Err(StoreError::Conflict(format!(
                    "dynamic field {} already exists",
                    field.name
                )))
            } else {
                state.next_id += 1;
                let id = state.next_id;
                let mut stored = field.clone();
                stored.id = id;
                state.fields.insert(id, stored);
                Ok(id)
            }
        };
        Box::pin(async move { result })
    }

    fn update<'a>(&'a self, field: &'a DynamicField, _user_id: i64) -> StoreFuture<'a, ()> {
        let result = {
            let mut state = self.state.write().unwrap();
            match state.fields.get_mut(&field.id) {
                Some(stored) => {
                    stored.label.clone_from(&field.label);
                    stored.field_order = field.field_order;
                    stored.field_type = field.field_type;
                    stored.object_type = field.object_type;
                    stored.config.clone_from(&field.config);
                    stored.valid_id = field.valid_id;
                    Ok(())
                }
                None => Err(StoreError::not_found("dynamic field", field.id)),
            }
        };
        Box::pin(async move { result })
    }

    fn screen_configs(&self, field_id: i64) -> StoreFuture<'_, Vec<ScreenConfig>> {
        let screens = self
            .state
            .read()
            .unwrap()
            .screens
            .iter()
            .filter(|((id, _), _)| *id == field_id)
            .map(|((id, key), value)| ScreenConfig {
                field_id: *id,
                screen_key: key.clone(),
                config_value: *value,
            })
            .collect();
        Box::pin(async move { Ok(screens) })
    }

    fn set_screen_config<'a>(
        &'a self,
        field_id: i64,
        screen_key: &'a str,
        value: i32,
        _user_id: i64,
    ) -> StoreFuture<'a, ()> {
        self.state
            .write()
            .unwrap()
            .screens
            .insert((field_id, screen_key.to_string()), value);
        Box::pin(async { Ok(()) })
    }
}
