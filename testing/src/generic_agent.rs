//! In-memory generic agent jobs.

use chrono::{DateTime, Utc};
use helpdesk_core::generic_agent::{
    GenericAgentJob, GenericAgentRepository, JobUpdate, LAST_RUN_KEY, VALID_KEY, validate_name,
};
use helpdesk_core::{StoreError, StoreFuture};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Job store holding the denormalized `(job_name, job_key) → job_value` rows.
#[derive(Clone, Debug, Default)]
pub struct InMemoryGenericAgentStore {
    rows: Arc<RwLock<BTreeMap<(String, String), String>>>,
}

impl InMemoryGenericAgentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value of one row.
    #[must_use]
    pub fn row(&self, name: &str, key: &str) -> Option<String> {
        self.rows
            .read()
            .unwrap()
            .get(&(name.to_string(), key.to_string()))
            .cloned()
    }

    fn apply_update(&self, name: &str, update: &JobUpdate) -> Result<(), StoreError> {
        let mut rows = self.rows.write().unwrap();
        if !rows.keys().any(|(n, _)| n == name) {
            return Err(StoreError::not_found("generic agent job", name));
        }

        let mut target = name.to_string();
        if let Some(new_name) = update.new_name.as_deref().map(str::trim) {
            if !new_name.is_empty() && new_name != name {
                if rows.keys().any(|(n, _)| n == new_name) {
                    return Err(StoreError::Conflict(format!(
                        "job {new_name} already exists"
                    )));
                }
                let moved: Vec<_> = rows
                    .iter()
                    .filter(|((n, _), _)| n == name)
                    .map(|((_, k), v)| (k.clone(), v.clone()))
                    .collect();
                rows.retain(|(n, _), _| n != name);
                for (k, v) in moved {
                    rows.insert((new_name.to_string(), k), v);
                }
                target = new_name.to_string();
            }
        }

        if let Some(valid) = update.valid {
            rows.insert((target.clone(), VALID_KEY.to_string()), bool_row(valid));
        }
        for (key, value) in &update.config {
            if key != VALID_KEY {
                rows.insert((target.clone(), key.clone()), value.clone());
            }
        }
        Ok(())
    }
}

fn bool_row(valid: bool) -> String {
    if valid { "1" } else { "0" }.to_string()
}

impl GenericAgentRepository for InMemoryGenericAgentStore {
    fn list_names(&self) -> StoreFuture<'_, Vec<String>> {
        let mut names: Vec<String> = self
            .rows
            .read()
            .unwrap()
            .keys()
            .map(|(name, _)| name.clone())
            .collect();
        names.dedup();
        Box::pin(async move { Ok(names) })
    }

    fn get<'a>(&'a self, name: &'a str) -> StoreFuture<'a, GenericAgentJob> {
        let rows: Vec<(String, String)> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|((n, _), _)| n == name)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect();
        let result = if rows.is_empty() {
            Err(StoreError::not_found("generic agent job", name))
        } else {
            Ok(GenericAgentJob::from_rows(name, rows))
        };
        Box::pin(async move { result })
    }

    fn create<'a>(&'a self, job: &'a GenericAgentJob) -> StoreFuture<'a, ()> {
        let result = validate_name(&job.name).and_then(|()| {
            let mut rows = self.rows.write().unwrap();
            if rows.keys().any(|(n, _)| *n == job.name) {
                return Err(StoreError::Conflict(format!(
                    "job {} already exists",
                    job.name
                )));
            }
            rows.insert((job.name.clone(), VALID_KEY.to_string()), bool_row(job.valid));
            for (key, value) in &job.config {
                if key != VALID_KEY {
                    rows.insert((job.name.clone(), key.clone()), value.clone());
                }
            }
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn update<'a>(&'a self, name: &'a str, update: &'a JobUpdate) -> StoreFuture<'a, ()> {
        let result = self.apply_update(name, update);
        Box::pin(async move { result })
    }

    fn delete<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        let result = {
            let mut rows = self.rows.write().unwrap();
            let before = rows.len();
            rows.retain(|(n, _), _| n != name);
            if rows.len() == before {
                Err(StoreError::not_found("generic agent job", name))
            } else {
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn record_run<'a>(&'a self, name: &'a str, at: DateTime<Utc>) -> StoreFuture<'a, ()> {
        self.rows.write().unwrap().insert(
            (name.to_string(), LAST_RUN_KEY.to_string()),
            at.to_rfc3339(),
        );
        Box::pin(async { Ok(()) })
    }
}
