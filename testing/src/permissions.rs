//! In-memory permission tables.

use helpdesk_core::StoreFuture;
use helpdesk_core::permission::{
    PermissionMatrix, PermissionRepository, PermissionSubjectKind, SubjectMatrix,
};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// `(kind, subject, group_id, key)` rows; only granted keys are stored.
type Row = (PermissionSubjectKind, String, i64, String);

/// Permission store holding all three tables in one set.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPermissionStore {
    rows: Arc<RwLock<BTreeSet<Row>>>,
}

impl InMemoryPermissionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any table references `group_id`.
    #[must_use]
    pub fn group_in_use(&self, group_id: i64) -> bool {
        self.rows
            .read()
            .unwrap()
            .iter()
            .any(|(_, _, g, _)| *g == group_id)
    }

    /// Number of stored rows across all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.read().unwrap().len()
    }
}

impl PermissionRepository for InMemoryPermissionStore {
    fn for_subject<'a>(
        &'a self,
        kind: PermissionSubjectKind,
        subject: &'a str,
    ) -> StoreFuture<'a, PermissionMatrix> {
        let mut matrix = PermissionMatrix::new();
        for (k, s, group_id, key) in self.rows.read().unwrap().iter() {
            if *k == kind && s == subject {
                matrix.entry(*group_id).or_default().insert(key.clone(), true);
            }
        }
        Box::pin(async move { Ok(matrix) })
    }

    fn for_group(&self, kind: PermissionSubjectKind, group_id: i64) -> StoreFuture<'_, SubjectMatrix> {
        let mut matrix = SubjectMatrix::new();
        for (k, subject, g, key) in self.rows.read().unwrap().iter() {
            if *k == kind && *g == group_id {
                matrix
                    .entry(subject.clone())
                    .or_default()
                    .insert(key.clone(), true);
            }
        }
        Box::pin(async move { Ok(matrix) })
    }

    fn replace_for_subject<'a>(
        &'a self,
        kind: PermissionSubjectKind,
        subject: &'a str,
        matrix: &'a PermissionMatrix,
        _user_id: i64,
    ) -> StoreFuture<'a, ()> {
        {
            let mut rows = self.rows.write().unwrap();
            rows.retain(|(k, s, _, _)| !(*k == kind && s == subject));
            for (group_id, perms) in matrix {
                for (key, granted) in perms {
                    if *granted {
                        rows.insert((kind, subject.to_string(), *group_id, key.clone()));
                    }
                }
            }
        }
        Box::pin(async { Ok(()) })
    }

    fn replace_for_group<'a>(
        &'a self,
        kind: PermissionSubjectKind,
        group_id: i64,
        matrix: &'a SubjectMatrix,
        _user_id: i64,
    ) -> StoreFuture<'a, ()> {
        {
            let mut rows = self.rows.write().unwrap();
            rows.retain(|(k, _, g, _)| !(*k == kind && *g == group_id));
            for (subject, perms) in matrix {
                for (key, granted) in perms {
                    if *granted {
                        rows.insert((kind, subject.clone(), group_id, key.clone()));
                    }
                }
            }
        }
        Box::pin(async { Ok(()) })
    }
}
