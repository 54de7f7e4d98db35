//! Record store collaborators.
//!
//! The engine only needs `list`/`get`/`put`/`delete`. Implementations must
//! keep insertion order in `list()`; re-putting an existing id keeps its
//! position.

mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;

use crate::error::StoreError;
use crate::model::{Initiative, InitiativeId};

pub trait RecordStore {
    /// All records in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend cannot be read.
    fn list(&self) -> Result<Vec<Initiative>, StoreError>;

    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend cannot be read.
    fn get(&self, id: &InitiativeId) -> Result<Option<Initiative>, StoreError>;

    /// Insert or replace by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the write fails; the store is unchanged.
    fn put(&mut self, initiative: &Initiative) -> Result<(), StoreError>;

    /// Remove by id. Removing a missing id is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the write fails.
    fn delete(&mut self, id: &InitiativeId) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend cannot be read.
    fn contains(&self, id: &InitiativeId) -> Result<bool, StoreError> {
        Ok(self.get(id)?.is_some())
    }
}

/// In-process store, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    order: Vec<InitiativeId>,
    records: HashMap<InitiativeId, Initiative>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store, keeping the given order.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = Initiative>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, initiative: Initiative) {
        let id = initiative.id().clone();
        if self.records.insert(id.clone(), initiative).is_none() {
            self.order.push(id);
        }
    }
}

impl RecordStore for MemoryStore {
    fn list(&self) -> Result<Vec<Initiative>, StoreError> {
        Ok(self
            .order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect())
    }

    fn get(&self, id: &InitiativeId) -> Result<Option<Initiative>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    fn put(&mut self, initiative: &Initiative) -> Result<(), StoreError> {
        self.insert(initiative.clone());
        Ok(())
    }

    fn delete(&mut self, id: &InitiativeId) -> Result<(), StoreError> {
        if self.records.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InitiativeFields, Proposal, Status, UserId};

    fn record(id: &str, name: &str) -> Initiative {
        let fields =
            InitiativeFields::from_proposal(Proposal::new(name, "dina", "sgn"), Status::NotStarted);
        Initiative::new(InitiativeId::new(id), UserId::new("dina"), fields)
    }

    fn ids(store: &MemoryStore) -> Vec<String> {
        store
            .list()
            .unwrap()
            .iter()
            .map(|i| i.id().to_string())
            .collect()
    }

    #[test]
    fn list_keeps_insertion_order_across_upserts() {
        let mut store = MemoryStore::with_records([record("b", "B"), record("a", "A")]);
        store.put(&record("c", "C")).unwrap();
        store.put(&record("b", "B2")).unwrap();
        assert_eq!(ids(&store), vec!["b", "a", "c"]);
        assert_eq!(
            store.get(&InitiativeId::new("b")).unwrap().unwrap().fields().name,
            "B2"
        );
    }

    #[test]
    fn delete_is_idempotent() {
        let mut store = MemoryStore::with_records([record("a", "A"), record("b", "B")]);
        store.delete(&InitiativeId::new("a")).unwrap();
        store.delete(&InitiativeId::new("a")).unwrap();
        assert_eq!(ids(&store), vec!["b"]);
        assert!(!store.contains(&InitiativeId::new("a")).unwrap());
        assert_eq!(store.len(), 1);
    }
}
