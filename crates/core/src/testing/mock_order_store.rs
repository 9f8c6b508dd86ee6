//! Mock order store for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use crate::entity_cache::{OrderStore, OrderStoreError};

/// In-memory implementation of the OrderStore trait.
///
/// Provides controllable behavior for testing:
/// - Preloaded `system_ref_id -> entity_id` rows
/// - An unreachable switch that makes every call fail
/// - A record of every batch queried, for asserting cache behavior
///
/// # Example
///
/// ```rust,ignore
/// use orderflow_core::testing::MockOrderStore;
///
/// let store = MockOrderStore::new().with_row("DST-1", "ENT-1");
/// let found = store.find_entity_ids(&["DST-1".to_string()])?;
/// assert_eq!(store.query_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockOrderStore {
    rows: RwLock<HashMap<String, String>>,
    unreachable: AtomicBool,
    queries: Mutex<Vec<Vec<String>>>,
}

impl MockOrderStore {
    /// Create an empty, reachable mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row (builder style).
    pub fn with_row(self, system_ref_id: &str, entity_id: &str) -> Self {
        self.insert(system_ref_id, entity_id);
        self
    }

    /// Start out unreachable (builder style).
    pub fn unreachable(self) -> Self {
        self.set_unreachable(true);
        self
    }

    /// Add a row.
    pub fn insert(&self, system_ref_id: &str, entity_id: &str) {
        self.rows
            .write()
            .unwrap()
            .insert(system_ref_id.to_string(), entity_id.to_string());
    }

    /// Toggle whether calls fail as if the database were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of `find_entity_ids` calls that reached the store.
    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Every batch passed to `find_entity_ids`, in call order.
    pub fn queried_ids(&self) -> Vec<Vec<String>> {
        self.queries.lock().unwrap().clone()
    }

    fn check_reachable(&self) -> Result<(), OrderStoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(OrderStoreError::Unavailable(
                "mock store is unreachable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl OrderStore for MockOrderStore {
    fn ping(&self) -> Result<(), OrderStoreError> {
        self.check_reachable()
    }

    fn find_entity_ids(&self, ids: &[String]) -> Result<HashMap<String, String>, OrderStoreError> {
        self.check_reachable()?;
        self.queries.lock().unwrap().push(ids.to_vec());
        let rows = self.rows.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(id).map(|entity| (id.clone(), entity.clone())))
            .collect())
    }
}
