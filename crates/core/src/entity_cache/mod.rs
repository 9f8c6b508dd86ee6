//! Entity id lookup with a process-wide cache.
//!
//! Desty order tokens are system reference ids; its automation expects the
//! internal entity id instead. Ids are resolved in one batched query against
//! an [`OrderStore`] and cached for the life of the process. Ids the store
//! does not know map to themselves, so a lookup never fails.

mod cache;
mod sqlite;

pub use cache::{CacheStats, EntityIdCache, LookupReport};
pub use sqlite::SqliteOrderStore;

use std::collections::HashMap;
use thiserror::Error;

/// Errors from the backing order store.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// The store could not be reached or opened.
    #[error("order store unavailable: {0}")]
    Unavailable(String),

    /// A query failed.
    #[error("database error: {0}")]
    Database(String),
}

/// Read access to the order database that owns the id mapping.
pub trait OrderStore: Send + Sync {
    /// Check that the store is reachable.
    fn ping(&self) -> Result<(), OrderStoreError>;

    /// Resolve a batch of system reference ids. Ids without a row are
    /// absent from the returned map.
    fn find_entity_ids(&self, ids: &[String]) -> Result<HashMap<String, String>, OrderStoreError>;
}
