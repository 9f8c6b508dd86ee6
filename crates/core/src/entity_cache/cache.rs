use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{OrderStore, OrderStoreError};
use crate::metrics::ENTITY_LOOKUPS;

/// Snapshot of the cache contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    /// Cached ids, sorted.
    pub ids: Vec<String>,
}

/// Result of one lookup with counts for operator output.
#[derive(Debug, Clone, Default)]
pub struct LookupReport {
    pub mapping: HashMap<String, String>,
    /// Served from the cache without a store call.
    pub cached: usize,
    /// Resolved by the store in this call.
    pub resolved: usize,
    /// Mapped to themselves (unknown to the store, or store unreachable).
    pub fallback: usize,
    /// Set when the store could not be used.
    pub warning: Option<String>,
}

impl LookupReport {
    /// One-line summary of where the ids came from.
    pub fn summary(&self) -> String {
        let total = self.mapping.len();
        if total > 0 && self.cached == total {
            return format!("All {total} entity ids found in cache");
        }
        format!(
            "Resolved entity ids for {}/{} orders (cached: {}, fallback: {})",
            self.cached + self.resolved,
            total,
            self.cached,
            self.fallback
        )
    }
}

/// Process-wide `system_ref_id -> entity_id` cache.
///
/// Safe to share between concurrent runs; the map is only locked for the
/// split and the merge, never across a store call.
pub struct EntityIdCache {
    entries: RwLock<HashMap<String, String>>,
    store: Option<Arc<dyn OrderStore>>,
}

impl EntityIdCache {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store: Some(store),
        }
    }

    /// A cache with no backing store: every id falls back to itself.
    pub fn without_store() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    pub fn store(&self) -> Option<&Arc<dyn OrderStore>> {
        self.store.as_ref()
    }

    /// Map each id to its entity id. The result has exactly one key per
    /// distinct input id.
    pub fn lookup(&self, ids: &[String]) -> HashMap<String, String> {
        self.lookup_with_report(ids).mapping
    }

    /// Like [`lookup`](Self::lookup), also reporting where results came from.
    pub fn lookup_with_report(&self, ids: &[String]) -> LookupReport {
        let distinct: BTreeSet<&String> = ids.iter().collect();
        let mut report = LookupReport::default();
        let mut uncached = Vec::new();

        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            for id in distinct {
                match entries.get(id) {
                    Some(entity_id) => {
                        report.mapping.insert(id.clone(), entity_id.clone());
                        report.cached += 1;
                    }
                    None => uncached.push(id.clone()),
                }
            }
        }

        ENTITY_LOOKUPS
            .with_label_values(&["hit"])
            .inc_by(report.cached as u64);

        if uncached.is_empty() {
            debug!(ids = report.cached, "All entity ids served from cache");
            return report;
        }

        match self.query(&uncached) {
            Ok(found) => {
                let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
                for id in uncached {
                    let (entity_id, resolved) = match found.get(&id) {
                        Some(entity_id) => (entity_id.clone(), true),
                        None => (id.clone(), false),
                    };
                    if resolved {
                        report.resolved += 1;
                    } else {
                        report.fallback += 1;
                    }
                    entries.insert(id.clone(), entity_id.clone());
                    report.mapping.insert(id, entity_id);
                }
                info!(
                    resolved = report.resolved,
                    fallback = report.fallback,
                    cached = report.cached,
                    "Entity id lookup finished"
                );
            }
            Err(e) => {
                warn!(error = %e, ids = uncached.len(), "Order store unreachable, using identity mapping");
                report.warning = Some(format!(
                    "Cannot reach order store ({e}); using system ref ids as entity ids"
                ));
                report.fallback += uncached.len();
                for id in uncached {
                    report.mapping.insert(id.clone(), id);
                }
            }
        }

        ENTITY_LOOKUPS
            .with_label_values(&["resolved"])
            .inc_by(report.resolved as u64);
        ENTITY_LOOKUPS
            .with_label_values(&["fallback"])
            .inc_by(report.fallback as u64);

        report
    }

    fn query(&self, ids: &[String]) -> Result<HashMap<String, String>, OrderStoreError> {
        match &self.store {
            Some(store) => store.find_entity_ids(ids),
            None => Err(OrderStoreError::Unavailable(
                "no order store configured".to_string(),
            )),
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.len();
        entries.clear();
        info!(removed, "Entity id cache cleared");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        CacheStats {
            size: entries.len(),
            ids,
        }
    }
}
